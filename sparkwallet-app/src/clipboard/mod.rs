//! Clipboard writes with a fallback path.
//!
//! The service tries the platform clipboard first and falls back to the
//! OSC 52 terminal escape sequence, which most modern terminals forward to
//! the system clipboard (and which also works over SSH).

mod system;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

pub use system::{escape_sequence, Osc52Clipboard, SystemClipboard};

/// Status shown after a successful copy.
pub const COPY_SUCCESS: &str = "Copied!";

/// Status shown when every backend failed.
pub const COPY_FAILURE: &str = "Failed to copy";

#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn write_text(&self, text: &str) -> Result<(), String>;
}

pub struct ClipboardService {
    primary: Option<Arc<dyn ClipboardBackend>>,
    fallback: Option<Arc<dyn ClipboardBackend>>,
}

impl ClipboardService {
    pub fn new(
        primary: Option<Arc<dyn ClipboardBackend>>,
        fallback: Option<Arc<dyn ClipboardBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Platform clipboard backed by OSC 52.
    pub fn system() -> Self {
        let primary = match SystemClipboard::spawn() {
            Ok(clipboard) => Some(Arc::new(clipboard) as Arc<dyn ClipboardBackend>),
            Err(e) => {
                warn!("Failed to start clipboard thread: {}", e);
                None
            }
        };
        let fallback: Arc<dyn ClipboardBackend> = Arc::new(Osc52Clipboard::new());
        Self::new(primary, Some(fallback))
    }

    /// Copy `text`, returning whether any backend accepted it.
    pub async fn copy(&self, text: &str) -> bool {
        for backend in [&self.primary, &self.fallback].into_iter().flatten() {
            match backend.write_text(text).await {
                Ok(()) => {
                    debug!("Copied {} chars via {}", text.chars().count(), backend.name());
                    return true;
                }
                Err(e) => warn!("Clipboard backend {} failed: {}", backend.name(), e),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        fail: bool,
        written: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                written: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClipboardBackend for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write_text(&self, text: &str) -> Result<(), String> {
            if self.fail {
                return Err("unavailable".into());
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let primary = Recording::new(false);
        let fallback = Recording::new(false);
        let service = ClipboardService::new(Some(primary.clone()), Some(fallback.clone()));

        assert!(service.copy("sp1qaddress").await);
        assert_eq!(*primary.written.lock().unwrap(), vec!["sp1qaddress"]);
        assert!(fallback.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_fails() {
        let primary = Recording::new(true);
        let fallback = Recording::new(false);
        let service = ClipboardService::new(Some(primary), Some(fallback.clone()));

        assert!(service.copy("lnbc1").await);
        assert_eq!(*fallback.written.lock().unwrap(), vec!["lnbc1"]);
    }

    #[tokio::test]
    async fn test_system_service_prefers_platform_clipboard() {
        let service = ClipboardService::system();
        assert_eq!(service.primary.as_ref().map(|b| b.name()), Some("system"));
        assert_eq!(service.fallback.as_ref().map(|b| b.name()), Some("osc52"));
    }

    #[tokio::test]
    async fn test_reports_failure_when_nothing_works() {
        let service = ClipboardService::new(None, Some(Recording::new(true)));
        assert!(!service.copy("x").await);
        assert!(!ClipboardService::new(None, None).copy("x").await);
    }
}
