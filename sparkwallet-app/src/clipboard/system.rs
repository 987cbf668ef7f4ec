use std::io::{IsTerminal, Write};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use zeroize::Zeroizing;

use super::ClipboardBackend;

struct CopyRequest {
    text: Zeroizing<String>,
    reply: oneshot::Sender<Result<(), String>>,
}

/// The platform clipboard, through `arboard`.
///
/// A dedicated thread owns the `arboard::Clipboard` handle and keeps it open
/// between copies; on X11 and Wayland the copied text is only served while
/// that handle is alive.
pub struct SystemClipboard {
    requests: mpsc::UnboundedSender<CopyRequest>,
}

impl SystemClipboard {
    /// Start the clipboard thread. It exits when this value is dropped.
    pub fn spawn() -> std::io::Result<Self> {
        let (requests, mut rx) = mpsc::unbounded_channel::<CopyRequest>();

        std::thread::Builder::new()
            .name("clipboard".into())
            .spawn(move || {
                let mut handle: Option<arboard::Clipboard> = None;
                while let Some(request) = rx.blocking_recv() {
                    let result = set_text(&mut handle, &request.text);
                    let _ = request.reply.send(result);
                }
                debug!("Clipboard thread stopped");
            })?;

        Ok(Self { requests })
    }
}

/// Write through the cached handle, opening one first if needed.
/// A handle that failed is dropped so the next copy reconnects.
fn set_text(handle: &mut Option<arboard::Clipboard>, text: &str) -> Result<(), String> {
    let mut clipboard = match handle.take() {
        Some(clipboard) => clipboard,
        None => arboard::Clipboard::new().map_err(|e| e.to_string())?,
    };
    clipboard.set_text(text).map_err(|e| e.to_string())?;
    *handle = Some(clipboard);
    Ok(())
}

#[async_trait]
impl ClipboardBackend for SystemClipboard {
    fn name(&self) -> &str {
        "system"
    }

    async fn write_text(&self, text: &str) -> Result<(), String> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(CopyRequest {
                text: Zeroizing::new(text.to_string()),
                reply,
            })
            .map_err(|_| "clipboard thread is not running".to_string())?;

        response
            .await
            .map_err(|_| "clipboard thread is not running".to_string())?
    }
}

/// OSC 52 "set clipboard" sequence for `text`.
pub fn escape_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text.as_bytes()))
}

/// Asks the hosting terminal to set the clipboard.
#[derive(Debug, Default, Clone)]
pub struct Osc52Clipboard;

impl Osc52Clipboard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClipboardBackend for Osc52Clipboard {
    fn name(&self) -> &str {
        "osc52"
    }

    async fn write_text(&self, text: &str) -> Result<(), String> {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            return Err("stdout is not a terminal".into());
        }

        stdout
            .write_all(escape_sequence(text).as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| e.to_string())
    }
}
