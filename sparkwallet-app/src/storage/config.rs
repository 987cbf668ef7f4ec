use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::Network;
use crate::error::Result;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub network: Network,
    /// JSON-RPC endpoint of the wallet SDK bridge.
    pub sdk_endpoint: String,
    /// Esplora-compatible block explorer used to find deposit transactions.
    pub esplora_url: String,
    pub invoice_poll_interval_ms: u64,
    pub deposit_poll_interval_ms: u64,
    pub copy_status_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            sdk_endpoint: "http://127.0.0.1:8080/rpc".to_string(),
            esplora_url: "https://blockstream.info/api".to_string(),
            invoice_poll_interval_ms: 2000,
            deposit_poll_interval_ms: 5000,
            copy_status_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

impl AppSettings {
    pub fn invoice_poll_interval(&self) -> Duration {
        Duration::from_millis(self.invoice_poll_interval_ms)
    }

    pub fn deposit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.deposit_poll_interval_ms)
    }

    pub fn copy_status_duration(&self) -> Duration {
        Duration::from_millis(self.copy_status_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn get_settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE_NAME)
}

pub fn load_settings(data_dir: &Path) -> Result<AppSettings> {
    let path = get_settings_path(data_dir);

    if !path.exists() {
        return Ok(AppSettings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: AppSettings = serde_json::from_str(&content)?;
    Ok(settings)
}

pub fn save_settings(data_dir: &Path, settings: &AppSettings) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = get_settings_path(data_dir);
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, content)?;
    Ok(())
}
