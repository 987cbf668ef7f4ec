use std::path::{Path, PathBuf};

use crate::error::{Result, SparkWalletError};

/// Directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "sparkwallet";

/// Platform data directory for the app, e.g. `~/.local/share/sparkwallet`.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            SparkWalletError::Storage("Could not determine data directory".into())
        })
}

/// Resolve the data directory (explicit override or platform default) and
/// make sure it exists.
pub fn init_data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let data_dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_data_dir()?,
    };

    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}
