mod config;
mod paths;

pub use config::{load_settings, save_settings, AppSettings, SETTINGS_FILE_NAME};
pub use paths::{default_data_dir, init_data_dir, APP_DIR_NAME};
