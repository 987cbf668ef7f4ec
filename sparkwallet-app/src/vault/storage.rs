//! Local persistent key-value storage.
//!
//! This module provides:
//! - `KeyValueStore`: synchronous string-to-string storage, device-scoped
//! - `FileStore`: a JSON object file in the data directory
//! - `MemoryStore`: an in-process map for ephemeral sessions and tests

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use super::error::{VaultError, VaultResult};

/// Storage file name inside the data directory
pub const STORAGE_FILE_NAME: &str = "local-storage.json";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> VaultResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> VaultResult<()>;
    fn remove(&self, key: &str) -> VaultResult<()>;
}

fn lock(entries: &Mutex<BTreeMap<String, String>>) -> VaultResult<MutexGuard<'_, BTreeMap<String, String>>> {
    entries
        .lock()
        .map_err(|_| VaultError::Storage("storage lock poisoned".into()))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> VaultResult<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Key-value store persisted as a single JSON object on disk.
///
/// Every mutation rewrites the whole file: write to a temp file, then rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store inside `data_dir`.
    ///
    /// An unreadable or corrupt file is logged and treated as empty; it is
    /// replaced on the next write.
    pub fn open(data_dir: &Path) -> VaultResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STORAGE_FILE_NAME);

        let entries = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(VaultError::from)
                .and_then(|content| serde_json::from_str(&content).map_err(VaultError::from))
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring unreadable storage file {:?}: {}", path, e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> VaultResult<()> {
        let content = serde_json::to_string_pretty(entries)?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes())?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Write `content` to `path`, readable by the owner only.
///
/// The file holds the wallet mnemonic, so the mode is set before any byte
/// is written.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // A leftover temp file keeps its old mode when reopened
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    /// Memory is only updated once the file write succeeded.
    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        let mut entries = lock(&self.entries)?;
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> VaultResult<()> {
        let mut entries = lock(&self.entries)?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(key);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}
