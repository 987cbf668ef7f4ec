//! Local credential vault.
//!
//! This module keeps the wallet mnemonic on the device:
//! - PIN-protected credential record (salted SHA-256 PIN hash)
//! - Legacy unprotected mnemonic record
//! - Pluggable key-value storage (file-backed or in-memory)

pub mod auth;
pub mod error;
pub mod manager;
pub mod salt;
pub mod storage;

pub use auth::VaultStatus;
pub use error::{VaultError, VaultResult};
pub use manager::{CredentialRecord, CredentialVault, CREDENTIALS_KEY, LEGACY_MNEMONIC_KEY};
pub use salt::{hash_pin, is_valid_pin, PIN_LENGTH};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
