//! Errors raised by the local credential store.
//!
//! The vault itself never lets these escape to the UI: they are logged and
//! treated as "no data". They are still typed so storage backends and tests
//! can tell the failure modes apart.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The stored record exists but cannot be used.
    #[error("Credential record is corrupted: {0}")]
    Corrupted(String),

    /// Backend failure other than I/O (poisoned lock, bad state).
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type VaultResult<T> = std::result::Result<T, VaultError>;

impl From<VaultError> for crate::error::SparkWalletError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Corrupted(msg) => {
                crate::error::SparkWalletError::Storage(format!("Credentials corrupted: {}", msg))
            }
            VaultError::Storage(msg) => crate::error::SparkWalletError::Storage(msg),
            VaultError::Io(e) => crate::error::SparkWalletError::Io(e),
            VaultError::Serialization(e) => crate::error::SparkWalletError::Serialization(e),
        }
    }
}

impl serde::Serialize for VaultError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("VaultError", 2)?;

        let code = match self {
            VaultError::Corrupted(_) => "CORRUPTED",
            VaultError::Storage(_) => "STORAGE_ERROR",
            VaultError::Io(_) => "IO_ERROR",
            VaultError::Serialization(_) => "SERIALIZATION_ERROR",
        };

        state.serialize_field("code", code)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
