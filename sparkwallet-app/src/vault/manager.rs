//! CredentialVault - PIN-protected storage of the wallet mnemonic.
//!
//! This module provides the CredentialVault struct that handles:
//! - Saving the mnemonic together with a salted PIN hash
//! - Verifying a PIN against the stored hash
//! - Reading the legacy unprotected mnemonic record
//! - Erasing every saved credential on logout
//!
//! Storage failures never propagate: they are logged and read as "no saved
//! wallet". A corrupted record therefore downgrades the user to a fresh
//! start instead of crashing the app.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::VaultStatus;
use super::error::{VaultError, VaultResult};
use super::salt::{digests_match, hash_pin};
use super::storage::KeyValueStore;

/// Storage key of the PIN-protected credential record.
pub const CREDENTIALS_KEY: &str = "spark_wallet_credentials";

/// Storage key of the legacy record: the raw mnemonic, no PIN.
pub const LEGACY_MNEMONIC_KEY: &str = "spark_wallet_mnemonic";

/// The single credential record kept per device.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub mnemonic: String,
    /// Empty for records written without PIN protection.
    #[serde(default)]
    pub pin_hash: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl CredentialRecord {
    pub fn is_pin_protected(&self) -> bool {
        !self.pin_hash.is_empty()
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("mnemonic", &"[REDACTED]")
            .field("pin_protected", &self.is_pin_protected())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

pub struct CredentialVault {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Classify what is saved on this device.
    pub fn status(&self) -> VaultStatus {
        if self.has_pin_protection() {
            VaultStatus::Locked
        } else if self.load_mnemonic().is_some() {
            VaultStatus::Unprotected
        } else {
            VaultStatus::NotSetup
        }
    }

    /// Persist `mnemonic` protected by `pin`, replacing any saved credential.
    ///
    /// Returns `false` (after logging) if nothing could be written.
    pub fn save_with_pin(&self, mnemonic: &str, pin: &str) -> bool {
        let record = CredentialRecord {
            mnemonic: mnemonic.trim().to_string(),
            pin_hash: hash_pin(pin),
            timestamp: Utc::now().timestamp_millis(),
        };

        match self.write_record(&record) {
            Ok(()) => {
                info!("Saved PIN-protected wallet credentials");
                true
            }
            Err(e) => {
                warn!("Failed to save wallet credentials: {}", e);
                false
            }
        }
    }

    /// Persist `mnemonic` without PIN protection, replacing any saved credential.
    pub fn save_unprotected(&self, mnemonic: &str) -> bool {
        let mnemonic = mnemonic.trim();
        if mnemonic.is_empty() {
            warn!("Refusing to save an empty mnemonic");
            return false;
        }

        let result = self
            .store
            .set(LEGACY_MNEMONIC_KEY, mnemonic)
            .and_then(|()| self.store.remove(CREDENTIALS_KEY));

        match result {
            Ok(()) => {
                info!("Saved wallet without PIN protection");
                true
            }
            Err(e) => {
                warn!("Failed to save wallet: {}", e);
                false
            }
        }
    }

    /// Check `pin` against the stored hash.
    ///
    /// `false` when no protected record exists or it cannot be read.
    pub fn verify_pin(&self, pin: &str) -> bool {
        match self.load_record() {
            Some(record) if record.is_pin_protected() => {
                digests_match(&record.pin_hash, &hash_pin(pin))
            }
            _ => false,
        }
    }

    pub fn has_pin_protection(&self) -> bool {
        self.load_record()
            .map(|record| record.is_pin_protected())
            .unwrap_or(false)
    }

    /// The saved mnemonic, from the credential record or the legacy record.
    pub fn load_mnemonic(&self) -> Option<String> {
        if let Some(record) = self.load_record() {
            return Some(record.mnemonic.clone());
        }

        match self.store.get(LEGACY_MNEMONIC_KEY) {
            Ok(Some(mnemonic)) if !mnemonic.trim().is_empty() => Some(mnemonic.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read legacy wallet record: {}", e);
                None
            }
        }
    }

    /// The credential record, if one exists and is usable.
    pub fn stored_credential(&self) -> Option<CredentialRecord> {
        self.load_record()
    }

    /// Erase the credential record and the legacy record.
    pub fn clear(&self) {
        for key in [CREDENTIALS_KEY, LEGACY_MNEMONIC_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to remove {}: {}", key, e);
            }
        }
        info!("Wallet credentials cleared");
    }

    fn load_record(&self) -> Option<CredentialRecord> {
        match self.try_load_record() {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring saved credentials: {}", e);
                None
            }
        }
    }

    fn try_load_record(&self) -> VaultResult<Option<CredentialRecord>> {
        let Some(raw) = self.store.get(CREDENTIALS_KEY)? else {
            return Ok(None);
        };

        let record: CredentialRecord = serde_json::from_str(&raw)
            .map_err(|e| VaultError::Corrupted(format!("unparseable record: {}", e)))?;

        if record.mnemonic.trim().is_empty() {
            return Err(VaultError::Corrupted("record has an empty mnemonic".into()));
        }

        debug!("Loaded credential record: {:?}", record);
        Ok(Some(record))
    }

    fn write_record(&self, record: &CredentialRecord) -> VaultResult<()> {
        if record.mnemonic.is_empty() {
            return Err(VaultError::Storage("refusing to save an empty mnemonic".into()));
        }

        let json = serde_json::to_string(record)?;
        self.store.set(CREDENTIALS_KEY, &json)?;
        self.store.remove(LEGACY_MNEMONIC_KEY)?;
        Ok(())
    }
}
