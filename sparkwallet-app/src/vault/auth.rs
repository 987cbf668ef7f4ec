//! Credential protection state.

use serde::{Deserialize, Serialize};

/// What the local credential store currently holds.
///
/// Checked once at startup to pick the initial Init sub-screen:
/// - `NotSetup` → landing (create or restore)
/// - `Locked` → PIN entry
/// - `Unprotected` → automatic restore from the saved mnemonic
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VaultStatus {
    /// No saved wallet on this device
    #[default]
    NotSetup,
    /// Saved wallet protected by a PIN
    Locked,
    /// Saved wallet without PIN (legacy record or restored wallet)
    Unprotected,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSetup => write!(f, "NotSetup"),
            Self::Locked => write!(f, "Locked"),
            Self::Unprotected => write!(f, "Unprotected"),
        }
    }
}
