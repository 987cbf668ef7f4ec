//! PIN hashing.
//!
//! A PIN is hashed as `SHA-256(pin || APP_SALT)` and stored as lowercase hex.
//! The salt is a fixed application constant so the same PIN always produces
//! the same digest across restarts.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Application-level salt appended to every PIN before hashing.
pub const APP_SALT: &str = "spark-wallet-pin-salt:v1";

/// Number of digits in a wallet PIN.
pub const PIN_LENGTH: usize = 4;

/// Hash a PIN into a 64-character hex digest.
pub fn hash_pin(pin: &str) -> String {
    let salted = Zeroizing::new(format!("{}{}", pin, APP_SALT));
    let mut hasher = Sha256::new();
    hasher.update(salted.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without leaking the mismatch position.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

/// A PIN is exactly four ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit())
}
