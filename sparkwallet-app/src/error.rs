use thiserror::Error;

use crate::client::ClientError;

#[derive(Error, Debug)]
pub enum SparkWalletError {
    /// Failure reported by the wallet SDK; the SDK's message is shown as-is.
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("Failed to generate invoice: {0}")]
    InvoiceCreation(ClientError),

    #[error("Failed to generate invoice: received invalid response format from the server")]
    InvalidInvoiceResponse,

    #[error("Failed to claim deposit: {0}")]
    ClaimDeposit(String),

    #[error("Insufficient balance to create invoice. Please add some funds first.")]
    InsufficientBalance,

    #[error("{0}")]
    Validation(String),

    #[error("Incorrect PIN")]
    InvalidPin,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Wallet not initialized")]
    NotInitialized,
}

impl SparkWalletError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl serde::Serialize for SparkWalletError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SparkWalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_message_is_surfaced_verbatim() {
        let err: SparkWalletError = ClientError::Rpc {
            code: -32000,
            message: "invalid mnemonic".into(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid mnemonic");
    }

    #[test]
    fn test_error_serializes_to_message() {
        let json = serde_json::to_string(&SparkWalletError::InsufficientBalance).unwrap();
        assert_eq!(
            json,
            "\"Insufficient balance to create invoice. Please add some funds first.\""
        );
    }
}
