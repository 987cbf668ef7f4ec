use thiserror::Error;

/// Failures at the wallet SDK boundary.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Error returned by the SDK itself. Displayed with the SDK's own message.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    /// The SDK answered, but the payload did not have the expected shape.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ClientError {
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            code: -32000,
            message: message.into(),
        }
    }
}
