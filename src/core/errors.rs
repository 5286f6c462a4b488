use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Error text reported by the remote API, kept verbatim.
    #[error("{0}")]
    Api(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Failed to upload file")]
    UploadRejected {
        status: u16,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the queue should requeue a task that failed with this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Config(_))
    }
}

pub type Result<T, E = TransferError> = std::result::Result<T, E>;
