//! Recorder error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The spreadsheet API answered with a status other than 200.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A message payload could not be decoded.
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The recorder is missing required configuration.
    #[error("Recorder not configured: {0}")]
    NotConfigured(String),

    /// A sheet operation was refused by the backend.
    #[error("Sheet error: {0}")]
    Sheet(String),
}

impl RecorderError {
    /// Retrying the same message cannot succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Payload(_))
    }
}
