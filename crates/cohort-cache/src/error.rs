//! Cache error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A round could not be encoded or a cached value could not be decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cache backend rejected or failed the operation.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}
