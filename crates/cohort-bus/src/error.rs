//! Bus error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// Connecting to the broker failed or the connection dropped.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker rejected a publish.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Subscribing to a topic failed.
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// A value could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// All publish attempts failed.
    #[error("Publish gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The shared publish deadline elapsed.
    #[error("Publish deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// Acknowledging or rejecting a delivery failed.
    #[error("Settling delivery failed: {0}")]
    Ack(String),

    /// The broker or subscription is closed.
    #[error("Bus closed")]
    Closed,
}
