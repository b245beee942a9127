//! # cohort-cache
//!
//! Cache-aside storage for ongoing rounds, keyed by guild id.
//!
//! Entries expire after their TTL; there is no explicit delete. Writers always
//! replace the entry, so staleness is bounded by the gap between a commit and
//! its write-through. Readers filling a miss never replace an entry, so a
//! read that raced a commit cannot push the cache back to an older round.

mod error;
mod memory;
mod write_through;

pub use error::CacheError;
pub use memory::MemoryRoundCache;
pub use write_through::{RETRY_INTERVAL, populate, write_through};

use std::time::Duration;

use async_trait::async_trait;
use cohort_core::entities::Round;

/// Key-value store for serialized rounds.
#[async_trait]
pub trait RoundCache: Send + Sync {
    /// Whether an unexpired entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// The cached round for `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Round>, CacheError>;

    /// Store `round` under `key` for `ttl`, replacing any previous entry.
    async fn set(&self, key: &str, round: &Round, ttl: Duration) -> Result<(), CacheError>;

    /// Store `round` unless an unexpired entry exists. Returns whether it
    /// was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        round: &Round,
        ttl: Duration,
    ) -> Result<bool, CacheError>;
}
