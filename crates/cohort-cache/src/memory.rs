//! In-process LRU tier with per-entry expiry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use cohort_core::entities::Round;

use crate::{CacheError, RoundCache};

struct CacheEntry {
    /// Serialized `Round`.
    value: String,
    expires_at: Instant,
}

/// Bounded LRU cache of serialized rounds.
pub struct MemoryRoundCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryRoundCache {
    /// Create a cache holding at most `capacity` guilds (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Fetch the raw value for `key`, evicting it if expired.
    async fn live_value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[async_trait]
impl RoundCache for MemoryRoundCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.peek(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(true),
            Some(_) => {
                entries.pop(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Round>, CacheError> {
        match self.live_value(key).await {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, round: &Round, ttl: Duration) -> Result<(), CacheError> {
        let value = serde_json::to_string(round)?;
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        round: &Round,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let value = serde_json::to_string(round)?;
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.peek(key).is_some_and(|entry| entry.expires_at > now) {
            return Ok(false);
        }
        entries.put(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }
}
