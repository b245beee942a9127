//! Best-effort cache writes bounded by a deadline.

use std::time::Duration;

use cohort_core::entities::Round;

use crate::RoundCache;

/// Pause between failed write attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Copy)]
enum Mode {
    Replace,
    IfAbsent,
}

/// Write `round` under `key`, retrying every [`RETRY_INTERVAL`] until it
/// succeeds or `deadline` elapses.
///
/// Failures are logged, never returned. Returns whether the write landed.
pub async fn write_through(
    cache: &dyn RoundCache,
    key: &str,
    round: &Round,
    ttl: Duration,
    deadline: Duration,
) -> bool {
    write(cache, key, round, ttl, deadline, Mode::Replace).await
}

/// Fill a miss with `round` as read from the store, with the same retry and
/// deadline as [`write_through`]. An entry written in the meantime is kept.
///
/// Returns whether the cache holds an entry for `key` afterwards.
pub async fn populate(
    cache: &dyn RoundCache,
    key: &str,
    round: &Round,
    ttl: Duration,
    deadline: Duration,
) -> bool {
    write(cache, key, round, ttl, deadline, Mode::IfAbsent).await
}

async fn write(
    cache: &dyn RoundCache,
    key: &str,
    round: &Round,
    ttl: Duration,
    deadline: Duration,
    mode: Mode,
) -> bool {
    let attempts = async {
        let mut attempt = 1_u32;
        loop {
            let result = match mode {
                Mode::Replace => cache.set(key, round, ttl).await,
                Mode::IfAbsent => cache.set_if_absent(key, round, ttl).await.map(|stored| {
                    if !stored {
                        tracing::debug!(key, "newer entry present; fill skipped");
                    }
                }),
            };
            match result {
                Ok(()) => return,
                Err(error) => {
                    tracing::warn!(%error, key, attempt, "cache write failed; retrying");
                }
            }
            attempt += 1;
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    };

    if tokio::time::timeout(deadline, attempts).await.is_ok() {
        true
    } else {
        tracing::warn!(key, ?deadline, "cache write abandoned after deadline");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheError, MemoryRoundCache};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` writes, then delegates to a memory cache.
    struct FlakyCache {
        failures: u32,
        calls: AtomicU32,
        inner: MemoryRoundCache,
    }

    #[async_trait]
    impl RoundCache for FlakyCache {
        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.inner.exists(key).await
        }

        async fn get(&self, key: &str) -> Result<Option<Round>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, round: &Round, ttl: Duration) -> Result<(), CacheError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(CacheError::Unavailable("connection refused".into()));
            }
            self.inner.set(key, round, ttl).await
        }

        async fn set_if_absent(
            &self,
            key: &str,
            round: &Round,
            ttl: Duration,
        ) -> Result<bool, CacheError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(CacheError::Unavailable("connection refused".into()));
            }
            self.inner.set_if_absent(key, round, ttl).await
        }
    }

    fn flaky(failures: u32) -> FlakyCache {
        FlakyCache {
            failures,
            calls: AtomicU32::new(0),
            inner: MemoryRoundCache::new(4),
        }
    }

    const TTL: Duration = Duration::from_secs(180);

    #[tokio::test(start_paused = true)]
    async fn retries_until_write_lands() {
        let cache = flaky(2);
        let round = Round::new("G1", 1, "T1", ["A"]);

        let written = write_through(&cache, "G1", &round, TTL, Duration::from_secs(5)).await;

        assert!(written);
        assert_eq!(cache.calls.load(Ordering::SeqCst), 3);
        assert!(cache.exists("G1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_deadline() {
        let cache = flaky(u32::MAX);
        let round = Round::new("G1", 1, "T1", ["A"]);

        let written = write_through(&cache, "G1", &round, TTL, Duration::from_millis(1200)).await;

        assert!(!written);
        // Attempts at 0 ms, 500 ms and 1000 ms fit in the deadline.
        assert_eq!(cache.calls.load(Ordering::SeqCst), 3);
        assert!(!cache.exists("G1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn populate_does_not_replace_a_newer_entry() {
        let cache = flaky(1);
        let mut newer = Round::new("G1", 1, "T1", ["A"]);
        newer.title = "newer".into();
        cache.inner.set("G1", &newer, TTL).await.unwrap();

        let stale = Round::new("G1", 1, "T1", ["A"]);
        assert!(populate(&cache, "G1", &stale, TTL, Duration::from_secs(5)).await);

        assert_eq!(cache.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("G1").await.unwrap().unwrap().title, "newer");
    }
}
