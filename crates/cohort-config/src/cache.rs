//! Round cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_ttl_secs() -> u64 {
    180
}

const fn default_capacity() -> usize {
    1024
}

const fn default_write_timeout_secs() -> u64 {
    300
}

const fn default_populate_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached round.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of guilds kept in the local tier.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Deadline for post-commit write-through retries.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// Deadline for populating the cache after a cold read.
    #[serde(default = "default_populate_timeout_secs")]
    pub populate_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
            write_timeout_secs: default_write_timeout_secs(),
            populate_timeout_secs: default_populate_timeout_secs(),
        }
    }
}

impl CacheConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub const fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub const fn populate_timeout(&self) -> Duration {
        Duration::from_secs(self.populate_timeout_secs)
    }
}
