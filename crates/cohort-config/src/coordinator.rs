//! Coordinator pipeline deadlines and publish policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_command_timeout_secs() -> u64 {
    5
}

const fn default_commit_timeout_secs() -> u64 {
    5
}

const fn default_publish_timeout_secs() -> u64 {
    5
}

const fn default_publish_max_attempts() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// Deadline for a whole mutating command, lock wait included.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Maximum time a repository transaction may stay open.
    #[serde(default = "default_commit_timeout_secs")]
    pub commit_timeout_secs: u64,

    /// Deadline shared by all attempts of one publish call.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    #[serde(default = "default_publish_max_attempts")]
    pub publish_max_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            commit_timeout_secs: default_commit_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            publish_max_attempts: default_publish_max_attempts(),
        }
    }
}

impl CoordinatorConfig {
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub const fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }

    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}
