//! Message broker (NATS JetStream) configuration.

use serde::{Deserialize, Serialize};

const fn default_connection_timeout_secs() -> u64 {
    10
}

const fn default_max_deliver() -> u32 {
    5
}

const fn default_ack_wait_secs() -> u64 {
    30
}

fn default_consumer_group() -> String {
    "cohort-recorder".to_string()
}

fn default_stream() -> String {
    "COHORT_EVENTS".to_string()
}

fn default_subjects() -> Vec<String> {
    vec!["study.>".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// NATS server URL (e.g., `nats://localhost:4222`). Empty selects the
    /// in-process broker.
    #[serde(default)]
    pub url: String,

    /// Durable consumer name shared by all instances of one consumer.
    #[serde(default = "default_consumer_group", alias = "queue_group")]
    pub consumer_group: String,

    /// JetStream stream retaining study events.
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Subjects captured by the stream.
    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,

    /// Deliveries of one message before it is given up on.
    #[serde(default = "default_max_deliver")]
    pub max_deliver: u32,

    /// Seconds an unacknowledged delivery waits before redelivery.
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            consumer_group: default_consumer_group(),
            stream: default_stream(),
            subjects: default_subjects(),
            max_deliver: default_max_deliver(),
            ack_wait_secs: default_ack_wait_secs(),
            user: String::new(),
            password: String::new(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

impl BrokerConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}
