//! Event topics and the JSON envelope published on the bus.
//!
//! `study.round-closed` carries the raw `Round` document. Every other topic
//! carries an [`EventEnvelope`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Header carrying the topic string on every published message.
pub const TOPIC_HEADER: &str = "x-event-topic";

pub const TOPIC_ROUND_CREATED: &str = "study.round-created";
pub const TOPIC_ROUND_PROGRESS: &str = "study.round-progress";
pub const TOPIC_ROUND_CLOSED: &str = "study.round-closed";
pub const TOPIC_ERROR: &str = "study.error";

/// All topics emitted by the coordinator.
pub const ALL_TOPICS: &[&str] = &[
    TOPIC_ROUND_CREATED,
    TOPIC_ROUND_PROGRESS,
    TOPIC_ROUND_CLOSED,
    TOPIC_ERROR,
];

/// Envelope for progress, creation and error events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub topic: String,
    pub description: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Opaque payload, base64 on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub data: Option<Vec<u8>>,
}

impl EventEnvelope {
    /// An envelope stamped with the current time and no payload.
    #[must_use]
    pub fn new(topic: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            description: description.into(),
            timestamp: Utc::now().timestamp(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

mod base64_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => ser.serialize_str(&STANDARD.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded = Option::<String>::deserialize(de)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_base64_on_the_wire() {
        let envelope = EventEnvelope::new(TOPIC_ROUND_CREATED, "created").with_data(b"{}".to_vec());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["data"], "e30=");
        assert_eq!(json["topic"], TOPIC_ROUND_CREATED);

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back.data.as_deref(), Some(b"{}".as_slice()));
    }

    #[test]
    fn data_is_optional() {
        let json = r#"{"topic":"study.error","description":"boom","timestamp":1700000000}"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.data.is_none());
        assert!(!serde_json::to_string(&envelope).unwrap().contains("data"));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = r#"{"topic":"t","description":"d","timestamp":1,"data":"%%%"}"#;
        assert!(serde_json::from_str::<EventEnvelope>(json).is_err());
    }
}
