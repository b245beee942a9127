//! JSON event publishing with bounded retry.
//!
//! A publish call makes up to `max_attempts` attempts, all under one shared
//! deadline, with capped exponential backoff between them. When every attempt
//! fails the failure is logged and a single `study.error` envelope is sent on
//! a best-effort basis.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use cohort_config::CoordinatorConfig;
use cohort_core::events::{EventEnvelope, TOPIC_ERROR};

use crate::{BusError, Broker, Message};

/// Retry policy for one publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    pub max_attempts: u32,
    /// Shared by all attempts, backoff included.
    pub deadline: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            deadline: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&CoordinatorConfig> for PublishPolicy {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_attempts: config.publish_max_attempts.max(1),
            deadline: config.publish_timeout(),
            ..Self::default()
        }
    }
}

impl PublishPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    broker: Arc<dyn Broker>,
    policy: PublishPolicy,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn Broker>, policy: PublishPolicy) -> Self {
        Self { broker, policy }
    }

    pub const fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    /// Serialize `value` as JSON and publish it on `topic`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Serialization` if `value` cannot be encoded, or the
    /// final publish error once retries are exhausted or the deadline passes.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(value)?;
        match self.publish_with_retry(topic, payload).await {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::error!(%error, topic, "event publish failed");
                self.report_failure(topic, &error).await;
                Err(error)
            }
        }
    }

    /// Publish in a detached task. Failures are logged and reported, never
    /// returned.
    pub fn publish_detached<T>(&self, topic: impl Into<String>, value: T) -> JoinHandle<()>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let publisher = self.clone();
        let topic = topic.into();
        tokio::spawn(async move {
            let _ = publisher.publish(&topic, &value).await;
        })
    }

    async fn publish_with_retry(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let policy = self.policy;
        let attempts = async {
            let mut last_error = String::new();
            for attempt in 1..=policy.max_attempts {
                match self.broker.publish(Message::new(topic, payload.clone())).await {
                    Ok(()) => {
                        tracing::debug!(topic, attempt, "event published");
                        return Ok(());
                    }
                    Err(error) => {
                        tracing::warn!(%error, topic, attempt, "publish attempt failed");
                        last_error = error.to_string();
                    }
                }
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
            Err(BusError::RetriesExhausted {
                attempts: policy.max_attempts,
                last_error,
            })
        };

        tokio::time::timeout(policy.deadline, attempts)
            .await
            .unwrap_or(Err(BusError::Timeout(policy.deadline)))
    }

    async fn report_failure(&self, topic: &str, error: &BusError) {
        if topic == TOPIC_ERROR {
            return;
        }
        let envelope = EventEnvelope::new(topic, format!("failed to publish event: {error}"));
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "failed to encode error envelope");
                return;
            }
        };
        let sent = tokio::time::timeout(
            self.policy.deadline,
            self.broker.publish(Message::new(TOPIC_ERROR, payload)),
        )
        .await;
        if !matches!(sent, Ok(Ok(()))) {
            tracing::error!(topic, "failed to report publish failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBroker, Subscription};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Rejects publishes on one topic a fixed number of times.
    struct FailingBroker {
        failing_topic: &'static str,
        failures: u32,
        attempts: AtomicU32,
        inner: MemoryBroker,
    }

    impl FailingBroker {
        fn new(failing_topic: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failing_topic,
                failures,
                attempts: AtomicU32::new(0),
                inner: MemoryBroker::new(),
            })
        }
    }

    #[async_trait]
    impl Broker for FailingBroker {
        async fn publish(&self, message: Message) -> Result<(), BusError> {
            if message.topic == self.failing_topic {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < self.failures {
                    return Err(BusError::Publish("broker unavailable".into()));
                }
            }
            self.inner.publish(message).await
        }

        async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError> {
            self.inner.subscribe(topics).await
        }
    }

    #[derive(Serialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = PublishPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(50));
        assert_eq!(policy.backoff(2), Duration::from_millis(100));
        assert_eq!(policy.backoff(5), Duration::from_millis(800));
        assert_eq!(policy.backoff(6), Duration::from_secs(1));
        assert_eq!(policy.backoff(40), Duration::from_secs(1));
    }

    #[test]
    fn policy_from_config() {
        let config = CoordinatorConfig {
            publish_max_attempts: 3,
            publish_timeout_secs: 2,
            ..CoordinatorConfig::default()
        };
        let policy = PublishPolicy::from(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.deadline, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let broker = FailingBroker::new("study.round-progress", 3);
        let publisher = EventPublisher::new(broker.clone(), PublishPolicy::default());

        publisher
            .publish("study.round-progress", &Payload { value: 7 })
            .await
            .unwrap();

        assert_eq!(broker.attempts.load(Ordering::SeqCst), 4);
        let published = broker.inner.published_on("study.round-progress");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, br#"{"value":7}"#);
        assert!(broker.inner.published_on(TOPIC_ERROR).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_on_error_topic() {
        let broker = FailingBroker::new("study.round-progress", u32::MAX);
        let policy = PublishPolicy {
            max_attempts: 3,
            ..PublishPolicy::default()
        };
        let publisher = EventPublisher::new(broker.clone(), policy);

        let err = publisher
            .publish("study.round-progress", &Payload { value: 1 })
            .await
            .unwrap_err();

        assert!(matches!(err, BusError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(broker.attempts.load(Ordering::SeqCst), 3);

        let reports = broker.inner.published_on(TOPIC_ERROR);
        assert_eq!(reports.len(), 1);
        let envelope: EventEnvelope = serde_json::from_slice(&reports[0].payload).unwrap();
        assert_eq!(envelope.topic, "study.round-progress");
        assert!(envelope.description.contains("broker unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_deadline_bounds_all_attempts() {
        let broker = FailingBroker::new("study.round-progress", u32::MAX);
        let policy = PublishPolicy {
            max_attempts: 100,
            deadline: Duration::from_millis(500),
            ..PublishPolicy::default()
        };
        let publisher = EventPublisher::new(broker.clone(), policy);

        let err = publisher
            .publish("study.round-progress", &Payload { value: 1 })
            .await
            .unwrap_err();

        assert!(matches!(err, BusError::Timeout(_)));
        assert!(broker.attempts.load(Ordering::SeqCst) < 100);
        assert_eq!(broker.inner.published_on(TOPIC_ERROR).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_topic_failures_are_not_reported_again() {
        let broker = FailingBroker::new(TOPIC_ERROR, u32::MAX);
        let policy = PublishPolicy {
            max_attempts: 2,
            ..PublishPolicy::default()
        };
        let publisher = EventPublisher::new(broker.clone(), policy);

        let envelope = EventEnvelope::new("study.round-created", "boom");
        assert!(publisher.publish(TOPIC_ERROR, &envelope).await.is_err());
        assert_eq!(broker.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detached_publish_delivers() {
        let broker = Arc::new(MemoryBroker::new());
        let publisher = EventPublisher::new(broker.clone(), PublishPolicy::default());

        publisher
            .publish_detached("study.round-created", EventEnvelope::new("study.round-created", "ok"))
            .await
            .unwrap();

        assert_eq!(broker.published_on("study.round-created").len(), 1);
    }
}
