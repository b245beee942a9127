//! NATS JetStream broker driver.
//!
//! Events are published into a file-backed stream so they outlive a recorder
//! restart. Each subscription binds the durable pull consumer named by the
//! consumer group, so every instance of one consumer shares a position and
//! every message is acknowledged explicitly. Connection events are logged and
//! fanned out to live subscriptions as transient errors.

use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, DeliverPolicy, PullConsumer, pull},
    message::AckKind,
    stream::{self, RetentionPolicy, StorageType},
};
use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot};

use cohort_config::BrokerConfig;
use cohort_core::events::TOPIC_HEADER;

use crate::{Acker, BusError, Broker, CHANNEL_CAPACITY, Delivery, Message, Subscription};

pub struct NatsBroker {
    client: Client,
    jetstream: jetstream::Context,
    stream: String,
    consumer_group: String,
    max_deliver: u32,
    ack_wait: Duration,
    events: broadcast::Sender<String>,
}

impl NatsBroker {
    /// Connect using `config` and make sure the event stream exists.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Connection` if the server is unreachable within the
    /// connection timeout or the stream cannot be created.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BusError> {
        let (events, _) = broadcast::channel(64);
        let callback_events = events.clone();

        let mut options = ConnectOptions::new()
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .event_callback(move |event| {
                let events = callback_events.clone();
                async move {
                    match event {
                        async_nats::Event::Connected => tracing::info!("NATS connected"),
                        async_nats::Event::Disconnected => {
                            tracing::warn!("NATS disconnected");
                            let _ = events.send("disconnected".to_string());
                        }
                        async_nats::Event::ClientError(err) => {
                            tracing::warn!(error = %err, "NATS client error");
                            let _ = events.send(err.to_string());
                        }
                        _ => {}
                    }
                }
            });

        if config.has_credentials() {
            options = options.user_and_password(config.user.clone(), config.password.clone());
        }

        let client = options.connect(&config.url).await.map_err(|e| {
            BusError::Connection(format!("failed to connect to {}: {e}", config.url))
        })?;

        let jetstream = jetstream::new(client.clone());
        jetstream
            .get_or_create_stream(stream::Config {
                name: config.stream.clone(),
                subjects: config.subjects.clone(),
                retention: RetentionPolicy::Limits,
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                BusError::Connection(format!("failed to open stream {}: {e}", config.stream))
            })?;
        tracing::info!(
            url = %config.url,
            stream = %config.stream,
            consumer_group = %config.consumer_group,
            "connected to broker"
        );

        Ok(Self {
            client,
            jetstream,
            stream: config.stream.clone(),
            consumer_group: config.consumer_group.clone(),
            max_deliver: config.max_deliver,
            ack_wait: Duration::from_secs(config.ack_wait_secs),
            events,
        })
    }

    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn consumer(&self, topics: &[&str]) -> Result<PullConsumer, BusError> {
        let stream = self
            .jetstream
            .get_stream(&self.stream)
            .await
            .map_err(|e| BusError::Subscribe(format!("stream {}: {e}", self.stream)))?;
        stream
            .get_or_create_consumer(
                &self.consumer_group,
                pull::Config {
                    durable_name: Some(self.consumer_group.clone()),
                    filter_subjects: topics.iter().map(ToString::to_string).collect(),
                    deliver_policy: DeliverPolicy::All,
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: self.ack_wait,
                    max_deliver: i64::from(self.max_deliver),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("consumer {}: {e}", self.consumer_group)))
    }
}

fn to_message(message: &async_nats::Message) -> Message {
    let topic = message
        .headers
        .as_ref()
        .and_then(|headers| headers.get(TOPIC_HEADER))
        .map_or_else(|| message.subject.to_string(), |value| value.as_str().to_string());
    Message::new(topic, message.payload.to_vec())
}

struct JetStreamAcker(jetstream::Message);

impl JetStreamAcker {
    async fn send(&self, kind: AckKind) -> Result<(), BusError> {
        self.0
            .ack_with(kind)
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}

#[async_trait]
impl Acker for JetStreamAcker {
    async fn ack(&self) -> Result<(), BusError> {
        self.send(AckKind::Ack).await
    }

    async fn nak(&self) -> Result<(), BusError> {
        self.send(AckKind::Nak(None)).await
    }

    async fn term(&self) -> Result<(), BusError> {
        self.send(AckKind::Term).await
    }
}

fn to_delivery(message: jetstream::Message) -> Delivery {
    let attempt = message
        .info()
        .map_or(1, |info| u32::try_from(info.delivered).unwrap_or(u32::MAX));
    Delivery::new(to_message(&message.message), attempt, Box::new(JetStreamAcker(message)))
}

#[async_trait]
impl Broker for NatsBroker {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &message.headers {
            headers.insert(name.as_str(), value.as_str());
        }
        let ack = self
            .jetstream
            .publish_with_headers(message.topic, headers, message.payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;
        // The stream has stored the message once the server acknowledges it.
        ack.await.map_err(|e| BusError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError> {
        let consumer = self.consumer(topics).await?;
        let mut upstream = consumer
            .messages()
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        tracing::debug!(?topics, consumer_group = %self.consumer_group, "subscribed");

        let mut events = self.events.subscribe();
        let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (close_tx, mut close_rx) = oneshot::channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => break,
                    next = upstream.next() => match next {
                        Some(Ok(message)) => {
                            if message_tx.send(to_delivery(message)).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = error_tx.send(BusError::Connection(e.to_string())).await;
                        }
                        None => break,
                    },
                    Ok(event) = events.recv() => {
                        let _ = error_tx.send(BusError::Connection(event)).await;
                    }
                }
            }
            // Unacknowledged deliveries return to the consumer after the ack wait.
            drop(upstream);
        });

        Ok(Subscription::new(message_rx, error_rx, close_tx))
    }
}
