//! # cohort-bus
//!
//! Topic-based messaging for Cohort.
//!
//! - [`Broker`]: narrow interface over the message broker driver, with a NATS
//!   implementation ([`NatsBroker`]) and an in-process one ([`MemoryBroker`]).
//! - [`Subscription`]: delivery and error channels plus a close handle.
//! - [`Delivery`]: a received message that must be settled with
//!   [`Delivery::ack`], [`Delivery::nak`] or [`Delivery::term`].
//! - [`EventPublisher`]: JSON publishing with bounded retry under a shared
//!   deadline, reporting final failures on the `study.error` topic.

mod error;
mod memory;
mod nats;
mod publisher;

pub use error::BusError;
pub use memory::MemoryBroker;
pub use nats::NatsBroker;
pub use publisher::{EventPublisher, PublishPolicy};

/// Deliveries of one message before the in-process broker gives up on it.
pub const DEFAULT_MAX_DELIVER: u32 = 5;

use std::collections::BTreeMap;

use async_trait::async_trait;
use cohort_core::events::TOPIC_HEADER;
use tokio::sync::{mpsc, oneshot};

/// Buffer size of subscription channels.
pub(crate) const CHANNEL_CAPACITY: usize = 256;

/// A message as seen by publishers and subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub headers: BTreeMap<String, String>,
    pub payload: Vec<u8>,
}

impl Message {
    /// A message on `topic` carrying the topic header.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        let topic = topic.into();
        let mut headers = BTreeMap::new();
        headers.insert(TOPIC_HEADER.to_string(), topic.clone());
        Self {
            topic,
            headers,
            payload,
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Message broker driver.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish one message. A single attempt; retry is the caller's concern.
    async fn publish(&self, message: Message) -> Result<(), BusError>;

    /// Subscribe to `topics` as a durable consumer.
    async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError>;
}

/// Broker-side settlement of one delivery.
#[async_trait]
pub trait Acker: Send + Sync {
    /// The message was handled; never deliver it again.
    async fn ack(&self) -> Result<(), BusError>;

    /// Handling failed; deliver it again later.
    async fn nak(&self) -> Result<(), BusError>;

    /// Handling can never succeed; drop it without redelivery.
    async fn term(&self) -> Result<(), BusError>;
}

/// A message handed to one subscriber, pending settlement.
///
/// A delivery dropped without being settled is redelivered once the broker's
/// ack deadline passes.
pub struct Delivery {
    pub message: Message,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
    acker: Box<dyn Acker>,
}

impl Delivery {
    #[must_use]
    pub fn new(message: Message, attempt: u32, acker: Box<dyn Acker>) -> Self {
        Self {
            message,
            attempt,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), BusError> {
        self.acker.ack().await
    }

    pub async fn nak(self) -> Result<(), BusError> {
        self.acker.nak().await
    }

    pub async fn term(self) -> Result<(), BusError> {
        self.acker.term().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// A live subscription.
///
/// Deliveries and transient errors arrive on separate channels. After
/// [`Subscription::close`], no new deliveries are forwarded; deliveries
/// already buffered can still be drained until the channel reports `None`.
pub struct Subscription {
    pub messages: mpsc::Receiver<Delivery>,
    pub errors: mpsc::Receiver<BusError>,
    closer: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub(crate) fn new(
        messages: mpsc::Receiver<Delivery>,
        errors: mpsc::Receiver<BusError>,
        closer: oneshot::Sender<()>,
    ) -> Self {
        Self {
            messages,
            errors,
            closer: Some(closer),
        }
    }

    /// Stop forwarding new messages and release the broker-side subscription.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            let _ = closer.send(());
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closer.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
