//! In-process broker with durable-consumer semantics.
//!
//! Used by tests and single-process deployments. All subscriptions share one
//! consumer group: each message goes to one live subscription whose topics
//! match it. Messages nobody can take yet are retained until a matching
//! subscriber appears, and a rejected delivery is retried until it has been
//! delivered `max_deliver` times.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{
    Acker, BusError, Broker, CHANNEL_CAPACITY, DEFAULT_MAX_DELIVER, Delivery, Message,
    Subscription,
};

/// Published messages kept for [`MemoryBroker::published`].
const HISTORY_LIMIT: usize = 1024;

/// Undelivered messages kept before the oldest is discarded.
const RETAINED_LIMIT: usize = 4096;

struct Pending {
    message: Message,
    deliveries: u32,
}

struct Slot {
    id: u64,
    topics: HashSet<String>,
    sender: mpsc::Sender<Delivery>,
}

#[derive(Default)]
struct State {
    next_slot: u64,
    slots: Vec<Slot>,
    pending: VecDeque<Pending>,
    history: VecDeque<Message>,
}

struct Shared {
    state: Mutex<State>,
    max_deliver: u32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand retained messages to subscribers with room, oldest first.
    fn pump(self: &Arc<Self>, state: &mut State) {
        state.slots.retain(|slot| !slot.sender.is_closed());
        let mut kept = VecDeque::with_capacity(state.pending.len());
        while let Some(entry) = state.pending.pop_front() {
            let permit = state
                .slots
                .iter()
                .filter(|slot| slot.topics.contains(&entry.message.topic))
                .find_map(|slot| slot.sender.try_reserve().ok());
            match permit {
                Some(permit) => {
                    let attempt = entry.deliveries + 1;
                    let acker = MemoryAcker {
                        shared: Arc::clone(self),
                        message: entry.message.clone(),
                        deliveries: attempt,
                        settled: AtomicBool::new(false),
                    };
                    permit.send(Delivery::new(entry.message, attempt, Box::new(acker)));
                }
                None => kept.push_back(entry),
            }
        }
        state.pending = kept;
    }

    fn retain(state: &mut State, entry: Pending) {
        if state.pending.len() >= RETAINED_LIMIT
            && let Some(dropped) = state.pending.pop_front()
        {
            tracing::warn!(topic = %dropped.message.topic, "retention full; oldest message discarded");
        }
        state.pending.push_back(entry);
    }

    fn redeliver(self: &Arc<Self>, message: Message, deliveries: u32) {
        let mut state = self.lock();
        if deliveries >= self.max_deliver {
            tracing::warn!(
                topic = %message.topic,
                deliveries,
                "delivery limit reached; message discarded"
            );
        } else {
            state.pending.push_front(Pending {
                message,
                deliveries,
            });
        }
        self.pump(&mut state);
    }

    fn settle(self: &Arc<Self>) {
        let mut state = self.lock();
        self.pump(&mut state);
    }
}

struct MemoryAcker {
    shared: Arc<Shared>,
    message: Message,
    deliveries: u32,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn claim(&self) -> bool {
        !self.settled.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(&self) -> Result<(), BusError> {
        if self.claim() {
            self.shared.settle();
        }
        Ok(())
    }

    async fn nak(&self) -> Result<(), BusError> {
        if self.claim() {
            self.shared.redeliver(self.message.clone(), self.deliveries);
        }
        Ok(())
    }

    async fn term(&self) -> Result<(), BusError> {
        self.ack().await
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if self.claim() {
            self.shared
                .redeliver(std::mem::take(&mut self.message), self.deliveries);
        }
    }
}

pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_deliver(DEFAULT_MAX_DELIVER)
    }

    /// A broker that gives up on a message after `max_deliver` deliveries.
    #[must_use]
    pub fn with_max_deliver(max_deliver: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                max_deliver: max_deliver.max(1),
            }),
        }
    }

    /// The most recent published messages, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.shared.lock().history.iter().cloned().collect()
    }

    /// Recent messages published on `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<Message> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    /// Messages waiting for a subscriber.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let mut state = self.shared.lock();
        if state.history.len() >= HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(message.clone());
        Shared::retain(
            &mut state,
            Pending {
                message,
                deliveries: 0,
            },
        );
        self.shared.pump(&mut state);
        Ok(())
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError> {
        let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);
        // The in-process broker has no connection to lose.
        let (_error_tx, error_rx) = mpsc::channel(1);
        let (close_tx, close_rx) = oneshot::channel::<()>();

        let id = {
            let mut state = self.shared.lock();
            let id = state.next_slot;
            state.next_slot += 1;
            state.slots.push(Slot {
                id,
                topics: topics.iter().map(ToString::to_string).collect(),
                sender: message_tx,
            });
            self.shared.pump(&mut state);
            id
        };

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let _ = close_rx.await;
            shared.lock().slots.retain(|slot| slot.id != id);
        });

        Ok(Subscription::new(message_rx, error_rx, close_tx))
    }
}
