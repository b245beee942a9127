//! Subscriber loop: dispatches bus messages to mapped handlers until shutdown.
//!
//! Every delivery is settled after its handler returns: acknowledged on
//! success, rejected for redelivery on a transient failure or timeout, and
//! terminated when no handler exists or the payload can never decode.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cohort_bus::{Delivery, Subscription};

use crate::mapper::Mapper;

/// Default deadline for a single handler invocation.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Messages whose handler succeeded.
    pub handled: u64,
    /// Deliveries whose handler failed or timed out.
    pub failed: u64,
    /// Messages terminated without redelivery: no handler for their topic or
    /// an undecodable payload.
    pub dropped: u64,
}

pub struct Subscriber {
    mapper: Mapper,
    handler_timeout: Duration,
}

impl Subscriber {
    #[must_use]
    pub const fn new(mapper: Mapper) -> Self {
        Self {
            mapper,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Process messages until `shutdown` flips to `true` or the message
    /// channel closes.
    ///
    /// Handler failures and broker errors are logged and never stop the loop.
    /// On shutdown the subscription is closed and already-buffered messages
    /// are still dispatched before returning.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunStats {
        let mut stats = RunStats::default();
        let mut errors_open = true;
        info!(topics = ?self.mapper.topics(), "subscriber started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = subscription.messages.recv() => {
                    match message {
                        Some(delivery) => self.dispatch(delivery, &mut stats).await,
                        None => {
                            info!("subscription ended");
                            return stats;
                        }
                    }
                }
                err = subscription.errors.recv(), if errors_open => {
                    match err {
                        Some(err) => warn!(error = %err, "broker error"),
                        None => errors_open = false,
                    }
                }
            }
        }

        info!("shutdown requested; draining subscription");
        subscription.close();
        while let Some(delivery) = subscription.messages.recv().await {
            self.dispatch(delivery, &mut stats).await;
        }
        info!(
            handled = stats.handled,
            failed = stats.failed,
            dropped = stats.dropped,
            "subscriber stopped"
        );
        stats
    }

    async fn dispatch(&self, delivery: Delivery, stats: &mut RunStats) {
        let topic = delivery.message.topic.clone();
        let handler = match self.mapper.handler(&topic) {
            Ok(handler) => handler,
            Err(err) => {
                warn!(topic = %topic, error = %err, "dropping message");
                stats.dropped += 1;
                settle(&topic, delivery.term().await);
                return;
            }
        };

        let outcome = tokio::time::timeout(self.handler_timeout, handler.handle(&delivery.message)).await;
        match outcome {
            Ok(Ok(())) => {
                debug!(topic = %topic, attempt = delivery.attempt, "message handled");
                stats.handled += 1;
                settle(&topic, delivery.ack().await);
            }
            Ok(Err(err)) if err.is_permanent() => {
                error!(topic = %topic, error = %err, "dropping undecodable message");
                stats.dropped += 1;
                settle(&topic, delivery.term().await);
            }
            Ok(Err(err)) => {
                error!(topic = %topic, attempt = delivery.attempt, error = %err, "handler failed");
                stats.failed += 1;
                settle(&topic, delivery.nak().await);
            }
            Err(_) => {
                error!(
                    topic = %topic,
                    attempt = delivery.attempt,
                    timeout_ms = u64::try_from(self.handler_timeout.as_millis()).unwrap_or(u64::MAX),
                    "handler timed out"
                );
                stats.failed += 1;
                settle(&topic, delivery.nak().await);
            }
        }
    }
}

fn settle(topic: &str, result: Result<(), cohort_bus::BusError>) {
    if let Err(err) = result {
        warn!(topic = %topic, error = %err, "failed to settle delivery");
    }
}
