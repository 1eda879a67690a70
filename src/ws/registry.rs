//! Subscriber registry
//!
//! Tracks the outbound channel of every connected client and fans
//! messages out to all of them. Delivery is best-effort and at-most-once:
//! each subscriber gets one bounded, non-blocking send attempt per
//! message, and a closed or backed-up channel gets that subscriber
//! dropped without delaying the others.

use crate::core::OutboundMessage;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-subscriber outbound buffer; a subscriber this far behind is dropped
pub const SUBSCRIBER_BUFFER: usize = 32;

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers the message was handed to
    pub delivered: usize,
    /// Subscribers removed because their channel was closed or full
    pub dropped: usize,
}

/// Live set of subscriber channels
///
/// Registration and removal happen from connection tasks while the tick
/// loop broadcasts; the map lock is never held across an await.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a subscriber, returning its id and the receiving end of its
    /// outbound channel (drained by that connection's writer task)
    pub fn register(&self) -> (Uuid, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();
        self.subscribers.write().insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    pub fn unregister(&self, id: Uuid) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    /// Number of live subscribers
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// True when no subscriber is connected
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Deliver one message to every subscriber
    ///
    /// Failed channels are collected and unregistered after the pass, so
    /// one dead subscriber never aborts delivery to the rest.
    pub fn broadcast(&self, message: &OutboundMessage) -> BroadcastOutcome {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize outbound message: {}", e);
                return BroadcastOutcome {
                    delivered: 0,
                    dropped: 0,
                };
            }
        };

        let mut failed = Vec::new();
        let mut delivered = 0;
        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                if tx.try_send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &failed {
                subscribers.remove(id);
            }
            tracing::warn!(
                "Dropped {} unresponsive subscriber(s), {} remain",
                failed.len(),
                subscribers.len()
            );
        }

        BroadcastOutcome {
            delivered,
            dropped: failed.len(),
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
