//! Event types and EventBus for the glucolog service
//!
//! The ingestion scheduler publishes a `ReadingsDiscovered` event for every
//! cycle that found observations whose timestamps were not yet stored. SSE
//! clients subscribe through the EventBus and receive events in publish
//! order.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::models::Observation;

/// Glucolog event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GlucoseEvent {
    /// New observations were discovered by an ingestion cycle
    ///
    /// Contains only observations whose timestamp was absent from the store
    /// immediately before the cycle, in fetch order. Never published empty.
    ReadingsDiscovered {
        /// The newly discovered observations
        readings: Vec<Observation>,
        /// When the cycle published the event
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GlucoseEvent {
    /// Event type string used as the SSE `event:` field
    pub fn kind(&self) -> &'static str {
        match self {
            GlucoseEvent::ReadingsDiscovered { .. } => "ReadingsDiscovered",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`, providing:
/// - Non-blocking publish (slow subscribers never block the publisher)
/// - Multiple concurrent subscribers, each with its own queue and cursor
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for subscribers that fall behind
///
/// Subscribers only receive events emitted after they subscribed; there is
/// no replay of history.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GlucoseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GlucoseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event. An event
    /// emitted with no live subscribers is dropped silently; that is not an
    /// error for the publisher.
    pub fn emit(&self, event: GlucoseEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Current number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
