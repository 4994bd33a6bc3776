//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`DomainEvent`]s.
//! Producers never see the bus itself: they are handed an
//! [`EventPublisher`] when they are constructed.

use chrono::{DateTime, Utc};
use civic_core::kinds::EventKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::chain::ChainEvent;

/// Body fields inspected, in order, to find an event's primary recipient.
pub const RECIPIENT_FIELDS: [&str; 3] = ["citizenAddress", "owner", "citizen"];

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// Something that happened in the wider application, on its way to live
/// sessions and (for chain kinds) to the notification store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,

    /// Free-form JSON body carrying event-specific data.
    pub body: serde_json::Value,

    /// When the event was submitted (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, body: serde_json::Value) -> Self {
        Self {
            kind,
            body,
            timestamp: Utc::now(),
        }
    }

    /// The identity this event is about, if the body names one.
    ///
    /// The first of [`RECIPIENT_FIELDS`] holding a string wins; non-string
    /// values are skipped.
    pub fn recipient(&self) -> Option<&str> {
        RECIPIENT_FIELDS
            .iter()
            .find_map(|field| self.body.get(field).and_then(|v| v.as_str()))
    }

    /// The body as an object map, empty when the body is not an object.
    pub fn data(&self) -> serde_json::Map<String, serde_json::Value> {
        self.body.as_object().cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest unconsumed events are dropped and slow
/// receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// A cloneable submit handle for producers.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// EventPublisher
// ---------------------------------------------------------------------------

/// Submit handle for event producers.
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    /// Submit an event of `kind` with the given body.
    pub fn submit(&self, kind: EventKind, body: serde_json::Value) {
        self.publish(DomainEvent::new(kind, body));
    }

    /// Submit a typed contract event.
    pub fn submit_chain(&self, event: ChainEvent) {
        self.publish(event.into_domain_event());
    }

    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind;
        // A send error only means nobody is listening yet.
        if self.sender.send(event).is_err() {
            tracing::debug!(kind = %kind, "Event submitted with no subscribers");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
