//! Event-to-session routing.
//!
//! [`EventRouter`] drains the event bus and pushes each event to the live
//! sessions that subscribed to its kind, restricted to the event's primary
//! recipient when the body names one.

use std::sync::Arc;

use civic_events::DomainEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::{Gateway, ServerMessage};

pub struct EventRouter {
    gateway: Arc<Gateway>,
}

impl EventRouter {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Push `event` to every eligible session. Returns the number reached.
    pub async fn route(&self, event: &DomainEvent) -> usize {
        let recipient = event.recipient();
        let targets = self.gateway.eligible_sessions(event.kind, recipient).await;
        if targets.is_empty() {
            tracing::debug!(kind = %event.kind, "No eligible sessions for event");
            return 0;
        }

        let message = ServerMessage::BlockchainEvent {
            event_type: event.kind.as_str().to_string(),
            data: event.body.clone(),
        };
        let sent = self.gateway.push_many(&targets, &message).await;
        tracing::debug!(kind = %event.kind, sent, "Routed event to live sessions");
        sent
    }

    /// Run the routing loop.
    ///
    /// Events are handled one at a time in bus order. The loop exits when
    /// `cancel` fires or the bus is closed.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<DomainEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event router stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        self.route(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event router lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, event router shutting down");
                        break;
                    }
                },
            }
        }
    }
}
