//! The notification orchestrator.
//!
//! [`NotificationService`] renders, persists and pushes notifications. It is
//! the only component HTTP handlers and background jobs call for
//! notification work; the store and the gateway stay behind it.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use civic_core::error::CoreError;
use civic_core::identity::Identity;
use civic_core::kinds::EventKind;
use civic_core::notification::{NotificationKind, Priority};
use civic_core::template::{self, TemplateSource};
use civic_core::types::{DbId, Timestamp};
use civic_db::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationPage, NotificationStats, Page,
};
use civic_db::NotificationStore;
use civic_events::DomainEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::ws::{Gateway, RealtimeStats, ServerMessage};

/// Per-call overrides for [`NotificationService::notify`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyOptions {
    /// Replaces the template's default priority.
    pub priority: Option<Priority>,
    /// Replaces the per-kind default expiry.
    pub expires_at: Option<Timestamp>,
    /// Retrying with the same key returns the first stored record.
    pub idempotency_key: Option<String>,
}

impl NotifyOptions {
    /// Reject an explicit expiry that is not in the future.
    pub fn validate(&self, now: Timestamp) -> Result<(), CoreError> {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => Err(CoreError::Validation(
                "expires_at must be in the future".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Title substituted into grievance notifications whose event carries none.
pub const DEFAULT_GRIEVANCE_TITLE: &str = "Your Grievance";

/// Outcome of a successful `notify`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    /// Live sessions the notification was pushed to.
    pub pushed: usize,
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Distinct recipients attempted.
    pub reach: usize,
    pub persisted: usize,
    pub failed: usize,
    /// Live sessions pushed to across all recipients.
    pub pushed: usize,
}

/// Store and gateway counters combined.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub notifications: NotificationStats,
    pub realtime: RealtimeStats,
}

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    gateway: Arc<Gateway>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, gateway: Arc<Gateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Render, persist, then push to every live session bound to `recipient`.
    ///
    /// Persistence happens before the push; a store failure is returned and
    /// nothing is pushed.
    pub async fn notify(
        &self,
        recipient: &Identity,
        source: &TemplateSource,
        data: Map<String, Value>,
        options: NotifyOptions,
    ) -> AppResult<Delivery> {
        options.validate(Utc::now())?;
        let mut content = source.resolve(&data)?;
        if let Some(priority) = options.priority {
            content.priority = priority;
        }
        let expires_at = options
            .expires_at
            .unwrap_or_else(|| Utc::now() + content.kind.default_expiry());

        let input = NewNotification {
            recipient: recipient.clone(),
            content,
            data: Value::Object(data),
            expires_at: Some(expires_at),
            idempotency_key: options.idempotency_key,
        };
        input.validate()?;

        let notification = self.store.create(input).await?;
        let pushed = self.push_notification(&notification).await;

        tracing::info!(
            id = notification.id,
            recipient = %recipient,
            kind = %notification.kind,
            pushed,
            "Notification sent"
        );
        Ok(Delivery {
            notification,
            pushed,
        })
    }

    /// Send one announcement to many recipients.
    ///
    /// The announcement is rendered once and always stored as a
    /// `system_announcement`. With explicit `targets` each distinct target
    /// is notified. Without, the recipients are the identities bound to a
    /// live session right now; offline users are not reached. A failure for
    /// one recipient does not stop the others.
    pub async fn broadcast(
        &self,
        source: &TemplateSource,
        data: Map<String, Value>,
        options: NotifyOptions,
        targets: Option<Vec<Identity>>,
    ) -> AppResult<BroadcastReport> {
        // Fail fast on a bad template or expiry instead of once per recipient.
        options.validate(Utc::now())?;
        let mut content = source.resolve(&data)?;
        content.kind = NotificationKind::SystemAnnouncement;
        let announcement = TemplateSource::Custom(content);

        let recipients: Vec<Identity> = match targets {
            Some(targets) => targets.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
            None => self.gateway.live_identities().await,
        };

        let mut report = BroadcastReport {
            reach: recipients.len(),
            ..Default::default()
        };
        for recipient in &recipients {
            match self
                .notify(recipient, &announcement, data.clone(), options.clone())
                .await
            {
                Ok(delivery) => {
                    report.persisted += 1;
                    report.pushed += delivery.pushed;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(recipient = %recipient, error = %e, "Broadcast delivery failed");
                }
            }
        }

        tracing::info!(
            reach = report.reach,
            persisted = report.persisted,
            failed = report.failed,
            "Broadcast complete"
        );
        Ok(report)
    }

    async fn push_notification(&self, notification: &Notification) -> usize {
        let data = match serde_json::to_value(notification) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(id = notification.id, error = %e, "Failed to encode notification");
                return 0;
            }
        };
        self.gateway
            .send_to_identity(&notification.recipient, &ServerMessage::Notification { data })
            .await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn list(
        &self,
        recipient: &Identity,
        filter: &NotificationFilter,
        page: Page,
    ) -> AppResult<NotificationPage> {
        Ok(self.store.list(recipient, filter, page).await?)
    }

    pub async fn unread_count(&self, recipient: &Identity) -> AppResult<i64> {
        Ok(self.store.unread_count(recipient).await?)
    }

    /// Mark one notification read. Not owned or missing is `NotFound`.
    pub async fn mark_read(&self, id: DbId, recipient: &Identity) -> AppResult<()> {
        if !self.store.mark_read(id, recipient).await? {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient: &Identity) -> AppResult<u64> {
        let count = self.store.mark_all_read(recipient).await?;
        tracing::debug!(recipient = %recipient, count, "Marked all notifications read");
        Ok(count)
    }

    /// Delete one notification. Not owned or missing is `NotFound`.
    pub async fn delete(&self, id: DbId, recipient: &Identity) -> AppResult<()> {
        if !self.store.delete(id, recipient).await? {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub async fn stats(&self) -> AppResult<ServiceStats> {
        Ok(ServiceStats {
            notifications: self.store.statistics().await?,
            realtime: self.gateway.statistics().await,
        })
    }

    /// Delete every notification expired at `now`.
    pub async fn sweep_expired(&self, now: Timestamp) -> AppResult<u64> {
        Ok(self.store.delete_expired(now).await?)
    }

    // -----------------------------------------------------------------------
    // Chain events
    // -----------------------------------------------------------------------

    /// Issue the templated notification for a domain event, if its kind has
    /// a template and its body names a recipient.
    ///
    /// The transaction hash, when present, keys the write so a replayed
    /// event does not notify twice. Grievance events without a title fall
    /// back to [`DEFAULT_GRIEVANCE_TITLE`].
    pub async fn handle_event(&self, event: &DomainEvent) -> AppResult<Option<Notification>> {
        let Some(template) = template::for_event(event.kind) else {
            return Ok(None);
        };
        let Some(raw) = event.recipient() else {
            tracing::debug!(kind = %event.kind, "Event has no recipient, no notification issued");
            return Ok(None);
        };
        let recipient = Identity::parse(raw)?;

        let idempotency_key = event
            .body
            .get("transactionHash")
            .and_then(Value::as_str)
            .map(|tx| format!("{}:{tx}", event.kind));

        let mut data = event.data();
        if is_grievance(event.kind) && !has_text(&data, "title") {
            data.insert("title".into(), Value::from(DEFAULT_GRIEVANCE_TITLE));
        }

        let delivery = self
            .notify(
                &recipient,
                &TemplateSource::Key(template.key.to_string()),
                data,
                NotifyOptions {
                    idempotency_key,
                    ..Default::default()
                },
            )
            .await?;
        Ok(Some(delivery.notification))
    }

    /// Drain the event bus, issuing notifications for chain events in bus
    /// order until `cancel` fires or the bus closes.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<DomainEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Chain notification loop stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        if let Err(e) = self.handle_event(&event).await {
                            tracing::error!(kind = %event.kind, error = %e, "Failed to notify for event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Chain notification loop lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, chain notification loop shutting down");
                        break;
                    }
                },
            }
        }
    }
}

fn is_grievance(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::GrievanceSubmitted | EventKind::GrievanceAssigned | EventKind::GrievanceResolved
    )
}

fn has_text(data: &Map<String, Value>, key: &str) -> bool {
    data.get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Notification",
        id,
    })
}
