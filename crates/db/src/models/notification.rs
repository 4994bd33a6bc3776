//! Notification entity models and DTOs.

use chrono::Utc;
use civic_core::error::CoreError;
use civic_core::identity::Identity;
use civic_core::notification::{NotificationContent, NotificationKind, Priority};
use civic_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default page size for notification listing.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Maximum page size for notification listing.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A row from the `notifications` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    #[sqlx(try_from = "String")]
    pub recipient: Identity,
    pub title: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    pub created_at: Timestamp,
}

impl Notification {
    /// Whether the record is past its expiry at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// DTO for inserting a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: Identity,
    pub content: NotificationContent,
    pub data: serde_json::Value,
    pub expires_at: Option<Timestamp>,
    pub idempotency_key: Option<String>,
}

impl NewNotification {
    pub fn new(recipient: Identity, content: NotificationContent) -> Self {
        Self {
            recipient,
            content,
            data: serde_json::Value::Object(Default::default()),
            expires_at: None,
            idempotency_key: None,
        }
    }

    /// Reject empty content and expiries that are not in the future.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.content.validate()?;
        if let Some(expires_at) = self.expires_at {
            if expires_at <= Utc::now() {
                return Err(CoreError::Validation(
                    "expires_at must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Optional filters for listing a recipient's notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
}

impl NotificationFilter {
    pub fn matches(&self, n: &Notification) -> bool {
        (!self.unread_only || !n.is_read)
            && self.kind.is_none_or(|k| k == n.kind)
            && self.priority.is_none_or(|p| p == n.priority)
    }
}

/// Limit/offset pagination, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of notifications plus counts computed independently of it.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    /// All unread notifications for the recipient, regardless of filter or page.
    pub unread_count: i64,
    /// Rows matching the filter across all pages.
    pub total: i64,
}

/// Per-kind aggregate for the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct KindStats {
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    pub count: i64,
    pub unread: i64,
}

/// Store-wide aggregates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationStats {
    pub by_kind: Vec<KindStats>,
    pub total: i64,
    pub total_unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limit_and_offset() {
        assert_eq!(Page::new(Some(1_000), Some(-5)), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(Some(0), None), Page { limit: 1, offset: 0 });
        assert_eq!(Page::default().limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn past_expiry_is_rejected() {
        let mut new = NewNotification::new(
            Identity::parse("0xabc").unwrap(),
            NotificationContent {
                title: "t".into(),
                message: "m".into(),
                kind: NotificationKind::Info,
                priority: Priority::Low,
                action: None,
            },
        );
        new.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(new.validate().is_err());

        new.expires_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(new.validate().is_ok());
    }
}
