//! Repository for the `notifications` table.

use civic_core::identity::Identity;
use civic_core::notification::{NotificationKind, Priority};
use civic_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::notification::{
    KindStats, NewNotification, Notification, NotificationFilter, NotificationStats, Page,
};

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, recipient, title, message, kind, priority, data, is_read, read_at, \
     expires_at, action_url, action_label, idempotency_key, created_at";

/// Sort key mapping the textual priority to its rank.
const PRIORITY_RANK: &str =
    "CASE priority WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'medium' THEN 1 ELSE 0 END";

/// Rows that have not yet expired. Expired rows stay invisible until swept.
const NOT_EXPIRED: &str = "(expires_at IS NULL OR expires_at > NOW())";

/// Provides CRUD operations for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification and return the stored row.
    ///
    /// When an idempotency key is supplied and a row with the same
    /// `(recipient, idempotency_key)` already exists, that row is returned
    /// unchanged instead of inserting a duplicate.
    pub async fn create(pool: &PgPool, input: &NewNotification) -> Result<Notification, sqlx::Error> {
        let (action_url, action_label) = match &input.content.action {
            Some(action) => (Some(action.url.as_str()), Some(action.label.as_str())),
            None => (None, None),
        };
        let query = format!(
            "INSERT INTO notifications \
                (recipient, title, message, kind, priority, data, expires_at, \
                 action_url, action_label, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT ON CONSTRAINT uq_notifications_recipient_idempotency \
             DO UPDATE SET idempotency_key = EXCLUDED.idempotency_key \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(input.recipient.as_str())
            .bind(&input.content.title)
            .bind(&input.content.message)
            .bind(input.content.kind.as_str())
            .bind(input.content.priority.as_str())
            .bind(&input.data)
            .bind(input.expires_at)
            .bind(action_url)
            .bind(action_label)
            .bind(input.idempotency_key.as_deref())
            .fetch_one(pool)
            .await
    }

    /// List one page of a recipient's live notifications, highest priority
    /// first, newest first within a priority.
    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient: &Identity,
        filter: &NotificationFilter,
        page: Page,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE recipient = $1 AND {NOT_EXPIRED} \
               AND ($2 = false OR is_read = false) \
               AND ($3::text IS NULL OR kind = $3) \
               AND ($4::text IS NULL OR priority = $4) \
             ORDER BY {PRIORITY_RANK} DESC, created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(recipient.as_str())
            .bind(filter.unread_only)
            .bind(filter.kind.map(NotificationKind::as_str))
            .bind(filter.priority.map(Priority::as_str))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    /// Count a recipient's live notifications matching the filter.
    pub async fn count_for_recipient(
        pool: &PgPool,
        recipient: &Identity,
        filter: &NotificationFilter,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM notifications \
             WHERE recipient = $1 AND {NOT_EXPIRED} \
               AND ($2 = false OR is_read = false) \
               AND ($3::text IS NULL OR kind = $3) \
               AND ($4::text IS NULL OR priority = $4)"
        );
        sqlx::query_scalar(&query)
            .bind(recipient.as_str())
            .bind(filter.unread_only)
            .bind(filter.kind.map(NotificationKind::as_str))
            .bind(filter.priority.map(Priority::as_str))
            .fetch_one(pool)
            .await
    }

    /// Get the number of unread live notifications for a recipient.
    pub async fn unread_count(pool: &PgPool, recipient: &Identity) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM notifications \
             WHERE recipient = $1 AND is_read = false AND {NOT_EXPIRED}"
        );
        sqlx::query_scalar(&query)
            .bind(recipient.as_str())
            .fetch_one(pool)
            .await
    }

    /// Mark a single notification as read.
    ///
    /// Returns `true` if the notification exists for the given recipient.
    /// Re-marking an already-read row keeps its original `read_at`.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: DbId,
        recipient: &Identity,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = true, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND recipient = $2",
        )
        .bind(notification_id)
        .bind(recipient.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all unread live notifications as read for a recipient.
    ///
    /// Returns the number of notifications that were marked read.
    pub async fn mark_all_read(pool: &PgPool, recipient: &Identity) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE notifications \
             SET is_read = true, read_at = NOW() \
             WHERE recipient = $1 AND is_read = false AND {NOT_EXPIRED}"
        );
        let result = sqlx::query(&query)
            .bind(recipient.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hard-delete a notification owned by the recipient.
    pub async fn delete(
        pool: &PgPool,
        notification_id: DbId,
        recipient: &Identity,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient = $2")
            .bind(notification_id)
            .bind(recipient.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every notification whose expiry is at or before `cutoff`.
    pub async fn delete_expired(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at <= $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Aggregate counts per kind plus overall totals.
    pub async fn statistics(pool: &PgPool) -> Result<NotificationStats, sqlx::Error> {
        let by_kind = sqlx::query_as::<_, KindStats>(
            "SELECT kind, COUNT(*) AS count, \
                    COUNT(*) FILTER (WHERE is_read = false) AS unread \
             FROM notifications \
             GROUP BY kind \
             ORDER BY kind",
        )
        .fetch_all(pool)
        .await?;

        let total = by_kind.iter().map(|k| k.count).sum();
        let total_unread = by_kind.iter().map(|k| k.unread).sum();

        Ok(NotificationStats {
            by_kind,
            total,
            total_unread,
        })
    }
}
