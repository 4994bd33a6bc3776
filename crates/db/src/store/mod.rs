//! The notification store abstraction.
//!
//! [`NotificationStore`] is the only persistence surface the notification
//! service depends on. [`PgNotificationStore`] backs it with PostgreSQL via
//! [`NotificationRepo`](crate::repositories::NotificationRepo);
//! [`MemoryNotificationStore`] keeps rows in process memory for tests and
//! database-less development runs.

use async_trait::async_trait;
use civic_core::identity::Identity;
use civic_core::types::{DbId, Timestamp};

use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationPage, NotificationStats, Page,
};

mod memory;
mod postgres;

pub use memory::MemoryNotificationStore;
pub use postgres::PgNotificationStore;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure of a store operation. The write may or may not have happened.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database query failed.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The backing store cannot serve requests right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    /// Pool exhaustion and lost connections mean the store is unreachable,
    /// not that the query was wrong.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationStore
// ---------------------------------------------------------------------------

/// Durable notification records, their read-state and expiry.
///
/// "Not found" is never an error: ownership-checked mutations report it as
/// `false`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification and return the stored record.
    async fn create(&self, input: NewNotification) -> Result<Notification, StoreError>;

    /// One page of the recipient's notifications plus independent counts.
    async fn list(
        &self,
        recipient: &Identity,
        filter: &NotificationFilter,
        page: Page,
    ) -> Result<NotificationPage, StoreError>;

    async fn unread_count(&self, recipient: &Identity) -> Result<i64, StoreError>;

    /// Mark one owned record read. Repeat calls succeed without changing it.
    async fn mark_read(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError>;

    /// Mark every unread record of the recipient read; returns affected rows.
    async fn mark_all_read(&self, recipient: &Identity) -> Result<u64, StoreError>;

    /// Ownership-checked hard delete.
    async fn delete(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError>;

    /// Remove every record whose expiry is at or before `now`.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError>;

    async fn statistics(&self) -> Result<NotificationStats, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn pool_failures_are_unavailable() {
        assert_matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        );
        assert_matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        );
    }

    #[test]
    fn query_failures_stay_database_errors() {
        assert_matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(sqlx::Error::RowNotFound)
        );
    }
}
