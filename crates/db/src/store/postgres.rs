use async_trait::async_trait;
use civic_core::identity::Identity;
use civic_core::types::{DbId, Timestamp};

use super::{NotificationStore, StoreError};
use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationPage, NotificationStats, Page,
};
use crate::repositories::NotificationRepo;
use crate::DbPool;

/// PostgreSQL-backed notification store.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, input: NewNotification) -> Result<Notification, StoreError> {
        let stored = NotificationRepo::create(&self.pool, &input).await?;
        tracing::debug!(
            id = stored.id,
            recipient = stored.recipient.as_str(),
            kind = stored.kind.as_str(),
            "Notification row stored"
        );
        Ok(stored)
    }

    async fn list(
        &self,
        recipient: &Identity,
        filter: &NotificationFilter,
        page: Page,
    ) -> Result<NotificationPage, StoreError> {
        let notifications =
            NotificationRepo::list_for_recipient(&self.pool, recipient, filter, page).await?;
        let total = NotificationRepo::count_for_recipient(&self.pool, recipient, filter).await?;
        let unread_count = NotificationRepo::unread_count(&self.pool, recipient).await?;

        Ok(NotificationPage {
            notifications,
            unread_count,
            total,
        })
    }

    async fn unread_count(&self, recipient: &Identity) -> Result<i64, StoreError> {
        Ok(NotificationRepo::unread_count(&self.pool, recipient).await?)
    }

    async fn mark_read(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError> {
        Ok(NotificationRepo::mark_read(&self.pool, id, recipient).await?)
    }

    async fn mark_all_read(&self, recipient: &Identity) -> Result<u64, StoreError> {
        Ok(NotificationRepo::mark_all_read(&self.pool, recipient).await?)
    }

    async fn delete(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError> {
        Ok(NotificationRepo::delete(&self.pool, id, recipient).await?)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        Ok(NotificationRepo::delete_expired(&self.pool, now).await?)
    }

    async fn statistics(&self) -> Result<NotificationStats, StoreError> {
        Ok(NotificationRepo::statistics(&self.pool).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
