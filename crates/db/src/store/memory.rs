use std::cmp::Reverse;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use civic_core::identity::Identity;
use civic_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use super::{NotificationStore, StoreError};
use crate::models::notification::{
    KindStats, NewNotification, Notification, NotificationFilter, NotificationPage,
    NotificationStats, Page,
};

#[derive(Default)]
struct Inner {
    next_id: DbId,
    rows: BTreeMap<DbId, Notification>,
}

/// In-process notification store.
///
/// Mirrors the PostgreSQL adapter's semantics (ordering, expiry visibility,
/// idempotency keys). Contents are lost on restart.
#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: RwLock<Inner>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrite a row's expiry. Lets tests age records without waiting.
    pub async fn set_expiry(&self, id: DbId, expires_at: Option<Timestamp>) -> bool {
        match self.inner.write().await.rows.get_mut(&id) {
            Some(row) => {
                row.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

fn visible<'a>(
    rows: &'a BTreeMap<DbId, Notification>,
    recipient: &'a Identity,
    now: Timestamp,
) -> impl Iterator<Item = &'a Notification> + 'a {
    rows.values()
        .filter(move |n| &n.recipient == recipient && !n.is_expired(now))
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, input: NewNotification) -> Result<Notification, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(key) = input.idempotency_key.as_deref() {
            let existing = inner.rows.values().find(|n| {
                n.recipient == input.recipient && n.idempotency_key.as_deref() == Some(key)
            });
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let (action_url, action_label) = match input.content.action {
            Some(action) => (Some(action.url), Some(action.label)),
            None => (None, None),
        };
        let row = Notification {
            id,
            recipient: input.recipient,
            title: input.content.title,
            message: input.content.message,
            kind: input.content.kind,
            priority: input.content.priority,
            data: input.data,
            is_read: false,
            read_at: None,
            expires_at: input.expires_at,
            action_url,
            action_label,
            idempotency_key: input.idempotency_key,
            created_at: Utc::now(),
        };
        inner.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn list(
        &self,
        recipient: &Identity,
        filter: &NotificationFilter,
        page: Page,
    ) -> Result<NotificationPage, StoreError> {
        let inner = self.inner.read().await;
        let now = Utc::now();

        let mut matching: Vec<&Notification> = visible(&inner.rows, recipient, now)
            .filter(|n| filter.matches(n))
            .collect();
        matching.sort_by_key(|n| Reverse((n.priority, n.created_at, n.id)));

        let total = matching.len() as i64;
        let notifications = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        let unread_count = visible(&inner.rows, recipient, now)
            .filter(|n| !n.is_read)
            .count() as i64;

        Ok(NotificationPage {
            notifications,
            unread_count,
            total,
        })
    }

    async fn unread_count(&self, recipient: &Identity) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        Ok(visible(&inner.rows, recipient, Utc::now())
            .filter(|n| !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.rows.get_mut(&id) {
            Some(row) if &row.recipient == recipient => {
                if !row.is_read {
                    row.is_read = true;
                    row.read_at = Some(Utc::now());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: &Identity) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut affected = 0;
        for row in inner.rows.values_mut() {
            if &row.recipient == recipient && !row.is_read && !row.is_expired(now) {
                row.is_read = true;
                row.read_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, id: DbId, recipient: &Identity) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .rows
            .get(&id)
            .is_some_and(|row| &row.recipient == recipient);
        if owned {
            inner.rows.remove(&id);
        }
        Ok(owned)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|_, row| !row.is_expired(now));
        Ok((before - inner.rows.len()) as u64)
    }

    async fn statistics(&self) -> Result<NotificationStats, StoreError> {
        let inner = self.inner.read().await;
        let mut by_kind: BTreeMap<&'static str, KindStats> = BTreeMap::new();

        for row in inner.rows.values() {
            let entry = by_kind.entry(row.kind.as_str()).or_insert(KindStats {
                kind: row.kind,
                count: 0,
                unread: 0,
            });
            entry.count += 1;
            if !row.is_read {
                entry.unread += 1;
            }
        }

        let by_kind: Vec<KindStats> = by_kind.into_values().collect();
        Ok(NotificationStats {
            total: by_kind.iter().map(|k| k.count).sum(),
            total_unread: by_kind.iter().map(|k| k.unread).sum(),
            by_kind,
        })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
