//! Reads and updates of the caller's own notifications.

use std::sync::Arc;

use super::Notification;
use crate::error::{Result, ServerError};
use crate::store::{NotificationRepository, Store};
use crate::user::Caller;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Notification inbox scoped to a caller.
#[derive(Clone)]
pub struct Inbox {
    store: Arc<dyn Store>,
}

impl Inbox {
    /// Create a new [`Inbox`].
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self, caller: &Caller) -> Result<i64> {
        self.store.count_unread(&caller.id).await
    }

    /// Newest-first page of notifications.
    pub async fn list(
        &self,
        caller: &Caller,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or_default().max(0);
        self.store
            .list_notifications(&caller.id, limit, offset)
            .await
    }

    /// Flag a notification as read.
    ///
    /// Fails with [`ServerError::NotificationNotFound`] when the notification
    /// does not exist or belongs to someone else.
    pub async fn mark_as_read(&self, caller: &Caller, id: &str) -> Result<()> {
        match self.store.mark_read(id, &caller.id).await? {
            0 => {
                tracing::debug!(caller = caller.id, id, "notification not owned by caller");
                Err(ServerError::NotificationNotFound)
            },
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::notification::{NewNotification, NotificationType};
    use crate::store::MemoryStore;
    use crate::user::Role;

    async fn seed(store: &MemoryStore, recipient: &str, count: i64) -> Vec<Notification> {
        let start = Utc::now();
        let mut rows = Vec::new();
        for i in 0..count {
            let notification = NewNotification {
                r#type: NotificationType::ApplicationApproved,
                title: format!("title {i}"),
                content: "content".into(),
                recipient_id: recipient.into(),
                metadata: serde_json::Value::Null,
            }
            .into_notification(start + Duration::seconds(i));
            store.insert_notification(&notification).await.unwrap();
            rows.push(notification);
        }
        rows
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        seed(&store, "doc", 3).await;
        seed(&store, "other", 2).await;
        let inbox = Inbox::new(Arc::new(store));
        let caller = Caller::new("doc", Role::User);

        let page = inbox.list(&caller, Some(2), None).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "title 2");
        assert_eq!(page[1].title, "title 1");

        let page = inbox.list(&caller, Some(0), Some(2)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "title 0");
    }

    #[tokio::test]
    async fn test_mark_as_read() {
        let store = MemoryStore::new();
        let rows = seed(&store, "doc", 2).await;
        let inbox = Inbox::new(Arc::new(store));
        let caller = Caller::new("doc", Role::User);

        assert_eq!(inbox.unread_count(&caller).await.unwrap(), 2);
        inbox.mark_as_read(&caller, &rows[0].id).await.unwrap();
        assert_eq!(inbox.unread_count(&caller).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_by_non_owner() {
        let store = MemoryStore::new();
        let rows = seed(&store, "doc", 1).await;
        let inbox = Inbox::new(Arc::new(store));
        let intruder = Caller::new("intruder", Role::Admin);

        let err = inbox.mark_as_read(&intruder, &rows[0].id).await.unwrap_err();
        assert!(matches!(err, ServerError::NotificationNotFound));
        assert_eq!(
            inbox
                .unread_count(&Caller::new("doc", Role::User))
                .await
                .unwrap(),
            1
        );
    }
}
