//! Notification fan-out
//!
//! Workflows never push anything themselves: they persist a Notification
//! row through [`NotificationDispatcher`] and the [`OutboxRelay`] delivers it
//! onto the broadcast channel later.

mod outbox;

pub use outbox::{OutboxRelay, RelayReport};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::{Notification, NotificationCategory, NotificationTarget, UserId};
use crate::store::WorkflowStore;

/// Message about to be written to the outbox
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingNotification {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub origin_user: UserId,
    pub target: NotificationTarget,
}

impl OutgoingNotification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        category: NotificationCategory,
        origin_user: UserId,
        target: NotificationTarget,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category,
            origin_user,
            target,
        }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn WorkflowStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Persist one outbox row.
    ///
    /// Failures are logged and swallowed: the mutation that triggered the
    /// notification has already been committed and must not be reported as
    /// failed because of it.
    pub async fn send(&self, outgoing: OutgoingNotification) -> Option<Notification> {
        let row = Notification {
            id: 0,
            title: outgoing.title,
            body: outgoing.body,
            category: outgoing.category,
            origin_user: outgoing.origin_user,
            target: outgoing.target,
            read: false,
            created_at: Utc::now(),
            delivered_at: None,
            attempts: 0,
            last_error: None,
        };

        match self.store.insert_notification(row).await {
            Ok(saved) => {
                debug!(
                    notification_id = saved.id,
                    category = ?saved.category,
                    target = ?saved.target,
                    "Queued notification"
                );
                Some(saved)
            }
            Err(e) => {
                warn!(error = %e, "Failed to queue notification");
                None
            }
        }
    }

    pub async fn send_to_user(
        &self,
        user_id: UserId,
        title: impl Into<String>,
        body: impl Into<String>,
        category: NotificationCategory,
        origin_user: UserId,
    ) -> Option<Notification> {
        self.send(OutgoingNotification::new(
            title,
            body,
            category,
            origin_user,
            NotificationTarget::user(user_id),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, NotificationStore};

    #[tokio::test]
    async fn test_send_persists_undelivered_row() {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone());

        let sent = dispatcher
            .send_to_user(7, "Solicitud", "Tu solicitud cambió", NotificationCategory::Request, 1)
            .await
            .unwrap();

        let stored = store.get_notification(sent.id).await.unwrap().unwrap();
        assert_eq!(stored.target, NotificationTarget::User(7));
        assert!(stored.delivered_at.is_none());
        assert!(!stored.read);
        assert_eq!(stored.attempts, 0);
    }
}
