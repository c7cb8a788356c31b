//! A recipient's view of their notifications

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use storage::{Actor, AlertStore, Notification, NotificationFilter};

use crate::NotifyError;

/// Per-recipient notification reads and updates
pub struct Inbox {
    store: Arc<dyn AlertStore>,
}

impl Inbox {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self { store }
    }

    /// The caller's own notifications, newest first
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, NotifyError> {
        Ok(self.store.list_notifications(actor.user_id, filter).await?)
    }

    /// Mark one of the caller's notifications read.
    ///
    /// Someone else's notification is reported as not found.
    pub async fn mark_read(&self, id: i64, actor: &Actor) -> Result<Notification, NotifyError> {
        let notification = self
            .store
            .mark_notification_read(id, actor.user_id, Utc::now())
            .await?
            .ok_or(NotifyError::NotFound)?;

        debug!(id, user_id = actor.user_id, "Notification marked read");
        Ok(notification)
    }
}
