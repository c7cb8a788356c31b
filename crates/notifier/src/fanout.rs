//! Per-recipient notification creation

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use storage::{Alert, AlertStore, Channel, NewNotification, Notification, Role, UserDirectory};

use crate::NotifyError;

/// Creates one in-app notification per privileged user for an alert
pub struct FanOut {
    store: Arc<dyn AlertStore>,
    directory: Arc<dyn UserDirectory>,
}

impl FanOut {
    pub fn new(store: Arc<dyn AlertStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory }
    }

    /// Notify every privileged user about `alert`.
    ///
    /// Returns the notifications created by this call. Recipients who already
    /// hold one for the alert are skipped, so a retry never duplicates. A
    /// failure for one recipient is logged and the rest still get theirs.
    pub async fn fan_out(&self, alert: &Alert) -> Result<Vec<Notification>, NotifyError> {
        let recipients = self.directory.users_by_role(&Role::PRIVILEGED).await?;
        debug!(alert_id = alert.id, recipients = recipients.len(), "Fanning out alert");

        let mut created = Vec::with_capacity(recipients.len());
        let mut failures = 0usize;

        for user_id in recipients {
            let now = Utc::now();
            let notification = NewNotification {
                user_id,
                alert_id: Some(alert.id),
                title: alert.title.clone(),
                message: alert.message.clone(),
                channel: Channel::InApp,
                created_at: now,
                sent_at: Some(now),
            };

            match self.store.insert_notification(notification).await {
                Ok(Some(n)) => created.push(n),
                Ok(None) => debug!(alert_id = alert.id, user_id, "Recipient already notified"),
                Err(e) => {
                    failures += 1;
                    warn!(alert_id = alert.id, user_id, "Failed to notify recipient: {}", e);
                }
            }
        }

        if failures > 0 {
            metrics::counter!("fanout_recipient_failures_total").increment(failures as u64);
        }
        metrics::counter!("notifications_created_total").increment(created.len() as u64);
        info!(
            alert_id = alert.id,
            created = created.len(),
            failures,
            "Alert fan-out complete"
        );
        Ok(created)
    }
}
