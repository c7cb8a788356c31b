//! Repository traits consumed by the alerting pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    Alert, AlertFilter, AlertSummary, NewAlert, NewNotification, Notification, NotificationFilter,
    Reading, Role,
};
use crate::StorageError;

/// Authoritative alert and notification records
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert an alert unconditionally
    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert, StorageError>;

    /// Insert an alert unless an active alert for the same wetland and
    /// category was created at or after `since`.
    ///
    /// The existence check and the insert are a single serialized operation;
    /// two concurrent callers with the same key never both insert.
    async fn insert_alert_unless_recent(
        &self,
        alert: NewAlert,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError>;

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>, StorageError>;

    /// Record the first acknowledgement of a still-active alert.
    ///
    /// Returns the stored alert whether or not it changed, `None` if absent.
    async fn acknowledge_alert(
        &self,
        id: i64,
        acknowledged_by: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError>;

    /// Deactivate an active alert. A resolved alert is returned unchanged.
    async fn resolve_alert(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError>;

    /// Alerts matching the filter, newest first
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError>;

    async fn alert_summary(
        &self,
        recent_since: DateTime<Utc>,
    ) -> Result<AlertSummary, StorageError>;

    /// Insert a notification. `None` when one already exists for the same
    /// alert and recipient.
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StorageError>;

    /// A recipient's notifications, newest first
    async fn list_notifications(
        &self,
        user_id: i64,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StorageError>;

    /// Mark a notification read if it belongs to `user_id`
    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StorageError>;
}

/// Timestamped sensor readings
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn insert_reading(&self, reading: Reading) -> Result<(), StorageError>;

    /// Readings with `timestamp >= since`, oldest first
    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError>;

    async fn reading_count(&self) -> Result<u64, StorageError>;
}

/// User ids by role
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn upsert_user(&self, user_id: i64, role: Role) -> Result<(), StorageError>;

    async fn users_by_role(&self, roles: &[Role]) -> Result<Vec<i64>, StorageError>;
}
