//! In-memory Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::model::{
    Alert, AlertFilter, AlertSummary, NewAlert, NewNotification, Notification, NotificationFilter,
    Reading, Role, Severity,
};
use crate::store::{AlertStore, TelemetryStore, UserDirectory};
use crate::StorageError;

/// Rows plus the next identity to hand out
struct Table<T> {
    rows: Vec<T>,
    next_id: i64,
}

impl<T> Table<T> {
    fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Repository for data access (in-memory implementation)
pub struct Repository {
    /// Alert ledger
    alerts: Mutex<Table<Alert>>,
    /// Notification inbox
    notifications: Mutex<Table<Notification>>,
    /// Sensor readings, oldest first
    readings: Mutex<VecDeque<Reading>>,
    /// User directory
    users: Mutex<BTreeMap<i64, Role>>,
    /// Max reading records kept
    max_readings: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

fn page<T>(items: impl Iterator<Item = T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    items.skip(offset).take(limit.unwrap_or(usize::MAX)).collect()
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_retention(100_000)
    }

    /// Create a repository that keeps at most `max_readings` readings
    pub fn with_retention(max_readings: usize) -> Self {
        info!("Creating in-memory repository (reading retention {})", max_readings);
        Self {
            alerts: Mutex::new(Table::new(1000)),
            notifications: Mutex::new(Table::new(1000)),
            readings: Mutex::new(VecDeque::with_capacity(10_000)),
            users: Mutex::new(BTreeMap::new()),
            max_readings,
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for Repository {
    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert, StorageError> {
        let mut alerts = lock(&self.alerts)?;
        let id = alerts.allocate_id();
        let alert = alert.into_alert(id);
        alerts.rows.push(alert.clone());
        debug!("Inserted alert with ID {}", id);
        Ok(alert)
    }

    async fn insert_alert_unless_recent(
        &self,
        alert: NewAlert,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        // Check and insert under the same guard
        let mut alerts = lock(&self.alerts)?;
        if alerts
            .rows
            .iter()
            .any(|a| a.suppresses(alert.wetland_id, alert.category, since))
        {
            return Ok(None);
        }

        let id = alerts.allocate_id();
        let alert = alert.into_alert(id);
        alerts.rows.push(alert.clone());
        debug!("Admitted alert with ID {}", id);
        Ok(Some(alert))
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>, StorageError> {
        let alerts = lock(&self.alerts)?;
        Ok(alerts.rows.iter().find(|a| a.id == id).cloned())
    }

    async fn acknowledge_alert(
        &self,
        id: i64,
        acknowledged_by: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        let mut alerts = lock(&self.alerts)?;
        let Some(alert) = alerts.rows.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };

        if alert.active && alert.acknowledged_at.is_none() {
            alert.acknowledged_by = Some(acknowledged_by);
            alert.acknowledged_at = Some(at);
        }
        Ok(Some(alert.clone()))
    }

    async fn resolve_alert(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        let mut alerts = lock(&self.alerts)?;
        let Some(alert) = alerts.rows.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };

        if alert.active {
            alert.active = false;
            alert.resolved_at = Some(at);
        }
        Ok(Some(alert.clone()))
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError> {
        let alerts = lock(&self.alerts)?;
        let mut matching: Vec<&Alert> = alerts.rows.iter().filter(|a| a.matches(filter)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(page(matching.into_iter().cloned(), filter.offset, filter.limit))
    }

    async fn alert_summary(
        &self,
        recent_since: DateTime<Utc>,
    ) -> Result<AlertSummary, StorageError> {
        let alerts = lock(&self.alerts)?;
        let mut summary = AlertSummary {
            total_alerts: alerts.rows.len() as u64,
            active_alerts: 0,
            critical_alerts: 0,
            recent_alerts: 0,
            generated_at: Utc::now(),
        };

        for alert in &alerts.rows {
            if alert.active {
                summary.active_alerts += 1;
                if alert.severity == Severity::Critical {
                    summary.critical_alerts += 1;
                }
            }
            if alert.created_at >= recent_since {
                summary.recent_alerts += 1;
            }
        }
        Ok(summary)
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StorageError> {
        let mut notifications = lock(&self.notifications)?;
        if notification.alert_id.is_some()
            && notifications
                .rows
                .iter()
                .any(|n| n.alert_id == notification.alert_id && n.user_id == notification.user_id)
        {
            return Ok(None);
        }

        let id = notifications.allocate_id();
        let notification = notification.into_notification(id);
        notifications.rows.push(notification.clone());
        Ok(Some(notification))
    }

    async fn list_notifications(
        &self,
        user_id: i64,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StorageError> {
        let notifications = lock(&self.notifications)?;
        let mut matching: Vec<&Notification> = notifications
            .rows
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| filter.is_read.map_or(true, |r| n.is_read == r))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(page(matching.into_iter().cloned(), filter.offset, filter.limit))
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StorageError> {
        let mut notifications = lock(&self.notifications)?;
        let Some(notification) = notifications
            .rows
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(None);
        };

        notification.is_read = true;
        notification.read_at.get_or_insert(at);
        Ok(Some(notification.clone()))
    }
}

#[async_trait]
impl TelemetryStore for Repository {
    async fn insert_reading(&self, reading: Reading) -> Result<(), StorageError> {
        let mut readings = lock(&self.readings)?;

        // Enforce retention
        while readings.len() >= self.max_readings {
            readings.pop_front();
        }

        readings.push_back(reading);
        Ok(())
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        let readings = lock(&self.readings)?;
        let mut window: Vec<Reading> = readings
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect();
        window.sort_by_key(|r| r.timestamp);
        Ok(window)
    }

    async fn reading_count(&self) -> Result<u64, StorageError> {
        Ok(lock(&self.readings)?.len() as u64)
    }
}

#[async_trait]
impl UserDirectory for Repository {
    async fn upsert_user(&self, user_id: i64, role: Role) -> Result<(), StorageError> {
        lock(&self.users)?.insert(user_id, role);
        Ok(())
    }

    async fn users_by_role(&self, roles: &[Role]) -> Result<Vec<i64>, StorageError> {
        let users = lock(&self.users)?;
        Ok(users
            .iter()
            .filter(|(_, role)| roles.contains(role))
            .map(|(id, _)| *id)
            .collect())
    }
}
