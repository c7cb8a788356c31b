//! SQLite Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

use crate::model::{
    Alert, AlertFilter, AlertSummary, Category, NewAlert, NewNotification, Notification,
    NotificationFilter, Reading, Role,
};
use crate::store::{AlertStore, TelemetryStore, UserDirectory};
use crate::StorageError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        category TEXT NOT NULL,
        severity TEXT NOT NULL,
        wetland_id INTEGER,
        sensor_id INTEGER,
        threshold_value REAL,
        actual_value REAL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at_ms INTEGER NOT NULL,
        resolved_at_ms INTEGER,
        acknowledged_by INTEGER,
        acknowledged_at_ms INTEGER
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_dedup
        ON alerts (wetland_id, category, active, created_at_ms)",
    "CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        alert_id INTEGER,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        channel TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at_ms INTEGER NOT NULL,
        sent_at_ms INTEGER,
        read_at_ms INTEGER
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_alert_user
        ON notifications (alert_id, user_id)",
    "CREATE TABLE IF NOT EXISTS sensor_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        wetland_id INTEGER NOT NULL,
        sensor_id INTEGER,
        timestamp_ms INTEGER NOT NULL,
        temperature REAL,
        ph REAL,
        dissolved_oxygen REAL,
        turbidity REAL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sensor_readings_timestamp ON sensor_readings (timestamp_ms)",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        role TEXT NOT NULL
    )",
];

const ALERT_COLUMNS: &str = "id, title, message, category, severity, wetland_id, sensor_id, \
     threshold_value, actual_value, active, created_at_ms, resolved_at_ms, acknowledged_by, \
     acknowledged_at_ms";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, alert_id, title, message, channel, is_read, created_at_ms, sent_at_ms, \
     read_at_ms";

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            // SQLITE_BUSY / SQLITE_LOCKED: another writer holds the database
            sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("5") | Some("6")) => {
                StorageError::Conflict(db.message().to_string())
            }
            _ => StorageError::DatabaseError(e.to_string()),
        }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::SerializationError(format!("timestamp out of range: {}", ms)))
}

fn opt_from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(from_millis).transpose()
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, StorageError> {
    Ok(Alert {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        category: row.try_get::<String, _>("category")?.parse()?,
        severity: row.try_get::<String, _>("severity")?.parse()?,
        wetland_id: row.try_get("wetland_id")?,
        sensor_id: row.try_get("sensor_id")?,
        threshold_value: row.try_get("threshold_value")?,
        actual_value: row.try_get("actual_value")?,
        active: row.try_get("active")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        resolved_at: opt_from_millis(row.try_get("resolved_at_ms")?)?,
        acknowledged_by: row.try_get("acknowledged_by")?,
        acknowledged_at: opt_from_millis(row.try_get("acknowledged_at_ms")?)?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        alert_id: row.try_get("alert_id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        channel: row.try_get::<String, _>("channel")?.parse()?,
        is_read: row.try_get("is_read")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        sent_at: opt_from_millis(row.try_get("sent_at_ms")?)?,
        read_at: opt_from_millis(row.try_get("read_at_ms")?)?,
    })
}

fn reading_from_row(row: &SqliteRow) -> Result<Reading, StorageError> {
    Ok(Reading {
        wetland_id: row.try_get("wetland_id")?,
        sensor_id: row.try_get("sensor_id")?,
        timestamp: from_millis(row.try_get("timestamp_ms")?)?,
        temperature: row.try_get("temperature")?,
        ph: row.try_get("ph")?,
        dissolved_oxygen: row.try_get("dissolved_oxygen")?,
        turbidity: row.try_get("turbidity")?,
    })
}

/// SQLite-backed repository
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if missing) the database at `url` and apply the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database is a separate database
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        info!("Opened SQLite repository at {}", url);
        Ok(repo)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_notification(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Notification>, StorageError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE id = ? AND user_id = ?",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(notification_from_row).transpose()
    }
}

#[async_trait]
impl AlertStore for SqliteRepository {
    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert, StorageError> {
        let result = sqlx::query(
            "INSERT INTO alerts (title, message, category, severity, wetland_id, sensor_id, \
             threshold_value, actual_value, active, created_at_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.category.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.wetland_id)
        .bind(alert.sensor_id)
        .bind(alert.threshold_value)
        .bind(alert.actual_value)
        .bind(alert.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted alert with ID {}", id);
        self.get_alert(id)
            .await?
            .ok_or_else(|| {
                StorageError::DatabaseError(format!("alert {} vanished after insert", id))
            })
    }

    async fn insert_alert_unless_recent(
        &self,
        alert: NewAlert,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        // One statement, so SQLite's write lock covers both the check and the insert
        let result = sqlx::query(
            "INSERT INTO alerts (title, message, category, severity, wetland_id, sensor_id, \
             threshold_value, actual_value, active, created_at_ms) \
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, 1, ? \
             WHERE NOT EXISTS (SELECT 1 FROM alerts WHERE wetland_id IS ? AND category = ? \
             AND active = 1 AND created_at_ms >= ?)",
        )
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.category.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.wetland_id)
        .bind(alert.sensor_id)
        .bind(alert.threshold_value)
        .bind(alert.actual_value)
        .bind(alert.created_at.timestamp_millis())
        .bind(alert.wetland_id)
        .bind(alert.category.as_str())
        .bind(since.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let id = result.last_insert_rowid();
        debug!("Admitted alert with ID {}", id);
        self.get_alert(id).await
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>, StorageError> {
        let sql = format!("SELECT {} FROM alerts WHERE id = ?", ALERT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    async fn acknowledge_alert(
        &self,
        id: i64,
        acknowledged_by: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        sqlx::query(
            "UPDATE alerts SET acknowledged_by = ?, acknowledged_at_ms = ? \
             WHERE id = ? AND active = 1 AND acknowledged_at_ms IS NULL",
        )
        .bind(acknowledged_by)
        .bind(at.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_alert(id).await
    }

    async fn resolve_alert(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        sqlx::query("UPDATE alerts SET active = 0, resolved_at_ms = ? WHERE id = ? AND active = 1")
            .bind(at.timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get_alert(id).await
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM alerts WHERE 1 = 1", ALERT_COLUMNS));

        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(severity) = filter.severity {
            query.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ").push_bind(active);
        }
        if let Some(wetland_id) = filter.wetland_id {
            query.push(" AND wetland_id = ").push_bind(wetland_id);
        }
        if filter.public_only {
            query.push(" AND category IN (");
            let mut public = query.separated(", ");
            for category in [Category::Critical, Category::Warning, Category::Info] {
                if category.is_public() {
                    public.push_bind(category.as_str());
                }
            }
            public.push_unseparated(")");
        }

        // LIMIT -1 is SQLite for "no limit"
        let limit = filter.limit.map_or(-1, |l| l as i64);
        query
            .push(" ORDER BY created_at_ms DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(alert_from_row).collect()
    }

    async fn alert_summary(
        &self,
        recent_since: DateTime<Utc>,
    ) -> Result<AlertSummary, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN active = 1 THEN 1 ELSE 0 END), 0) AS active, \
             COALESCE(SUM(CASE WHEN active = 1 AND severity = 'critical' THEN 1 ELSE 0 END), 0) \
             AS critical, \
             COALESCE(SUM(CASE WHEN created_at_ms >= ? THEN 1 ELSE 0 END), 0) AS recent \
             FROM alerts",
        )
        .bind(recent_since.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(AlertSummary {
            total_alerts: row.try_get::<i64, _>("total")? as u64,
            active_alerts: row.try_get::<i64, _>("active")? as u64,
            critical_alerts: row.try_get::<i64, _>("critical")? as u64,
            recent_alerts: row.try_get::<i64, _>("recent")? as u64,
            generated_at: Utc::now(),
        })
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, StorageError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO notifications \
             (user_id, alert_id, title, message, channel, is_read, created_at_ms, sent_at_ms) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(notification.user_id)
        .bind(notification.alert_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.channel.as_str())
        .bind(notification.created_at.timestamp_millis())
        .bind(notification.sent_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_notification(result.last_insert_rowid(), notification.user_id)
            .await
    }

    async fn list_notifications(
        &self,
        user_id: i64,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM notifications WHERE user_id = ",
            NOTIFICATION_COLUMNS
        ));
        query.push_bind(user_id);

        if let Some(is_read) = filter.is_read {
            query.push(" AND is_read = ").push_bind(is_read);
        }

        let limit = filter.limit.map_or(-1, |l| l as i64);
        query
            .push(" ORDER BY created_at_ms DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StorageError> {
        sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at_ms = COALESCE(read_at_ms, ?) \
             WHERE id = ? AND user_id = ?",
        )
        .bind(at.timestamp_millis())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.fetch_notification(id, user_id).await
    }
}

#[async_trait]
impl TelemetryStore for SqliteRepository {
    async fn insert_reading(&self, reading: Reading) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sensor_readings \
             (wetland_id, sensor_id, timestamp_ms, temperature, ph, dissolved_oxygen, turbidity) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.wetland_id)
        .bind(reading.sensor_id)
        .bind(reading.timestamp.timestamp_millis())
        .bind(reading.temperature)
        .bind(reading.ph)
        .bind(reading.dissolved_oxygen)
        .bind(reading.turbidity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        let rows = sqlx::query(
            "SELECT wetland_id, sensor_id, timestamp_ms, temperature, ph, dissolved_oxygen, \
             turbidity \
             FROM sensor_readings WHERE timestamp_ms >= ? ORDER BY timestamp_ms ASC, id ASC",
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reading_from_row).collect()
    }

    async fn reading_count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sensor_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as u64)
    }
}

#[async_trait]
impl UserDirectory for SqliteRepository {
    async fn upsert_user(&self, user_id: i64, role: Role) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO users (id, role) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET role = excluded.role",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn users_by_role(&self, roles: &[Role]) -> Result<Vec<i64>, StorageError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM users WHERE role IN (");
        let mut list = query.separated(", ");
        for role in roles {
            list.push_bind(role.as_str());
        }
        list.push_unseparated(") ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Severity};
    use chrono::Duration;

    async fn memory_repo() -> SqliteRepository {
        SqliteRepository::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn new_alert(wetland_id: i64, category: Category, created_at: DateTime<Utc>) -> NewAlert {
        NewAlert {
            title: "High Turbidity".to_string(),
            message: "Turbidity: 62 NTU".to_string(),
            category,
            severity: Severity::High,
            wetland_id: Some(wetland_id),
            sensor_id: None,
            threshold_value: Some(50.0),
            actual_value: Some(62.0),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_alert_round_trip() {
        let repo = memory_repo().await;
        let now = Utc::now();

        let alert = repo.insert_alert(new_alert(4, Category::Critical, now)).await.unwrap();
        assert_eq!(alert.category, Category::Critical);
        assert_eq!(alert.wetland_id, Some(4));
        assert_eq!(alert.sensor_id, None);
        assert_eq!(alert.created_at.timestamp_millis(), now.timestamp_millis());
        assert!(alert.active);
    }

    #[tokio::test]
    async fn test_admission_is_suppressed_within_window() {
        let repo = memory_repo().await;
        let now = Utc::now();
        let since = now - Duration::hours(1);

        assert!(repo
            .insert_alert_unless_recent(new_alert(1, Category::Critical, now), since)
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .insert_alert_unless_recent(new_alert(1, Category::Critical, now), since)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .insert_alert_unless_recent(new_alert(1, Category::Warning, now), since)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("alerts.db").display());
        let repo = std::sync::Arc::new(SqliteRepository::connect(&url, 8).await.unwrap());
        let now = Utc::now();
        let since = now - Duration::hours(1);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.insert_alert_unless_recent(new_alert(7, Category::Critical, now), since)
                    .await
            }));
        }

        let (mut admitted, mut suppressed, mut conflicts) = (0, 0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Some(_)) => admitted += 1,
                Ok(None) => suppressed += 1,
                Err(StorageError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected storage error: {}", e),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(suppressed + conflicts, 31);

        let stored = repo.list_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_updates() {
        let repo = memory_repo().await;
        let now = Utc::now();
        let alert = repo.insert_alert(new_alert(1, Category::Warning, now)).await.unwrap();

        let acked = repo.acknowledge_alert(alert.id, 3, now).await.unwrap().unwrap();
        assert_eq!(acked.acknowledged_by, Some(3));
        let again = repo.acknowledge_alert(alert.id, 4, now).await.unwrap().unwrap();
        assert_eq!(again.acknowledged_by, Some(3));

        let resolved = repo.resolve_alert(alert.id, now).await.unwrap().unwrap();
        assert!(!resolved.active);
        assert!(resolved.resolved_at.is_some());

        let summary = repo.alert_summary(now - Duration::days(1)).await.unwrap();
        assert_eq!(summary.total_alerts, 1);
        assert_eq!(summary.active_alerts, 0);
        assert_eq!(summary.recent_alerts, 1);
    }

    #[tokio::test]
    async fn test_list_alerts_public_only() {
        let repo = memory_repo().await;
        let now = Utc::now();
        repo.insert_alert(new_alert(1, Category::Critical, now)).await.unwrap();
        repo.insert_alert(new_alert(1, Category::Info, now)).await.unwrap();

        let public = repo
            .list_alerts(&AlertFilter {
                public_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].category, Category::Info);

        let all = repo.list_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 2);
    }

    #[tokio::test]
    async fn test_notification_unique_per_alert_and_user() {
        let repo = memory_repo().await;
        let notification = NewNotification {
            user_id: 8,
            alert_id: Some(1),
            title: "High Turbidity".to_string(),
            message: "Turbidity: 62 NTU".to_string(),
            channel: Channel::InApp,
            created_at: Utc::now(),
            sent_at: Some(Utc::now()),
        };

        let first = repo.insert_notification(notification.clone()).await.unwrap().unwrap();
        assert!(repo.insert_notification(notification).await.unwrap().is_none());

        let read = repo.mark_notification_read(first.id, 8, Utc::now()).await.unwrap().unwrap();
        assert!(read.is_read);
        assert!(repo.mark_notification_read(first.id, 9, Utc::now()).await.unwrap().is_none());

        let unread = repo
            .list_notifications(
                8,
                &NotificationFilter {
                    is_read: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn test_readings_and_users() {
        let repo = memory_repo().await;
        let now = Utc::now();

        let mut old = Reading::new(1, now - Duration::days(2));
        old.ph = Some(7.1);
        let mut fresh = Reading::new(1, now);
        fresh.turbidity = Some(55.0);
        repo.insert_reading(old).await.unwrap();
        repo.insert_reading(fresh).await.unwrap();

        let window = repo.readings_since(now - Duration::days(1)).await.unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].turbidity, Some(55.0));
        assert_eq!(repo.reading_count().await.unwrap(), 2);

        repo.upsert_user(1, Role::Admin).await.unwrap();
        repo.upsert_user(2, Role::CommunityMember).await.unwrap();
        assert_eq!(repo.users_by_role(&Role::PRIVILEGED).await.unwrap(), vec![1]);
    }
}
