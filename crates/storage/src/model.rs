//! Domain records shared by every store implementation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that does not name a member of one of the closed enumerations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct InvalidValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// User role as resolved by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Researcher,
    GovernmentOfficial,
    CommunityMember,
}

impl Role {
    /// Roles allowed to manage alerts and receive alert notifications
    pub const PRIVILEGED: [Role; 3] = [Role::Admin, Role::Researcher, Role::GovernmentOfficial];

    pub fn is_privileged(self) -> bool {
        match self {
            Role::Admin | Role::Researcher | Role::GovernmentOfficial => true,
            Role::CommunityMember => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Researcher => "researcher",
            Role::GovernmentOfficial => "government_official",
            Role::CommunityMember => "community_member",
        }
    }
}

impl FromStr for Role {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "researcher" => Ok(Role::Researcher),
            "government_official" => Ok(Role::GovernmentOfficial),
            "community_member" => Ok(Role::CommunityMember),
            other => Err(InvalidValue::new("role", other)),
        }
    }
}

/// The authenticated caller of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Critical,
    Warning,
    Info,
}

impl Category {
    /// Whether callers outside the privileged role set may see this category
    pub fn is_public(self) -> bool {
        match self {
            Category::Critical => false,
            Category::Warning | Category::Info => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Critical => "critical",
            Category::Warning => "warning",
            Category::Info => "info",
        }
    }
}

impl FromStr for Category {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Category::Critical),
            "warning" => Ok(Category::Warning),
            "info" => Ok(Category::Info),
            other => Err(InvalidValue::new("category", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(InvalidValue::new("severity", other)),
        }
    }
}

/// Notification delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    InApp,
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl FromStr for Channel {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(Channel::InApp),
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(InvalidValue::new("channel", other)),
        }
    }
}

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub category: Category,
    pub severity: Severity,
    pub wetland_id: Option<i64>,
    pub sensor_id: Option<i64>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<i64>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }

    /// True when this alert blocks a new one for the same wetland and category
    pub fn suppresses(
        &self,
        wetland_id: Option<i64>,
        category: Category,
        since: DateTime<Utc>,
    ) -> bool {
        self.active
            && self.wetland_id == wetland_id
            && self.category == category
            && self.created_at >= since
    }

    pub fn matches(&self, filter: &AlertFilter) -> bool {
        filter.category.map_or(true, |c| self.category == c)
            && filter.severity.map_or(true, |s| self.severity == s)
            && filter.active.map_or(true, |a| self.active == a)
            && filter.wetland_id.map_or(true, |w| self.wetland_id == Some(w))
            && (!filter.public_only || self.category.is_public())
    }
}

/// Descriptive fields of an alert about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub title: String,
    pub message: String,
    pub category: Category,
    pub severity: Severity,
    pub wetland_id: Option<i64>,
    pub sensor_id: Option<i64>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl NewAlert {
    pub(crate) fn into_alert(self, id: i64) -> Alert {
        Alert {
            id,
            title: self.title,
            message: self.message,
            category: self.category,
            severity: self.severity,
            wetland_id: self.wetland_id,
            sensor_id: self.sensor_id,
            threshold_value: self.threshold_value,
            actual_value: self.actual_value,
            active: true,
            created_at: self.created_at,
            resolved_at: None,
            acknowledged_by: None,
            acknowledged_at: None,
        }
    }
}

/// Alert list filters
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub category: Option<Category>,
    pub severity: Option<Severity>,
    pub active: Option<bool>,
    pub wetland_id: Option<i64>,
    /// Restrict to categories visible outside the privileged role set
    pub public_only: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Aggregate alert counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total_alerts: u64,
    pub active_alerts: u64,
    pub critical_alerts: u64,
    pub recent_alerts: u64,
    pub generated_at: DateTime<Utc>,
}

/// A per-recipient notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub alert_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Fields of a notification about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub alert_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub(crate) fn into_notification(self, id: i64) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            alert_id: self.alert_id,
            title: self.title,
            message: self.message,
            channel: self.channel,
            is_read: false,
            created_at: self.created_at,
            sent_at: self.sent_at,
            read_at: None,
        }
    }
}

/// Notification list filters
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// One telemetry sample from a field sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub wetland_id: i64,
    #[serde(default)]
    pub sensor_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub dissolved_oxygen: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
}

impl Reading {
    /// Reading with no metric values, for building samples field by field
    pub fn new(wetland_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            wetland_id,
            sensor_id: None,
            timestamp,
            temperature: None,
            ph: None,
            dissolved_oxygen: None,
            turbidity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_privileges() {
        assert!(Role::Admin.is_privileged());
        assert!(Role::Researcher.is_privileged());
        assert!(Role::GovernmentOfficial.is_privileged());
        assert!(!Role::CommunityMember.is_privileged());
        assert!(Role::PRIVILEGED.iter().all(|r| r.is_privileged()));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("government_official".parse::<Role>().unwrap(), Role::GovernmentOfficial);
        assert_eq!("warning".parse::<Category>().unwrap(), Category::Warning);
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("in_app".parse::<Channel>().unwrap(), Channel::InApp);

        let err = "Admin".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert!("urgent".parse::<Category>().is_err());
    }

    #[test]
    fn test_suppression_window() {
        let now = Utc::now();
        let alert = NewAlert {
            title: "High Temperature".to_string(),
            message: "Temperature: 36°C".to_string(),
            category: Category::Critical,
            severity: Severity::High,
            wetland_id: Some(1),
            sensor_id: None,
            threshold_value: Some(35.0),
            actual_value: Some(36.0),
            created_at: now - Duration::minutes(30),
        }
        .into_alert(1);

        assert!(alert.suppresses(Some(1), Category::Critical, now - Duration::hours(1)));
        assert!(!alert.suppresses(Some(2), Category::Critical, now - Duration::hours(1)));
        assert!(!alert.suppresses(Some(1), Category::Warning, now - Duration::hours(1)));
        assert!(!alert.suppresses(Some(1), Category::Critical, now - Duration::minutes(10)));

        let resolved = Alert {
            active: false,
            resolved_at: Some(now),
            ..alert
        };
        assert!(!resolved.suppresses(Some(1), Category::Critical, now - Duration::hours(1)));
    }

    #[test]
    fn test_public_filter() {
        let filter = AlertFilter {
            public_only: true,
            ..Default::default()
        };
        let mut alert = NewAlert {
            title: "t".to_string(),
            message: "m".to_string(),
            category: Category::Critical,
            severity: Severity::High,
            wetland_id: None,
            sensor_id: None,
            threshold_value: None,
            actual_value: None,
            created_at: Utc::now(),
        }
        .into_alert(7);
        assert!(!alert.matches(&filter));

        alert.category = Category::Info;
        assert!(alert.matches(&filter));
    }
}
