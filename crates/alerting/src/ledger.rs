//! Alert Ledger
//!
//! Owns alert identity and every lifecycle transition. Manual creation,
//! threshold admission, acknowledgement and resolution all go through here,
//! so the role checks and the side effects (fan-out, live events) live in
//! one place.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use broadcast::{BroadcastEvent, BroadcastRegistry, EventKind};
use notifier::NotificationDispatcher;
use storage::{
    Actor, Alert, AlertFilter, AlertStore, AlertSummary, Category, NewAlert, Severity,
};

use crate::config::AlertConfig;
use crate::dedup::DedupGate;
use crate::error::AlertError;
use crate::rules::Candidate;

/// Largest page a list call returns
pub const MAX_PAGE_SIZE: usize = 500;
const DEFAULT_PAGE_SIZE: usize = 100;

/// Operator-supplied fields of a manual alert
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertDraft {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(alias = "alert_type")]
    pub category: Option<String>,
    pub severity: Option<String>,
    pub wetland_id: Option<i64>,
    pub sensor_id: Option<i64>,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
}

impl AlertDraft {
    fn validate(self, now: DateTime<Utc>) -> Result<NewAlert, AlertError> {
        let title = required(self.title, "title")?;
        let message = required(self.message, "message")?;
        let category: Category = required(self.category, "category")?
            .parse()
            .map_err(|e: storage::InvalidValue| AlertError::Validation(e.to_string()))?;
        let severity = match self.severity {
            Some(s) => s
                .parse()
                .map_err(|e: storage::InvalidValue| AlertError::Validation(e.to_string()))?,
            None => Severity::default(),
        };

        Ok(NewAlert {
            title,
            message,
            category,
            severity,
            wetland_id: self.wetland_id,
            sensor_id: self.sensor_id,
            threshold_value: self.threshold_value,
            actual_value: self.actual_value,
            created_at: now,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, AlertError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AlertError::Validation(format!("{} is required", field))),
    }
}

/// Alert list query as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    #[serde(alias = "alert_type")]
    pub category: Option<String>,
    pub severity: Option<String>,
    #[serde(alias = "is_active")]
    pub active: Option<bool>,
    pub wetland_id: Option<i64>,
    #[serde(alias = "skip")]
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl AlertQuery {
    fn to_filter(&self, actor: &Actor) -> Result<AlertFilter, AlertError> {
        let category = self
            .category
            .as_deref()
            .map(str::parse::<Category>)
            .transpose()
            .map_err(|e| AlertError::Validation(e.to_string()))?;
        let severity = self
            .severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()
            .map_err(|e| AlertError::Validation(e.to_string()))?;

        Ok(AlertFilter {
            category,
            severity,
            active: self.active,
            wetland_id: self.wetland_id,
            public_only: !actor.role.is_privileged(),
            offset: self.offset.unwrap_or(0),
            limit: Some(self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)),
        })
    }
}

/// The alert ledger and lifecycle API
pub struct AlertLedger {
    store: Arc<dyn AlertStore>,
    gate: DedupGate,
    dispatcher: NotificationDispatcher,
    registry: BroadcastRegistry,
    summary_window: Duration,
}

impl AlertLedger {
    pub fn new(
        store: Arc<dyn AlertStore>,
        config: &AlertConfig,
        dispatcher: NotificationDispatcher,
        registry: BroadcastRegistry,
    ) -> Self {
        info!("Creating alert ledger with config: {:?}", config);
        Self {
            store,
            gate: DedupGate::new(config.cooldown()),
            dispatcher,
            registry,
            summary_window: config.summary_window(),
        }
    }

    /// Create an alert by hand. Bypasses the cool-down gate.
    pub async fn create(&self, draft: AlertDraft, actor: &Actor) -> Result<Alert, AlertError> {
        if !actor.role.is_privileged() {
            return Err(AlertError::Forbidden);
        }
        let new_alert = draft.validate(Utc::now())?;

        let alert = self.store.insert_alert(new_alert).await?;
        info!(
            id = alert.id,
            category = %alert.category,
            created_by = actor.user_id,
            "Alert created: {}",
            alert.title
        );
        metrics::counter!("alerts_created_total", "source" => "manual").increment(1);

        self.announce(&alert).await;
        Ok(alert)
    }

    /// Pass a threshold candidate through the cool-down gate.
    ///
    /// Returns the new alert, or `None` if an equivalent one is still active.
    pub async fn admit(&self, candidate: &Candidate) -> Result<Option<Alert>, AlertError> {
        validate_candidate(candidate)?;

        let Some(alert) = self.gate.admit(candidate, self.store.as_ref(), Utc::now()).await? else {
            metrics::counter!("alerts_suppressed_total").increment(1);
            return Ok(None);
        };

        info!(
            id = alert.id,
            wetland_id = candidate.wetland_id,
            rule = ?candidate.rule,
            "Alert created: {}",
            alert.title
        );
        metrics::counter!("alerts_created_total", "source" => "threshold").increment(1);

        self.announce(&alert).await;
        Ok(Some(alert))
    }

    /// Record an acknowledgement. The first acknowledgement wins; later ones,
    /// and acknowledgements of resolved alerts, leave the alert unchanged.
    pub async fn acknowledge(&self, id: i64, actor: &Actor) -> Result<Alert, AlertError> {
        let current = self.existing(id).await?;
        if !actor.role.is_privileged() {
            return Err(AlertError::Forbidden);
        }

        let updated = self
            .store
            .acknowledge_alert(id, actor.user_id, Utc::now())
            .await?
            .ok_or(AlertError::NotFound)?;

        if updated != current {
            info!(id, acknowledged_by = actor.user_id, "Alert acknowledged");
            self.publish(EventKind::AlertUpdated, &updated);
        } else {
            debug!(id, "Acknowledgement left alert unchanged");
        }
        Ok(updated)
    }

    /// Resolve an alert. Resolution is terminal; resolving again keeps the
    /// original resolution time.
    pub async fn resolve(&self, id: i64, actor: &Actor) -> Result<Alert, AlertError> {
        let current = self.existing(id).await?;
        if !actor.role.is_privileged() {
            return Err(AlertError::Forbidden);
        }

        let updated = self
            .store
            .resolve_alert(id, Utc::now())
            .await?
            .ok_or(AlertError::NotFound)?;

        if updated != current {
            info!(id, resolved_by = actor.user_id, "Alert resolved");
            self.publish(EventKind::AlertUpdated, &updated);
        } else {
            debug!(id, "Alert already resolved");
        }
        Ok(updated)
    }

    /// Alerts visible to the caller, newest first
    pub async fn list(&self, query: &AlertQuery, actor: &Actor) -> Result<Vec<Alert>, AlertError> {
        let filter = query.to_filter(actor)?;
        Ok(self.store.list_alerts(&filter).await?)
    }

    /// One alert, if the caller may see it. Hidden alerts look absent.
    pub async fn get(&self, id: i64, actor: &Actor) -> Result<Alert, AlertError> {
        let alert = self.existing(id).await?;
        if !actor.role.is_privileged() && !alert.category.is_public() {
            return Err(AlertError::NotFound);
        }
        Ok(alert)
    }

    pub async fn summary(&self) -> Result<AlertSummary, AlertError> {
        let since = Utc::now()
            .checked_sub_signed(self.summary_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.store.alert_summary(since).await?)
    }

    async fn existing(&self, id: i64) -> Result<Alert, AlertError> {
        self.store.get_alert(id).await?.ok_or(AlertError::NotFound)
    }

    /// Queue fan-out and push the live event. Neither is awaited to completion.
    async fn announce(&self, alert: &Alert) {
        if let Err(e) = self.dispatcher.enqueue(alert.clone()).await {
            warn!(id = alert.id, "Alert stored but fan-out not queued: {}", e);
        }
        self.publish(EventKind::AlertCreated, alert);
    }

    fn publish(&self, kind: EventKind, alert: &Alert) {
        match BroadcastEvent::from_payload(kind, alert) {
            Ok(event) => self.registry.publish(event),
            Err(e) => warn!(id = alert.id, "Failed to encode {:?} event: {}", kind, e),
        }
    }
}

fn validate_candidate(candidate: &Candidate) -> Result<(), AlertError> {
    if candidate.title.trim().is_empty() || candidate.message.trim().is_empty() {
        return Err(AlertError::Validation("candidate has no title or message".to_string()));
    }
    if !candidate.actual_value.is_finite() || !candidate.threshold_value.is_finite() {
        return Err(AlertError::Validation(format!(
            "non-finite value in {:?} candidate for wetland {}",
            candidate.rule, candidate.wetland_id
        )));
    }
    Ok(())
}
