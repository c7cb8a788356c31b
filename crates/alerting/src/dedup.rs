//! Cool-down deduplication

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use storage::{Alert, AlertStore, StorageError};

use crate::rules::Candidate;

/// Admits a candidate only when no active alert for the same wetland and
/// category was created inside the cool-down window
#[derive(Debug, Clone, Copy)]
pub struct DedupGate {
    cooldown: Duration,
}

impl DedupGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Earliest creation time that still suppresses a candidate at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.cooldown).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Persist the candidate if it passes the gate.
    ///
    /// The check and the insert are one store operation, so concurrent
    /// sweeps never both admit the same key. `None` means suppressed.
    pub async fn admit(
        &self,
        candidate: &Candidate,
        store: &dyn AlertStore,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, StorageError> {
        let admitted = store
            .insert_alert_unless_recent(candidate.to_new_alert(now), self.window_start(now))
            .await?;

        match &admitted {
            Some(alert) => debug!(
                id = alert.id,
                wetland_id = candidate.wetland_id,
                category = %candidate.category,
                "Alert admitted"
            ),
            None => debug!(
                wetland_id = candidate.wetland_id,
                category = %candidate.category,
                "Alert suppressed: in cooldown period"
            ),
        }
        Ok(admitted)
    }
}
