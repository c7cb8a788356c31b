//! Threshold sweep over recent telemetry

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use broadcast::{BroadcastEvent, BroadcastRegistry, EventKind};
use storage::{Reading, TelemetryStore};

use crate::error::AlertError;
use crate::ledger::AlertLedger;
use crate::rules::ThresholdEvaluator;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Readings inside the window
    pub readings: usize,
    /// Candidates the rules produced
    pub candidates: usize,
    /// Alerts created
    pub created: usize,
    /// Candidates suppressed by the cool-down
    pub suppressed: usize,
    /// Candidates rejected or lost to a concurrent admission
    pub skipped: usize,
}

/// Outcome of ingesting one reading
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Titles of the rules the reading tripped
    pub anomalies: Vec<String>,
}

/// Evaluator, dedup gate and ledger wired into one pass
pub struct ThresholdSweep {
    ledger: Arc<AlertLedger>,
    telemetry: Arc<dyn TelemetryStore>,
    registry: BroadcastRegistry,
    evaluator: ThresholdEvaluator,
    window: Duration,
}

impl ThresholdSweep {
    pub fn new(
        ledger: Arc<AlertLedger>,
        telemetry: Arc<dyn TelemetryStore>,
        registry: BroadcastRegistry,
        window: Duration,
    ) -> Self {
        Self {
            ledger,
            telemetry,
            registry,
            evaluator: ThresholdEvaluator::new(),
            window,
        }
    }

    /// Evaluate every reading in the window and admit the resulting candidates.
    ///
    /// Safe to call repeatedly: the cool-down gate absorbs repeats. A bad
    /// candidate is logged and skipped; only a storage failure aborts.
    pub async fn run(&self) -> Result<SweepReport, AlertError> {
        let since = Utc::now()
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let readings = self.telemetry.readings_since(since).await?;
        let candidates = self.evaluator.evaluate(&readings);

        let mut report = SweepReport {
            readings: readings.len(),
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            match self.ledger.admit(candidate).await {
                Ok(Some(_)) => report.created += 1,
                Ok(None) => report.suppressed += 1,
                Err(AlertError::Unavailable(e)) => {
                    error!("Threshold sweep aborted: {}", e);
                    return Err(AlertError::Unavailable(e));
                }
                Err(e) => {
                    warn!(
                        wetland_id = candidate.wetland_id,
                        rule = ?candidate.rule,
                        "Skipping candidate: {}",
                        e
                    );
                    metrics::counter!("sweep_candidates_skipped_total").increment(1);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "Checked thresholds: {} readings, {} candidates, {} created, {} suppressed, {} skipped",
            report.readings, report.candidates, report.created, report.suppressed, report.skipped
        );
        Ok(report)
    }

    /// Store a reading and push a live update if it trips any rule.
    ///
    /// Alerts are only created by `run`.
    pub async fn ingest(&self, reading: Reading) -> Result<IngestReport, AlertError> {
        let anomalies: Vec<String> = self
            .evaluator
            .evaluate_reading(&reading)
            .into_iter()
            .map(|c| c.title)
            .collect();

        self.telemetry.insert_reading(reading.clone()).await?;

        if !anomalies.is_empty() {
            debug!(wetland_id = reading.wetland_id, ?anomalies, "Anomalous reading");
            let event = BroadcastEvent::new(
                EventKind::SensorUpdate,
                json!({ "reading": reading, "anomalies": anomalies }),
            );
            self.registry.publish(event);
        }
        Ok(IngestReport { anomalies })
    }

    /// Run the sweep on a fixed period until the task is aborted
    pub fn spawn_schedule(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        info!("Scheduling threshold sweep every {:?}", interval);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run().await {
                    warn!("Scheduled threshold sweep failed: {}", e);
                }
            }
        })
    }
}
