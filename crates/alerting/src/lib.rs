//! Alerting System
//!
//! Threshold evaluation over telemetry, cool-down deduplication, and the
//! alert lifecycle (create, acknowledge, resolve) with role checks.

mod config;
mod dedup;
mod error;
mod ledger;
mod rules;
mod sweep;

pub use config::AlertConfig;
pub use dedup::DedupGate;
pub use error::AlertError;
pub use ledger::{AlertDraft, AlertLedger, AlertQuery, MAX_PAGE_SIZE};
pub use rules::{Candidate, ThresholdEvaluator, ThresholdRule};
pub use sweep::{IngestReport, SweepReport, ThresholdSweep};
