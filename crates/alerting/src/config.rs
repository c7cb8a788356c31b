//! Alerting configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Cool-down between equivalent alerts for one wetland (seconds)
    pub cooldown_seconds: u64,
    /// How far back a threshold sweep reads telemetry (seconds)
    pub sweep_window_seconds: u64,
    /// Built-in sweep period; 0 leaves scheduling to an external caller (seconds)
    pub sweep_interval_seconds: u64,
    /// Window counted as "recent" in the alert summary (seconds)
    pub summary_window_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 3600,      // 1 hour
            sweep_window_seconds: 86400, // 24 hours
            sweep_interval_seconds: 0,
            summary_window_seconds: 86400,
        }
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1000))
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_seconds)
    }

    pub fn sweep_window(&self) -> Duration {
        seconds(self.sweep_window_seconds)
    }

    pub fn summary_window(&self) -> Duration {
        seconds(self.summary_window_seconds)
    }

    /// Period of the built-in sweep, if enabled
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        (self.sweep_interval_seconds > 0)
            .then(|| std::time::Duration::from_secs(self.sweep_interval_seconds))
    }
}
