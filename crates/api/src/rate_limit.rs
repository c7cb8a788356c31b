//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Guards the sweep and telemetry endpoints with tower_governor. Callers are
//! sensor gateways and schedulers rather than browsers, so each route group
//! gets one global bucket instead of per-IP keys. Ingest has its own bucket
//! sized for a whole sensor fleet; the sweep bucket stays small.

use governor::middleware::StateInformationMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};
use tower_governor::key_extractor::GlobalKeyExtractor;
use tower_governor::GovernorLayer;

/// Governor config with X-RateLimit-* headers enabled
pub type SharedGovernorConfig = GovernorConfig<GlobalKeyExtractor, StateInformationMiddleware>;

/// One token bucket
#[derive(Debug, Clone, Deserialize)]
pub struct BucketConfig {
    /// Milliseconds to replenish one request
    pub period_ms: u64,
    /// Requests that can be made immediately
    pub burst_size: u32,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Manual threshold sweeps
    pub sweep: BucketConfig,
    /// Sensor reading ingest, shared by every sensor
    pub telemetry: BucketConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sweep: BucketConfig {
                period_ms: 2000,
                burst_size: 5,
            },
            telemetry: BucketConfig {
                period_ms: 5,
                burst_size: 1000,
            },
        }
    }
}

/// Build the governor config. `None` if either setting is zero.
pub fn create_governor_config(bucket: &BucketConfig) -> Option<Arc<SharedGovernorConfig>> {
    GovernorConfigBuilder::default()
        .key_extractor(GlobalKeyExtractor)
        .period(Duration::from_millis(bucket.period_ms))
        .burst_size(bucket.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}

/// Layer for a rate-limited route group
pub fn governor_layer(
    config: Arc<SharedGovernorConfig>,
) -> GovernorLayer<GlobalKeyExtractor, StateInformationMiddleware> {
    GovernorLayer { config }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.sweep.period_ms, 2000);
        assert_eq!(config.sweep.burst_size, 5);
        assert!(config.telemetry.burst_size > config.sweep.burst_size);
        assert!(create_governor_config(&config.sweep).is_some());
        assert!(create_governor_config(&config.telemetry).is_some());
    }

    #[test]
    fn test_zero_settings_are_rejected() {
        let no_burst = BucketConfig {
            period_ms: 1000,
            burst_size: 0,
        };
        assert!(create_governor_config(&no_burst).is_none());

        let no_period = BucketConfig {
            period_ms: 0,
            burst_size: 5,
        };
        assert!(create_governor_config(&no_period).is_none());
    }
}
