//! Service configuration
//!
//! Layered with the `config` crate: an optional TOML file, then environment
//! variables such as `WETLAND_ALERTS__ALERTING__COOLDOWN_SECONDS=1800`.

use serde::Deserialize;

use alerting::AlertConfig;
use broadcast::RegistryConfig;
use notifier::DispatcherConfig;

use crate::rate_limit::RateLimitConfig;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_VAR: &str = "WETLAND_ALERTS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "wetland-alerts.toml";
const ENV_PREFIX: &str = "WETLAND_ALERTS";

/// Full service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub alerting: AlertConfig,
    pub notifier: DispatcherConfig,
    pub broadcast: RegistryConfig,
    pub rate_limit: RateLimitConfig,
}

impl ServiceConfig {
    /// Load from the config file (if present) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Max level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite URL; unset keeps everything in memory
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.database_url.is_none());
        assert_eq!(config.alerting.cooldown_seconds, 3600);
        assert_eq!(config.notifier.workers, 2);
        assert_eq!(config.broadcast.observer_buffer, 32);
        assert_eq!(config.rate_limit.sweep.burst_size, 5);
        assert_eq!(config.rate_limit.telemetry.burst_size, 1000);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: ServiceConfig = config::Config::builder()
            .set_override("alerting.cooldown_seconds", 900)
            .unwrap()
            .set_override("storage.database_url", "sqlite://alerts.db")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.alerting.cooldown_seconds, 900);
        assert_eq!(config.alerting.sweep_window_seconds, 86400);
        assert_eq!(config.storage.database_url.as_deref(), Some("sqlite://alerts.db"));
        assert_eq!(config.storage.max_connections, 5);
    }
}
