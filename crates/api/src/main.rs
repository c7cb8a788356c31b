//! Wetland Alerts - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, ServiceConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("=== Wetland Alerts v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    run_server(config, Some(metrics)).await
}
