use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::TelemetryConfig;

/// Build the event filter: `RUST_LOG` wins, otherwise the configured level
pub fn build_env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize structured JSON logging on stderr.
///
/// Stdout belongs to the operator console, so events never share it.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(build_env_filter(config))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;

    tracing::debug!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
