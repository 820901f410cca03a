//! Tracing subscriber bootstrap

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogSettings};

const DEFAULT_FILTER: &str = "catalog_service=info,grpc_interceptors=info,info";

/// Install the global subscriber
///
/// `RUST_LOG` wins over the default filter. Must be called once, before the
/// pipeline captures its logger with `CallLogger::current()`.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_new(settings.filter.as_deref().unwrap_or(DEFAULT_FILTER))
        .map_err(|e| anyhow!("Invalid RUST_LOG filter: {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
