//! Configuration validation

use super::*;
use crate::fetcher::parse_endpoint;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Validate complete configuration
///
/// The reference point is range-checked when it is constructed, so it is not
/// re-checked here.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_endpoint(&config.endpoint)?;
    validate_polling(&config.polling)?;
    validate_logging(&config.logging)?;

    Ok(())
}

/// Validate endpoint configuration
pub fn validate_endpoint(endpoint: &EndpointConfig) -> Result<()> {
    parse_endpoint(&endpoint.url).context("Invalid endpoint URL")?;

    if endpoint.timeout_ms == Some(0) {
        anyhow::bail!("timeout must be greater than zero (omit it to use the transport default)");
    }

    Ok(())
}

/// Validate poll loop configuration
pub fn validate_polling(polling: &PollingConfig) -> Result<()> {
    if polling.interval_ms == 0 {
        anyhow::bail!("poll interval must be greater than zero");
    }

    Ok(())
}

/// Validate logging configuration
pub fn validate_logging(logging: &LoggingConfig) -> Result<()> {
    EnvFilter::try_new(&logging.level)
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    Ok(())
}
