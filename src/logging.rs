//! Logging setup
//!
//! Structured `tracing` output to stderr so interactive output on stdout stays
//! readable. `RUST_LOG` takes precedence over the configured level.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `default_level`
pub fn build_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level: {}", default_level)),
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails if the level is not a valid filter or a subscriber is already set.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = build_filter(default_level)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
