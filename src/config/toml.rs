//! TOML configuration file parsing

use super::cli::Cli;
use super::cli_convert::{duration_to_ms, parse_duration};
use super::*;
use crate::geo::Coordinate;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(ref url) = cli.url {
        config.endpoint.url = url.clone();
    }

    if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
        config.reference = Coordinate::new(lat, lon).context("Invalid reference point")?;
    }

    if let Some(ref interval) = cli.interval {
        let interval = parse_duration(interval).context("Invalid poll interval")?;
        config.polling.interval_ms = duration_to_ms(interval);
    }

    if let Some(ref timeout) = cli.timeout {
        let timeout = parse_duration(timeout).context("Invalid timeout")?;
        config.endpoint.timeout_ms = Some(duration_to_ms(timeout));
    }

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    Ok(config)
}

/// Build the effective configuration: defaults, then file, then CLI
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    merge_cli_with_config(cli, base)
}
