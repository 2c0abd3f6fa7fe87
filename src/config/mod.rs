//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Precedence, lowest first: built-in defaults, TOML file, CLI flags and
//! environment variables.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Senate building, University of Kent
pub const DEFAULT_REFERENCE: Coordinate = Coordinate::from_trusted(51.297269, 1.069740);

pub const DEFAULT_ENDPOINT_URL: &str = "https://www.cs.kent.ac.uk/people/staff/iau/LocalUsers.php";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fixed "self" location all distances are measured from
    #[serde(default = "default_reference")]
    pub reference: Coordinate,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_reference() -> Coordinate {
    DEFAULT_REFERENCE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference: DEFAULT_REFERENCE,
            endpoint: EndpointConfig::default(),
            polling: PollingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.endpoint.timeout_ms.map(Duration::from_millis)
    }
}

/// Remote feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Feed URL polled with GET
    #[serde(default = "default_endpoint_url")]
    pub url: String,
    /// Whole-request timeout; unset leaves it to the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            timeout_ms: None,
        }
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep between cycles
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Reference:     {}", self.reference)?;
        writeln!(f, "  Endpoint:      {}", self.endpoint.url)?;
        writeln!(f, "  Poll interval: {}ms", self.polling.interval_ms)?;
        match self.endpoint.timeout_ms {
            Some(ms) => writeln!(f, "  Timeout:       {}ms", ms)?,
            None => writeln!(f, "  Timeout:       transport default")?,
        }
        write!(f, "  Log level:     {}", self.logging.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.reference.latitude(), 51.297269);
        assert_eq!(config.reference.longitude(), 1.069740);
        assert_eq!(config.endpoint.url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.fetch_timeout(), None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_display_lists_settings() {
        let text = Config::default().to_string();
        assert!(text.contains("51.297269"));
        assert!(text.contains("5000ms"));
        assert!(text.contains("transport default"));
    }
}
