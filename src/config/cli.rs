//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// FriendRadar - track nearby friends from a location feed
#[derive(Parser, Debug, Default)]
#[command(name = "friendradar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "FRIENDRADAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Feed URL to poll
    #[arg(long, env = "FRIENDRADAR_URL")]
    pub url: Option<String>,

    /// Reference latitude in decimal degrees (requires --lon)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Reference longitude in decimal degrees (requires --lat)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Poll interval (e.g., 500ms, 5s, 1m)
    #[arg(short = 'i', long)]
    pub interval: Option<String>,

    /// Per-request timeout (e.g., 10s); unset leaves it to the transport
    #[arg(long)]
    pub timeout: Option<String>,

    /// Log filter used when RUST_LOG is not set (e.g., info, friendradar=debug)
    #[arg(long, env = "FRIENDRADAR_LOG")]
    pub log_level: Option<String>,

    /// Run a single poll cycle, print the friends found and exit
    #[arg(long)]
    pub once: bool,

    /// Validate and print the configuration, then exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lat.is_some() != self.lon.is_some() {
            anyhow::bail!("--lat and --lon must be given together");
        }

        if self.once && self.dry_run {
            anyhow::bail!("--once and --dry-run cannot be combined");
        }

        Ok(())
    }
}
