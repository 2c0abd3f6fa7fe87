//! CLI string conversion utilities

use anyhow::{Context, Result};
use std::time::Duration;

/// Parse a duration string (e.g., "500ms", "5s", "2m", "1h") to a `Duration`
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, unit_ms) = if let Some(num) = s.strip_suffix("ms") {
        (num, 1u64)
    } else if let Some(num) = s.strip_suffix("sec").or_else(|| s.strip_suffix('s')) {
        (num, 1000)
    } else if let Some(num) = s.strip_suffix("min").or_else(|| s.strip_suffix('m')) {
        (num, 60 * 1000)
    } else if let Some(num) = s.strip_suffix("hr").or_else(|| s.strip_suffix('h')) {
        (num, 60 * 60 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    let millis = num
        .checked_mul(unit_ms)
        .with_context(|| format!("Duration too large: {}", s))?;

    Ok(Duration::from_millis(millis))
}

/// Duration in whole milliseconds, as stored in the config file
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("5sec").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("2min").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 10 ").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("3S").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("1.5s").is_err());
    }

    #[test]
    fn test_duration_to_ms() {
        assert_eq!(duration_to_ms(Duration::from_secs(5)), 5000);
        assert_eq!(duration_to_ms(Duration::from_micros(1500)), 1);
        assert_eq!(duration_to_ms(Duration::MAX), u64::MAX);
    }
}
