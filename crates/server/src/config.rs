// crates/server/src/config.rs
//! Runtime configuration from environment variables. Domain policy knobs
//! (batch sizes, thresholds, the progress modulus) live in the core
//! config structs; only deployment concerns are read from the
//! environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default session broker endpoint.
const DEFAULT_BROKER_URL: &str = "http://127.0.0.1:47831";
/// Default channel reference handed to the notifier.
const DEFAULT_WEBHOOK_CHANNEL: &str = "alerts";
/// Default profile-page base for alert links.
const DEFAULT_PROFILE_URL_BASE: &str = "https://steamcommunity.com/profiles";
/// Direct message sent through the relay when a poll matches a followed
/// player.
const DEFAULT_RELAY_FOUND_TEXT: &str = "===(partySearch found following)===";

const DEFAULT_SELF_REFRESH_SECS: u64 = 3_600;
const DEFAULT_WIDE_REFRESH_SECS: u64 = 10_800;
const DEFAULT_POLL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Database file path. `None` means the platform default location.
    pub db_path: Option<PathBuf>,
    pub broker_url: String,
    /// Alert webhook endpoint. `None` disables the notifier entirely.
    pub webhook_url: Option<String>,
    pub webhook_channel: String,
    pub profile_url_base: String,
    pub relay_found_text: String,
    pub self_refresh: Duration,
    pub wide_refresh: Duration,
    pub poll: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("LOBBYSCOUT_DB").ok().map(PathBuf::from),
            broker_url: std::env::var("LOBBYSCOUT_BROKER_URL")
                .unwrap_or_else(|_| DEFAULT_BROKER_URL.to_string()),
            webhook_url: std::env::var("LOBBYSCOUT_WEBHOOK_URL").ok(),
            webhook_channel: std::env::var("LOBBYSCOUT_WEBHOOK_CHANNEL")
                .unwrap_or_else(|_| DEFAULT_WEBHOOK_CHANNEL.to_string()),
            profile_url_base: std::env::var("LOBBYSCOUT_PROFILE_URL_BASE")
                .unwrap_or_else(|_| DEFAULT_PROFILE_URL_BASE.to_string()),
            relay_found_text: std::env::var("LOBBYSCOUT_RELAY_FOUND_TEXT")
                .unwrap_or_else(|_| DEFAULT_RELAY_FOUND_TEXT.to_string()),
            self_refresh: secs_or(
                std::env::var("LOBBYSCOUT_SELF_REFRESH_SECS").ok().as_deref(),
                DEFAULT_SELF_REFRESH_SECS,
            ),
            wide_refresh: secs_or(
                std::env::var("LOBBYSCOUT_WIDE_REFRESH_SECS").ok().as_deref(),
                DEFAULT_WIDE_REFRESH_SECS,
            ),
            poll: secs_or(
                std::env::var("LOBBYSCOUT_POLL_SECS").ok().as_deref(),
                DEFAULT_POLL_SECS,
            ),
        }
    }
}

/// Parse a seconds value, falling back to the default on anything that
/// is unset or malformed.
fn secs_or(value: Option<&str>, default: u64) -> Duration {
    Duration::from_secs(value.and_then(|v| v.parse().ok()).unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_or_parses_valid_values() {
        assert_eq!(secs_or(Some("90"), 60), Duration::from_secs(90));
    }

    #[test]
    fn test_secs_or_falls_back_on_garbage() {
        assert_eq!(secs_or(Some("soon"), 60), Duration::from_secs(60));
        assert_eq!(secs_or(Some(""), 60), Duration::from_secs(60));
        assert_eq!(secs_or(None, 60), Duration::from_secs(60));
    }
}
