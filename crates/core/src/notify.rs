// crates/core/src/notify.rs
//! Outbound alerting capability and the message formatting contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;

/// Delivers a formatted alert to a named channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the channel reported delivery. A failed send is
    /// logged by the caller, never retried or escalated.
    async fn send(&self, channel: &str, text: &str) -> Result<bool, CoreError>;
}

/// Format an alert: timestamp and source prefix, then each non-empty
/// trimmed segment wrapped in brackets, joined with single spaces.
/// Segments that already start with `[` get an inner space so nested
/// brackets stay readable.
pub fn format_alert(now: DateTime<Utc>, source: &str, segments: &[String]) -> String {
    let prefix = [now.format("%d/%m/%Y %H:%M:%S").to_string(), source.to_string()];
    prefix
        .iter()
        .chain(segments.iter())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let pad = if s.starts_with('[') { " " } else { "" };
            format!("[{pad}{s}{pad}]")
        })
        .collect::<Vec<_>>()
        .join(" ")
}
