// crates/server/src/notifier.rs
//! Webhook-backed `Notifier`. One JSON POST per alert; the delivered
//! flag is the HTTP status, nothing more.

use async_trait::async_trait;
use serde::Serialize;

use lobbyscout_core::{CoreError, Notifier};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<bool, CoreError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { channel, text })
            .send()
            .await
            .map_err(|e| CoreError::notify(e.to_string()))?;
        Ok(response.status().is_success())
    }
}
