//! The reqwest-backed webhook transport.

use crate::config::HttpConfig;
use crate::core::WebhookSender;
use crate::dispatch::DeliveryError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Sends webhook requests over a pooled `reqwest::Client`.
///
/// The per-attempt timeout is enforced by the client itself; a request in
/// flight runs to completion or to that timeout, never cancelled by the
/// engine.
pub struct HttpWebhookSender {
    client: reqwest::Client,
    content_type: String,
}

impl HttpWebhookSender {
    /// Builds a sender from the HTTP transport configuration.
    pub fn from_config(config: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            content_type: config.content_type.clone(),
        })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        debug!(url, bytes = payload.len(), "Webhook POST");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, self.content_type.as_str())
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(url, status = %status, "Received response code");

        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
