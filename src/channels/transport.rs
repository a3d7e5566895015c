//! Delivery backends behind the channel adapters.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::ChannelPayload;
use crate::constants::network as net_constants;
use crate::types::{FlowError, Result, json_string};

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Hand the payload over; returns the provider message id
    async fn deliver(&self, payload: &ChannelPayload) -> Result<String>;

    fn name(&self) -> &str;
}

/// POSTs the payload as JSON to a configured endpoint
pub struct WebhookTransport {
    url: url::Url,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        let url = url::Url::parse(endpoint)
            .map_err(|e| FlowError::Config(format!("Invalid webhook URL '{}': {}", endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl ChannelTransport for WebhookTransport {
    async fn deliver(&self, payload: &ChannelPayload) -> Result<String> {
        debug!("Posting {} message to {}", payload.channel, self.url);

        let mut request = self.client.post(self.url.clone()).json(payload);
        if let Some(key) = &payload.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FlowError::Repository(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Repository(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        Ok(json_string(&body, "message_id")
            .or_else(|| json_string(&body, "id"))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()))
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Logs instead of sending; used when no webhook is configured
#[derive(Debug, Default)]
pub struct DryRunTransport;

#[async_trait]
impl ChannelTransport for DryRunTransport {
    async fn deliver(&self, payload: &ChannelPayload) -> Result<String> {
        info!(
            "[dry-run] {} to {} ({} chars)",
            payload.channel,
            payload.recipient,
            payload.body.chars().count()
        );
        Ok(format!("dry-run-{}", uuid::Uuid::new_v4()))
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_rejects_bad_url() {
        let err = WebhookTransport::new("not a url").err().unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(WebhookTransport::new("https://hooks.example.com/whatsapp").is_ok());
    }
}
