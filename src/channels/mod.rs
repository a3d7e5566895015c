//! Channel Adapters
//!
//! Normalised outgoing messages are validated and shaped per channel
//! (`prepare_outgoing`) before a transport delivers them (`send`). Send
//! failures never raise: they come back as a `SendResult` carrying
//! `CHANNEL_SEND_FAILED`.

mod adapters;
mod transport;
pub mod validators;

pub use adapters::{EmailAdapter, InstagramAdapter, LinkedinAdapter, WhatsappAdapter};
pub use transport::{ChannelTransport, DryRunTransport, WebhookTransport};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ChannelsConfig;
use crate::types::error::CHANNEL_SEND_FAILED;
use crate::types::{Channel, FlowError, Result};

pub type SharedTransport = Arc<dyn ChannelTransport>;
pub type SharedChannelAdapter = Arc<dyn ChannelAdapter>;

/// Channel-agnostic outgoing message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub recipient: String,
    pub body: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Usually the follow-up suggestion id
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NormalizedMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Validated, channel-shaped payload ready for a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub channel: Channel,
    pub recipient: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl SendResult {
    pub fn delivered(message_id: String) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            error: None,
            error_code: None,
            sent_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            error_code: Some(CHANNEL_SEND_FAILED.to_string()),
            sent_at: None,
        }
    }
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Validate and shape a message; fails with `INVALID_CHANNEL_PAYLOAD`
    fn prepare_outgoing(&self, message: &NormalizedMessage) -> Result<ChannelPayload>;

    async fn send(&self, payload: &ChannelPayload) -> SendResult;

    fn validate_recipient(&self, recipient: &str) -> bool;

    fn supports_feature(&self, feature: &str) -> bool;
}

/// Checks shared by every adapter: recipient format, non-empty body, length cap
pub(crate) fn prepare_common(
    adapter: &dyn ChannelAdapter,
    message: &NormalizedMessage,
    max_len: usize,
) -> Result<ChannelPayload> {
    let channel = adapter.channel();
    let recipient = message.recipient.trim();
    if !adapter.validate_recipient(recipient) {
        return Err(FlowError::payload(
            channel.as_str(),
            format!("invalid recipient '{}'", recipient),
        ));
    }

    let body = message.body.trim();
    if body.is_empty() {
        return Err(FlowError::payload(channel.as_str(), "empty message body"));
    }
    let len = body.chars().count();
    if len > max_len {
        return Err(FlowError::payload(
            channel.as_str(),
            format!("message too long ({} > {} characters)", len, max_len),
        ));
    }

    Ok(ChannelPayload {
        channel,
        recipient: recipient.to_string(),
        body: body.to_string(),
        subject: None,
        metadata: message.metadata.clone(),
        idempotency_key: message.idempotency_key.clone(),
    })
}

pub(crate) async fn deliver(transport: &dyn ChannelTransport, payload: &ChannelPayload) -> SendResult {
    match transport.deliver(payload).await {
        Ok(message_id) => {
            debug!(
                "{} message delivered via {} ({})",
                payload.channel,
                transport.name(),
                message_id
            );
            SendResult::delivered(message_id)
        }
        Err(e) => {
            warn!("{} send via {} failed: {}", payload.channel, transport.name(), e);
            SendResult::failed(e.to_string())
        }
    }
}

/// One adapter per messaging channel, wired to webhook or dry-run transports
pub struct ChannelRegistry {
    adapters: HashMap<Channel, SharedChannelAdapter>,
}

impl ChannelRegistry {
    pub fn from_config(config: &ChannelsConfig) -> Result<Self> {
        let transport_for = |channel: Channel| -> Result<SharedTransport> {
            let transport: SharedTransport = match config.webhook_for(channel) {
                Some(url) => Arc::new(WebhookTransport::new(url)?),
                None => Arc::new(DryRunTransport),
            };
            Ok(transport)
        };

        let mut adapters: HashMap<Channel, SharedChannelAdapter> = HashMap::new();
        adapters.insert(
            Channel::Whatsapp,
            Arc::new(WhatsappAdapter::new(transport_for(Channel::Whatsapp)?)),
        );
        adapters.insert(
            Channel::Email,
            Arc::new(EmailAdapter::new(transport_for(Channel::Email)?)),
        );
        adapters.insert(
            Channel::Linkedin,
            Arc::new(LinkedinAdapter::new(transport_for(Channel::Linkedin)?)),
        );
        adapters.insert(
            Channel::Instagram,
            Arc::new(InstagramAdapter::new(transport_for(Channel::Instagram)?)),
        );
        Ok(Self { adapters })
    }

    /// `None` for channels without a messaging adapter (phone)
    pub fn get(&self, channel: Channel) -> Option<&SharedChannelAdapter> {
        self.adapters.get(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingTransport;

    #[async_trait]
    impl ChannelTransport for RefusingTransport {
        async fn deliver(&self, _payload: &ChannelPayload) -> Result<String> {
            Err(FlowError::Repository("connection refused".into()))
        }

        fn name(&self) -> &str {
            "refusing"
        }
    }

    fn dry() -> SharedTransport {
        Arc::new(DryRunTransport)
    }

    #[test]
    fn test_prepare_rejects_bad_recipient_and_length() {
        let whatsapp = WhatsappAdapter::new(dry());
        let err = whatsapp
            .prepare_outgoing(&NormalizedMessage::new("01701234567", "Hi"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CHANNEL_PAYLOAD");

        let instagram = InstagramAdapter::new(dry());
        let long = "x".repeat(crate::constants::channels::INSTAGRAM_MAX_LEN + 1);
        assert!(instagram
            .prepare_outgoing(&NormalizedMessage::new("ig:anna", long))
            .is_err());
        assert!(instagram
            .prepare_outgoing(&NormalizedMessage::new("ig:anna", "   "))
            .is_err());
    }

    #[test]
    fn test_email_requires_subject() {
        let email = EmailAdapter::new(dry());
        let message = NormalizedMessage::new("anna@example.com", "Hello Anna");
        assert!(email.prepare_outgoing(&message).is_err());

        let payload = email
            .prepare_outgoing(&message.clone().with_subject("Quick question"))
            .unwrap();
        assert_eq!(payload.subject.as_deref(), Some("Quick question"));

        let mut via_meta = message;
        via_meta.metadata.insert("subject".into(), "From metadata".into());
        assert_eq!(
            email.prepare_outgoing(&via_meta).unwrap().subject.as_deref(),
            Some("From metadata")
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_returned_not_raised() {
        let linkedin = LinkedinAdapter::new(Arc::new(RefusingTransport));
        let payload = linkedin
            .prepare_outgoing(
                &NormalizedMessage::new("urn:li:person:abc123", "Hi").with_idempotency_key("sg-1"),
            )
            .unwrap();
        assert_eq!(payload.idempotency_key.as_deref(), Some("sg-1"));

        let result = linkedin.send(&payload).await;
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("CHANNEL_SEND_FAILED"));
        assert!(result.sent_at.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_send_succeeds() {
        let registry = ChannelRegistry::from_config(&ChannelsConfig::default()).unwrap();
        let whatsapp = registry.get(Channel::Whatsapp).unwrap();
        assert!(whatsapp.supports_feature("templates"));
        assert!(!whatsapp.supports_feature("inmail"));
        assert!(registry.get(Channel::Phone).is_none());

        let payload = whatsapp
            .prepare_outgoing(&NormalizedMessage::new(" +491701234567 ", "Hallo!"))
            .unwrap();
        assert_eq!(payload.recipient, "+491701234567");
        let result = whatsapp.send(&payload).await;
        assert!(result.success);
        assert!(result.message_id.unwrap().starts_with("dry-run-"));
    }
}
