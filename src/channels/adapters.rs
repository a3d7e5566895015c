//! Concrete channel adapters.

use async_trait::async_trait;

use super::validators::{
    is_email_recipient, is_instagram_recipient, is_linkedin_recipient, is_whatsapp_recipient,
};
use super::{
    ChannelAdapter, ChannelPayload, NormalizedMessage, SendResult, SharedTransport, deliver,
    prepare_common,
};
use crate::constants::channels as limits;
use crate::types::{Channel, FlowError, Result};

macro_rules! transport_ctor {
    ($adapter:ident) => {
        impl $adapter {
            pub fn new(transport: SharedTransport) -> Self {
                Self { transport }
            }
        }
    };
}

// =============================================================================
// WhatsApp
// =============================================================================

pub struct WhatsappAdapter {
    transport: SharedTransport,
}

transport_ctor!(WhatsappAdapter);

#[async_trait]
impl ChannelAdapter for WhatsappAdapter {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    fn prepare_outgoing(&self, message: &NormalizedMessage) -> Result<ChannelPayload> {
        prepare_common(self, message, limits::WHATSAPP_MAX_LEN)
    }

    async fn send(&self, payload: &ChannelPayload) -> SendResult {
        deliver(self.transport.as_ref(), payload).await
    }

    fn validate_recipient(&self, recipient: &str) -> bool {
        is_whatsapp_recipient(recipient)
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(feature, "templates" | "media" | "read_receipts")
    }
}

// =============================================================================
// Email
// =============================================================================

pub struct EmailAdapter {
    transport: SharedTransport,
}

transport_ctor!(EmailAdapter);

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    /// Requires a subject, either on the message or as `metadata.subject`
    fn prepare_outgoing(&self, message: &NormalizedMessage) -> Result<ChannelPayload> {
        let mut payload = prepare_common(self, message, limits::EMAIL_MAX_LEN)?;

        let subject = message
            .subject
            .as_deref()
            .or_else(|| message.metadata.get("subject").map(String::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FlowError::payload("email", "missing subject"))?;
        if subject.chars().count() > limits::EMAIL_SUBJECT_MAX_LEN {
            return Err(FlowError::payload(
                "email",
                format!("subject longer than {} characters", limits::EMAIL_SUBJECT_MAX_LEN),
            ));
        }

        payload.subject = Some(subject.to_string());
        Ok(payload)
    }

    async fn send(&self, payload: &ChannelPayload) -> SendResult {
        deliver(self.transport.as_ref(), payload).await
    }

    fn validate_recipient(&self, recipient: &str) -> bool {
        is_email_recipient(recipient)
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(feature, "subject" | "html" | "attachments" | "threads")
    }
}

// =============================================================================
// LinkedIn
// =============================================================================

pub struct LinkedinAdapter {
    transport: SharedTransport,
}

transport_ctor!(LinkedinAdapter);

#[async_trait]
impl ChannelAdapter for LinkedinAdapter {
    fn channel(&self) -> Channel {
        Channel::Linkedin
    }

    fn prepare_outgoing(&self, message: &NormalizedMessage) -> Result<ChannelPayload> {
        prepare_common(self, message, limits::LINKEDIN_MAX_LEN)
    }

    async fn send(&self, payload: &ChannelPayload) -> SendResult {
        deliver(self.transport.as_ref(), payload).await
    }

    fn validate_recipient(&self, recipient: &str) -> bool {
        is_linkedin_recipient(recipient)
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(feature, "inmail" | "connection_request")
    }
}

// =============================================================================
// Instagram
// =============================================================================

pub struct InstagramAdapter {
    transport: SharedTransport,
}

transport_ctor!(InstagramAdapter);

#[async_trait]
impl ChannelAdapter for InstagramAdapter {
    fn channel(&self) -> Channel {
        Channel::Instagram
    }

    fn prepare_outgoing(&self, message: &NormalizedMessage) -> Result<ChannelPayload> {
        prepare_common(self, message, limits::INSTAGRAM_MAX_LEN)
    }

    async fn send(&self, payload: &ChannelPayload) -> SendResult {
        deliver(self.transport.as_ref(), payload).await
    }

    fn validate_recipient(&self, recipient: &str) -> bool {
        is_instagram_recipient(recipient)
    }

    fn supports_feature(&self, feature: &str) -> bool {
        matches!(feature, "media" | "quick_replies")
    }
}
