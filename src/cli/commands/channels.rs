//! Channel Commands
//!
//! Usage:
//!   leadflow channels validate <channel> <recipient>
//!   leadflow channels send <channel> <recipient> <body> [--subject S] [--key K]

use crate::channels::validators::is_valid_recipient;
use crate::channels::{ChannelRegistry, NormalizedMessage};
use crate::cli::ui::Output;
use crate::cli::util::{is_json, print_json};
use crate::config::ConfigLoader;
use crate::types::{Channel, FlowError, Result};

pub fn validate(channel: Channel, recipient: &str, format: &str) -> Result<()> {
    let valid = is_valid_recipient(channel, recipient);
    if is_json(format) {
        return print_json(&serde_json::json!({
            "channel": channel,
            "recipient": recipient,
            "valid": valid,
        }));
    }

    let out = Output::new();
    if valid {
        out.success(&format!("{} is a valid {} recipient", recipient, channel));
    } else {
        out.error(&format!("{} is not a valid {} recipient", recipient, channel));
    }
    Ok(())
}

/// Prepare and send one message; dry-run unless a webhook is configured
pub async fn send(
    channel: Channel,
    message: NormalizedMessage,
    format: &str,
) -> Result<()> {
    let config = ConfigLoader::load()?;
    let registry = ChannelRegistry::from_config(&config.channels)?;
    let adapter = registry
        .get(channel)
        .ok_or_else(|| FlowError::payload(channel.as_str(), "no messaging adapter"))?;

    let payload = adapter.prepare_outgoing(&message)?;
    let result = adapter.send(&payload).await;

    if is_json(format) {
        return print_json(&result);
    }

    let out = Output::new();
    match (&result.message_id, &result.error) {
        (Some(id), _) if result.success => out.success(&format!("Sent via {} ({})", channel, id)),
        (_, Some(error)) => out.error(&format!("Send failed: {}", error)),
        _ => out.error("Send failed"),
    }
    Ok(())
}
