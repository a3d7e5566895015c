//! Recipient formats per channel.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::Channel;

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 regex"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("valid email regex")
});

static LINKEDIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^urn:li:person:[A-Za-z0-9_-]+$").expect("valid linkedin regex"));

static INSTAGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+|ig:\S+)$").expect("valid instagram regex"));

/// WhatsApp: E.164 with leading `+`
pub fn is_whatsapp_recipient(value: &str) -> bool {
    E164.is_match(value)
}

pub fn is_email_recipient(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// LinkedIn member URN, `urn:li:person:<id>`
pub fn is_linkedin_recipient(value: &str) -> bool {
    LINKEDIN.is_match(value)
}

/// Instagram-scoped user id (numeric) or `ig:` handle
pub fn is_instagram_recipient(value: &str) -> bool {
    INSTAGRAM.is_match(value)
}

pub fn is_valid_recipient(channel: Channel, value: &str) -> bool {
    match channel {
        Channel::Whatsapp | Channel::Phone => is_whatsapp_recipient(value),
        Channel::Email => is_email_recipient(value),
        Channel::Linkedin => is_linkedin_recipient(value),
        Channel::Instagram => is_instagram_recipient(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_is_exact_e164() {
        assert!(is_whatsapp_recipient("+491701234567"));
        assert!(!is_whatsapp_recipient("01701234567"));
        assert!(!is_whatsapp_recipient("+0170123"));
        assert!(!is_whatsapp_recipient("+49 170 1234567"));
        assert!(!is_whatsapp_recipient("+1234567890123456"));
    }

    #[test]
    fn test_email() {
        assert!(is_email_recipient("anna.schmidt+leads@example.co.uk"));
        assert!(!is_email_recipient("anna@"));
        assert!(!is_email_recipient("anna@localhost"));
        assert!(!is_email_recipient("anna schmidt@example.com"));
    }

    #[test]
    fn test_linkedin_needs_person_urn() {
        assert!(is_linkedin_recipient("urn:li:person:AbC123_x"));
        assert!(!is_linkedin_recipient("urn:li:organization:123"));
        assert!(!is_linkedin_recipient("https://linkedin.com/in/anna"));
        assert!(!is_linkedin_recipient("urn:li:person:"));
    }

    #[test]
    fn test_instagram() {
        assert!(is_instagram_recipient("17841400000000000"));
        assert!(is_instagram_recipient("ig:anna.insta"));
        assert!(!is_instagram_recipient("@anna"));
        assert!(!is_instagram_recipient("ig:"));
    }
}
