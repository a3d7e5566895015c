//! Lead snapshot records shared by the follow-up engine and the workflow detector.
//!
//! Snapshots come from an external CRM, so parsing is lenient: statuses are
//! case-insensitive, unknown values fall back to defaults, missing fields are
//! absent rather than errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::goal::VerticalId;
use crate::types::utils::ParseWithDefault;

// =============================================================================
// Status & Temperature
// =============================================================================

/// CRM pipeline status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Engaged,
    Qualified,
    Opportunity,
    Won,
    Lost,
    Dormant,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Engaged => "engaged",
            Self::Qualified => "qualified",
            Self::Opportunity => "opportunity",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Dormant => "dormant",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ParseWithDefault for LeadStatus {
    const TYPE_NAME: &'static str = "LeadStatus";

    fn fallback() -> Self {
        LeadStatus::New
    }

    fn try_parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Some(Self::New),
            // "reviewed" is the CRM's label for a contacted lead that was looked at again
            "contacted" | "reviewed" => Some(Self::Contacted),
            "engaged" => Some(Self::Engaged),
            "qualified" => Some(Self::Qualified),
            "opportunity" => Some(Self::Opportunity),
            "won" => Some(Self::Won),
            "lost" => Some(Self::Lost),
            "dormant" => Some(Self::Dormant),
            _ => None,
        }
    }
}

impl From<String> for LeadStatus {
    fn from(s: String) -> Self {
        Self::parse_or_default(&s)
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s).ok_or_else(|| format!("Unknown lead status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Temperature {
    Cold,
    Warm,
    Hot,
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

impl ParseWithDefault for Temperature {
    const TYPE_NAME: &'static str = "Temperature";

    fn fallback() -> Self {
        Temperature::Cold
    }

    fn try_parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cold" => Some(Self::Cold),
            "warm" => Some(Self::Warm),
            "hot" => Some(Self::Hot),
            _ => None,
        }
    }
}

impl From<String> for Temperature {
    fn from(s: String) -> Self {
        Self::parse_or_default(&s)
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Outreach channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Whatsapp,
    Email,
    Linkedin,
    Instagram,
    Phone,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Linkedin => "linkedin",
            Self::Instagram => "instagram",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whatsapp" => Ok(Self::Whatsapp),
            "email" => Ok(Self::Email),
            "linkedin" => Ok(Self::Linkedin),
            "instagram" => Ok(Self::Instagram),
            "phone" | "call" => Ok(Self::Phone),
            _ => Err(format!("Unknown channel '{}'", s)),
        }
    }
}

// =============================================================================
// Lead Snapshot
// =============================================================================

/// Lead as seen by the engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default)]
    pub temperature: Option<Temperature>,
    /// 0..=100
    #[serde(default)]
    pub lead_score: u32,
    #[serde(default)]
    pub last_contact_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// IANA zone name, e.g. `Europe/Berlin`
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub vertical: Option<VerticalId>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Lead {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            first_name: None,
            name: None,
            status: LeadStatus::New,
            temperature: None,
            lead_score: 0,
            last_contact_at: None,
            created_at: None,
            timezone: None,
            vertical: None,
            phone: None,
            email: None,
            instagram: None,
            linkedin: None,
        }
    }

    pub fn has_phone(&self) -> bool {
        present(&self.phone)
    }

    pub fn has_email(&self) -> bool {
        present(&self.email)
    }

    pub fn has_instagram(&self) -> bool {
        present(&self.instagram)
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn is_hot(&self) -> bool {
        self.temperature == Some(Temperature::Hot)
    }

    /// First name for message templates; falls back to the first word of `name`
    pub fn display_first_name(&self) -> String {
        if let Some(first) = self.first_name.as_deref().map(str::trim)
            && !first.is_empty()
        {
            return first.to_string();
        }
        self.name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .map(String::from)
            .unwrap_or_default()
    }

    /// Whole days since the last contact, if one is known
    pub fn days_since_last_contact(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_contact_at
            .map(|at| (now - at).num_days().max(0))
    }
}

// =============================================================================
// Interactions & Messages
// =============================================================================

/// Logged touchpoint with a lead (`reply_positive`, `message_sent`, `call`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub interaction_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Interaction {
    pub fn new(interaction_type: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            interaction_type: interaction_type.into(),
            created_at,
            content: None,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.interaction_type.starts_with("reply_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Conversation message as stored by the CRM inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadMessage {
    pub direction: MessageDirection,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl LeadMessage {
    pub fn inbound(created_at: DateTime<Utc>) -> Self {
        Self {
            direction: MessageDirection::Inbound,
            created_at: Some(created_at),
            content: None,
        }
    }

    pub fn outbound(created_at: DateTime<Utc>) -> Self {
        Self {
            direction: MessageDirection::Outbound,
            created_at: Some(created_at),
            content: None,
        }
    }
}

/// Follow-up task scheduled for a lead by the CRM
///
/// `due_at` is kept raw: a malformed timestamp counts as due now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFollowUp {
    pub id: String,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub suggested_message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl PendingFollowUp {
    pub fn new(id: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            lead_id: None,
            due_at: Some(due_at.to_rfc3339()),
            channel: None,
            suggested_message: None,
            title: None,
        }
    }

    pub fn due_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.due_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Missing or unparseable timestamps are treated as due
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.due_at_parsed() {
            Some(due) => due <= now,
            None => {
                if let Some(raw) = &self.due_at {
                    tracing::warn!("Malformed due_at '{}' on follow-up {}, treating as due", raw, self.id);
                }
                true
            }
        }
    }
}

// =============================================================================
// Lead Context
// =============================================================================

/// Lead plus the conversation and open tasks the engines read together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadContext {
    pub lead: Lead,
    #[serde(default)]
    pub messages: Vec<LeadMessage>,
    #[serde(default)]
    pub pending_followups: Vec<PendingFollowUp>,
}

impl LeadContext {
    pub fn new(lead: Lead) -> Self {
        Self {
            lead,
            messages: Vec::new(),
            pending_followups: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<LeadMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_followups(mut self, followups: Vec<PendingFollowUp>) -> Self {
        self.pending_followups = followups;
        self
    }

    /// Newest message by timestamp; untimestamped messages only win when nothing is dated
    pub fn latest_message(&self) -> Option<&LeadMessage> {
        self.messages
            .iter()
            .filter(|m| m.created_at.is_some())
            .max_by_key(|m| m.created_at)
            .or_else(|| self.messages.last())
    }

    pub fn has_due_followup(&self, now: DateTime<Utc>) -> bool {
        self.pending_followups.iter().any(|f| f.is_due(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        let lead: Lead = serde_json::from_value(serde_json::json!({
            "id": "l1",
            "status": "WON",
            "temperature": "Hot"
        }))
        .unwrap();
        assert_eq!(lead.status, LeadStatus::Won);
        assert_eq!(lead.temperature, Some(Temperature::Hot));
        assert!(lead.is_closed());
    }

    #[test]
    fn test_unknown_status_falls_back_to_new() {
        let lead: Lead =
            serde_json::from_value(serde_json::json!({"id": "l1", "status": "archived"})).unwrap();
        assert_eq!(lead.status, LeadStatus::New);
    }

    #[test]
    fn test_first_name_fallback() {
        let mut lead = Lead::new("l1");
        lead.name = Some("Anna Schmidt".into());
        assert_eq!(lead.display_first_name(), "Anna");
        lead.first_name = Some("  ".into());
        assert_eq!(lead.display_first_name(), "Anna");
        lead.first_name = Some("Annie".into());
        assert_eq!(lead.display_first_name(), "Annie");
    }

    #[test]
    fn test_pending_followup_due() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let overdue = PendingFollowUp::new("f1", now - Duration::hours(2));
        let future = PendingFollowUp::new("f2", now + Duration::hours(2));
        let mut malformed = PendingFollowUp::new("f3", now);
        malformed.due_at = Some("next tuesday".into());

        assert!(overdue.is_due(now));
        assert!(!future.is_due(now));
        assert!(malformed.is_due(now));
    }

    #[test]
    fn test_latest_message_prefers_timestamps() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let undated = LeadMessage {
            direction: MessageDirection::Outbound,
            created_at: None,
            content: None,
        };
        let ctx = LeadContext::new(Lead::new("l1")).with_messages(vec![
            LeadMessage::inbound(now),
            LeadMessage::outbound(now - Duration::days(1)),
            undated,
        ]);
        assert_eq!(ctx.latest_message().unwrap().direction, MessageDirection::Inbound);
        assert!(LeadContext::new(Lead::new("l2")).latest_message().is_none());
    }

    #[test]
    fn test_reply_detection() {
        let now = Utc::now();
        assert!(Interaction::new("reply_positive", now).is_reply());
        assert!(!Interaction::new("message_sent", now).is_reply());
    }
}
