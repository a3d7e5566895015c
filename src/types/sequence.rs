//! Follow-up sequences, per-lead progress, and the suggestions derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::types::goal::VerticalId;
use crate::types::lead::{Channel, Lead, LeadStatus};

// =============================================================================
// Steps & Sequences
// =============================================================================

/// Guard evaluated against the most recent interaction before a step fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCondition {
    #[default]
    Always,
    NoReply,
    RepliedPositive,
    RepliedNegative,
}

impl StepCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::NoReply => "no_reply",
            Self::RepliedPositive => "replied_positive",
            Self::RepliedNegative => "replied_negative",
        }
    }

    /// Evaluate against the type of the most recent interaction, if any
    pub fn is_satisfied(&self, last_interaction_type: Option<&str>) -> bool {
        match self {
            Self::Always => true,
            Self::NoReply => last_interaction_type.is_none_or(|t| !t.starts_with("reply_")),
            Self::RepliedPositive => last_interaction_type == Some("reply_positive"),
            Self::RepliedNegative => last_interaction_type == Some("reply_negative"),
        }
    }
}

impl FromStr for StepCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "no_reply" => Ok(Self::NoReply),
            "replied_positive" => Ok(Self::RepliedPositive),
            "replied_negative" => Ok(Self::RepliedNegative),
            _ => Err(format!("Unknown step condition '{}'", s)),
        }
    }
}

/// One follow-up action inside a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub channel: Channel,
    /// Days after the sequence start
    pub day_offset: u32,
    pub order_index: u32,
    pub template_key: String,
    pub action: String,
    #[serde(default)]
    pub condition: StepCondition,
}

impl Step {
    pub fn new(id: impl Into<String>, channel: Channel, day_offset: u32, order_index: u32) -> Self {
        let id = id.into();
        Self {
            template_key: id.clone(),
            id,
            channel,
            day_offset,
            order_index,
            action: "send_message".to_string(),
            condition: StepCondition::Always,
        }
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_template(mut self, template_key: impl Into<String>) -> Self {
        self.template_key = template_key.into();
        self
    }
}

/// Ordered follow-up plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Sequence {
    /// Build a sequence; steps are sorted by `(day_offset, order_index)`
    pub fn new(id: impl Into<String>, name: impl Into<String>, mut steps: Vec<Step>) -> Self {
        sort_steps(&mut steps);
        Self {
            id: id.into(),
            name: name.into(),
            steps,
        }
    }

    /// Steps in deterministic execution order, regardless of how they were loaded
    pub fn sorted_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| (s.day_offset, s.order_index));
        steps
    }
}

pub fn sort_steps(steps: &mut [Step]) {
    steps.sort_by_key(|s| (s.day_offset, s.order_index));
}

/// Enrollment rule: which sequence a lead starts when it has none.
///
/// Unset fields are wildcards; the most specific matching binding wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceBinding {
    pub sequence_id: String,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub vertical: Option<VerticalId>,
}

impl SequenceBinding {
    pub fn new(sequence_id: impl Into<String>) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            status: None,
            vertical: None,
        }
    }

    pub fn for_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_vertical(mut self, vertical: VerticalId) -> Self {
        self.vertical = Some(vertical);
        self
    }

    /// Number of matched fields, or `None` if any set field disagrees
    pub fn specificity(&self, lead: &Lead) -> Option<u8> {
        let mut score = 0;
        if let Some(status) = self.status {
            if status != lead.status {
                return None;
            }
            score += 1;
        }
        if let Some(vertical) = self.vertical {
            if lead.vertical != Some(vertical) {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

/// Most specific binding for the lead; earlier bindings win ties
pub fn pick_binding<'a>(bindings: &'a [SequenceBinding], lead: &Lead) -> Option<&'a SequenceBinding> {
    bindings
        .iter()
        .enumerate()
        .filter_map(|(i, b)| b.specificity(lead).map(|score| (score, std::cmp::Reverse(i), b)))
        .max_by_key(|(score, idx, _)| (*score, *idx))
        .map(|(_, _, b)| b)
}

// =============================================================================
// Sequence State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    InProgress,
    /// Lead replied positively; no suggestions until resumed
    Paused,
    Completed,
    Stopped,
    Ghosted,
}

impl SequenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Ghosted => "ghosted",
        }
    }

    /// Terminal states are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Ghosted)
    }
}

impl fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SequenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "stopped" => Ok(Self::Stopped),
            "ghosted" => Ok(Self::Ghosted),
            _ => Err(format!("Unknown sequence status '{}'", s)),
        }
    }
}

/// Per-lead progress through a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceState {
    pub lead_id: String,
    pub sequence_id: String,
    pub status: SequenceStatus,
    /// Index (in sorted order) of the last completed step
    pub current_step_index: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub last_step_completed_at: Option<DateTime<Utc>>,
    pub last_interaction_type: Option<String>,
    /// Optimistic concurrency version, bumped on every write
    #[serde(default)]
    pub version: i64,
}

impl SequenceState {
    pub fn start(
        lead_id: impl Into<String>,
        sequence_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lead_id: lead_id.into(),
            sequence_id: sequence_id.into(),
            status: SequenceStatus::InProgress,
            current_step_index: None,
            started_at,
            last_step_completed_at: None,
            last_interaction_type: None,
            version: 0,
        }
    }

    /// Sorted index of the step that should run next
    pub fn next_step_index(&self) -> usize {
        self.current_step_index.map_or(0, |i| i + 1)
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Total order: `Critical < High < Medium < Low` (most urgent sorts first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Suggestions & Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Sent,
    Skipped,
    Expired,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "skipped" => Ok(Self::Skipped),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown suggestion status '{}'", s)),
        }
    }
}

/// Engine recommendation for the next action on a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpSuggestion {
    /// Deterministic per `(lead_id, sequence_id, step_id)`; doubles as the send idempotency key
    pub id: String,
    pub lead_id: String,
    pub sequence_id: String,
    pub step_id: String,
    pub recommended_channel: Channel,
    pub recommended_time: DateTime<Utc>,
    pub priority: Priority,
    pub reason: String,
    pub meta: serde_json::Value,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: SuggestionStatus,
}

impl FollowUpSuggestion {
    pub fn suggestion_id(lead_id: &str, sequence_id: &str, step_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(lead_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(sequence_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(step_id.as_bytes());
        let digest = hasher.finalize();
        digest
            .iter()
            .take(16)
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Outgoing message recorded when a suggestion is acted upon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpMessage {
    pub suggestion_id: String,
    pub lead_id: String,
    pub channel: Channel,
    pub content: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Classified reply from a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Positive,
    Negative,
    Neutral,
}

impl ReplyKind {
    pub fn interaction_type(&self) -> &'static str {
        match self {
            Self::Positive => "reply_positive",
            Self::Negative => "reply_negative",
            Self::Neutral => "reply_neutral",
        }
    }
}
