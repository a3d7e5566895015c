//! Workflow classification output: cases, buttons and UI-ready queue items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::lead::{Channel, Lead, LeadContext, LeadStatus};
use crate::types::sequence::Priority;

/// Lead situation, in detection precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowCase {
    Closed,
    HotLead,
    ResponseReceived,
    FollowupDue,
    Waiting,
    GoneCold,
    Qualified,
    NewLead,
}

impl WorkflowCase {
    /// Declared precedence; the detector picks the first match
    pub const PRECEDENCE: [WorkflowCase; 8] = [
        WorkflowCase::Closed,
        WorkflowCase::HotLead,
        WorkflowCase::ResponseReceived,
        WorkflowCase::FollowupDue,
        WorkflowCase::Waiting,
        WorkflowCase::GoneCold,
        WorkflowCase::Qualified,
        WorkflowCase::NewLead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::HotLead => "HOT_LEAD",
            Self::ResponseReceived => "RESPONSE_RECEIVED",
            Self::FollowupDue => "FOLLOWUP_DUE",
            Self::Waiting => "WAITING",
            Self::GoneCold => "GONE_COLD",
            Self::Qualified => "QUALIFIED",
            Self::NewLead => "NEW_LEAD",
        }
    }
}

impl fmt::Display for WorkflowCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Now,
    Today,
    ThisWeek,
    Later,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::Today => "today",
            Self::ThisWeek => "this_week",
            Self::Later => "later",
        }
    }
}

/// Action button shown next to a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueButton {
    CallNow,
    Whatsapp,
    Instagram,
    Email,
    Reply,
    ScheduleMeeting,
    MarkDone,
    Snooze,
    Reactivate,
    Archive,
}

impl QueueButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallNow => "call_now",
            Self::Whatsapp => "whatsapp",
            Self::Instagram => "instagram",
            Self::Email => "email",
            Self::Reply => "reply",
            Self::ScheduleMeeting => "schedule_meeting",
            Self::MarkDone => "mark_done",
            Self::Snooze => "snooze",
            Self::Reactivate => "reactivate",
            Self::Archive => "archive",
        }
    }

    /// Whether the lead has the contact handle this button needs
    pub fn is_available_for(&self, lead: &Lead) -> bool {
        match self {
            Self::CallNow | Self::Whatsapp => lead.has_phone(),
            Self::Instagram => lead.has_instagram(),
            Self::Email => lead.has_email(),
            _ => true,
        }
    }
}

/// UI-ready prioritised action for one lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub lead: Lead,
    pub workflow_case: WorkflowCase,
    pub priority: Priority,
    pub action_label: String,
    pub reason: String,
    pub suggested_message: Option<String>,
    pub buttons: Vec<QueueButton>,
    pub urgency: Urgency,
    pub channel: Channel,
    /// Sort key, descending
    pub score: u32,
    #[serde(default)]
    pub followup_id: Option<String>,
}

/// Candidate lead selection used to build the action queue, in query order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePass {
    HotLeads,
    DueFollowups,
    NewLeads,
    ActivePipeline,
    Contacted,
    /// Any open lead; only used when every other pass came back empty
    Fallback,
}

impl QueuePass {
    pub const ORDERED: [QueuePass; 5] = [
        QueuePass::HotLeads,
        QueuePass::DueFollowups,
        QueuePass::NewLeads,
        QueuePass::ActivePipeline,
        QueuePass::Contacted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HotLeads => "hot_leads",
            Self::DueFollowups => "due_followups",
            Self::NewLeads => "new_leads",
            Self::ActivePipeline => "active_pipeline",
            Self::Contacted => "contacted",
            Self::Fallback => "fallback",
        }
    }

    /// Statuses a store may pre-filter on; `None` means any open status
    pub fn statuses(&self) -> Option<&'static [LeadStatus]> {
        match self {
            Self::NewLeads => Some(&[LeadStatus::New]),
            Self::ActivePipeline => Some(&[
                LeadStatus::Engaged,
                LeadStatus::Opportunity,
                LeadStatus::Qualified,
            ]),
            Self::Contacted => Some(&[LeadStatus::Contacted]),
            Self::HotLeads | Self::DueFollowups | Self::Fallback => None,
        }
    }

    pub fn matches(&self, ctx: &LeadContext, now: DateTime<Utc>) -> bool {
        if ctx.lead.is_closed() {
            return false;
        }
        match self {
            Self::HotLeads => ctx.lead.is_hot(),
            Self::DueFollowups => ctx.has_due_followup(now),
            Self::Fallback => true,
            _ => self
                .statuses()
                .is_some_and(|statuses| statuses.contains(&ctx.lead.status)),
        }
    }
}

impl fmt::Display for QueuePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
