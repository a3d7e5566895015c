//! Workflow Detector: one case per lead, then a UI-ready queue item.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::messages::{clean_optional, template_for};
use crate::constants::workflow::{COLD_AFTER_DAYS, score};
use crate::types::{
    Channel, Lead, LeadContext, LeadMessage, LeadStatus, MessageDirection, PendingFollowUp,
    Priority, QueueButton, QueueItem, Urgency, WorkflowCase,
};

/// Static per-case presentation
struct CaseProfile {
    priority: Priority,
    action_label: &'static str,
    buttons: &'static [QueueButton],
    urgency: Urgency,
    score: u32,
}

fn profile(case: WorkflowCase, status: LeadStatus) -> CaseProfile {
    use QueueButton::*;
    match case {
        WorkflowCase::Closed => CaseProfile {
            priority: Priority::Low,
            action_label: "No action needed",
            buttons: &[Archive],
            urgency: Urgency::Later,
            score: score::CLOSED,
        },
        WorkflowCase::HotLead => CaseProfile {
            priority: Priority::Critical,
            action_label: "Call now, the lead is hot",
            buttons: &[CallNow, Whatsapp, ScheduleMeeting, MarkDone],
            urgency: Urgency::Now,
            score: score::HOT_LEAD,
        },
        WorkflowCase::ResponseReceived => CaseProfile {
            priority: Priority::High,
            action_label: "Reply to the lead",
            buttons: &[Reply, Whatsapp, Instagram, Email, CallNow],
            urgency: Urgency::Now,
            score: if status == LeadStatus::Qualified {
                score::RESPONSE_QUALIFIED
            } else {
                score::RESPONSE
            },
        },
        WorkflowCase::FollowupDue => CaseProfile {
            priority: Priority::High,
            action_label: "Send the due follow-up",
            buttons: &[Whatsapp, Instagram, Email, MarkDone, Snooze],
            urgency: Urgency::Today,
            score: score::FOLLOWUP_DUE,
        },
        WorkflowCase::Waiting => CaseProfile {
            priority: Priority::Low,
            action_label: "Wait for a reply",
            buttons: &[Snooze, MarkDone],
            urgency: Urgency::Later,
            score: score::WAITING,
        },
        WorkflowCase::GoneCold => CaseProfile {
            priority: Priority::Medium,
            action_label: "Reactivate the lead",
            buttons: &[Reactivate, Whatsapp, Instagram, Email],
            urgency: Urgency::ThisWeek,
            score: score::GONE_COLD,
        },
        WorkflowCase::Qualified => CaseProfile {
            priority: Priority::High,
            action_label: "Book a meeting",
            buttons: &[ScheduleMeeting, CallNow, Whatsapp, Email],
            urgency: Urgency::Today,
            score: score::QUALIFIED,
        },
        WorkflowCase::NewLead => CaseProfile {
            priority: Priority::Medium,
            action_label: "Make first contact",
            buttons: &[Whatsapp, Instagram, Email, CallNow],
            urgency: Urgency::Today,
            score: score::NEW_LEAD,
        },
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowDetector {
    cold_after_days: i64,
}

impl Default for WorkflowDetector {
    fn default() -> Self {
        Self::new(COLD_AFTER_DAYS)
    }
}

impl WorkflowDetector {
    pub fn new(cold_after_days: i64) -> Self {
        Self {
            cold_after_days: cold_after_days.max(1),
        }
    }

    /// First matching case in precedence order
    pub fn classify(&self, ctx: &LeadContext, now: DateTime<Utc>) -> WorkflowCase {
        let lead = &ctx.lead;
        if lead.is_closed() {
            return WorkflowCase::Closed;
        }
        if lead.is_hot() {
            return WorkflowCase::HotLead;
        }

        let latest = ctx.latest_message();
        if latest.is_some_and(|m| m.direction == MessageDirection::Inbound) {
            return WorkflowCase::ResponseReceived;
        }
        if ctx.has_due_followup(now) {
            return WorkflowCase::FollowupDue;
        }

        let days = days_since_contact(lead, latest, now);
        let last_outbound = latest.is_some_and(|m| m.direction == MessageDirection::Outbound);
        if last_outbound && days.is_none_or(|d| d < self.cold_after_days) {
            return WorkflowCase::Waiting;
        }
        if days.is_some_and(|d| d >= self.cold_after_days) {
            return WorkflowCase::GoneCold;
        }
        if lead.status == LeadStatus::Qualified {
            return WorkflowCase::Qualified;
        }
        WorkflowCase::NewLead
    }

    /// Classify and assemble the queue item
    pub fn detect(&self, ctx: &LeadContext, now: DateTime<Utc>) -> QueueItem {
        let lead = &ctx.lead;
        let case = self.classify(ctx, now);
        let profile = profile(case, lead.status);

        let due: Vec<&PendingFollowUp> = ctx
            .pending_followups
            .iter()
            .filter(|f| f.is_due(now))
            .collect();
        let followup = due.first().copied().or(ctx.pending_followups.first());

        let buttons: Vec<QueueButton> = profile
            .buttons
            .iter()
            .copied()
            .filter(|b| b.is_available_for(lead))
            .collect();

        let suggested_message = followup
            .and_then(|f| clean_optional(f.suggested_message.as_deref()))
            .or_else(|| {
                template_for(case, &lead.display_first_name()).and_then(|t| clean_optional(Some(&t)))
            });

        let latest = ctx.latest_message();
        let reason = reason_for(case, lead, latest, &due, now);
        debug!("Lead {} classified as {}", lead.id, case);

        QueueItem {
            lead: lead.clone(),
            workflow_case: case,
            priority: profile.priority,
            action_label: profile.action_label.to_string(),
            reason,
            suggested_message,
            buttons,
            urgency: profile.urgency,
            channel: resolve_channel(lead, &ctx.pending_followups),
            score: profile.score,
            followup_id: followup.map(|f| f.id.clone()),
        }
    }
}

/// Convenience form over loose parts
pub fn detect_workflow(
    lead: &Lead,
    messages: &[LeadMessage],
    followups: &[PendingFollowUp],
    now: DateTime<Utc>,
) -> QueueItem {
    let ctx = LeadContext::new(lead.clone())
        .with_messages(messages.to_vec())
        .with_followups(followups.to_vec());
    WorkflowDetector::default().detect(&ctx, now)
}

fn days_since_contact(
    lead: &Lead,
    latest: Option<&LeadMessage>,
    now: DateTime<Utc>,
) -> Option<i64> {
    lead.days_since_last_contact(now).or_else(|| {
        latest
            .and_then(|m| m.created_at)
            .map(|at| (now - at).num_days().max(0))
    })
}

/// Follow-up channel first, then whatsapp/phone, instagram, email
fn resolve_channel(lead: &Lead, followups: &[PendingFollowUp]) -> Channel {
    if let Some(channel) = followups.iter().find_map(|f| f.channel) {
        return channel;
    }
    if lead.has_phone() {
        Channel::Whatsapp
    } else if lead.has_instagram() {
        Channel::Instagram
    } else if lead.has_email() {
        Channel::Email
    } else {
        Channel::Whatsapp
    }
}

fn reason_for(
    case: WorkflowCase,
    lead: &Lead,
    latest: Option<&LeadMessage>,
    due: &[&PendingFollowUp],
    now: DateTime<Utc>,
) -> String {
    let days = days_since_contact(lead, latest, now);
    match case {
        WorkflowCase::Closed => format!("Lead is {}", lead.status),
        WorkflowCase::HotLead => "Lead is marked hot".to_string(),
        WorkflowCase::ResponseReceived => "Lead sent the latest message".to_string(),
        WorkflowCase::FollowupDue => match due.first().and_then(|f| f.title.as_deref()) {
            Some(title) => format!("Follow-up due: {}", title),
            None => format!("{} follow-up(s) due", due.len()),
        },
        WorkflowCase::Waiting => "Waiting for a reply to your last message".to_string(),
        WorkflowCase::GoneCold => format!("No contact for {} days", days.unwrap_or_default()),
        WorkflowCase::Qualified => "Qualified lead without a next step".to_string(),
        WorkflowCase::NewLead => "New lead, not contacted yet".to_string(),
    }
}
