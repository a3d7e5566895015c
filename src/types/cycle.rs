//! Lead lifecycle states, the transition table, and the follow-up cycle queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::lead::{Channel, LeadStatus};

/// Lifecycle state driving the follow-up cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    New,
    Engaged,
    Opportunity,
    Won,
    Lost,
    Churned,
    Dormant,
}

use LifecycleState::*;

/// `STATE_TRANSITIONS`: state -> allowed next states
pub const STATE_TRANSITIONS: &[(LifecycleState, &[LifecycleState])] = &[
    (New, &[Engaged, Lost, Dormant]),
    (Engaged, &[Opportunity, Lost, Dormant]),
    (Opportunity, &[Won, Lost, Dormant]),
    (Won, &[Churned, Dormant]),
    (Lost, &[Engaged, Dormant]),
    (Churned, &[Engaged, Dormant]),
    (Dormant, &[Engaged, New]),
];

impl LifecycleState {
    pub const ALL: [LifecycleState; 7] = [New, Engaged, Opportunity, Won, Lost, Churned, Dormant];

    pub fn as_str(&self) -> &'static str {
        match self {
            New => "new",
            Engaged => "engaged",
            Opportunity => "opportunity",
            Won => "won",
            Lost => "lost",
            Churned => "churned",
            Dormant => "dormant",
        }
    }

    pub fn valid_transitions(&self) -> &'static [LifecycleState] {
        STATE_TRANSITIONS
            .iter()
            .find(|(from, _)| from == self)
            .map(|(_, to)| *to)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(New),
            "engaged" => Ok(Engaged),
            "opportunity" => Ok(Opportunity),
            "won" => Ok(Won),
            "lost" => Ok(Lost),
            "churned" => Ok(Churned),
            "dormant" => Ok(Dormant),
            _ => Err(format!(
                "Unknown lead state '{}'. Valid values: new, engaged, opportunity, won, lost, churned, dormant",
                s
            )),
        }
    }
}

/// Initial lifecycle state for leads that never went through a state change
impl From<LeadStatus> for LifecycleState {
    fn from(status: LeadStatus) -> Self {
        match status {
            LeadStatus::New => New,
            LeadStatus::Contacted | LeadStatus::Engaged | LeadStatus::Qualified => Engaged,
            LeadStatus::Opportunity => Opportunity,
            LeadStatus::Won => Won,
            LeadStatus::Lost => Lost,
            LeadStatus::Dormant => Dormant,
        }
    }
}

/// One step of the per-state follow-up cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStep {
    pub id: String,
    pub lead_state: LifecycleState,
    pub step_order: u32,
    /// Delay relative to the previous entry (or to the state change for the first step)
    pub days_after_previous: u32,
    pub channel: Channel,
    pub action: String,
    pub template_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Sent,
    Cancelled,
    Skipped,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown queue status '{}'", s)),
        }
    }
}

/// Scheduled cycle follow-up for a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub user_id: String,
    pub lead_id: String,
    pub cycle_step_id: String,
    pub lead_state: LifecycleState,
    pub step_order: u32,
    pub channel: Channel,
    pub due_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn schedule(
        user_id: &str,
        lead_id: &str,
        step: &CycleStep,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            lead_id: lead_id.to_string(),
            cycle_step_id: step.id.clone(),
            lead_state: step.lead_state,
            step_order: step.step_order,
            channel: step.channel,
            due_at,
            status: QueueStatus::Pending,
            created_at: now,
            sent_at: None,
        }
    }
}

/// Result of a successful lifecycle change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangeOutcome {
    pub ok: bool,
    pub previous_state: LifecycleState,
    pub new_state: LifecycleState,
    pub cancelled_entries: usize,
    pub next_followup: Option<QueueEntry>,
}

/// Result of acknowledging a sent queue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentOutcome {
    pub ok: bool,
    pub next: Option<QueueEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_literal() {
        assert_eq!(New.valid_transitions(), &[Engaged, Lost, Dormant]);
        assert_eq!(Engaged.valid_transitions(), &[Opportunity, Lost, Dormant]);
        assert_eq!(Opportunity.valid_transitions(), &[Won, Lost, Dormant]);
        assert_eq!(Won.valid_transitions(), &[Churned, Dormant]);
        assert_eq!(Lost.valid_transitions(), &[Engaged, Dormant]);
        assert_eq!(Churned.valid_transitions(), &[Engaged, Dormant]);
        assert_eq!(Dormant.valid_transitions(), &[Engaged, New]);
    }

    #[test]
    fn test_accepts_iff_in_table() {
        for from in LifecycleState::ALL {
            for to in LifecycleState::ALL {
                let listed = STATE_TRANSITIONS
                    .iter()
                    .any(|(f, targets)| *f == from && targets.contains(&to));
                assert_eq!(from.can_transition_to(to), listed, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_status_seeds_lifecycle() {
        assert_eq!(LifecycleState::from(LeadStatus::Qualified), Engaged);
        assert_eq!(LifecycleState::from(LeadStatus::Won), Won);
        assert_eq!(LifecycleState::from(LeadStatus::New), New);
    }

    #[test]
    fn test_round_trip_edges() {
        // engaged <-> dormant both exist
        assert!(Engaged.can_transition_to(Dormant));
        assert!(Dormant.can_transition_to(Engaged));
        // new -> lost exists, lost -> new does not
        assert!(New.can_transition_to(Lost));
        assert!(!Lost.can_transition_to(New));
    }
}
