//! Persistence ports consumed by the follow-up engine, the cycle service and
//! the queue builder. `storage` ships SQLite and in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::{
    CycleStep, FollowUpMessage, FollowUpSuggestion, Interaction, Lead, LeadContext,
    LifecycleState, QueueEntry, QueuePass, QueueStatus, Result, Sequence, SequenceState,
    SuggestionStatus,
};

#[async_trait]
pub trait FollowUpRepository: Send + Sync {
    async fn get_lead_context(&self, lead_id: &str) -> Result<Option<LeadContext>>;

    /// All leads, optionally restricted to one owner
    async fn list_all_leads(&self, user_id: Option<&str>) -> Result<Vec<LeadContext>>;

    /// Latest sequence state for the lead, terminal or not
    async fn get_active_sequence_state(&self, lead_id: &str) -> Result<Option<SequenceState>>;

    /// Write `state` if the stored version still equals `state.version`.
    ///
    /// Returns the stored state with its bumped version, or
    /// `FlowError::VersionConflict` when another writer got there first.
    async fn upsert_sequence_state(&self, state: &SequenceState) -> Result<SequenceState>;

    async fn get_sequence_by_id(&self, sequence_id: &str) -> Result<Option<Sequence>>;

    /// Sequence to enroll a lead in, chosen by status and vertical
    async fn get_default_sequence_for_lead(&self, lead: &Lead) -> Result<Option<Sequence>>;

    /// Newest first
    async fn get_recent_interactions(&self, lead_id: &str, limit: usize)
    -> Result<Vec<Interaction>>;

    async fn record_interaction(&self, lead_id: &str, interaction: &Interaction) -> Result<()>;

    /// Upsert by suggestion id; an existing status is kept
    async fn log_followup_suggestion(&self, suggestion: &FollowUpSuggestion) -> Result<()>;

    async fn get_suggestion(&self, suggestion_id: &str) -> Result<Option<FollowUpSuggestion>>;

    async fn update_suggestion_status(
        &self,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<()>;

    /// Insert-once per suggestion id
    async fn log_followup_message(&self, message: &FollowUpMessage) -> Result<()>;
}

#[async_trait]
pub trait CycleRepository: Send + Sync {
    /// Current lifecycle state; `None` when the lead does not exist for this user.
    ///
    /// Leads without a recorded state report the one derived from their CRM status.
    async fn get_lead_state(&self, user_id: &str, lead_id: &str)
    -> Result<Option<LifecycleState>>;

    /// Steps configured for a state, ordered by `step_order`
    async fn get_cycle_steps(&self, state: LifecycleState) -> Result<Vec<CycleStep>>;

    async fn get_queue_entry(&self, user_id: &str, queue_id: &str) -> Result<Option<QueueEntry>>;

    async fn list_queue(
        &self,
        user_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<QueueEntry>>;

    /// Atomically: cancel the lead's pending entries, record the new state and
    /// insert the seed entry. Returns the number of cancelled entries.
    async fn apply_state_change(
        &self,
        user_id: &str,
        lead_id: &str,
        new_state: LifecycleState,
        seed: Option<&QueueEntry>,
    ) -> Result<usize>;

    /// Atomically mark an entry sent and insert its successor
    async fn complete_entry(
        &self,
        queue_id: &str,
        sent_at: DateTime<Utc>,
        next: Option<&QueueEntry>,
    ) -> Result<()>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Candidate leads for one queue pass, at most `limit`
    async fn list_leads_for_pass(
        &self,
        user_id: &str,
        pass: QueuePass,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadContext>>;
}

pub type SharedFollowUpRepository = Arc<dyn FollowUpRepository>;
pub type SharedCycleRepository = Arc<dyn CycleRepository>;
pub type SharedWorkflowRepository = Arc<dyn WorkflowRepository>;
