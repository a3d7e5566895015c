//! In-memory implementation of every repository port.
//!
//! Backed by `DashMap`s so engines can fan out across leads concurrently.
//! Multi-row queue changes take a store-wide mutex to stay atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Mutex, RwLock};
use tracing::debug;

use super::Dataset;
use crate::followup::{CycleRepository, FollowUpRepository, WorkflowRepository};
use crate::types::{
    CycleStep, FlowError, FollowUpMessage, FollowUpSuggestion, Interaction, Lead, LeadContext,
    LifecycleState, QueueEntry, QueuePass, QueueStatus, Result, Sequence, SequenceBinding,
    SequenceState, SuggestionStatus, pick_binding,
};

#[derive(Default)]
pub struct MemoryStore {
    leads: DashMap<String, LeadContext>,
    sequences: DashMap<String, Sequence>,
    bindings: RwLock<Vec<SequenceBinding>>,
    states: DashMap<String, SequenceState>,
    interactions: DashMap<String, Vec<Interaction>>,
    suggestions: DashMap<String, FollowUpSuggestion>,
    messages: DashMap<String, FollowUpMessage>,
    lead_states: DashMap<String, LifecycleState>,
    cycle_steps: DashMap<LifecycleState, Vec<CycleStep>>,
    queue: DashMap<String, QueueEntry>,
    queue_lock: Mutex<()>,
}

fn owned_by(lead: &Lead, user_id: &str) -> bool {
    lead.user_id.as_deref().is_none_or(|owner| owner == user_id)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lead(&self, ctx: LeadContext) {
        self.leads.insert(ctx.lead.id.clone(), ctx);
    }

    pub fn insert_sequence(&self, sequence: Sequence) {
        self.sequences.insert(sequence.id.clone(), sequence);
    }

    pub fn bind_sequence(&self, binding: SequenceBinding) {
        self.bindings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(binding);
    }

    pub fn add_interaction(&self, lead_id: &str, interaction: Interaction) {
        self.interactions
            .entry(lead_id.to_string())
            .or_default()
            .push(interaction);
    }

    pub fn set_cycle_steps(&self, state: LifecycleState, mut steps: Vec<CycleStep>) {
        steps.sort_by_key(|s| s.step_order);
        self.cycle_steps.insert(state, steps);
    }

    pub fn insert_queue_entry(&self, entry: QueueEntry) {
        self.queue.insert(entry.id.clone(), entry);
    }

    /// Overwrite a sequence state without a version check (fixtures only)
    pub fn put_sequence_state(&self, state: SequenceState) {
        self.states.insert(state.lead_id.clone(), state);
    }

    pub fn queue_entries_for(&self, lead_id: &str) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = self
            .queue
            .iter()
            .filter(|e| e.lead_id == lead_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.step_order));
        entries
    }

    pub fn messages_for(&self, lead_id: &str) -> Vec<FollowUpMessage> {
        self.messages
            .iter()
            .filter(|m| m.lead_id == lead_id)
            .map(|m| m.value().clone())
            .collect()
    }

    pub fn suggestions_for(&self, lead_id: &str) -> Vec<FollowUpSuggestion> {
        let mut suggestions: Vec<FollowUpSuggestion> = self
            .suggestions
            .iter()
            .filter(|s| s.lead_id == lead_id)
            .map(|s| s.value().clone())
            .collect();
        suggestions.sort_by(|a, b| a.step_id.cmp(&b.step_id));
        suggestions
    }

    pub fn import(&self, dataset: &Dataset) {
        for ctx in &dataset.leads {
            self.insert_lead(ctx.clone());
        }
        for sequence in &dataset.sequences {
            self.insert_sequence(sequence.clone());
        }
        for binding in &dataset.bindings {
            self.bind_sequence(binding.clone());
        }
        let mut by_state: std::collections::HashMap<LifecycleState, Vec<CycleStep>> =
            std::collections::HashMap::new();
        for step in &dataset.cycle_steps {
            by_state.entry(step.lead_state).or_default().push(step.clone());
        }
        for (state, steps) in by_state {
            self.set_cycle_steps(state, steps);
        }
        for (lead_id, interactions) in &dataset.interactions {
            for interaction in interactions {
                self.add_interaction(lead_id, interaction.clone());
            }
        }
    }

    fn sorted_leads(&self) -> Vec<LeadContext> {
        let mut leads: Vec<LeadContext> = self.leads.iter().map(|l| l.value().clone()).collect();
        leads.sort_by(|a, b| a.lead.id.cmp(&b.lead.id));
        leads
    }
}

#[async_trait]
impl FollowUpRepository for MemoryStore {
    async fn get_lead_context(&self, lead_id: &str) -> Result<Option<LeadContext>> {
        Ok(self.leads.get(lead_id).map(|l| l.value().clone()))
    }

    async fn list_all_leads(&self, user_id: Option<&str>) -> Result<Vec<LeadContext>> {
        Ok(self
            .sorted_leads()
            .into_iter()
            .filter(|ctx| user_id.is_none_or(|uid| owned_by(&ctx.lead, uid)))
            .collect())
    }

    async fn get_active_sequence_state(&self, lead_id: &str) -> Result<Option<SequenceState>> {
        Ok(self.states.get(lead_id).map(|s| s.value().clone()))
    }

    async fn upsert_sequence_state(&self, state: &SequenceState) -> Result<SequenceState> {
        let conflict = || FlowError::VersionConflict {
            lead_id: state.lead_id.clone(),
            expected: state.version,
        };
        match self.states.entry(state.lead_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().version != state.version {
                    return Err(conflict());
                }
                let mut stored = state.clone();
                stored.version += 1;
                occupied.insert(stored.clone());
                Ok(stored)
            }
            Entry::Vacant(vacant) => {
                if state.version != 0 {
                    return Err(conflict());
                }
                let mut stored = state.clone();
                stored.version = 1;
                vacant.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn get_sequence_by_id(&self, sequence_id: &str) -> Result<Option<Sequence>> {
        Ok(self.sequences.get(sequence_id).map(|s| s.value().clone()))
    }

    async fn get_default_sequence_for_lead(&self, lead: &Lead) -> Result<Option<Sequence>> {
        let bindings = self.bindings.read().unwrap_or_else(|e| e.into_inner());
        let Some(binding) = pick_binding(&bindings, lead) else {
            debug!("No sequence binding matches lead {}", lead.id);
            return Ok(None);
        };
        Ok(self
            .sequences
            .get(&binding.sequence_id)
            .map(|s| s.value().clone()))
    }

    async fn get_recent_interactions(
        &self,
        lead_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let mut interactions = self
            .interactions
            .get(lead_id)
            .map(|i| i.value().clone())
            .unwrap_or_default();
        // Stored in arrival order; ties on created_at go to the latest arrival
        interactions.reverse();
        interactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        interactions.truncate(limit);
        Ok(interactions)
    }

    async fn record_interaction(&self, lead_id: &str, interaction: &Interaction) -> Result<()> {
        self.add_interaction(lead_id, interaction.clone());
        Ok(())
    }

    async fn log_followup_suggestion(&self, suggestion: &FollowUpSuggestion) -> Result<()> {
        match self.suggestions.entry(suggestion.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let status = occupied.get().status;
                let mut updated = suggestion.clone();
                updated.status = status;
                occupied.insert(updated);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(suggestion.clone());
            }
        }
        Ok(())
    }

    async fn get_suggestion(&self, suggestion_id: &str) -> Result<Option<FollowUpSuggestion>> {
        Ok(self.suggestions.get(suggestion_id).map(|s| s.value().clone()))
    }

    async fn update_suggestion_status(
        &self,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<()> {
        match self.suggestions.get_mut(suggestion_id) {
            Some(mut s) => {
                s.status = status;
                Ok(())
            }
            None => Err(FlowError::Repository(format!(
                "Suggestion not found: {}",
                suggestion_id
            ))),
        }
    }

    async fn log_followup_message(&self, message: &FollowUpMessage) -> Result<()> {
        self.messages
            .entry(message.suggestion_id.clone())
            .or_insert_with(|| message.clone());
        Ok(())
    }
}

#[async_trait]
impl CycleRepository for MemoryStore {
    async fn get_lead_state(
        &self,
        user_id: &str,
        lead_id: &str,
    ) -> Result<Option<LifecycleState>> {
        let Some(ctx) = self.leads.get(lead_id) else {
            return Ok(None);
        };
        if !owned_by(&ctx.lead, user_id) {
            return Ok(None);
        }
        Ok(Some(
            self.lead_states
                .get(lead_id)
                .map(|s| *s.value())
                .unwrap_or_else(|| LifecycleState::from(ctx.lead.status)),
        ))
    }

    async fn get_cycle_steps(&self, state: LifecycleState) -> Result<Vec<CycleStep>> {
        Ok(self
            .cycle_steps
            .get(&state)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn get_queue_entry(&self, user_id: &str, queue_id: &str) -> Result<Option<QueueEntry>> {
        Ok(self
            .queue
            .get(queue_id)
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone()))
    }

    async fn list_queue(
        &self,
        user_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<QueueEntry>> {
        let mut entries: Vec<QueueEntry> = self
            .queue
            .iter()
            .filter(|e| e.user_id == user_id && status.is_none_or(|s| e.status == s))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.due_at);
        Ok(entries)
    }

    async fn apply_state_change(
        &self,
        user_id: &str,
        lead_id: &str,
        new_state: LifecycleState,
        seed: Option<&QueueEntry>,
    ) -> Result<usize> {
        let _guard = self.queue_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut cancelled = 0;
        for mut entry in self.queue.iter_mut() {
            if entry.user_id == user_id
                && entry.lead_id == lead_id
                && entry.status == QueueStatus::Pending
            {
                entry.status = QueueStatus::Cancelled;
                cancelled += 1;
            }
        }
        self.lead_states.insert(lead_id.to_string(), new_state);
        if let Some(seed) = seed {
            self.queue.insert(seed.id.clone(), seed.clone());
        }
        Ok(cancelled)
    }

    async fn complete_entry(
        &self,
        queue_id: &str,
        sent_at: DateTime<Utc>,
        next: Option<&QueueEntry>,
    ) -> Result<()> {
        let _guard = self.queue_lock.lock().unwrap_or_else(|e| e.into_inner());
        {
            let Some(mut entry) = self.queue.get_mut(queue_id) else {
                return Err(FlowError::Repository(format!(
                    "Queue entry not found: {}",
                    queue_id
                )));
            };
            entry.status = QueueStatus::Sent;
            entry.sent_at = Some(sent_at);
        }
        if let Some(next) = next {
            self.queue.insert(next.id.clone(), next.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowRepository for MemoryStore {
    async fn list_leads_for_pass(
        &self,
        user_id: &str,
        pass: QueuePass,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadContext>> {
        Ok(self
            .sorted_leads()
            .into_iter()
            .filter(|ctx| owned_by(&ctx.lead, user_id) && pass.matches(ctx, now))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_version_check_rejects_stale_writes() {
        let store = MemoryStore::new();
        let state = SequenceState::start("l1", "s1", now());

        let first = store.upsert_sequence_state(&state).await.unwrap();
        assert_eq!(first.version, 1);

        // Writing the pre-insert copy again is stale
        let err = store.upsert_sequence_state(&state).await.unwrap_err();
        assert!(err.is_retryable());

        let mut next = first.clone();
        next.current_step_index = Some(0);
        let second = store.upsert_sequence_state(&next).await.unwrap();
        assert_eq!(second.version, 2);
        assert!(store.upsert_sequence_state(&next).await.is_err());
    }

    #[tokio::test]
    async fn test_suggestion_status_survives_relog() {
        let store = MemoryStore::new();
        let suggestion = FollowUpSuggestion {
            id: "sg1".into(),
            lead_id: "l1".into(),
            sequence_id: "s1".into(),
            step_id: "st1".into(),
            recommended_channel: crate::types::Channel::Whatsapp,
            recommended_time: now(),
            priority: crate::types::Priority::Medium,
            reason: "test".into(),
            meta: serde_json::json!({}),
            content: None,
            status: SuggestionStatus::Pending,
        };
        store.log_followup_suggestion(&suggestion).await.unwrap();
        store
            .update_suggestion_status("sg1", SuggestionStatus::Sent)
            .await
            .unwrap();
        store.log_followup_suggestion(&suggestion).await.unwrap();

        let stored = store.get_suggestion("sg1").await.unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Sent);
    }

    #[tokio::test]
    async fn test_recent_interactions_newest_first() {
        let store = MemoryStore::new();
        store.add_interaction("l1", Interaction::new("message_sent", now()));
        store.add_interaction(
            "l1",
            Interaction::new("reply_positive", now() + chrono::Duration::hours(1)),
        );
        let recent = store.get_recent_interactions("l1", 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].interaction_type, "reply_positive");
    }

    #[tokio::test]
    async fn test_recent_interactions_tie_prefers_latest_arrival() {
        let store = MemoryStore::new();
        store.add_interaction("l1", Interaction::new("message_sent", now()));
        store.add_interaction("l1", Interaction::new("reply_positive", now()));
        store.add_interaction("l1", Interaction::new("reply_negative", now()));

        let recent = store.get_recent_interactions("l1", 3).await.unwrap();
        let kinds: Vec<_> = recent.iter().map(|i| i.interaction_type.as_str()).collect();
        assert_eq!(kinds, ["reply_negative", "reply_positive", "message_sent"]);
    }

    #[tokio::test]
    async fn test_lead_state_defaults_from_status_and_respects_owner() {
        let store = MemoryStore::new();
        let mut lead = Lead::new("l1");
        lead.user_id = Some("u1".into());
        lead.status = crate::types::LeadStatus::Qualified;
        store.insert_lead(LeadContext::new(lead));

        assert_eq!(
            store.get_lead_state("u1", "l1").await.unwrap(),
            Some(LifecycleState::Engaged)
        );
        assert_eq!(store.get_lead_state("u2", "l1").await.unwrap(), None);
        assert_eq!(store.get_lead_state("u1", "missing").await.unwrap(), None);
    }
}
