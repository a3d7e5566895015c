//! Follow-Up Engine
//!
//! Picks the single next sequence step for a lead, schedules it inside the
//! lead's business window and records the suggestion. Caller events (sends,
//! replies, manual stop/resume) move the per-lead `SequenceState`.
//!
//! Every state write goes through the repository's version check, so two
//! concurrent writers for one lead end with one `VersionConflict`.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use super::ports::SharedFollowUpRepository;
use crate::ai::{SharedRouter, TaskType, with_timeout};
use crate::config::FollowUpConfig;
use crate::constants::followup::priority as thresholds;
use crate::time::{Clock, TimezoneService};
use crate::types::{
    FollowUpMessage, FollowUpSuggestion, Interaction, Lead, Priority, ReplyKind, Result,
    Sequence, SequenceState, SequenceStatus, Step, SuggestionStatus, log_filter_warn,
};
use crate::workflow::clean_optional;

/// Engine tuning, usually taken from `[followup]` config
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ghosting_days: i64,
    pub recent_interactions_limit: usize,
    pub concurrency: usize,
    pub generate_content: bool,
    pub ai_timeout: std::time::Duration,
}

impl From<&FollowUpConfig> for EngineSettings {
    fn from(config: &FollowUpConfig) -> Self {
        Self {
            ghosting_days: i64::from(config.ghosting_days),
            recent_interactions_limit: config.recent_interactions_limit,
            concurrency: config.concurrency.max(1),
            generate_content: config.generate_content,
            ai_timeout: std::time::Duration::from_secs(config.ai_timeout_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&FollowUpConfig::default())
    }
}

/// Priority from lead score and days since the last contact
pub fn compute_priority(lead_score: u32, days_since_contact: i64) -> Priority {
    if lead_score >= thresholds::CRITICAL_SCORE && days_since_contact >= thresholds::CRITICAL_DAYS {
        Priority::Critical
    } else if lead_score >= thresholds::HIGH_SCORE && days_since_contact >= thresholds::HIGH_DAYS {
        Priority::High
    } else if days_since_contact >= thresholds::STALE_DAYS {
        Priority::High
    } else {
        Priority::Medium
    }
}

/// Days since last contact, falling back to lead creation, else 0
fn days_since_contact(lead: &Lead, now: DateTime<Utc>) -> i64 {
    lead.days_since_last_contact(now)
        .or_else(|| lead.created_at.map(|at| (now - at).num_days().max(0)))
        .unwrap_or(0)
}

pub struct FollowUpEngine {
    repo: SharedFollowUpRepository,
    timezone: Arc<dyn TimezoneService>,
    clock: Arc<dyn Clock>,
    ai: Option<SharedRouter>,
    settings: EngineSettings,
}

impl FollowUpEngine {
    pub fn new(
        repo: SharedFollowUpRepository,
        timezone: Arc<dyn TimezoneService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            timezone,
            clock,
            ai: None,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_ai(mut self, router: SharedRouter) -> Self {
        self.ai = Some(router);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Next suggestion for a lead, or `None` when nothing should happen now
    pub async fn get_next_follow_up(&self, lead_id: &str) -> Result<Option<FollowUpSuggestion>> {
        let Some(ctx) = self.repo.get_lead_context(lead_id).await? else {
            debug!("Lead {} not found, no follow-up", lead_id);
            return Ok(None);
        };
        let lead = &ctx.lead;
        let now = self.clock.now();

        let Some((mut state, sequence)) = self.load_or_enroll(lead, now).await? else {
            return Ok(None);
        };

        if state.status.is_terminal() {
            debug!("Sequence {} for lead {} is {}", sequence.id, lead_id, state.status);
            return Ok(None);
        }
        if state.status == SequenceStatus::Paused {
            debug!("Sequence {} for lead {} is paused", sequence.id, lead_id);
            return Ok(None);
        }

        let interactions = self
            .repo
            .get_recent_interactions(lead_id, self.settings.recent_interactions_limit)
            .await?;

        let last_activity = interactions
            .first()
            .map(|i| i.created_at.max(state.started_at))
            .unwrap_or(state.started_at);
        if now - last_activity >= Duration::days(self.settings.ghosting_days) {
            self.settle_pending(&state, &sequence, SuggestionStatus::Expired)
                .await?;
            state.status = SequenceStatus::Ghosted;
            self.repo.upsert_sequence_state(&state).await?;
            info!(
                "Lead {} ghosted sequence {} (silent since {})",
                lead_id, sequence.id, last_activity
            );
            return Ok(None);
        }

        let steps = sequence.sorted_steps();
        let Some(step) = steps.get(state.next_step_index()).copied() else {
            state.status = SequenceStatus::Completed;
            self.repo.upsert_sequence_state(&state).await?;
            info!("Sequence {} completed for lead {}", sequence.id, lead_id);
            return Ok(None);
        };

        let last_type = interactions
            .first()
            .map(|i| i.interaction_type.as_str())
            .or(state.last_interaction_type.as_deref());
        if !step.condition.is_satisfied(last_type) {
            debug!(
                "Step {} for lead {} waits: condition {} not met by {:?}",
                step.id,
                lead_id,
                step.condition.as_str(),
                last_type
            );
            return Ok(None);
        }

        let recommended_time = self.recommended_time(&state, step, lead, now).await;
        let priority = compute_priority(lead.lead_score, days_since_contact(lead, now));
        let id = FollowUpSuggestion::suggestion_id(&lead.id, &sequence.id, &step.id);

        let existing = self.repo.get_suggestion(&id).await?;
        let status = existing.as_ref().map(|s| s.status).unwrap_or_default();
        let content = match existing.and_then(|s| s.content) {
            Some(content) => Some(content),
            None => self.draft_content(lead, &sequence, step, &interactions).await,
        };

        let position = state.next_step_index() + 1;
        let suggestion = FollowUpSuggestion {
            id,
            lead_id: lead.id.clone(),
            sequence_id: sequence.id.clone(),
            step_id: step.id.clone(),
            recommended_channel: step.channel,
            recommended_time,
            priority,
            reason: format!(
                "Step {} of {} in '{}': {} via {} (day {})",
                position,
                steps.len(),
                sequence.name,
                step.action,
                step.channel,
                step.day_offset
            ),
            meta: serde_json::json!({
                "sequence_name": sequence.name,
                "step_action": step.action,
                "day_offset": step.day_offset,
                "template_key": step.template_key,
            }),
            content,
            status,
        };

        self.repo.log_followup_suggestion(&suggestion).await?;
        debug!(
            "Suggested step {} for lead {} at {} ({})",
            step.id, lead_id, recommended_time, priority
        );
        Ok(Some(suggestion))
    }

    /// Due suggestions across leads, most urgent first
    pub async fn get_today_followups(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<FollowUpSuggestion>> {
        let leads = self.repo.list_all_leads(user_id).await?;
        let now = self.clock.now();

        let results: Vec<_> = stream::iter(leads)
            .map(|ctx| async move {
                let result = self.get_next_follow_up(&ctx.lead.id).await;
                (ctx.lead.id, ctx.lead.timezone, result)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut due: Vec<FollowUpSuggestion> = results
            .into_iter()
            .filter_map(|(lead_id, tz, result)| {
                let suggestion =
                    log_filter_warn(result, &format!("Follow-up for lead {}", lead_id))??;
                let zone = self.timezone.zone(tz.as_deref());
                let today = now.with_timezone(&zone).date_naive();
                let day = suggestion.recommended_time.with_timezone(&zone).date_naive();
                (day <= today).then_some(suggestion)
            })
            .collect();

        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.recommended_time.cmp(&b.recommended_time))
                .then_with(|| a.lead_id.cmp(&b.lead_id))
        });
        info!("{} follow-up(s) due today", due.len());
        Ok(due)
    }

    // =========================================================================
    // Caller events
    // =========================================================================

    /// Mark the next step as done without a send; completes the sequence after its last step.
    ///
    /// A pending suggestion for the skipped step is marked `Skipped`.
    pub async fn advance_sequence(&self, lead_id: &str) -> Result<Option<SequenceState>> {
        self.advance_step(lead_id, SuggestionStatus::Skipped).await
    }

    async fn advance_step(
        &self,
        lead_id: &str,
        outcome: SuggestionStatus,
    ) -> Result<Option<SequenceState>> {
        let Some(mut state) = self.repo.get_active_sequence_state(lead_id).await? else {
            debug!("No sequence state for lead {}", lead_id);
            return Ok(None);
        };
        if state.status.is_terminal() {
            return Ok(Some(state));
        }

        let total = match self.repo.get_sequence_by_id(&state.sequence_id).await? {
            Some(sequence) => {
                self.settle_pending(&state, &sequence, outcome).await?;
                sequence.steps.len()
            }
            None => {
                tracing::warn!(
                    "Sequence {} for lead {} no longer exists",
                    state.sequence_id,
                    lead_id
                );
                0
            }
        };

        let index = state.next_step_index();
        state.current_step_index = Some(index);
        state.last_step_completed_at = Some(self.clock.now());
        if index + 1 >= total {
            state.status = SequenceStatus::Completed;
        }

        let stored = self.repo.upsert_sequence_state(&state).await?;
        info!(
            "Lead {} advanced to step {} of {} ({})",
            lead_id,
            index + 1,
            total,
            stored.status
        );
        Ok(Some(stored))
    }

    /// Record a classified reply; a positive reply pauses the sequence
    pub async fn handle_reply(
        &self,
        lead_id: &str,
        kind: ReplyKind,
    ) -> Result<Option<SequenceState>> {
        let interaction = Interaction::new(kind.interaction_type(), self.clock.now());
        self.repo.record_interaction(lead_id, &interaction).await?;

        let Some(mut state) = self.repo.get_active_sequence_state(lead_id).await? else {
            return Ok(None);
        };
        if state.status.is_terminal() {
            return Ok(Some(state));
        }

        state.last_interaction_type = Some(interaction.interaction_type);
        if kind == ReplyKind::Positive {
            state.status = SequenceStatus::Paused;
            info!("Lead {} replied positively, sequence paused", lead_id);
        }
        Ok(Some(self.repo.upsert_sequence_state(&state).await?))
    }

    pub async fn resume_sequence(&self, lead_id: &str) -> Result<Option<SequenceState>> {
        self.transition(lead_id, |status| {
            (status == SequenceStatus::Paused).then_some(SequenceStatus::InProgress)
        })
        .await
    }

    pub async fn stop_sequence(&self, lead_id: &str) -> Result<Option<SequenceState>> {
        self.transition(lead_id, |status| {
            (!status.is_terminal()).then_some(SequenceStatus::Stopped)
        })
        .await
    }

    /// Acknowledge that a suggestion was sent.
    ///
    /// Safe to repeat: the message is keyed by suggestion id and the sequence
    /// only advances while the suggested step is still the next one. Skipped or
    /// expired suggestions, and sends against a paused or finished sequence, are
    /// not recorded.
    pub async fn process_sent_suggestion(
        &self,
        suggestion_id: &str,
        content: Option<String>,
    ) -> Result<Option<SequenceState>> {
        let Some(suggestion) = self.repo.get_suggestion(suggestion_id).await? else {
            debug!("Suggestion {} not found", suggestion_id);
            return Ok(None);
        };
        let lead_id = suggestion.lead_id.as_str();

        if suggestion.status == SuggestionStatus::Sent {
            debug!("Suggestion {} already acknowledged", suggestion_id);
            return self.repo.get_active_sequence_state(lead_id).await;
        }
        if suggestion.status != SuggestionStatus::Pending {
            tracing::warn!(
                "Suggestion {} is {}, send not recorded",
                suggestion_id,
                suggestion.status.as_str()
            );
            return self.repo.get_active_sequence_state(lead_id).await;
        }

        let state = self.repo.get_active_sequence_state(lead_id).await?;
        if let Some(state) = &state
            && state.sequence_id == suggestion.sequence_id
            && (state.status.is_terminal() || state.status == SequenceStatus::Paused)
        {
            tracing::warn!(
                "Sequence {} for lead {} is {}, send of {} not recorded",
                state.sequence_id,
                lead_id,
                state.status,
                suggestion_id
            );
            return Ok(Some(state.clone()));
        }

        let message = FollowUpMessage {
            suggestion_id: suggestion.id.clone(),
            lead_id: suggestion.lead_id.clone(),
            channel: suggestion.recommended_channel,
            content: clean_optional(content.as_deref()).or(suggestion.content.clone()),
            sent_at: self.clock.now(),
        };
        self.repo.log_followup_message(&message).await?;

        match state {
            Some(state)
                if state.sequence_id == suggestion.sequence_id
                    && self.is_next_step(&state, &suggestion.step_id).await? =>
            {
                self.advance_step(lead_id, SuggestionStatus::Sent).await
            }
            other => {
                debug!(
                    "Sequence for lead {} is not waiting on step {}",
                    lead_id, suggestion.step_id
                );
                self.repo
                    .update_suggestion_status(suggestion_id, SuggestionStatus::Sent)
                    .await?;
                Ok(other)
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_or_enroll(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<(SequenceState, Sequence)>> {
        if let Some(state) = self.repo.get_active_sequence_state(&lead.id).await? {
            return match self.repo.get_sequence_by_id(&state.sequence_id).await? {
                Some(sequence) => Ok(Some((state, sequence))),
                None => {
                    tracing::warn!(
                        "Sequence {} for lead {} not found",
                        state.sequence_id,
                        lead.id
                    );
                    Ok(None)
                }
            };
        }

        let Some(sequence) = self.repo.get_default_sequence_for_lead(lead).await? else {
            debug!("No default sequence for lead {}", lead.id);
            return Ok(None);
        };
        let state = self
            .repo
            .upsert_sequence_state(&SequenceState::start(&lead.id, &sequence.id, now))
            .await?;
        info!("Enrolled lead {} in sequence {}", lead.id, sequence.id);
        Ok(Some((state, sequence)))
    }

    async fn recommended_time(
        &self,
        state: &SequenceState,
        step: &Step,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let tz = lead.timezone.as_deref();
        let candidate = state.started_at + Duration::days(i64::from(step.day_offset));
        let local_now = self.timezone.now_in_tz(tz).await;
        if candidate < local_now.with_timezone(&Utc) {
            self.timezone.next_best_contact_time(tz, Some(now)).await
        } else {
            candidate
        }
    }

    async fn is_next_step(&self, state: &SequenceState, step_id: &str) -> Result<bool> {
        let Some(sequence) = self.repo.get_sequence_by_id(&state.sequence_id).await? else {
            return Ok(false);
        };
        Ok(sequence
            .sorted_steps()
            .get(state.next_step_index())
            .is_some_and(|step| step.id == step_id))
    }

    /// Moves the pending suggestion for the state's next step to `status`
    async fn settle_pending(
        &self,
        state: &SequenceState,
        sequence: &Sequence,
        status: SuggestionStatus,
    ) -> Result<()> {
        let steps = sequence.sorted_steps();
        let Some(step) = steps.get(state.next_step_index()) else {
            return Ok(());
        };
        let id = FollowUpSuggestion::suggestion_id(&state.lead_id, &sequence.id, &step.id);
        match self.repo.get_suggestion(&id).await? {
            Some(suggestion) if suggestion.status == SuggestionStatus::Pending => {
                self.repo.update_suggestion_status(&id, status).await?;
                debug!("Suggestion {} is now {}", id, status.as_str());
            }
            _ => {}
        }
        Ok(())
    }

    async fn transition<F>(&self, lead_id: &str, next: F) -> Result<Option<SequenceState>>
    where
        F: FnOnce(SequenceStatus) -> Option<SequenceStatus>,
    {
        let Some(mut state) = self.repo.get_active_sequence_state(lead_id).await? else {
            return Ok(None);
        };
        let Some(status) = next(state.status) else {
            debug!("Sequence for lead {} stays {}", lead_id, state.status);
            return Ok(Some(state));
        };
        if status.is_terminal()
            && let Some(sequence) = self.repo.get_sequence_by_id(&state.sequence_id).await?
        {
            self.settle_pending(&state, &sequence, SuggestionStatus::Expired)
                .await?;
        }
        state.status = status;
        let stored = self.repo.upsert_sequence_state(&state).await?;
        info!("Sequence for lead {} is now {}", lead_id, stored.status);
        Ok(Some(stored))
    }

    async fn draft_content(
        &self,
        lead: &Lead,
        sequence: &Sequence,
        step: &Step,
        interactions: &[Interaction],
    ) -> Option<String> {
        if !self.settings.generate_content {
            return None;
        }
        let router = self.ai.as_ref()?;

        let payload = serde_json::json!({
            "lead": {
                "first_name": lead.display_first_name(),
                "status": lead.status,
                "vertical": lead.vertical,
                "timezone": lead.timezone,
            },
            "sequence": sequence.name,
            "step": {
                "action": step.action,
                "channel": step.channel,
                "template_key": step.template_key,
                "day_offset": step.day_offset,
            },
            "recent_interactions": interactions,
        });

        let response = log_filter_warn(
            with_timeout(
                self.settings.ai_timeout,
                router.generate(TaskType::FollowupGeneration, &payload, None),
                "follow-up draft",
            )
            .await,
            &format!("AI draft for lead {} failed", lead.id),
        )?;
        debug!(
            "Drafted step {} with {} ({} tokens, prompt {})",
            step.id, response.model, response.tokens_used, response.prompt_version
        );
        clean_optional(Some(&response.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiResponse, AiRouter, GenerationConfig};
    use crate::followup::FollowUpRepository;
    use crate::storage::MemoryStore;
    use crate::time::{BusinessHoursService, FixedClock};
    use crate::types::{Channel, LeadContext, SequenceBinding, StepCondition};
    use async_trait::async_trait;
    use chrono::TimeZone;

    // Monday, inside the Berlin business window
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        engine: FollowUpEngine,
    }

    fn fixture(now: DateTime<Utc>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let tz = Arc::new(
            BusinessHoursService::from_config(clock.clone(), &FollowUpConfig::default()).unwrap(),
        );
        let engine = FollowUpEngine::new(store.clone(), tz, clock.clone());
        Fixture {
            store,
            clock,
            engine,
        }
    }

    fn five_steps() -> Sequence {
        Sequence::new(
            "seq-intro",
            "Intro",
            vec![
                Step::new("s0", Channel::Whatsapp, 0, 0),
                Step::new("s1", Channel::Whatsapp, 2, 0),
                Step::new("s2", Channel::Email, 5, 0).with_condition(StepCondition::NoReply),
                Step::new("s3", Channel::Phone, 8, 0)
                    .with_condition(StepCondition::RepliedPositive)
                    .with_action("book_call"),
                Step::new("s4", Channel::Email, 14, 0),
            ],
        )
    }

    fn lead(id: &str) -> Lead {
        let mut lead = Lead::new(id);
        lead.first_name = Some("Anna".into());
        lead.timezone = Some("Europe/Berlin".into());
        lead
    }

    fn seed(f: &Fixture, lead: Lead) {
        f.store.insert_lead(LeadContext::new(lead));
        f.store.insert_sequence(five_steps());
        f.store.bind_sequence(SequenceBinding::new("seq-intro"));
    }

    #[test]
    fn test_priority_rules() {
        assert_eq!(compute_priority(85, 7), Priority::Critical);
        assert_eq!(compute_priority(85, 6), Priority::High);
        assert_eq!(compute_priority(60, 4), Priority::High);
        assert_eq!(compute_priority(60, 2), Priority::Medium);
        assert_eq!(compute_priority(10, 9), Priority::High);
        assert_eq!(compute_priority(10, 0), Priority::Medium);
    }

    #[tokio::test]
    async fn test_missing_lead_is_soft_none() {
        let f = fixture(monday());
        assert!(f.engine.get_next_follow_up("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enrolls_lead_and_suggests_first_step() {
        let f = fixture(monday());
        seed(&f, lead("l1"));

        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(suggestion.step_id, "s0");
        assert_eq!(suggestion.recommended_channel, Channel::Whatsapp);
        assert_eq!(suggestion.meta["sequence_name"], "Intro");
        assert_eq!(suggestion.meta["template_key"], "s0");

        let state = f.store.get_active_sequence_state("l1").await.unwrap().unwrap();
        assert_eq!(state.status, SequenceStatus::InProgress);
        assert_eq!(state.current_step_index, None);
    }

    #[tokio::test]
    async fn test_no_binding_means_no_suggestion() {
        let f = fixture(monday());
        f.store.insert_lead(LeadContext::new(lead("l1")));
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_step_selection_with_positive_reply() {
        let now = monday();
        let f = fixture(now);
        let mut l = lead("l1");
        l.lead_score = 60;
        l.last_contact_at = Some(now - Duration::days(4));
        seed(&f, l);

        let started = now - Duration::days(3);
        let mut state = SequenceState::start("l1", "seq-intro", started);
        state.current_step_index = Some(2);
        f.store.put_sequence_state(state);
        f.store
            .add_interaction("l1", Interaction::new("reply_positive", now - Duration::hours(5)));

        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(suggestion.step_id, "s3");
        assert_eq!(suggestion.recommended_channel, Channel::Phone);
        assert_eq!(suggestion.priority, Priority::High);
        // day 8 is still in the future, so the raw offset is kept
        assert_eq!(suggestion.recommended_time, started + Duration::days(8));
        assert_eq!(suggestion.meta["step_action"], "book_call");
    }

    #[tokio::test]
    async fn test_past_step_moves_to_next_business_slot() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 19, 0, 0).unwrap();
        let f = fixture(now);
        seed(&f, lead("l1"));
        f.store
            .put_sequence_state(SequenceState::start("l1", "seq-intro", now - Duration::days(1)));

        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        // 20:00 Berlin on Monday, next slot is Tuesday 09:00 local
        assert_eq!(
            suggestion.recommended_time,
            Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_unsatisfied_condition_waits() {
        let now = monday();
        let f = fixture(now);
        seed(&f, lead("l1"));
        let mut state = SequenceState::start("l1", "seq-intro", now - Duration::days(6));
        state.current_step_index = Some(1);
        f.store.put_sequence_state(state);
        f.store
            .add_interaction("l1", Interaction::new("reply_neutral", now - Duration::days(1)));

        // s2 needs no reply
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_none());
        let state = f.store.get_active_sequence_state("l1").await.unwrap().unwrap();
        assert_eq!(state.current_step_index, Some(1));
    }

    #[tokio::test]
    async fn test_next_follow_up_is_idempotent() {
        let f = fixture(monday());
        seed(&f, lead("l1"));

        let first = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        let second = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_advance_n_times() {
        let f = fixture(monday());
        seed(&f, lead("l1"));
        f.engine.get_next_follow_up("l1").await.unwrap();

        for n in 1..=3 {
            let state = f.engine.advance_sequence("l1").await.unwrap().unwrap();
            assert_eq!(state.next_step_index(), n);
            assert_eq!(state.status, SequenceStatus::InProgress);
        }
        f.engine.advance_sequence("l1").await.unwrap();
        let done = f.engine.advance_sequence("l1").await.unwrap().unwrap();
        assert_eq!(done.status, SequenceStatus::Completed);

        // terminal is absorbing
        let again = f.engine.advance_sequence("l1").await.unwrap().unwrap();
        assert_eq!(again.current_step_index, Some(4));
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ghosting_after_inactivity() {
        let now = monday();
        let f = fixture(now);
        seed(&f, lead("l1"));
        f.store
            .put_sequence_state(SequenceState::start("l1", "seq-intro", now - Duration::days(40)));

        for _ in 0..3 {
            let today = f.engine.get_today_followups(None).await.unwrap();
            assert!(today.is_empty());
            f.clock.advance(Duration::days(1));
        }
        let state = f.store.get_active_sequence_state("l1").await.unwrap().unwrap();
        assert_eq!(state.status, SequenceStatus::Ghosted);
    }

    #[tokio::test]
    async fn test_positive_reply_pauses_until_resumed() {
        let f = fixture(monday());
        seed(&f, lead("l1"));
        f.engine.get_next_follow_up("l1").await.unwrap();

        let paused = f
            .engine
            .handle_reply("l1", ReplyKind::Positive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paused.status, SequenceStatus::Paused);
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_none());

        let resumed = f.engine.resume_sequence("l1").await.unwrap().unwrap();
        assert_eq!(resumed.status, SequenceStatus::InProgress);
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_some());

        let stopped = f.engine.stop_sequence("l1").await.unwrap().unwrap();
        assert_eq!(stopped.status, SequenceStatus::Stopped);
        let still = f.engine.resume_sequence("l1").await.unwrap().unwrap();
        assert_eq!(still.status, SequenceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_sent_suggestion_advances_once() {
        let f = fixture(monday());
        seed(&f, lead("l1"));
        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();

        let state = f
            .engine
            .process_sent_suggestion(&suggestion.id, Some("**Hi Anna!**".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_step_index, Some(0));

        let again = f
            .engine
            .process_sent_suggestion(&suggestion.id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.current_step_index, Some(0));

        let messages = f.store.messages_for("l1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.as_deref(), Some("Hi Anna!"));

        let next = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(next.step_id, "s1");
    }

    fn statuses(f: &Fixture, lead_id: &str) -> Vec<(String, SuggestionStatus)> {
        f.store
            .suggestions_for(lead_id)
            .into_iter()
            .map(|s| (s.step_id, s.status))
            .collect()
    }

    fn pending_count(f: &Fixture, lead_id: &str) -> usize {
        f.store
            .suggestions_for(lead_id)
            .iter()
            .filter(|s| s.sequence_id == "seq-intro" && s.status == SuggestionStatus::Pending)
            .count()
    }

    #[tokio::test]
    async fn test_suggestion_lifecycle_across_skip_and_stop() {
        let f = fixture(monday());
        seed(&f, lead("l1"));

        let first = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(pending_count(&f, "l1"), 1);

        f.engine.advance_sequence("l1").await.unwrap();
        assert_eq!(pending_count(&f, "l1"), 0);
        let second = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(second.step_id, "s1");
        assert_eq!(
            statuses(&f, "l1"),
            vec![
                ("s0".to_string(), SuggestionStatus::Skipped),
                ("s1".to_string(), SuggestionStatus::Pending),
            ]
        );
        assert_eq!(pending_count(&f, "l1"), 1);

        f.engine.stop_sequence("l1").await.unwrap();
        assert_eq!(
            statuses(&f, "l1")[1],
            ("s1".to_string(), SuggestionStatus::Expired)
        );
        assert_eq!(pending_count(&f, "l1"), 0);

        // neither the expired nor the skipped suggestion can be sent
        for id in [&second.id, &first.id] {
            let state = f
                .engine
                .process_sent_suggestion(id, Some("late".into()))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(state.status, SequenceStatus::Stopped);
            assert_eq!(state.current_step_index, Some(0));
        }
        assert!(f.store.messages_for("l1").is_empty());
    }

    #[tokio::test]
    async fn test_send_refused_while_paused() {
        let f = fixture(monday());
        seed(&f, lead("l1"));
        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        f.engine.handle_reply("l1", ReplyKind::Positive).await.unwrap();

        let state = f
            .engine
            .process_sent_suggestion(&suggestion.id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.status, SequenceStatus::Paused);
        assert_eq!(state.current_step_index, None);
        assert!(f.store.messages_for("l1").is_empty());
        assert_eq!(pending_count(&f, "l1"), 1);

        // the same suggestion goes through once resumed
        f.engine.resume_sequence("l1").await.unwrap();
        let state = f
            .engine
            .process_sent_suggestion(&suggestion.id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_step_index, Some(0));
        assert_eq!(statuses(&f, "l1")[0].1, SuggestionStatus::Sent);
        assert_eq!(f.store.messages_for("l1").len(), 1);
    }

    #[tokio::test]
    async fn test_ghosting_expires_pending_suggestion() {
        let now = monday();
        let f = fixture(now);
        seed(&f, lead("l1"));
        f.engine.get_next_follow_up("l1").await.unwrap().unwrap();

        f.clock.advance(Duration::days(40));
        assert!(f.engine.get_next_follow_up("l1").await.unwrap().is_none());
        let state = f.store.get_active_sequence_state("l1").await.unwrap().unwrap();
        assert_eq!(state.status, SequenceStatus::Ghosted);
        assert_eq!(
            statuses(&f, "l1"),
            vec![("s0".to_string(), SuggestionStatus::Expired)]
        );
    }

    #[tokio::test]
    async fn test_today_sorted_by_priority_then_time() {
        let now = monday();
        let f = fixture(now);
        f.store.insert_sequence(five_steps());
        f.store.bind_sequence(SequenceBinding::new("seq-intro"));

        let mut hot = lead("a-hot");
        hot.lead_score = 90;
        hot.last_contact_at = Some(now - Duration::days(10));
        let mut fresh = lead("b-fresh");
        fresh.last_contact_at = Some(now - Duration::days(1));
        let mut later = lead("c-later");
        later.last_contact_at = Some(now);
        for l in [fresh, hot, later] {
            f.store.insert_lead(LeadContext::new(l));
        }
        // c-later's sequence starts tomorrow, so its first step is not due today
        f.store
            .put_sequence_state(SequenceState::start("c-later", "seq-intro", now + Duration::days(1)));

        let today = f.engine.get_today_followups(None).await.unwrap();
        let ids: Vec<_> = today.iter().map(|s| s.lead_id.as_str()).collect();
        assert_eq!(ids, vec!["a-hot", "b-fresh"]);
        assert_eq!(today[0].priority, Priority::Critical);
        assert!(today.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    struct SlowRouter;

    #[async_trait]
    impl AiRouter for SlowRouter {
        async fn generate(
            &self,
            _task_type: TaskType,
            _user_payload: &serde_json::Value,
            _config: Option<&GenerationConfig>,
        ) -> Result<AiResponse> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(AiResponse {
                content: "too late".into(),
                model: "slow".into(),
                prompt_version: "v0".into(),
                tokens_used: 0,
            })
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct EchoRouter;

    #[async_trait]
    impl AiRouter for EchoRouter {
        async fn generate(
            &self,
            task_type: TaskType,
            user_payload: &serde_json::Value,
            _config: Option<&GenerationConfig>,
        ) -> Result<AiResponse> {
            assert_eq!(task_type, TaskType::FollowupGeneration);
            let name = user_payload["lead"]["first_name"].as_str().unwrap_or_default();
            Ok(AiResponse {
                content: format!("Nachricht: **Hallo {}!**", name),
                model: "echo".into(),
                prompt_version: "v1".into(),
                tokens_used: 12,
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn drafting_settings(timeout_ms: u64) -> EngineSettings {
        EngineSettings {
            generate_content: true,
            ai_timeout: std::time::Duration::from_millis(timeout_ms),
            ..EngineSettings::default()
        }
    }

    #[tokio::test]
    async fn test_ai_draft_is_cleaned() {
        let mut f = fixture(monday());
        seed(&f, lead("l1"));
        f.engine = f
            .engine
            .with_settings(drafting_settings(1000))
            .with_ai(Arc::new(EchoRouter));

        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert_eq!(suggestion.content.as_deref(), Some("Hallo Anna!"));
    }

    #[tokio::test]
    async fn test_ai_timeout_still_returns_suggestion() {
        let mut f = fixture(monday());
        seed(&f, lead("l1"));
        f.engine = f
            .engine
            .with_settings(drafting_settings(20))
            .with_ai(Arc::new(SlowRouter));

        let suggestion = f.engine.get_next_follow_up("l1").await.unwrap().unwrap();
        assert!(suggestion.content.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers_conflict() {
        let f = fixture(monday());
        seed(&f, lead("l1"));
        f.engine.get_next_follow_up("l1").await.unwrap();

        let stale = f.store.get_active_sequence_state("l1").await.unwrap().unwrap();
        f.engine.advance_sequence("l1").await.unwrap();
        let err = f.store.upsert_sequence_state(&stale).await.unwrap_err();
        assert_eq!(err.code(), "REPOSITORY_ERROR");
        assert!(err.is_retryable());
    }
}
