//! Lead lifecycle changes and the per-state follow-up cycle queue.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ports::SharedCycleRepository;
use crate::time::Clock;
use crate::types::{
    CycleStep, FlowError, LifecycleState, QueueEntry, QueueStatus, Result, SentOutcome,
    StateChangeOutcome,
};

pub struct LeadCycleService {
    repo: SharedCycleRepository,
    clock: Arc<dyn Clock>,
}

impl LeadCycleService {
    pub fn new(repo: SharedCycleRepository, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Move a lead to `new_state` and re-seed its cycle queue.
    ///
    /// Transitions outside the table fail with the allowed alternatives and
    /// leave every queue entry untouched.
    pub async fn change_lead_state(
        &self,
        user_id: &str,
        lead_id: &str,
        new_state: LifecycleState,
    ) -> Result<StateChangeOutcome> {
        let current = self
            .repo
            .get_lead_state(user_id, lead_id)
            .await?
            .ok_or_else(|| FlowError::LeadNotFound(lead_id.to_string()))?;

        if !current.can_transition_to(new_state) {
            debug!(
                "Rejected transition {} -> {} for lead {}",
                current, new_state, lead_id
            );
            return Err(FlowError::InvalidStateTransition {
                from: current,
                requested: new_state,
                valid: current.valid_transitions().to_vec(),
            });
        }

        let now = self.clock.now();
        let steps = self.repo.get_cycle_steps(new_state).await?;
        let seed = first_step(&steps).map(|step| {
            QueueEntry::schedule(
                user_id,
                lead_id,
                step,
                now + Duration::days(i64::from(step.days_after_previous)),
                now,
            )
        });
        if seed.is_none() {
            debug!("No cycle steps configured for state {}", new_state);
        }

        let cancelled = self
            .repo
            .apply_state_change(user_id, lead_id, new_state, seed.as_ref())
            .await?;

        info!(
            "Lead {} moved {} -> {} ({} pending entr{} cancelled)",
            lead_id,
            current,
            new_state,
            cancelled,
            if cancelled == 1 { "y" } else { "ies" }
        );

        Ok(StateChangeOutcome {
            ok: true,
            previous_state: current,
            new_state,
            cancelled_entries: cancelled,
            next_followup: seed,
        })
    }

    /// Mark a queue entry sent and schedule the next step of its cycle
    pub async fn process_sent_followup(&self, user_id: &str, queue_id: &str) -> Result<SentOutcome> {
        let Some(entry) = self.repo.get_queue_entry(user_id, queue_id).await? else {
            warn!("Queue entry {} not found for user {}", queue_id, user_id);
            return Ok(SentOutcome {
                ok: false,
                next: None,
            });
        };

        match entry.status {
            QueueStatus::Pending => {}
            QueueStatus::Sent => {
                debug!("Queue entry {} already sent", queue_id);
                return Ok(SentOutcome {
                    ok: true,
                    next: None,
                });
            }
            QueueStatus::Cancelled | QueueStatus::Skipped => {
                warn!(
                    "Queue entry {} is {}, not marking as sent",
                    queue_id,
                    entry.status.as_str()
                );
                return Ok(SentOutcome {
                    ok: false,
                    next: None,
                });
            }
        }

        let now = self.clock.now();
        let steps = self.repo.get_cycle_steps(entry.lead_state).await?;
        let next = steps
            .iter()
            .filter(|s| s.step_order > entry.step_order)
            .min_by_key(|s| s.step_order)
            .map(|step| {
                QueueEntry::schedule(
                    &entry.user_id,
                    &entry.lead_id,
                    step,
                    now + Duration::days(i64::from(step.days_after_previous)),
                    now,
                )
            });

        self.repo.complete_entry(queue_id, now, next.as_ref()).await?;
        match &next {
            Some(next) => info!(
                "Queue entry {} sent; next step {} due {}",
                queue_id, next.cycle_step_id, next.due_at
            ),
            None => info!("Queue entry {} sent; cycle finished", queue_id),
        }

        Ok(SentOutcome { ok: true, next })
    }
}

fn first_step(steps: &[CycleStep]) -> Option<&CycleStep> {
    steps.iter().min_by_key(|s| s.step_order)
}
