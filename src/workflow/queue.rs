//! Prioritised action queue built from several candidate passes.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::detector::WorkflowDetector;
use crate::config::QueueConfig;
use crate::followup::SharedWorkflowRepository;
use crate::time::Clock;
use crate::types::{QueueItem, QueuePass};

pub struct QueueBuilder {
    repo: SharedWorkflowRepository,
    clock: Arc<dyn Clock>,
    detector: WorkflowDetector,
    pass_limit: usize,
}

impl QueueBuilder {
    pub fn new(repo: SharedWorkflowRepository, clock: Arc<dyn Clock>, config: &QueueConfig) -> Self {
        Self {
            repo,
            clock,
            detector: WorkflowDetector::new(config.cold_after_days),
            pass_limit: config.pass_limit.max(1),
        }
    }

    /// Top `limit` queue items, highest score first.
    ///
    /// Never fails: a pass whose query errors is logged and skipped.
    pub async fn get_prioritized_queue(&self, user_id: &str, limit: usize) -> Vec<QueueItem> {
        let now = self.clock.now();
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for pass in QueuePass::ORDERED {
            self.run_pass(user_id, pass, &mut seen, &mut items).await;
        }
        if items.is_empty() {
            debug!("All queue passes empty for user {}, running fallback", user_id);
            self.run_pass(user_id, QueuePass::Fallback, &mut seen, &mut items)
                .await;
        }

        items.sort_by(|a: &QueueItem, b: &QueueItem| {
            b.score
                .cmp(&a.score)
                .then(a.priority.cmp(&b.priority))
                .then_with(|| a.lead.id.cmp(&b.lead.id))
        });
        items.truncate(limit);
        info!(
            "Queue for user {} at {}: {} item(s)",
            user_id,
            now.format("%Y-%m-%d %H:%M"),
            items.len()
        );
        items
    }

    async fn run_pass(
        &self,
        user_id: &str,
        pass: QueuePass,
        seen: &mut HashSet<String>,
        items: &mut Vec<QueueItem>,
    ) {
        let now = self.clock.now();
        let leads = match self
            .repo
            .list_leads_for_pass(user_id, pass, self.pass_limit, now)
            .await
        {
            Ok(leads) => leads,
            Err(e) => {
                warn!("Queue pass {} failed for user {}: {}", pass, user_id, e);
                return;
            }
        };

        let before = items.len();
        for ctx in leads {
            if seen.insert(ctx.lead.id.clone()) {
                items.push(self.detector.detect(&ctx, now));
            }
        }
        debug!("Queue pass {} added {} lead(s)", pass, items.len() - before);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::followup::WorkflowRepository;
    use crate::storage::MemoryStore;
    use crate::time::FixedClock;
    use crate::types::{
        FlowError, Lead, LeadContext, LeadStatus, PendingFollowUp, Result, Temperature,
        WorkflowCase,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn lead(id: &str, status: LeadStatus) -> Lead {
        let mut lead = Lead::new(id);
        lead.user_id = Some("u1".into());
        lead.status = status;
        lead
    }

    fn builder(repo: SharedWorkflowRepository) -> QueueBuilder {
        QueueBuilder::new(
            repo,
            Arc::new(FixedClock::new(now())),
            &QueueConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_queue_dedups_and_sorts() {
        let store = Arc::new(MemoryStore::new());
        let mut hot = lead("hot", LeadStatus::Qualified);
        hot.temperature = Some(Temperature::Hot);
        // hot lead also has a due follow-up: listed once
        store.insert_lead(
            LeadContext::new(hot)
                .with_followups(vec![PendingFollowUp::new("f1", now() - Duration::hours(1))]),
        );
        store.insert_lead(LeadContext::new(lead("new", LeadStatus::New)));
        store.insert_lead(LeadContext::new(lead("qualified", LeadStatus::Qualified)));
        store.insert_lead(LeadContext::new(lead("won", LeadStatus::Won)));
        let mut other = lead("other-user", LeadStatus::New);
        other.user_id = Some("u2".into());
        store.insert_lead(LeadContext::new(other));

        let queue = builder(store.clone()).get_prioritized_queue("u1", 10).await;
        let ids: Vec<_> = queue.iter().map(|i| i.lead.id.as_str()).collect();
        assert_eq!(ids, vec!["hot", "qualified", "new"]);
        assert_eq!(queue[0].workflow_case, WorkflowCase::HotLead);
        assert!(queue.windows(2).all(|w| w[0].score >= w[1].score));

        let top = builder(store).get_prioritized_queue("u1", 1).await;
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_sweep_when_passes_empty() {
        let store = Arc::new(MemoryStore::new());
        let mut cold = lead("dormant", LeadStatus::Dormant);
        cold.last_contact_at = Some(now() - Duration::days(20));
        store.insert_lead(LeadContext::new(cold));

        let queue = builder(store).get_prioritized_queue("u1", 5).await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].workflow_case, WorkflowCase::GoneCold);
    }

    struct FlakyRepo {
        inner: MemoryStore,
    }

    #[async_trait]
    impl WorkflowRepository for FlakyRepo {
        async fn list_leads_for_pass(
            &self,
            user_id: &str,
            pass: QueuePass,
            limit: usize,
            now: DateTime<Utc>,
        ) -> Result<Vec<LeadContext>> {
            if pass == QueuePass::HotLeads {
                return Err(FlowError::Repository("hot lead index offline".into()));
            }
            self.inner.list_leads_for_pass(user_id, pass, limit, now).await
        }
    }

    #[tokio::test]
    async fn test_failing_pass_is_skipped() {
        let inner = MemoryStore::new();
        inner.insert_lead(LeadContext::new(lead("new", LeadStatus::New)));
        let queue = builder(Arc::new(FlakyRepo { inner }))
            .get_prioritized_queue("u1", 5)
            .await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].lead.id, "new");
    }
}
