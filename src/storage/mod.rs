//! Repository implementations: pooled SQLite for the CLI, in-memory for
//! tests and embedding.

mod database;
mod memory;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{CycleStep, Interaction, LeadContext, Result, Sequence, SequenceBinding};

/// Importable bundle of leads, sequences and cycle configuration (JSON or YAML)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub leads: Vec<LeadContext>,
    pub sequences: Vec<Sequence>,
    pub bindings: Vec<SequenceBinding>,
    pub cycle_steps: Vec<CycleStep>,
    /// Interaction history keyed by lead id
    pub interactions: BTreeMap<String, Vec<Interaction>>,
}

impl Dataset {
    /// `.yaml`/`.yml` files parse as YAML, anything else as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Ok(serde_yaml::from_str(&raw)?)
        } else {
            Ok(serde_json::from_str(&raw)?)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
            && self.sequences.is_empty()
            && self.bindings.is_empty()
            && self.cycle_steps.is_empty()
            && self.interactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::followup::FollowUpRepository;

    const YAML: &str = r#"
leads:
  - lead:
      id: lead-1
      status: new
      lead_score: 40
sequences:
  - id: seq-new
    name: New lead nurture
    steps:
      - id: s1
        channel: whatsapp
        day_offset: 0
        order_index: 0
        template_key: intro
        action: send_intro
bindings:
  - sequence_id: seq-new
    status: new
interactions:
  lead-1:
    - type: message_sent
      created_at: 2025-03-01T09:00:00Z
"#;

    #[tokio::test]
    async fn test_load_yaml_and_import_into_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.yaml");
        std::fs::write(&path, YAML).unwrap();

        let dataset = Dataset::load(&path).unwrap();
        assert!(!dataset.is_empty());
        assert_eq!(dataset.leads.len(), 1);
        assert_eq!(dataset.sequences[0].steps.len(), 1);

        let memory = MemoryStore::new();
        memory.import(&dataset);
        let db = Database::open_in_memory().unwrap();
        db.import(&dataset).unwrap();

        for repo in [&memory as &dyn FollowUpRepository, &db as &dyn FollowUpRepository] {
            let ctx = repo.get_lead_context("lead-1").await.unwrap().unwrap();
            let sequence = repo
                .get_default_sequence_for_lead(&ctx.lead)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sequence.id, "seq-new");
            assert_eq!(
                repo.get_recent_interactions("lead-1", 5).await.unwrap().len(),
                1
            );
        }
    }

    #[test]
    fn test_load_json_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.data");
        std::fs::write(&path, r#"{"leads": []}"#).unwrap();
        assert!(Dataset::load(&path).unwrap().is_empty());

        std::fs::write(&path, "leads: []").unwrap();
        assert!(Dataset::load(&path).is_err());
    }
}
