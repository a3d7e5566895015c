//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::ai::build_router;
use crate::config::{Config, ConfigLoader};
use crate::followup::{EngineSettings, FollowUpEngine, LeadCycleService};
use crate::storage::{Database, SharedDatabase};
use crate::time::{BusinessHoursService, Clock, SystemClock};
use crate::types::{FlowError, Result};
use crate::workflow::QueueBuilder;

/// Command execution context
///
/// Loaded configuration plus the opened database; services are built on demand.
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub db: SharedDatabase,
    pub clock: Arc<dyn Clock>,
}

impl CommandContext {
    /// Validate initialization, load config and open the database.
    pub fn load() -> Result<Self> {
        require_initialized()?;
        let config = ConfigLoader::load()?;
        let db = Database::open(&config.storage.database_path)?;

        Ok(Self {
            config,
            db: Arc::new(db),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn followup_engine(&self) -> Result<FollowUpEngine> {
        let timezone =
            BusinessHoursService::from_config(Arc::clone(&self.clock), &self.config.followup)?;
        let mut engine = FollowUpEngine::new(
            self.db.clone(),
            Arc::new(timezone),
            Arc::clone(&self.clock),
        )
        .with_settings(EngineSettings::from(&self.config.followup));

        if let Some(router) = build_router(&self.config.ai)? {
            tracing::debug!("AI drafting via {}", router.name());
            engine = engine.with_ai(router);
        }
        Ok(engine)
    }

    pub fn cycle_service(&self) -> LeadCycleService {
        LeadCycleService::new(self.db.clone(), Arc::clone(&self.clock))
    }

    pub fn queue_builder(&self) -> QueueBuilder {
        QueueBuilder::new(self.db.clone(), Arc::clone(&self.clock), &self.config.queue)
    }
}

/// Returns the `.leadflow` directory, or `FlowError::NotInitialized`
pub fn require_initialized() -> Result<PathBuf> {
    let dir = ConfigLoader::project_dir();
    if !dir.exists() {
        return Err(FlowError::NotInitialized);
    }
    Ok(dir)
}

pub fn is_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Tests omitted: these helpers depend on the process working directory,
// which parallel tests cannot change safely.
