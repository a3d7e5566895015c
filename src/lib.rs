//! Leadflow - Goal Planning and Follow-up Engine for Sales Practitioners
//!
//! Turns a practitioner's income or rank goal into daily activity targets,
//! drives per-lead follow-up sequences, and builds a prioritized action queue.
//!
//! ## Core Features
//!
//! - **Goal Planning**: Vertical adapters for network marketing, real estate, finance and coaching
//! - **Follow-up Sequences**: Step timing in the lead's timezone with business-hours rescheduling
//! - **Lifecycle Cycles**: Per-state follow-up queues that reset on every state change
//! - **Workflow Detection**: Classifies leads into actionable cases and ranks them
//! - **Channels**: Per-channel validation and payload shaping for outbound messages
//!
//! ## Quick Start
//!
//! ```ignore
//! use leadflow::{BusinessHoursService, Config, Database, FollowUpEngine, SystemClock};
//!
//! let config = Config::default();
//! let clock = Arc::new(SystemClock);
//! let db = Arc::new(Database::open(".leadflow/leadflow.db")?);
//! let hours = BusinessHoursService::from_config(clock.clone(), &config.followup)?;
//! let engine = FollowUpEngine::new(db, Arc::new(hours), clock);
//! let due = engine.get_today_followups(Some("user-1")).await?;
//! ```
//!
//! ## Modules
//!
//! - [`goals`]: Vertical adapters and the goal planner
//! - [`followup`]: Sequence engine, lifecycle cycles and repository ports
//! - [`workflow`]: Workflow detection and the daily action queue
//! - [`storage`]: SQLite persistence with connection pooling, plus an in-memory store
//! - [`channels`]: Messaging adapters and transports
//! - [`ai`]: Optional message generation behind a router trait

pub mod ai;
pub mod channels;
pub mod cli;
pub mod config;
pub mod constants;
pub mod followup;
pub mod goals;
pub mod storage;
pub mod time;
pub mod types;
pub mod workflow;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{FlowError, Result, ResultExt};

// Storage
pub use storage::{Database, Dataset, MemoryStore, PoolConfig, SharedDatabase};

// Time
pub use time::{BusinessHoursService, Clock, FixedClock, SystemClock};

// =============================================================================
// Engine Re-exports
// =============================================================================

pub use followup::{EngineSettings, FollowUpEngine, LeadCycleService};
pub use goals::{GoalPlanner, Plan, VerticalRegistry};
pub use workflow::{QueueBuilder, WorkflowDetector};

// =============================================================================
// Integration Re-exports
// =============================================================================

pub use ai::{AiRouter, SharedRouter, build_router};
pub use channels::{ChannelAdapter, ChannelRegistry, NormalizedMessage, SendResult};
