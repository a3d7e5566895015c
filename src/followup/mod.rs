//! Follow-Up Engine
//!
//! Sequence-driven suggestions ([`FollowUpEngine`]) and the lifecycle-driven
//! cycle queue ([`LeadCycleService`]), both over async repository ports.

mod cycle;
mod engine;
mod ports;

pub use cycle::LeadCycleService;
pub use engine::{EngineSettings, FollowUpEngine, compute_priority};
pub use ports::{
    CycleRepository, FollowUpRepository, SharedCycleRepository, SharedFollowUpRepository,
    SharedWorkflowRepository, WorkflowRepository,
};
