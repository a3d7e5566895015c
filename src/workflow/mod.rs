//! Workflow Detector
//!
//! Classifies each lead into one [`WorkflowCase`](crate::types::WorkflowCase)
//! and assembles the prioritised daily action queue.

mod detector;
mod messages;
mod queue;

pub use detector::{WorkflowDetector, detect_workflow};
pub use messages::{clean_message, clean_optional, template_for};
pub use queue::QueueBuilder;
