//! Unified Error Type System
//!
//! Centralized error types for the whole engine. Every variant maps to a
//! stable machine code (`FlowError::code`) so transports can surface
//! structured errors without string matching.
//!
//! ## Error Codes
//!
//! - **INVALID_GOAL_INPUT**: goal validation failed (field-level messages)
//! - **ADAPTER_COMPUTATION_ERROR**: arithmetic failure inside an adapter
//! - **INVALID_STATE_TRANSITION**: lead lifecycle change not in the table
//! - **REPOSITORY_ERROR**: persistence failure, including version conflicts
//! - **CHANNEL_SEND_FAILED**: returned inside `SendResult`, never thrown

use std::time::Duration;
use thiserror::Error;

use crate::types::cycle::LifecycleState;

// =============================================================================
// Error Codes
// =============================================================================

pub const INVALID_GOAL_INPUT: &str = "INVALID_GOAL_INPUT";
pub const ADAPTER_COMPUTATION_ERROR: &str = "ADAPTER_COMPUTATION_ERROR";
pub const INVALID_STATE_TRANSITION: &str = "INVALID_STATE_TRANSITION";
pub const REPOSITORY_ERROR: &str = "REPOSITORY_ERROR";
pub const CHANNEL_SEND_FAILED: &str = "CHANNEL_SEND_FAILED";
pub const INVALID_CHANNEL_PAYLOAD: &str = "INVALID_CHANNEL_PAYLOAD";
pub const LEAD_NOT_FOUND: &str = "LEAD_NOT_FOUND";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const AI_ERROR: &str = "AI_ERROR";
pub const TIMEOUT: &str = "TIMEOUT";

// =============================================================================
// Field Error
// =============================================================================

/// Field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Input field that failed validation
    pub field: String,
    /// Human readable problem description
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_states(states: &[LifecycleState]) -> String {
    states
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum FlowError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Goal Engine Errors
    // -------------------------------------------------------------------------
    #[error("Invalid goal input: {}", join_field_errors(.0))]
    InvalidGoalInput(Vec<FieldError>),

    #[error("Adapter computation failed in {adapter}: {message}")]
    AdapterComputation { adapter: String, message: String },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error(
        "Invalid state transition {from} -> {requested}; valid: [{}]",
        join_states(.valid)
    )]
    InvalidStateTransition {
        from: LifecycleState,
        requested: LifecycleState,
        valid: Vec<LifecycleState>,
    },

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Repository error: {0}")]
    Repository(String),

    /// Another writer updated the sequence state first; caller should retry
    #[error("Sequence state for lead {lead_id} changed concurrently (expected version {expected})")]
    VersionConflict { lead_id: String, expected: i64 },

    // -------------------------------------------------------------------------
    // Channel / AI Errors
    // -------------------------------------------------------------------------
    #[error("Invalid {channel} payload: {message}")]
    InvalidPayload { channel: String, message: String },

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'leadflow init' first")]
    NotInitialized,
}

impl From<r2d2::Error> for FlowError {
    fn from(err: r2d2::Error) -> Self {
        FlowError::Repository(format!("Connection pool error: {}", err))
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return FlowError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }
        FlowError::Repository(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl FlowError {
    /// Stable machine code for transports and structured responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGoalInput(_) => INVALID_GOAL_INPUT,
            Self::AdapterComputation { .. } => ADAPTER_COMPUTATION_ERROR,
            Self::InvalidStateTransition { .. } => INVALID_STATE_TRANSITION,
            Self::LeadNotFound(_) => LEAD_NOT_FOUND,
            Self::Io(_)
            | Self::Database(_)
            | Self::Json(_)
            | Self::Repository(_)
            | Self::VersionConflict { .. } => REPOSITORY_ERROR,
            Self::InvalidPayload { .. } => INVALID_CHANNEL_PAYLOAD,
            Self::Ai(_) => AI_ERROR,
            Self::Timeout { .. } => TIMEOUT,
            Self::Config(_) | Self::Yaml(_) | Self::NotInitialized => CONFIG_ERROR,
        }
    }

    /// Create an invalid goal input error from a single field problem
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidGoalInput(vec![FieldError::new(field, message)])
    }

    /// Create an adapter computation error
    pub fn computation(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterComputation {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a channel payload error
    pub fn payload(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Field-level messages carried by a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::InvalidGoalInput(errors) => errors,
            _ => &[],
        }
    }

    /// Allowed next states carried by a rejected transition
    pub fn valid_transitions(&self) -> &[LifecycleState] {
        match self {
            Self::InvalidStateTransition { valid, .. } => valid,
            _ => &[],
        }
    }

    /// Check if the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::Timeout { .. })
    }

    /// Structured JSON form for transports
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "ok": false,
            "code": self.code(),
            "message": self.to_string(),
        });
        match self {
            Self::InvalidGoalInput(errors) => {
                body["errors"] = serde_json::to_value(errors).unwrap_or_default();
            }
            Self::InvalidStateTransition {
                requested, valid, ..
            } => {
                body["requested"] = serde_json::Value::from(requested.as_str());
                body["valid_transitions"] = valid.iter().map(|s| s.as_str()).collect();
            }
            _ => {}
        }
        body
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| FlowError::Repository(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| FlowError::Repository(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FlowError::invalid_field("timeframe_months", "out of range").code(),
            "INVALID_GOAL_INPUT"
        );
        assert_eq!(
            FlowError::computation("real_estate", "divide by zero").code(),
            "ADAPTER_COMPUTATION_ERROR"
        );
        assert_eq!(
            FlowError::Repository("down".into()).code(),
            "REPOSITORY_ERROR"
        );
        assert_eq!(
            FlowError::VersionConflict {
                lead_id: "l1".into(),
                expected: 3
            }
            .code(),
            "REPOSITORY_ERROR"
        );
    }

    #[test]
    fn test_invalid_goal_display_lists_fields() {
        let err = FlowError::InvalidGoalInput(vec![
            FieldError::new("target_value", "must be greater than 0"),
            FieldError::new("timeframe_months", "must be between 1 and 60"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("target_value: must be greater than 0"));
        assert!(msg.contains("timeframe_months"));
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_transition_error_json() {
        let err = FlowError::InvalidStateTransition {
            from: LifecycleState::New,
            requested: LifecycleState::Won,
            valid: vec![
                LifecycleState::Engaged,
                LifecycleState::Lost,
                LifecycleState::Dormant,
            ],
        };
        let json = err.to_json();
        assert_eq!(json["code"], "INVALID_STATE_TRANSITION");
        assert_eq!(json["requested"], "won");
        assert_eq!(
            json["valid_transitions"],
            serde_json::json!(["engaged", "lost", "dormant"])
        );
    }

    #[test]
    fn test_retryable() {
        assert!(
            FlowError::VersionConflict {
                lead_id: "l".into(),
                expected: 1
            }
            .is_retryable()
        );
        assert!(FlowError::timeout("ai", Duration::from_secs(1)).is_retryable());
        assert!(!FlowError::Repository("x".into()).is_retryable());
    }
}
