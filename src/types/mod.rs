pub mod cycle;
pub mod error;
pub mod goal;
pub mod lead;
pub mod sequence;
pub mod utils;
pub mod workflow;

pub use cycle::*;
pub use error::{FieldError, FlowError, Result, ResultExt};
pub use goal::*;
pub use lead::*;
pub use sequence::*;
pub use utils::{
    ParseWithDefault, capitalize_first, enum_to_str, json_string, log_filter_warn,
};
pub use workflow::*;

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for lead IDs
///
/// Prevents accidental mixing of lead IDs with user or queue IDs at the CLI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeadId(String);

impl LeadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LeadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LeadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for LeadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod newtype_tests {
    use super::*;

    #[test]
    fn test_lead_id() {
        let id = LeadId::new("lead-123");
        assert_eq!(id.as_str(), "lead-123");
        assert_eq!(format!("{}", id), "lead-123");
        assert_eq!(LeadId::from("x").into_inner(), "x");
    }
}
