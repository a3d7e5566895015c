//! AI Drafting Layer
//!
//! Opaque text generation behind the [`AiRouter`] port. The engines only
//! depend on the contract `generate(task_type, user_payload, config?)`;
//! the OpenAI-compatible router is the one shipped implementation.

pub mod openai;
pub mod timeout;

pub use openai::OpenAiRouter;
pub use timeout::with_timeout;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::AiConfig;
use crate::types::{FlowError, Result};

/// Closed set of generation tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    FollowupGeneration,
    MessageRewrite,
    ReplyClassification,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FollowupGeneration => "FOLLOWUP_GENERATION",
            Self::MessageRewrite => "MESSAGE_REWRITE",
            Self::ReplyClassification => "REPLY_CLASSIFICATION",
        }
    }

    pub(crate) fn system_prompt(&self) -> &'static str {
        match self {
            Self::FollowupGeneration => {
                "You write short follow-up messages for sales leads. \
                 Use the JSON context you are given. Reply with the message text only."
            }
            Self::MessageRewrite => {
                "Rewrite the given message for the given channel. Reply with the message text only."
            }
            Self::ReplyClassification => {
                "Classify the lead reply as positive, negative or neutral. Reply with one word."
            }
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-call overrides of the router defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub content: String,
    pub model: String,
    pub prompt_version: String,
    pub tokens_used: u32,
}

#[async_trait]
pub trait AiRouter: Send + Sync {
    async fn generate(
        &self,
        task_type: TaskType,
        user_payload: &serde_json::Value,
        config: Option<&GenerationConfig>,
    ) -> Result<AiResponse>;

    fn name(&self) -> &str;
}

pub type SharedRouter = Arc<dyn AiRouter>;

/// Router for the configured provider; `None` when drafting is disabled
pub fn build_router(config: &AiConfig) -> Result<Option<SharedRouter>> {
    if !config.is_enabled() {
        debug!("AI drafting disabled");
        return Ok(None);
    }
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Some(Arc::new(OpenAiRouter::new(config)?))),
        other => Err(FlowError::Config(format!(
            "Unknown AI provider '{}'. Supported: none, openai",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_wire_names() {
        let json = serde_json::to_string(&TaskType::FollowupGeneration).unwrap();
        assert_eq!(json, "\"FOLLOWUP_GENERATION\"");
        assert_eq!(TaskType::ReplyClassification.to_string(), "REPLY_CLASSIFICATION");
    }

    #[test]
    fn test_build_router_disabled() {
        assert!(build_router(&AiConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_build_router_unknown_provider() {
        let config = AiConfig {
            provider: "mystery".into(),
            ..AiConfig::default()
        };
        let err = build_router(&config).err().unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
