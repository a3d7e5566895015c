//! OpenAI-compatible router
//!
//! Chat Completions over `reqwest`. Rate limits, server errors and transport
//! failures are retried with exponential backoff; other failures surface
//! immediately as `AI_ERROR`.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{AiResponse, AiRouter, GenerationConfig, TaskType};
use crate::config::AiConfig;
use crate::constants::{ai as ai_constants, network as net_constants};
use crate::types::{FlowError, Result};

/// OpenAI router with secure API key handling
pub struct OpenAiRouter {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiRouter")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiRouter {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                FlowError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or ai.api_key in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| ai_constants::DEFAULT_API_BASE.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| FlowError::Ai(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: net_constants::MAX_NETWORK_RETRIES,
            client,
        })
    }

    fn build_request(
        &self,
        task_type: TaskType,
        user_payload: &Value,
        config: Option<&GenerationConfig>,
    ) -> ChatCompletionRequest {
        let user_content = match serde_json::to_string_pretty(user_payload) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to pretty-print payload, using compact format: {}", e);
                user_payload.to_string()
            }
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: task_type.system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            temperature: config
                .and_then(|c| c.temperature)
                .unwrap_or(self.temperature),
            max_tokens: Some(config.and_then(|c| c.max_tokens).unwrap_or(self.max_tokens)),
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<ChatCompletionResponse, AttemptError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::transient(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("OpenAI API error ({}): {}", status, body);
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                AttemptError::transient(message)
            } else {
                AttemptError::permanent(message)
            });
        }

        response
            .json()
            .await
            .map_err(|e| AttemptError::permanent(format!("Failed to parse OpenAI response: {}", e)))
    }
}

#[async_trait]
impl AiRouter for OpenAiRouter {
    async fn generate(
        &self,
        task_type: TaskType,
        user_payload: &Value,
        config: Option<&GenerationConfig>,
    ) -> Result<AiResponse> {
        info!("Generating {} with OpenAI (model: {})", task_type, self.model);

        let start_time = Instant::now();
        let request = self.build_request(task_type, user_payload, config);
        let url = format!("{}/chat/completions", self.api_base);

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(net_constants::BASE_DELAY_MS))
            .with_max_delay(Duration::from_secs(net_constants::MAX_DELAY_SECS))
            .with_max_times(self.max_retries);

        let body = (|| self.send_once(&url, &request))
            .retry(backoff)
            .when(|e: &AttemptError| e.retryable)
            .notify(|e: &AttemptError, delay: Duration| {
                warn!("{}; retrying in {:?}", e.message, delay);
            })
            .await
            .map_err(|e| FlowError::Ai(e.message))?;

        debug!("OpenAI responded in {:?}", start_time.elapsed());

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FlowError::Ai("No content in OpenAI response".to_string()))?;

        Ok(AiResponse {
            content: content.to_string(),
            model: body.model.unwrap_or_else(|| self.model.clone()),
            prompt_version: ai_constants::PROMPT_VERSION.to_string(),
            tokens_used: body.usage.map(|u| u.total_tokens).unwrap_or_default(),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

struct AttemptError {
    message: String,
    retryable: bool,
}

impl AttemptError {
    fn transient(message: String) -> Self {
        Self {
            message,
            retryable: true,
        }
    }

    fn permanent(message: String) -> Self {
        Self {
            message,
            retryable: false,
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> OpenAiRouter {
        OpenAiRouter::new(&AiConfig {
            provider: "openai".into(),
            api_key: Some("sk-test-secret".into()),
            api_base: Some("http://localhost:9/v1/".into()),
            ..AiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", router());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-test-secret"));
    }

    #[test]
    fn test_request_uses_task_prompt_and_overrides() {
        let r = router();
        assert_eq!(r.api_base, "http://localhost:9/v1");

        let payload = serde_json::json!({"first_name": "Anna"});
        let overrides = GenerationConfig {
            temperature: Some(0.2),
            max_tokens: None,
        };
        let req = r.build_request(TaskType::FollowupGeneration, &payload, Some(&overrides));
        assert_eq!(req.messages[0].content, TaskType::FollowupGeneration.system_prompt());
        assert!(req.messages[1].content.contains("Anna"));
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.max_tokens, Some(ai_constants::DEFAULT_MAX_TOKENS));
    }

    #[test]
    fn test_response_parsing() {
        let body: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"content": "Hi Anna!"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();
        assert_eq!(body.usage.unwrap().total_tokens, 15);
        assert_eq!(body.choices[0].message.content.as_deref(), Some("Hi Anna!"));
    }
}
