//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/leadflow/) and project (.leadflow/) level configuration.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::{ai, followup, workflow};
use crate::types::{Channel, FlowError, Result, VerticalId};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Goal planner settings
    pub planner: PlannerConfig,

    /// Follow-up engine settings
    pub followup: FollowUpConfig,

    /// Work queue settings
    pub queue: QueueConfig,

    /// AI drafting settings
    pub ai: AiConfig,

    /// Persistence settings
    pub storage: StorageConfig,

    /// Outbound channel settings
    pub channels: ChannelsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            planner: PlannerConfig::default(),
            followup: FollowUpConfig::default(),
            queue: QueueConfig::default(),
            ai: AiConfig::default(),
            storage: StorageConfig::default(),
            channels: ChannelsConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `FlowError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        let f = &self.followup;

        if f.ghosting_days == 0 {
            return Err(FlowError::Config(
                "followup.ghosting_days must be greater than 0".to_string(),
            ));
        }

        if f.business_end_hour > 24 || f.business_start_hour >= f.business_end_hour {
            return Err(FlowError::Config(format!(
                "followup business window must satisfy start < end <= 24, got {}..{}",
                f.business_start_hour, f.business_end_hour
            )));
        }

        if f.business_days.is_empty() {
            return Err(FlowError::Config(
                "followup.business_days must name at least one weekday".to_string(),
            ));
        }

        if f.default_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(FlowError::Config(format!(
                "followup.default_timezone '{}' is not a known IANA zone",
                f.default_timezone
            )));
        }

        if f.concurrency == 0 {
            return Err(FlowError::Config(
                "followup.concurrency must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(FlowError::Config(format!(
                "AI temperature must be between 0.0 and 2.0, got {}",
                self.ai.temperature
            )));
        }

        if self.ai.timeout_secs == 0 {
            return Err(FlowError::Config(
                "AI timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.queue.default_limit == 0 {
            return Err(FlowError::Config(
                "queue.default_limit must be greater than 0".to_string(),
            ));
        }

        for (channel, endpoint) in &self.channels.webhooks {
            if url::Url::parse(endpoint).is_err() {
                return Err(FlowError::Config(format!(
                    "channels.webhooks.{} is not a valid URL: {}",
                    channel, endpoint
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Planner Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Vertical used when a goal names an unknown one
    pub default_vertical: VerticalId,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_vertical: VerticalId::NetworkMarketing,
        }
    }
}

// =============================================================================
// Follow-Up Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpConfig {
    /// Days without interaction before a sequence is ghosted
    pub ghosting_days: u32,

    /// Local business window start (inclusive hour)
    pub business_start_hour: u32,

    /// Local business window end (exclusive hour)
    pub business_end_hour: u32,

    /// Weekdays counted as business days
    pub business_days: Vec<Weekday>,

    /// Zone used for leads without (or with an unknown) timezone
    pub default_timezone: String,

    /// Interactions loaded per lead for condition checks
    pub recent_interactions_limit: usize,

    /// Leads evaluated concurrently by the today query
    pub concurrency: usize,

    /// Ask the AI router for a message draft with each suggestion
    pub generate_content: bool,

    /// Timeout for a single drafting call
    pub ai_timeout_secs: u64,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            ghosting_days: followup::DEFAULT_GHOSTING_DAYS,
            business_start_hour: followup::DEFAULT_BUSINESS_START_HOUR,
            business_end_hour: followup::DEFAULT_BUSINESS_END_HOUR,
            business_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            default_timezone: followup::DEFAULT_TIMEZONE.to_string(),
            recent_interactions_limit: followup::DEFAULT_RECENT_INTERACTIONS,
            concurrency: followup::DEFAULT_CONCURRENCY,
            generate_content: false,
            ai_timeout_secs: ai::DEFAULT_GENERATION_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Queue Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Items returned when the caller gives no limit
    pub default_limit: usize,

    /// Leads loaded per queue pass
    pub pass_limit: usize,

    /// Days since last contact after which a lead counts as gone cold
    pub cold_after_days: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_limit: workflow::DEFAULT_QUEUE_LIMIT,
            pass_limit: workflow::DEFAULT_PASS_LIMIT,
            cold_after_days: workflow::COLD_AFTER_DAYS,
        }
    }
}

// =============================================================================
// AI Configuration
// =============================================================================

/// AI drafting settings
///
/// The API key is never serialized and is redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider type: "openai" (any OpenAI-compatible endpoint) or "none"
    pub provider: String,

    /// Model name
    pub model: String,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// API key; falls back to OPENAI_API_KEY
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub temperature: f32,

    pub max_tokens: u32,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: ai::DEFAULT_MODEL.to_string(),
            api_base: None,
            api_key: None,
            timeout_secs: crate::constants::network::DEFAULT_TIMEOUT_SECS,
            temperature: ai::DEFAULT_TEMPERATURE,
            max_tokens: ai::DEFAULT_MAX_TOKENS,
        }
    }
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        !self.provider.eq_ignore_ascii_case("none") && !self.provider.is_empty()
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".leadflow/leadflow.db"),
        }
    }
}

// =============================================================================
// Channel Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Webhook endpoint per channel; channels without one only validate payloads
    pub webhooks: BTreeMap<String, String>,
}

impl ChannelsConfig {
    pub fn webhook_for(&self, channel: Channel) -> Option<&str> {
        self.webhooks.get(channel.as_str()).map(String::as_str)
    }
}

// =============================================================================
// Tests
// =============================================================================
