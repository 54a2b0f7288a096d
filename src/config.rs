//! @ai:module:intent Configuration structs for the evaluation harness
//! @ai:module:layer infrastructure
//! @ai:module:public_api HarnessConfig, ApiConfig, RetryConfig, PathConfig, GoogleConfig
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// @ai:intent Main configuration for the harness
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

/// @ai:intent Provider endpoints and generation parameters
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    /// Claude-like batch lines: total token cap
    #[serde(default = "default_batch_max_tokens")]
    pub batch_max_tokens: u32,
    /// Claude-like batch lines: extended thinking budget
    #[serde(default = "default_batch_thinking_budget")]
    pub batch_thinking_budget: u32,
    /// Interactive Claude calls with extended thinking
    #[serde(default = "default_interactive_max_tokens")]
    pub interactive_max_tokens: u32,
    #[serde(default = "default_interactive_thinking_budget")]
    pub interactive_thinking_budget: u32,
    /// Model that grades step-cloze answers
    #[serde(default = "default_critic_model")]
    pub critic_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// @ai:intent Bounded retry settings for interactive calls
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_errors: u32,
    #[serde(default = "default_max_attempts")]
    pub max_unresponsive: u32,
    #[serde(default = "default_max_attempts")]
    pub max_clarifications: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

/// @ai:intent Path configuration for dataset, batch files and logs
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub strategies_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub freeform_dir: PathBuf,
    pub results_dir: PathBuf,
    pub call_log: PathBuf,
    pub freeform_rubric: PathBuf,
    pub step_grading_prompt: PathBuf,
}

/// @ai:intent Google Cloud settings for Gemini-like batch jobs
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_google_project")]
    pub project: String,
    /// Falls back to GOOGLE_LOCATION
    #[serde(default)]
    pub location: Option<String>,
    /// Falls back to GOOGLE_BUCKET
    #[serde(default)]
    pub bucket: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            batch_max_tokens: default_batch_max_tokens(),
            batch_thinking_budget: default_batch_thinking_budget(),
            interactive_max_tokens: default_interactive_max_tokens(),
            interactive_thinking_budget: default_interactive_thinking_budget(),
            critic_model: default_critic_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_attempts(),
            max_unresponsive: default_max_attempts(),
            max_clarifications: default_max_attempts(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            strategies_dir: PathBuf::from("Strategies"),
            uploads_dir: PathBuf::from("Batch_Uploads"),
            downloads_dir: PathBuf::from("Batch_Downloads"),
            freeform_dir: PathBuf::from("FreeformOutputsGraded"),
            results_dir: PathBuf::from("results"),
            call_log: PathBuf::from("calls.LOG"),
            freeform_rubric: PathBuf::from("freeform_grade_rubric.txt"),
            step_grading_prompt: PathBuf::from("few_shot_step_grading.txt"),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            project: default_google_project(),
            location: None,
            bucket: None,
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_batch_max_tokens() -> u32 {
    16000
}

fn default_batch_thinking_budget() -> u32 {
    8000
}

fn default_interactive_max_tokens() -> u32 {
    32000
}

fn default_interactive_thinking_budget() -> u32 {
    16000
}

fn default_critic_model() -> String {
    "o3-2025-04-16".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_google_project() -> String {
    "sheltercheck".to_string()
}

impl HarnessConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl RetryConfig {
    /// @ai:intent Fixed back-off between failed provider calls
    /// @ai:effects pure
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl GoogleConfig {
    /// @ai:intent Resolve the Vertex AI location from config or environment
    /// @ai:effects env
    pub fn resolved_location(&self) -> crate::error::Result<String> {
        self.location
            .clone()
            .or_else(|| std::env::var("GOOGLE_LOCATION").ok())
            .ok_or_else(|| crate::error::Error::Config("GOOGLE_LOCATION".to_string()))
    }

    /// @ai:intent Resolve the staging bucket from config or environment
    /// @ai:effects env
    pub fn resolved_bucket(&self) -> crate::error::Result<String> {
        self.bucket
            .clone()
            .or_else(|| std::env::var("GOOGLE_BUCKET").ok())
            .ok_or_else(|| crate::error::Error::Config("GOOGLE_BUCKET".to_string()))
    }
}
