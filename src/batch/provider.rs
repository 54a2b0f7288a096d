//! @ai:module:intent Provider family detection and the per-family wire codec seam
//! @ai:module:layer domain
//! @ai:module:public_api ProviderFamily, LineOptions, ParsedLine, BatchCodec
//! @ai:module:stateless true

use crate::batch::anthropic::AnthropicCodec;
use crate::batch::gemini::GeminiCodec;
use crate::batch::openai::OpenAiCodec;
use crate::batch::types::{BatchItem, ResponseItem};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// @ai:intent Vendor family whose batch wire format a model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderFamily {
    /// @ai:intent Detect the provider family from the model name prefix
    /// @ai:post Err(UnsupportedModel) for names outside the three families
    /// @ai:effects pure
    pub fn from_model(model: &str) -> Result<Self> {
        if model.starts_with("gpt-") || model.starts_with("o3") {
            Ok(ProviderFamily::OpenAi)
        } else if model.starts_with("claude-sonnet-4")
            || model.starts_with("claude-opus-4")
            || model.starts_with("claude-3")
        {
            Ok(ProviderFamily::Anthropic)
        } else if model.starts_with("gemini") {
            Ok(ProviderFamily::Gemini)
        } else {
            Err(Error::UnsupportedModel(model.to_string()))
        }
    }

    /// @ai:intent Wire codec for this family
    /// @ai:effects pure
    pub fn codec(&self) -> &'static dyn BatchCodec {
        match self {
            ProviderFamily::OpenAi => &OpenAiCodec,
            ProviderFamily::Anthropic => &AnthropicCodec,
            ProviderFamily::Gemini => &GeminiCodec,
        }
    }

    /// @ai:intent Human-readable provider name for errors and logs
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "OpenAI",
            ProviderFamily::Anthropic => "Anthropic",
            ProviderFamily::Gemini => "Gemini",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @ai:intent Per-line generation settings that go into every request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOptions {
    pub model: String,
    pub max_tokens: u32,
    pub thinking_budget: u32,
}

impl LineOptions {
    /// @ai:intent Batch line settings for a model using the configured token limits
    /// @ai:effects pure
    pub fn for_model(model: impl Into<String>, api: &ApiConfig) -> Self {
        Self {
            model: model.into(),
            max_tokens: api.batch_max_tokens,
            thinking_budget: api.batch_thinking_budget,
        }
    }
}

/// @ai:intent One parsed result line, with the request when the provider echoes it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub response: ResponseItem,
    pub echoed_request: Option<BatchItem>,
}

/// @ai:intent Translate between neutral batch items and one provider's JSONL lines
/// @ai:effects pure
pub trait BatchCodec: Send + Sync {
    /// @ai:intent Encode one item as a single JSON line (no trailing newline)
    /// @ai:pre item passed validate_shape
    fn serialize_line(&self, item: &BatchItem, options: &LineOptions) -> Result<String>;

    /// @ai:intent Decode a line previously written by serialize_line
    fn parse_request_line(&self, line: &str) -> Result<BatchItem>;

    /// @ai:intent Decode one result line and enforce the provider's response invariants
    /// @ai:pre line_no is 1-based and only used for error reporting
    fn parse_result_line(&self, line_no: usize, line: &str) -> Result<ParsedLine>;
}
