//! @ai:module:intent Claude-like batch lines, result parsing and the Message Batches transport
//! @ai:module:layer infrastructure
//! @ai:module:public_api AnthropicCodec, AnthropicBatch
//! @ai:module:stateless false

use crate::batch::provider::{BatchCodec, LineOptions, ParsedLine};
use crate::batch::transport::{api_key, ensure_success, http_client, BatchTransport};
use crate::batch::types::{BatchItem, ChatMessage, ResponseItem, TokenUsage};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const PROVIDER: &str = "Anthropic";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Thinking {
    #[serde(rename = "type")]
    pub kind: String,
    pub budget_tokens: u32,
}

impl Thinking {
    pub(crate) fn enabled(budget_tokens: u32) -> Self {
        Self {
            kind: "enabled".to_string(),
            budget_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestLine {
    custom_id: String,
    params: Params,
}

#[derive(Debug, Serialize, Deserialize)]
struct Params {
    model: String,
    max_tokens: u32,
    thinking: Thinking,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ResultLine {
    custom_id: String,
    result: BatchResult,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<MessageResponse>,
}

/// Messages API response body, shared with the interactive client
#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub content: Vec<ContentBlock>,
    pub usage: MessageUsage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl MessageResponse {
    /// @ai:intent Text of the one `text` block, skipping thinking blocks
    /// @ai:pre exactly one text block
    /// @ai:effects pure
    pub(crate) fn single_text(&self) -> std::result::Result<String, String> {
        let texts: Vec<&ContentBlock> =
            self.content.iter().filter(|b| b.kind == "text").collect();

        match texts.as_slice() {
            [block] => block
                .text
                .clone()
                .ok_or_else(|| "text block has no text".to_string()),
            _ => Err(format!("expected 1 text block, got {}", texts.len())),
        }
    }

    pub(crate) fn to_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.usage.input_tokens,
            reasoning_tokens: 0,
            output_tokens: self.usage.output_tokens,
        }
    }
}

/// @ai:intent Codec for `{custom_id, params}` Message Batches lines
pub struct AnthropicCodec;

impl BatchCodec for AnthropicCodec {
    fn serialize_line(&self, item: &BatchItem, options: &LineOptions) -> Result<String> {
        let line = RequestLine {
            custom_id: item.identifier.clone(),
            params: Params {
                model: options.model.clone(),
                max_tokens: options.max_tokens,
                thinking: Thinking::enabled(options.thinking_budget),
                messages: item.conversation.iter().map(ChatMessage::from_turn).collect(),
            },
        };

        Ok(serde_json::to_string(&line)?)
    }

    fn parse_request_line(&self, line: &str) -> Result<BatchItem> {
        let parsed: RequestLine = serde_json::from_str(line)?;
        let identifier = parsed.custom_id;

        let conversation = parsed
            .params
            .messages
            .into_iter()
            .map(|m| m.into_turn(&identifier))
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchItem {
            identifier,
            conversation,
        })
    }

    fn parse_result_line(&self, line_no: usize, line: &str) -> Result<ParsedLine> {
        let parsed: ResultLine = serde_json::from_str(line)
            .map_err(|e| Error::malformed(PROVIDER, line_no, e.to_string()))?;

        if parsed.result.kind != "succeeded" {
            return Err(Error::malformed(
                PROVIDER,
                line_no,
                format!("{}: result type is {:?}", parsed.custom_id, parsed.result.kind),
            ));
        }

        let message = parsed
            .result
            .message
            .ok_or_else(|| Error::malformed(PROVIDER, line_no, "missing message"))?;

        let text = message
            .single_text()
            .map_err(|msg| Error::malformed(PROVIDER, line_no, msg))?;

        Ok(ParsedLine {
            response: ResponseItem {
                identifier: parsed.custom_id,
                text,
                usage: message.to_usage(),
            },
            echoed_request: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessageBatch {
    id: String,
    processing_status: String,
    #[serde(default)]
    results_url: Option<String>,
}

/// @ai:intent Message Batches API transport
pub struct AnthropicBatch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicBatch {
    /// @ai:intent Create a transport from config and ANTHROPIC_API_KEY
    /// @ai:pre ANTHROPIC_API_KEY environment variable is set
    /// @ai:effects env
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self::with_api_key(
            config,
            api_key("ANTHROPIC_API_KEY")?,
            http_client(config.request_timeout_secs)?,
        ))
    }

    /// @ai:intent Create a transport with an explicit key and HTTP client
    /// @ai:effects pure
    pub fn with_api_key(config: &ApiConfig, api_key: String, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

impl BatchTransport for AnthropicBatch {
    async fn submit(&self, path: &Path, _model: &str) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let requests = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<serde_json::Value>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let response = self
            .client
            .post(format!("{}/v1/messages/batches", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await?;
        let batch: MessageBatch = ensure_success(PROVIDER, response).await?.json().await?;

        info!(batch_id = %batch.id, requests = requests.len(), "Submitted Anthropic batch");
        Ok(batch.id)
    }

    async fn fetch_results(&self, handle: &str) -> Result<String> {
        let response = self
            .get(&format!("{}/v1/messages/batches/{}", self.base_url, handle))
            .send()
            .await?;
        let batch: MessageBatch = ensure_success(PROVIDER, response).await?.json().await?;

        let results_url = match (batch.processing_status.as_str(), batch.results_url) {
            ("ended", Some(url)) => url,
            (status, _) => {
                return Err(Error::BatchNotReady {
                    handle: handle.to_string(),
                    status: status.to_string(),
                })
            }
        };

        let response = self.get(&results_url).send().await?;
        Ok(ensure_success(PROVIDER, response).await?.text().await?)
    }
}
