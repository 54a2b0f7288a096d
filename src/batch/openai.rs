//! @ai:module:intent OpenAI-like batch lines, result parsing and the Files/Batches transport
//! @ai:module:layer infrastructure
//! @ai:module:public_api OpenAiCodec, OpenAiBatch
//! @ai:module:stateless false

use crate::batch::provider::{BatchCodec, LineOptions, ParsedLine};
use crate::batch::transport::{api_key, ensure_success, http_client, BatchTransport};
use crate::batch::types::{BatchItem, ChatMessage, ResponseItem, TokenUsage};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const PROVIDER: &str = "OpenAI";
const CHAT_COMPLETIONS: &str = "/v1/chat/completions";

#[derive(Debug, Serialize, Deserialize)]
struct RequestLine {
    custom_id: String,
    method: String,
    url: String,
    body: RequestBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    reasoning_effort: String,
}

#[derive(Debug, Deserialize)]
struct ResultLine {
    custom_id: String,
    #[serde(default)]
    response: Option<ResultResponse>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    body: ChatCompletion,
}

/// Body of a chat completion, shared with the interactive client
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    pub choices: Vec<Choice>,
    pub usage: CompletionUsage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u64,
}

impl CompletionUsage {
    pub(crate) fn to_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.prompt_tokens,
            reasoning_tokens: self
                .completion_tokens_details
                .as_ref()
                .map_or(0, |d| d.reasoning_tokens),
            output_tokens: self.completion_tokens,
        }
    }
}

impl ChatCompletion {
    /// @ai:intent Single assistant answer of the completion
    /// @ai:pre exactly one choice whose role is assistant
    /// @ai:effects pure
    pub(crate) fn single_answer(&self) -> std::result::Result<String, String> {
        if self.choices.len() != 1 {
            return Err(format!("expected 1 choice, got {}", self.choices.len()));
        }

        let message = &self.choices[0].message;
        if message.role != "assistant" {
            return Err(format!("expected assistant role, got {:?}", message.role));
        }

        message
            .content
            .clone()
            .ok_or_else(|| "assistant message has no content".to_string())
    }
}

/// @ai:intent Codec for `{custom_id, method, url, body}` chat-completion batch lines
pub struct OpenAiCodec;

impl BatchCodec for OpenAiCodec {
    fn serialize_line(&self, item: &BatchItem, options: &LineOptions) -> Result<String> {
        let line = RequestLine {
            custom_id: item.identifier.clone(),
            method: "POST".to_string(),
            url: CHAT_COMPLETIONS.to_string(),
            body: RequestBody {
                model: options.model.clone(),
                messages: item.conversation.iter().map(ChatMessage::from_turn).collect(),
                reasoning_effort: "high".to_string(),
            },
        };

        Ok(serde_json::to_string(&line)?)
    }

    fn parse_request_line(&self, line: &str) -> Result<BatchItem> {
        let parsed: RequestLine = serde_json::from_str(line)?;

        let conversation = parsed
            .body
            .messages
            .into_iter()
            .map(|m| m.into_turn(&parsed.custom_id))
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchItem {
            identifier: parsed.custom_id,
            conversation,
        })
    }

    fn parse_result_line(&self, line_no: usize, line: &str) -> Result<ParsedLine> {
        let parsed: ResultLine = serde_json::from_str(line)
            .map_err(|e| Error::malformed(PROVIDER, line_no, e.to_string()))?;

        if let Some(error) = parsed.error.filter(|e| !e.is_null()) {
            return Err(Error::malformed(
                PROVIDER,
                line_no,
                format!("{}: request failed: {}", parsed.custom_id, error),
            ));
        }

        let body = parsed
            .response
            .ok_or_else(|| Error::malformed(PROVIDER, line_no, "missing response"))?
            .body;

        let text = body
            .single_answer()
            .map_err(|msg| Error::malformed(PROVIDER, line_no, msg))?;

        Ok(ParsedLine {
            response: ResponseItem {
                identifier: parsed.custom_id,
                text,
                usage: body.usage.to_usage(),
            },
            echoed_request: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
}

/// @ai:intent Files + Batches API transport
pub struct OpenAiBatch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBatch {
    /// @ai:intent Create a transport from config and OPENAI_API_KEY
    /// @ai:pre OPENAI_API_KEY environment variable is set
    /// @ai:effects env
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self::with_api_key(
            config,
            api_key("OPENAI_API_KEY")?,
            http_client(config.request_timeout_secs)?,
        ))
    }

    /// @ai:intent Create a transport with an explicit key and HTTP client
    /// @ai:effects pure
    pub fn with_api_key(config: &ApiConfig, api_key: String, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl BatchTransport for OpenAiBatch {
    async fn submit(&self, path: &Path, _model: &str) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "batch.jsonl".to_string());

        let form = reqwest::multipart::Form::new()
            .text("purpose", "batch")
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = self
            .client
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let file: FileObject = ensure_success(PROVIDER, response).await?.json().await?;

        let response = self
            .client
            .post(format!("{}/v1/batches", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CreateBatchRequest {
                input_file_id: &file.id,
                endpoint: CHAT_COMPLETIONS,
                completion_window: "24h",
            })
            .send()
            .await?;
        let batch: BatchObject = ensure_success(PROVIDER, response).await?.json().await?;

        info!(file_id = %file.id, batch_id = %batch.id, "Submitted OpenAI batch");
        Ok(batch.id)
    }

    async fn fetch_results(&self, handle: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/v1/batches/{}", self.base_url, handle))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let batch: BatchObject = ensure_success(PROVIDER, response).await?.json().await?;

        let output_file_id = batch.output_file_id.ok_or_else(|| Error::BatchNotReady {
            handle: handle.to_string(),
            status: batch.status.clone(),
        })?;

        let response = self
            .client
            .get(format!(
                "{}/v1/files/{}/content",
                self.base_url, output_file_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(ensure_success(PROVIDER, response).await?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> LineOptions {
        LineOptions {
            model: "o3-2025-04-16".to_string(),
            max_tokens: 16000,
            thinking_budget: 8000,
        }
    }

    #[test]
    fn test_serialize_line_shape() {
        let item = BatchItem::single("Strategy_1_Goal_1", "Is it viable?");
        let line = OpenAiCodec.serialize_line(&item, &options()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "custom_id": "Strategy_1_Goal_1",
                "method": "POST",
                "url": "/v1/chat/completions",
                "body": {
                    "model": "o3-2025-04-16",
                    "messages": [{"role": "user", "content": "Is it viable?"}],
                    "reasoning_effort": "high"
                }
            })
        );
    }

    #[test]
    fn test_request_line_reads_back_three_turns() {
        let item = BatchItem::follow_up("id", "q", "maybe", "So the answer is:");
        let line = OpenAiCodec.serialize_line(&item, &options()).unwrap();
        assert_eq!(OpenAiCodec.parse_request_line(&line).unwrap(), item);
    }

    #[test]
    fn test_parse_result_with_reasoning_tokens() {
        let line = r#"{"id":"batch_req_1","custom_id":"Strategy_1_Goal_1","response":{"status_code":200,"body":{"choices":[{"index":0,"message":{"role":"assistant","content":"Yes."}}],"usage":{"prompt_tokens":120,"completion_tokens":40,"completion_tokens_details":{"reasoning_tokens":32}}}},"error":null}"#;
        let parsed = OpenAiCodec.parse_result_line(1, line).unwrap();

        assert_eq!(parsed.response.identifier, "Strategy_1_Goal_1");
        assert_eq!(parsed.response.text, "Yes.");
        assert_eq!(
            parsed.response.usage,
            TokenUsage {
                input_tokens: 120,
                reasoning_tokens: 32,
                output_tokens: 40
            }
        );
        assert!(parsed.echoed_request.is_none());
    }

    #[test]
    fn test_parse_result_rejects_error_and_multiple_choices() {
        let errored = r#"{"custom_id":"a","response":null,"error":{"code":"server_error"}}"#;
        assert!(matches!(
            OpenAiCodec.parse_result_line(3, errored),
            Err(Error::MalformedResponse { line: 3, .. })
        ));

        let two_choices = r#"{"custom_id":"a","response":{"body":{"choices":[{"message":{"role":"assistant","content":"x"}},{"message":{"role":"assistant","content":"y"}}],"usage":{"prompt_tokens":1,"completion_tokens":1}}},"error":null}"#;
        assert!(OpenAiCodec.parse_result_line(1, two_choices).is_err());

        let wrong_role = r#"{"custom_id":"a","response":{"body":{"choices":[{"message":{"role":"user","content":"x"}}],"usage":{"prompt_tokens":1,"completion_tokens":1}}},"error":null}"#;
        assert!(OpenAiCodec.parse_result_line(1, wrong_role).is_err());
    }
}
