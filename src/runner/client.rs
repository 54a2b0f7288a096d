//! @ai:module:intent Interactive (non-batch) chat clients for OpenAI-like and Claude-like models
//! @ai:module:layer infrastructure
//! @ai:module:public_api ChatClientTrait, ChatResponse, OpenAiChatClient, AnthropicChatClient, AnyChatClient, MockChatClient, MockReply
//! @ai:module:stateless false

use crate::batch::anthropic::{MessageResponse, Thinking, ANTHROPIC_VERSION};
use crate::batch::openai::ChatCompletion;
use crate::batch::transport::{api_key, ensure_success};
use crate::batch::types::{ChatMessage, TokenUsage, Turn};
use crate::batch::ProviderFamily;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// @ai:intent Trait for a single synchronous-looking chat call
#[allow(async_fn_in_trait)]
pub trait ChatClientTrait: Send + Sync {
    /// @ai:intent Send a conversation and return the assistant's text
    async fn send_messages(&self, turns: &[Turn]) -> Result<ChatResponse>;
}

/// @ai:intent Answer of an interactive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    seed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

/// @ai:intent Chat Completions client
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// @ai:intent Create a client for an OpenAI-like model
    /// @ai:pre OPENAI_API_KEY environment variable is set
    /// @ai:effects env
    pub fn new(model: &str, config: &ApiConfig) -> Result<Self> {
        // gpt-4 answers fast; reasoning models need minutes
        let timeout = if model.starts_with("gpt-4") { 60 } else { 240 };

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: api_key("OPENAI_API_KEY")?,
            model: model.to_string(),
        })
    }

    fn request<'a>(&'a self, turns: &[Turn]) -> CompletionRequest<'a> {
        let messages = turns.iter().map(ChatMessage::from_turn).collect();

        if self.model.starts_with("o1") {
            // o1 takes neither temperature nor reasoning_effort
            CompletionRequest {
                model: &self.model,
                messages,
                seed: 42,
                temperature: None,
                max_tokens: None,
                reasoning_effort: None,
            }
        } else if self.model.starts_with("gpt-4") {
            CompletionRequest {
                model: &self.model,
                messages,
                seed: 42,
                temperature: Some(0.0),
                max_tokens: Some(4095),
                reasoning_effort: None,
            }
        } else {
            CompletionRequest {
                model: &self.model,
                messages,
                seed: 42,
                temperature: None,
                max_tokens: None,
                reasoning_effort: Some("high"),
            }
        }
    }
}

impl ChatClientTrait for OpenAiChatClient {
    async fn send_messages(&self, turns: &[Turn]) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(turns))
            .send()
            .await?;

        let completion: ChatCompletion = ensure_success("OpenAI", response).await?.json().await?;
        let content = completion
            .single_answer()
            .map_err(|msg| Error::malformed("OpenAI", 0, msg))?;
        let usage = completion.usage.to_usage();

        debug!(
            input_tokens = usage.input_tokens,
            reasoning_tokens = usage.reasoning_tokens,
            output_tokens = usage.output_tokens,
            "OpenAI call finished"
        );
        Ok(ChatResponse { content, usage })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
    messages: Vec<ChatMessage>,
}

/// @ai:intent Messages API client, with extended thinking for Claude 4 models
pub struct AnthropicChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    thinking_budget: u32,
}

impl AnthropicChatClient {
    /// @ai:intent Create a client for a Claude-like model
    /// @ai:pre ANTHROPIC_API_KEY environment variable is set
    /// @ai:effects env
    pub fn new(model: &str, config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()?,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            api_key: api_key("ANTHROPIC_API_KEY")?,
            model: model.to_string(),
            max_tokens: config.interactive_max_tokens,
            thinking_budget: config.interactive_thinking_budget,
        })
    }

    fn request<'a>(&'a self, turns: &[Turn]) -> MessagesRequest<'a> {
        let messages = turns.iter().map(ChatMessage::from_turn).collect();

        // thinking excludes temperature, so claude-3 is the only deterministic profile
        if self.model.starts_with("claude-3") {
            MessagesRequest {
                model: &self.model,
                max_tokens: 4095,
                temperature: Some(0.0),
                thinking: None,
                messages,
            }
        } else {
            MessagesRequest {
                model: &self.model,
                max_tokens: self.max_tokens,
                temperature: None,
                thinking: Some(Thinking::enabled(self.thinking_budget)),
                messages,
            }
        }
    }
}

impl ChatClientTrait for AnthropicChatClient {
    async fn send_messages(&self, turns: &[Turn]) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.request(turns))
            .send()
            .await?;

        let message: MessageResponse = ensure_success("Anthropic", response).await?.json().await?;
        let content = message
            .single_text()
            .map_err(|msg| Error::malformed("Anthropic", 0, msg))?;
        let usage = message.to_usage();

        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Anthropic call finished"
        );
        Ok(ChatResponse { content, usage })
    }
}

/// @ai:intent Interactive client picked from the model name
pub enum AnyChatClient {
    OpenAi(OpenAiChatClient),
    Anthropic(AnthropicChatClient),
}

impl AnyChatClient {
    /// @ai:intent Build the interactive client for a model
    /// @ai:post Err(UnsupportedModel) for Gemini-like models, which only run as batches
    /// @ai:post o1 models are interactive-only and use the OpenAI client
    /// @ai:effects env
    pub fn for_model(model: &str, config: &ApiConfig) -> Result<Self> {
        if model.starts_with("o1") {
            return Ok(AnyChatClient::OpenAi(OpenAiChatClient::new(model, config)?));
        }

        match ProviderFamily::from_model(model)? {
            ProviderFamily::OpenAi => {
                Ok(AnyChatClient::OpenAi(OpenAiChatClient::new(model, config)?))
            }
            ProviderFamily::Anthropic => Ok(AnyChatClient::Anthropic(AnthropicChatClient::new(
                model, config,
            )?)),
            ProviderFamily::Gemini => Err(Error::UnsupportedModel(format!(
                "{} (interactive calls are not supported, use a batch)",
                model
            ))),
        }
    }
}

impl ChatClientTrait for AnyChatClient {
    async fn send_messages(&self, turns: &[Turn]) -> Result<ChatResponse> {
        match self {
            AnyChatClient::OpenAi(client) => client.send_messages(turns).await,
            AnyChatClient::Anthropic(client) => client.send_messages(turns).await,
        }
    }
}

/// @ai:intent One scripted reply of the mock client
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

/// @ai:intent Mock client replaying a script and recording every conversation it receives
#[derive(Default)]
pub struct MockChatClient {
    script: Mutex<VecDeque<MockReply>>,
    received: Mutex<Vec<Vec<Turn>>>,
}

impl MockChatClient {
    /// @ai:intent Create a mock that answers with the given texts in order
    /// @ai:effects pure
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(texts.into_iter().map(|t| MockReply::Text(t.into())))
    }

    /// @ai:intent Create a mock from a mixed script of texts and failures
    /// @ai:effects pure
    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// @ai:intent Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// @ai:intent Conversations received, in call order
    pub fn received(&self) -> Vec<Vec<Turn>> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ChatClientTrait for MockChatClient {
    async fn send_messages(&self, turns: &[Turn]) -> Result<ChatResponse> {
        if let Ok(mut received) = self.received.lock() {
            received.push(turns.to_vec());
        }

        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .ok_or_else(|| Error::Config("mock chat script exhausted".to_string()))?;

        match reply {
            MockReply::Text(content) => Ok(ChatResponse {
                content,
                usage: TokenUsage {
                    input_tokens: 100,
                    reasoning_tokens: 0,
                    output_tokens: 20,
                },
            }),
            MockReply::Fail(body) => Err(Error::Api {
                provider: "Mock",
                status: 500,
                body,
            }),
        }
    }
}
