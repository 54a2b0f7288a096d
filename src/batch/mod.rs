//! @ai:module:intent Provider-normalized batch client for OpenAI-like, Claude-like and Gemini-like APIs
//! @ai:module:layer application
//! @ai:module:public_api BatchClient, BatchItem, ResponseItem, ProviderFamily, BatchCodec, BatchTransport

pub mod anthropic;
pub mod client;
pub mod followup;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod request;
pub mod transport;
pub mod types;

pub use client::BatchClient;
pub use followup::{build_follow_ups, original_prompts};
pub use provider::{BatchCodec, LineOptions, ParsedLine, ProviderFamily};
pub use request::{batch_file_path, test_name, validate_test_name, Postfix};
pub use transport::{AnyTransport, BatchTransport};
pub use types::{
    validate_items, BatchItem, BatchJob, ResponseItem, RetrievedBatch, Role, TokenUsage, Turn,
};
