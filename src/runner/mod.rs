//! @ai:module:intent Interactive model calls: clients, bounded retry and the Yes/No Clarifier
//! @ai:module:layer application
//! @ai:module:public_api ChatClientTrait, AnyChatClient, MockChatClient, YesNoClarifier, Answer, Verdict, RetryPolicy

pub mod clarifier;
pub mod client;
pub mod retry;

pub use clarifier::{
    classify_first_answer, classify_followup_answer, Answer, Verdict, YesNoClarifier,
    FOLLOW_UP_PROMPT,
};
pub use client::{
    AnthropicChatClient, AnyChatClient, ChatClientTrait, ChatResponse, MockChatClient, MockReply,
    OpenAiChatClient,
};
pub use retry::{call_with_retry, is_unresponsive, RetryPolicy};
