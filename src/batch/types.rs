//! @ai:module:intent Provider-neutral batch data model
//! @ai:module:layer domain
//! @ai:module:public_api Role, Turn, BatchItem, ResponseItem, TokenUsage, BatchJob, RetrievedBatch
//! @ai:module:stateless true

use crate::batch::provider::ProviderFamily;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// @ai:intent Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// @ai:intent Role label shared by the OpenAI-like and Claude-like wire formats
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// @ai:intent Parse a wire role label; `assistant_label` is "assistant" or Gemini's "model"
    /// @ai:post Err(UnsupportedConversation) for any other label
    /// @ai:effects pure
    pub fn from_label(label: &str, assistant_label: &str, identifier: &str) -> Result<Self> {
        if label == "user" {
            Ok(Role::User)
        } else if label == assistant_label {
            Ok(Role::Assistant)
        } else {
            Err(Error::UnsupportedConversation {
                identifier: identifier.to_string(),
                reason: format!("unknown role {:?}", label),
            })
        }
    }
}

/// `{role, content}` message spoken by the OpenAI-like and Claude-like formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub(crate) fn from_turn(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.text.clone(),
        }
    }

    pub(crate) fn into_turn(self, identifier: &str) -> Result<Turn> {
        Ok(Turn {
            role: Role::from_label(&self.role, "assistant", identifier)?,
            text: self.content,
        })
    }
}

/// @ai:intent A single turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// @ai:intent One prompt in a batch, tagged with a caller-supplied identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub identifier: String,
    pub conversation: Vec<Turn>,
}

impl BatchItem {
    /// @ai:intent Single user turn item
    /// @ai:effects pure
    pub fn single(identifier: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            conversation: vec![Turn::user(prompt)],
        }
    }

    /// @ai:intent Three-turn item re-asking a question after the model's first answer
    /// @ai:effects pure
    pub fn follow_up(
        identifier: impl Into<String>,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        follow_up: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            conversation: vec![
                Turn::user(prompt),
                Turn::assistant(answer),
                Turn::user(follow_up),
            ],
        }
    }

    /// @ai:intent First user turn of the conversation
    /// @ai:effects pure
    pub fn primary_prompt(&self) -> Option<&str> {
        self.conversation
            .first()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }

    /// @ai:intent Check the conversation is one user turn or user/assistant/user
    /// @ai:effects pure
    pub fn validate_shape(&self) -> Result<()> {
        let roles: Vec<Role> = self.conversation.iter().map(|t| t.role).collect();

        match roles.as_slice() {
            [Role::User] | [Role::User, Role::Assistant, Role::User] => Ok(()),
            _ => Err(Error::UnsupportedConversation {
                identifier: self.identifier.clone(),
                reason: format!(
                    "expected one user turn or user/assistant/user, got {:?}",
                    roles
                ),
            }),
        }
    }
}

/// @ai:intent Reject duplicate identifiers and unsupported conversation shapes
/// @ai:post Ok only if every item may be serialized into the same batch
/// @ai:effects pure
pub fn validate_items(items: &[BatchItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());

    for item in items {
        if !seen.insert(item.identifier.as_str()) {
            return Err(Error::DuplicateIdentifier(item.identifier.clone()));
        }
        item.validate_shape()?;
    }

    Ok(())
}

/// @ai:intent Token counters reported by providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub reasoning_tokens: u64,
    pub output_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl std::iter::Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, u| {
            acc += u;
            acc
        })
    }
}

/// @ai:intent Normalized answer for one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    pub identifier: String,
    pub text: String,
    pub usage: TokenUsage,
}

/// @ai:intent A submitted, vendor-hosted batch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub provider: ProviderFamily,
    pub handle: String,
    pub submitted_at: DateTime<Utc>,
}

/// @ai:intent All responses of a finished batch plus summed usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedBatch {
    pub items: Vec<ResponseItem>,
    pub usage: TokenUsage,
    /// Request echoed back by providers that include it in results (Gemini-like)
    #[serde(default)]
    pub echoed_requests: Vec<BatchItem>,
}

impl RetrievedBatch {
    /// @ai:intent Check every response belongs to a submitted item
    /// @ai:effects pure
    pub fn cross_check(&self, submitted: &[BatchItem]) -> Result<()> {
        let known: HashSet<&str> = submitted.iter().map(|i| i.identifier.as_str()).collect();

        self.items
            .iter()
            .find(|item| !known.contains(item.identifier.as_str()))
            .map_or(Ok(()), |item| {
                Err(Error::UnknownIdentifier(item.identifier.clone()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::from_label("user", "assistant", "a").unwrap(), Role::User);
        assert_eq!(Role::from_label("model", "model", "a").unwrap(), Role::Assistant);
        assert!(matches!(
            Role::from_label("model", "assistant", "a"),
            Err(Error::UnsupportedConversation { .. })
        ));

        let turn = ChatMessage::from_turn(&Turn::user("q")).into_turn("a").unwrap();
        assert_eq!(turn, Turn::user("q"));
        let system = ChatMessage {
            role: "system".to_string(),
            content: "x".to_string(),
        };
        assert!(system.into_turn("a").is_err());
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let items = vec![
            BatchItem::single("Strategy_1_Goal_1", "a"),
            BatchItem::single("Strategy_1_Goal_1", "b"),
        ];
        let err = validate_items(&items).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentifier(id) if id == "Strategy_1_Goal_1"));
    }

    #[test]
    fn test_two_turn_conversation_rejected() {
        let item = BatchItem {
            identifier: "x".to_string(),
            conversation: vec![Turn::user("q"), Turn::assistant("a")],
        };
        assert!(matches!(
            item.validate_shape(),
            Err(Error::UnsupportedConversation { .. })
        ));
    }

    #[test]
    fn test_follow_up_shape_accepted() {
        let item = BatchItem::follow_up("x", "q", "a", "So?");
        assert!(item.validate_shape().is_ok());
        assert_eq!(item.primary_prompt(), Some("q"));
    }

    #[test]
    fn test_usage_sum() {
        let total: TokenUsage = vec![
            TokenUsage {
                input_tokens: 10,
                reasoning_tokens: 2,
                output_tokens: 5,
            },
            TokenUsage {
                input_tokens: 1,
                reasoning_tokens: 0,
                output_tokens: 1,
            },
        ]
        .into_iter()
        .sum();
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.reasoning_tokens, 2);
        assert_eq!(total.output_tokens, 6);
    }

    #[test]
    fn test_cross_check_flags_unknown_identifier() {
        let submitted = vec![BatchItem::single("a", "q")];
        let retrieved = RetrievedBatch {
            items: vec![ResponseItem {
                identifier: "b".to_string(),
                text: "Yes".to_string(),
                usage: TokenUsage::default(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            retrieved.cross_check(&submitted),
            Err(Error::UnknownIdentifier(id)) if id == "b"
        ));
    }
}
