//! @ai:module:intent Bounded retry around a single model call
//! @ai:module:layer application
//! @ai:module:public_api RetryPolicy, is_unresponsive, call_with_retry
//! @ai:module:stateless true

use crate::batch::types::Turn;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::runner::client::{ChatClientTrait, ChatResponse};
use std::time::Duration;
use tracing::warn;

const NONRESPONSE_TAGS: [&str; 4] = ["sorry", "can't assist", "cannot assist", "i apologize"];

/// @ai:intent Whether a response is a refusal or apology rather than an answer
/// @ai:effects pure
pub fn is_unresponsive(response: &str) -> bool {
    let lowered = response.to_lowercase();
    NONRESPONSE_TAGS.iter().any(|tag| lowered.contains(tag))
}

/// @ai:intent Limits for call_with_retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_errors: u32,
    pub max_unresponsive: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_errors: config.max_errors,
            max_unresponsive: config.max_unresponsive,
            delay: config.delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// @ai:intent Call the model, retrying provider errors and non-responsive answers separately
/// @ai:post Err(last error) after max_errors failures; Err(Unresponsive) after max_unresponsive refusals
/// @ai:effects network
pub async fn call_with_retry<C: ChatClientTrait>(
    client: &C,
    turns: &[Turn],
    policy: &RetryPolicy,
) -> Result<ChatResponse> {
    let mut errors = 0;
    let mut unresponsive = 0;

    loop {
        match client.send_messages(turns).await {
            Err(e) => {
                errors += 1;
                warn!(error = %e, attempt = errors, "Model call failed");
                if errors >= policy.max_errors {
                    return Err(e);
                }
                tokio::time::sleep(policy.delay).await;
            }
            Ok(response) if is_unresponsive(&response.content) => {
                unresponsive += 1;
                warn!(
                    attempt = unresponsive,
                    response = %response.content,
                    "Retrying non-responsive answer"
                );
                if unresponsive >= policy.max_unresponsive {
                    return Err(Error::Unresponsive {
                        attempts: unresponsive,
                        last: response.content,
                    });
                }
            }
            Ok(response) => return Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::client::{MockChatClient, MockReply};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_errors: 3,
            max_unresponsive: 2,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_is_unresponsive() {
        assert!(is_unresponsive("I CANNOT ASSIST with that."));
        assert!(is_unresponsive("Sorry, no."));
        assert!(is_unresponsive("i apologize"));
        assert!(is_unresponsive("I can't assist here"));
        assert!(!is_unresponsive("Yes."));
    }

    #[tokio::test]
    async fn test_retries_errors_then_succeeds() {
        let client = MockChatClient::with_replies(vec![
            MockReply::Fail("503".to_string()),
            MockReply::Fail("503".to_string()),
            MockReply::Text("No.".to_string()),
        ]);

        let response = call_with_retry(&client, &[Turn::user("q")], &fast_policy())
            .await
            .unwrap();
        assert_eq!(response.content, "No.");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_error_budget_exhausted_returns_last_error() {
        let client = MockChatClient::with_replies(
            (0..5).map(|i| MockReply::Fail(format!("failure {}", i))),
        );

        let err = call_with_retry(&client, &[Turn::user("q")], &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { body, .. } if body == "failure 2"));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unresponsive_budget_exhausted() {
        let client = MockChatClient::with_texts(vec!["Sorry.", "I apologize.", "Yes"]);

        let err = call_with_retry(&client, &[Turn::user("q")], &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unresponsive { attempts: 2, .. }));
    }
}
