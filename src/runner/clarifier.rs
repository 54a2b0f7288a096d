//! @ai:module:intent Reduce free-text model answers to Yes / No with a bounded follow-up protocol
//! @ai:module:layer application
//! @ai:module:public_api YesNoClarifier, Answer, Verdict, classify_first_answer, classify_followup_answer, FOLLOW_UP_PROMPT
//! @ai:module:stateless false

use crate::batch::types::{TokenUsage, Turn};
use crate::call_log::{CallLog, CallLogEntry};
use crate::error::{Error, Result};
use crate::runner::client::ChatClientTrait;
use crate::runner::retry::{call_with_retry, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Second-round user turn asking for a bare binary answer
pub const FOLLOW_UP_PROMPT: &str = "So the answer (just Yes or No) is:";

/// @ai:intent Outcome of a yes/no question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    /// Retry budget ran out without a usable answer
    Undetermined,
}

impl Answer {
    /// @ai:intent Only an explicit Yes counts as verified
    /// @ai:effects pure
    pub fn is_affirmative(&self) -> bool {
        matches!(self, Answer::Yes)
    }
}

/// @ai:intent First-round rule: the whole answer must be "yes" or "no" (case and trailing dots ignored)
/// @ai:effects pure
pub fn classify_first_answer(text: &str) -> Answer {
    match text.trim().trim_matches('.').to_lowercase().as_str() {
        "yes" => Answer::Yes,
        "no" => Answer::No,
        _ => Answer::Undetermined,
    }
}

/// @ai:intent Follow-up rule: answer must start with "yes" or "no" after stripping dots and bold markers
/// @ai:effects pure
pub fn classify_followup_answer(text: &str) -> Answer {
    let stripped = text.trim().trim_matches(['.', '*']).to_lowercase();

    if stripped.starts_with("yes") {
        Answer::Yes
    } else if stripped.starts_with("no") {
        Answer::No
    } else {
        Answer::Undetermined
    }
}

/// @ai:intent Result of asking one yes/no question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub answer: Answer,
    /// Always the model's first answer of the deciding attempt
    pub explanation: String,
    /// Call-log timestamp; None when the answer is undetermined
    pub timestamp: Option<String>,
    pub usage: TokenUsage,
}

/// @ai:intent Interactive yes/no clarifier over a chat client
pub struct YesNoClarifier<C: ChatClientTrait> {
    client: Arc<C>,
    log: Arc<dyn CallLog>,
    policy: RetryPolicy,
    max_attempts: u32,
}

impl<C: ChatClientTrait> YesNoClarifier<C> {
    /// @ai:intent Create a clarifier
    /// @ai:effects pure
    pub fn new(
        client: Arc<C>,
        log: Arc<dyn CallLog>,
        policy: RetryPolicy,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            log,
            policy,
            max_attempts,
        }
    }

    /// @ai:intent Ask a yes/no question, following up once per attempt when the first answer is not bare
    /// @ai:post answer is Undetermined with no timestamp after max_attempts unusable attempts
    /// @ai:post refusals use up an attempt; only transport errors propagate
    /// @ai:effects network, fs:write
    pub async fn ask(&self, prompt: &str, context: &str) -> Result<Verdict> {
        let mut usage = TokenUsage::default();
        let mut explanation = String::new();

        for attempt in 1..=self.max_attempts {
            let mut turns = vec![Turn::user(prompt)];

            let first = match call_with_retry(self.client.as_ref(), &turns, &self.policy).await {
                Ok(response) => response,
                Err(Error::Unresponsive { last, .. }) => {
                    warn!(context, attempt, "Model refused the question");
                    explanation = last;
                    continue;
                }
                Err(e) => return Err(e),
            };
            usage += first.usage;
            explanation = first.content.clone();
            turns.push(Turn::assistant(first.content));

            let answer = classify_first_answer(&explanation);
            if answer != Answer::Undetermined {
                return self.settle(answer, explanation, turns, context, usage);
            }

            debug!(context, attempt, "Making yes/no follow-up call");
            turns.push(Turn::user(FOLLOW_UP_PROMPT));

            let second = match call_with_retry(self.client.as_ref(), &turns, &self.policy).await {
                Ok(response) => response,
                Err(Error::Unresponsive { .. }) => {
                    warn!(context, attempt, "Model refused the follow-up");
                    continue;
                }
                Err(e) => return Err(e),
            };
            usage += second.usage;
            let answer = classify_followup_answer(&second.content);
            turns.push(Turn::assistant(second.content));

            if answer != Answer::Undetermined {
                return self.settle(answer, explanation, turns, context, usage);
            }

            if let Some(Turn { text, .. }) = turns.last() {
                warn!(context, attempt, response = %text, "No yes or no in follow-up answer");
            }
        }

        warn!(context, attempts = self.max_attempts, "Giving up on yes/no answer");
        Ok(Verdict {
            answer: Answer::Undetermined,
            explanation,
            timestamp: None,
            usage,
        })
    }

    fn settle(
        &self,
        answer: Answer,
        explanation: String,
        turns: Vec<Turn>,
        context: &str,
        usage: TokenUsage,
    ) -> Result<Verdict> {
        let timestamp = self.log.record(&CallLogEntry::Transcript {
            context: context.to_string(),
            turns,
        })?;

        Ok(Verdict {
            answer,
            explanation,
            timestamp: Some(timestamp),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_log::MemoryCallLog;
    use crate::runner::client::{MockChatClient, MockReply};
    use std::time::Duration;

    fn clarifier(
        client: Arc<MockChatClient>,
        log: Arc<MemoryCallLog>,
        attempts: u32,
    ) -> YesNoClarifier<MockChatClient> {
        let policy = RetryPolicy {
            max_errors: 2,
            max_unresponsive: 2,
            delay: Duration::ZERO,
        };
        YesNoClarifier::new(client, log, policy, attempts)
    }

    #[test]
    fn test_classify_first_answer() {
        assert_eq!(classify_first_answer("Yes."), Answer::Yes);
        assert_eq!(classify_first_answer("  NO..  "), Answer::No);
        assert_eq!(classify_first_answer("Yes, because"), Answer::Undetermined);
        assert_eq!(classify_first_answer("**Yes**"), Answer::Undetermined);
    }

    #[test]
    fn test_classify_followup_answer() {
        assert_eq!(classify_followup_answer("**Yes**"), Answer::Yes);
        assert_eq!(classify_followup_answer("No, the step fails."), Answer::No);
        assert_eq!(classify_followup_answer("...yes"), Answer::Yes);
        assert_eq!(classify_followup_answer("It depends"), Answer::Undetermined);
    }

    #[tokio::test]
    async fn test_bare_yes_needs_one_call() {
        let client = Arc::new(MockChatClient::with_texts(vec!["Yes."]));
        let log = Arc::new(MemoryCallLog::new());

        let verdict = clarifier(client.clone(), log.clone(), 10)
            .ask("Is the analysis correct?", "Strategy_1_Analysis_1")
            .await
            .unwrap();

        assert_eq!(verdict.answer, Answer::Yes);
        assert_eq!(verdict.explanation, "Yes.");
        assert!(verdict.timestamp.as_deref().is_some_and(|t| !t.is_empty()));
        assert_eq!(client.call_count(), 1);
        assert_eq!(log.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_answer_gets_exactly_one_follow_up() {
        let client = Arc::new(MockChatClient::with_texts(vec![
            "I think the analysis holds up well,",
            "No, on reflection it does not.",
        ]));
        let log = Arc::new(MemoryCallLog::new());

        let verdict = clarifier(client.clone(), log.clone(), 10)
            .ask("Is the analysis correct?", "ctx")
            .await
            .unwrap();

        assert_eq!(verdict.answer, Answer::No);
        assert_eq!(verdict.explanation, "I think the analysis holds up well,");
        assert!(verdict.timestamp.is_some());
        assert_eq!(client.call_count(), 2);

        let second_call = &client.received()[1];
        assert_eq!(second_call.len(), 3);
        assert_eq!(second_call[2].text, FOLLOW_UP_PROMPT);

        match &log.entries()[0].1 {
            CallLogEntry::Transcript { turns, .. } => assert_eq!(turns.len(), 4),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_attempts_are_undetermined() {
        let client = Arc::new(MockChatClient::with_texts(vec![
            "Maybe", "Unclear", "Perhaps", "Hard to say",
        ]));
        let log = Arc::new(MemoryCallLog::new());

        let verdict = clarifier(client.clone(), log.clone(), 2)
            .ask("q", "ctx")
            .await
            .unwrap();

        assert_eq!(verdict.answer, Answer::Undetermined);
        assert!(!verdict.answer.is_affirmative());
        assert_eq!(verdict.timestamp, None);
        assert_eq!(verdict.explanation, "Perhaps");
        assert_eq!(client.call_count(), 4);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_refusals_fail_soft() {
        let client = Arc::new(MockChatClient::with_texts(vec!["Sorry, I cannot assist."; 4]));
        let log = Arc::new(MemoryCallLog::new());

        let verdict = clarifier(client.clone(), log.clone(), 2)
            .ask("q", "ctx")
            .await
            .unwrap();

        assert_eq!(verdict.answer, Answer::Undetermined);
        assert_eq!(verdict.timestamp, None);
        assert_eq!(verdict.explanation, "Sorry, I cannot assist.");
        assert_eq!(client.call_count(), 4);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_refused_follow_up_retries_the_question() {
        let client = Arc::new(MockChatClient::with_texts(vec![
            "It hinges on basis.",
            "Sorry.",
            "I apologize.",
            "Yes.",
        ]));
        let log = Arc::new(MemoryCallLog::new());

        let verdict = clarifier(client.clone(), log.clone(), 3)
            .ask("q", "ctx")
            .await
            .unwrap();

        assert_eq!(verdict.answer, Answer::Yes);
        assert_eq!(verdict.explanation, "Yes.");
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_errors_still_propagate() {
        let client = Arc::new(MockChatClient::with_replies(
            (0..2).map(|i| MockReply::Fail(format!("failure {}", i))),
        ));
        let log = Arc::new(MemoryCallLog::new());

        let result = clarifier(client, log, 3).ask("q", "ctx").await;
        assert!(matches!(result, Err(Error::Api { .. })));
    }
}
