//! @ai:module:intent Merge first-round answers with their prompts into follow-up batch items
//! @ai:module:layer application
//! @ai:module:public_api original_prompts, build_follow_ups
//! @ai:module:stateless true

use crate::batch::types::{BatchItem, RetrievedBatch, Role};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// @ai:intent Map identifier -> first-round prompt
/// @ai:pre every source item is a single user turn with a unique identifier
/// @ai:effects pure
pub fn original_prompts(sources: &[BatchItem]) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::with_capacity(sources.len());

    for item in sources {
        let prompt = match item.conversation.as_slice() {
            [turn] if turn.role == Role::User => turn.text.clone(),
            _ => {
                return Err(Error::UnsupportedConversation {
                    identifier: item.identifier.clone(),
                    reason: "first-round item must be a single user turn".to_string(),
                })
            }
        };

        if prompts.insert(item.identifier.clone(), prompt).is_some() {
            return Err(Error::DuplicateIdentifier(item.identifier.clone()));
        }
    }

    Ok(prompts)
}

/// @ai:intent Three-turn items (prompt, first answer, follow-up) for every first-round response
/// @ai:pre uploaded holds the first-round upload for providers that do not echo requests
/// @ai:post one item per response, in response order
/// @ai:effects pure
pub fn build_follow_ups(
    first_round: &RetrievedBatch,
    uploaded: &[BatchItem],
    follow_up: &str,
) -> Result<Vec<BatchItem>> {
    let sources = if first_round.echoed_requests.is_empty() {
        if uploaded.len() != first_round.items.len() {
            return Err(Error::CountMismatch {
                uploaded: uploaded.len(),
                retrieved: first_round.items.len(),
            });
        }
        uploaded
    } else {
        &first_round.echoed_requests
    };

    let prompts = original_prompts(sources)?;

    first_round
        .items
        .iter()
        .map(|response| {
            let prompt = prompts
                .get(&response.identifier)
                .ok_or_else(|| Error::UnknownIdentifier(response.identifier.clone()))?;

            Ok(BatchItem::follow_up(
                response.identifier.clone(),
                prompt.clone(),
                response.text.clone(),
                follow_up,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::{ResponseItem, TokenUsage};
    use pretty_assertions::assert_eq;

    fn response(id: &str, text: &str) -> ResponseItem {
        ResponseItem {
            identifier: id.to_string(),
            text: text.to_string(),
            usage: TokenUsage::default(),
        }
    }

    #[test]
    fn test_follow_ups_from_uploaded_file() {
        let uploaded = vec![
            BatchItem::single("Strategy_1_Goal_1", "q1"),
            BatchItem::single("Strategy_1_Goal_2", "q2"),
        ];
        let retrieved = RetrievedBatch {
            items: vec![
                response("Strategy_1_Goal_2", "Probably not"),
                response("Strategy_1_Goal_1", "Yes"),
            ],
            ..Default::default()
        };

        let items = build_follow_ups(&retrieved, &uploaded, "So?").unwrap();

        assert_eq!(
            items,
            vec![
                BatchItem::follow_up("Strategy_1_Goal_2", "q2", "Probably not", "So?"),
                BatchItem::follow_up("Strategy_1_Goal_1", "q1", "Yes", "So?"),
            ]
        );
    }

    #[test]
    fn test_follow_ups_from_echoed_requests() {
        let retrieved = RetrievedBatch {
            items: vec![response("k", "It depends")],
            echoed_requests: vec![BatchItem::single("k", "echoed prompt")],
            ..Default::default()
        };

        let items = build_follow_ups(&retrieved, &[], "So?").unwrap();
        assert_eq!(items[0].primary_prompt(), Some("echoed prompt"));
    }

    #[test]
    fn test_follow_ups_reject_multi_turn_source() {
        let uploaded = vec![BatchItem::follow_up("a", "q", "x", "y")];
        let retrieved = RetrievedBatch {
            items: vec![response("a", "Yes")],
            ..Default::default()
        };
        assert!(matches!(
            build_follow_ups(&retrieved, &uploaded, "So?"),
            Err(Error::UnsupportedConversation { .. })
        ));
    }

    #[test]
    fn test_follow_ups_reject_count_mismatch() {
        let uploaded = vec![BatchItem::single("a", "q"), BatchItem::single("b", "q")];
        let retrieved = RetrievedBatch {
            items: vec![response("a", "Yes")],
            ..Default::default()
        };
        assert!(matches!(
            build_follow_ups(&retrieved, &uploaded, "So?"),
            Err(Error::CountMismatch {
                uploaded: 2,
                retrieved: 1
            })
        ));
    }
}
