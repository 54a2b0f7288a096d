//! @ai:module:intent Prompt builders for analysis verification and goal verification
//! @ai:module:layer application
//! @ai:module:public_api Standard, GoalVariant, analysis_verification_items, goal_verification_items
//! @ai:module:stateless true

use crate::batch::types::BatchItem;
use crate::corpus::{replace_adversarial_step, ItemId, ItemKind, Strategy};
use crate::error::{Error, Result};
use crate::tasks::IGNORE_DOCTRINES;
use serde::{Deserialize, Serialize};

/// @ai:intent How strictly the model should weigh the claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Viable,
    Correct,
}

impl Standard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Viable => "viable",
            Standard::Correct => "correct",
        }
    }
}

impl std::str::FromStr for Standard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "viable" => Ok(Standard::Viable),
            "correct" => Ok(Standard::Correct),
            other => Err(Error::Config(format!(
                "standard must be viable or correct, got {:?}",
                other
            ))),
        }
    }
}

/// @ai:intent Which version of the strategy the goal is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalVariant {
    WithoutAnalysis,
    WithAnalysis,
    AdversarialStep,
}

impl GoalVariant {
    /// @ai:intent Test name prefix of the variant
    /// @ai:effects pure
    pub fn test_name(&self) -> &'static str {
        match self {
            GoalVariant::WithoutAnalysis => "goal_verification_without_analysis",
            GoalVariant::WithAnalysis => "goal_verification_with_analysis",
            GoalVariant::AdversarialStep => "goal_verification_adversarial_step",
        }
    }
}

impl std::str::FromStr for GoalVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            GoalVariant::WithoutAnalysis,
            GoalVariant::WithAnalysis,
            GoalVariant::AdversarialStep,
        ]
        .into_iter()
        .find(|v| v.test_name() == s)
        .ok_or_else(|| Error::Config(format!("unknown goal verification test {:?}", s)))
    }
}

fn context_block(strategy: &Strategy, strategy_text: &str) -> String {
    let mut prompt = format!(
        "\n\nHere are the authorities you will be applying:\n\n{}",
        strategy.authorities
    );
    if strategy.has_background() {
        prompt.push_str("\n\nHere is the background:\n\n");
        prompt.push_str(&strategy.background);
    }
    prompt.push_str("\n\nHere is the strategy:\n\n");
    prompt.push_str(strategy_text);
    prompt
}

/// @ai:intent One item per analysis step, each assuming the earlier steps hold
/// @ai:post identifiers are Strategy_<n>_Analysis_<k>, k from 1
/// @ai:effects pure
pub fn analysis_verification_items(
    strategies: &[Strategy],
    standard: Standard,
) -> Result<Vec<BatchItem>> {
    let mut items = Vec::new();

    for strategy in strategies {
        let analysis = strategy.analysis_items()?;

        let mut prompt_start = format!(
            "You will be verifying some legal analysis of a tax strategy, given authorities and factual background.  {}",
            IGNORE_DOCTRINES
        );
        prompt_start.push_str(&context_block(strategy, &strategy.strategy));
        prompt_start.push_str("\n\n");

        for (idx, step) in analysis.iter().enumerate() {
            let mut prompt = prompt_start.clone();

            if idx > 0 {
                prompt.push_str(&format!(
                    "Assume that the following analysis is {}:\n",
                    standard.as_str()
                ));
                for previous in &analysis[..idx] {
                    prompt.push_str(previous);
                    prompt.push('\n');
                }
                prompt.push('\n');
            }

            prompt.push_str(match standard {
                Standard::Viable => {
                    "Even if it is not necessarily correct, is the following analysis potentially viable, \
                     based on the information and authorities provided? Spell out your reasoning in detail, and \
                     resolve all reasonable doubts in favor of the analysis being viable.  \
                     Here is the analysis to weigh: "
                }
                Standard::Correct => {
                    "Is the following analysis correct, based on the information and authorities provided? \
                     Spell out your reasoning in detail. Here is the analysis to weigh: "
                }
            });
            prompt.push_str(step);

            let id = ItemId::new(strategy.number, ItemKind::Analysis, idx as u32 + 1);
            items.push(BatchItem::single(id.to_string(), prompt));
        }
    }

    Ok(items)
}

/// @ai:intent One item per goal; a strategy passes only if every goal is met
/// @ai:post identifiers are Strategy_<n>_Goal_<k>, k from 1
/// @ai:effects pure
pub fn goal_verification_items(
    strategies: &[Strategy],
    variant: GoalVariant,
    standard: Standard,
) -> Result<Vec<BatchItem>> {
    let include_analysis = variant == GoalVariant::WithAnalysis;
    let mut items = Vec::new();

    for strategy in strategies {
        let strategy_text = match variant {
            GoalVariant::AdversarialStep => {
                replace_adversarial_step(&strategy.strategy, &strategy.adversarial_step)
                    .map_err(|e| Error::grammar(&strategy.file_name, e.to_string()))?
            }
            _ => strategy.strategy.clone(),
        };

        let mut prompt_start = String::from(
            "You will be determining whether a specified tax strategy meets a particular goal, ",
        );
        prompt_start.push_str(if include_analysis {
            "given the authorities, factual background, and analysis of the strategy below. "
        } else {
            "given the authorities and factual background below. "
        });
        prompt_start.push_str(IGNORE_DOCTRINES);
        prompt_start.push_str(&context_block(strategy, &strategy_text));

        if include_analysis {
            prompt_start.push_str("\n\nHere is an analysis of the strategy:\n\n");
            prompt_start.push_str(&strategy.analysis);
            prompt_start
                .push_str("\n\nBased on the legal authorities, background, and analysis above, ");
        } else {
            prompt_start.push_str("\n\nBased on the legal authorities and background above, ");
        }

        prompt_start.push_str(match standard {
            Standard::Viable => {
                "is it viable that the strategy above meets the following goal?  \
                 Spell out your reasoning in detail, and resolve all reasonable doubts \
                 in favor of the strategy being viable for meeting the goal.  Here is the goal: "
            }
            Standard::Correct => {
                "is it correct that the strategy above meets the following goal?  \
                 Spell out your reasoning in detail.  Here is the goal: "
            }
        });

        for (idx, goal) in strategy.goal_items()?.iter().enumerate() {
            let id = ItemId::new(strategy.number, ItemKind::Goal, idx as u32 + 1);
            items.push(BatchItem::single(
                id.to_string(),
                format!("{}{}", prompt_start, goal),
            ));
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::tests::sample_strategy;
    use crate::corpus::parse_strategy;

    fn strategy() -> Strategy {
        parse_strategy("3_Sample.txt", &sample_strategy("Sample")).unwrap()
    }

    #[test]
    fn test_analysis_items_accumulate_prior_steps() {
        let items = analysis_verification_items(&[strategy()], Standard::Correct).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].identifier, "Strategy_3_Analysis_1");
        assert_eq!(items[1].identifier, "Strategy_3_Analysis_2");

        let first = items[0].primary_prompt().unwrap();
        let second = items[1].primary_prompt().unwrap();
        assert!(!first.contains("Assume that the following analysis is"));
        assert!(second.contains(
            "Assume that the following analysis is correct:\nThe contribution is nonrecognition under section 721.\n\n"
        ));
        assert!(second.ends_with("Here is the analysis to weigh: Alice takes a substituted basis."));
        assert!(first.contains(IGNORE_DOCTRINES));
        assert!(first.contains("Here is the background:"));
    }

    #[test]
    fn test_goal_items_without_analysis() {
        let items =
            goal_verification_items(&[strategy()], GoalVariant::WithoutAnalysis, Standard::Viable)
                .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identifier, "Strategy_3_Goal_1");
        let prompt = items[0].primary_prompt().unwrap();
        assert!(prompt.contains("given the authorities and factual background below."));
        assert!(!prompt.contains("Here is an analysis of the strategy"));
        assert!(prompt.ends_with("Here is the goal: Alice defers recognizing the gain."));
    }

    #[test]
    fn test_goal_items_with_analysis_and_adversarial() {
        let with_analysis =
            goal_verification_items(&[strategy()], GoalVariant::WithAnalysis, Standard::Correct)
                .unwrap();
        let prompt = with_analysis[0].primary_prompt().unwrap();
        assert!(prompt.contains("Here is an analysis of the strategy:\n\n1) The contribution"));
        assert!(prompt.contains("is it correct that the strategy above meets"));

        let adversarial =
            goal_verification_items(&[strategy()], GoalVariant::AdversarialStep, Standard::Correct)
                .unwrap();
        let prompt = adversarial[0].primary_prompt().unwrap();
        assert!(prompt.contains("2) The partnership sells the stock immediately."));
        assert!(!prompt.contains("2) The partnership holds the stock."));
    }

    #[test]
    fn test_parse_standard_and_variant() {
        assert_eq!("viable".parse::<Standard>().unwrap(), Standard::Viable);
        assert!("strict".parse::<Standard>().is_err());
        assert_eq!(
            "goal_verification_adversarial_step".parse::<GoalVariant>().unwrap(),
            GoalVariant::AdversarialStep
        );
    }
}
