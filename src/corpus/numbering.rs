//! @ai:module:intent Numbered-list helpers and item identifiers for strategy sections
//! @ai:module:layer domain
//! @ai:module:public_api strip_numbering, replace_adversarial_step, ItemKind, ItemId, StepId
//! @ai:module:stateless true

use crate::error::{Error, Result};
use thiserror::Error;

/// @ai:intent A numbered line that breaks the dense 1-based numbering
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("item {position} should start with {expected:?}, found {found:?}")]
pub struct NumberingError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

/// @ai:intent Strip `1) `, `2) `, ... prefixes from the non-blank lines of a section
/// @ai:pre numbering is dense and starts at 1
/// @ai:post result has one entry per non-blank line, prefix removed
/// @ai:effects pure
pub fn strip_numbering(text: &str) -> std::result::Result<Vec<String>, NumberingError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| {
            let expected = format!("{}) ", idx + 1);

            line.strip_prefix(expected.as_str())
                .map(str::to_string)
                .ok_or_else(|| NumberingError {
                    position: idx + 1,
                    expected,
                    found: line.to_string(),
                })
        })
        .collect()
}

/// @ai:intent Substitute one strategy step with the adversarial step
/// @ai:pre adversarial is a single line "<k>) ..." with 1 <= k <= step count; strategy has >= 2 steps
/// @ai:post the k-th step line is replaced, all other lines keep their order
/// @ai:effects pure
pub fn replace_adversarial_step(strategy: &str, adversarial: &str) -> Result<String> {
    let adversarial = adversarial.trim();

    if adversarial.contains('\n') {
        return Err(Error::grammar(
            "ADVERSARIAL STRATEGY STEP(S)",
            "only a single adversarial step is supported",
        ));
    }

    let steps = strip_numbering(strategy)
        .map_err(|e| Error::grammar("STRATEGY", e.to_string()))?;

    if steps.len() < 2 {
        return Err(Error::grammar("STRATEGY", "expected at least two strategy steps"));
    }

    let step_num = leading_number(adversarial).ok_or_else(|| {
        Error::grammar(
            "ADVERSARIAL STRATEGY STEP(S)",
            format!("adversarial step must start with its step number: {:?}", adversarial),
        )
    })?;

    if step_num == 0 || step_num > steps.len() {
        return Err(Error::grammar(
            "ADVERSARIAL STRATEGY STEP(S)",
            format!(
                "adversarial step {} must replace one of the {} existing steps",
                step_num,
                steps.len()
            ),
        ));
    }

    let lines: Vec<String> = strategy
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| {
            if idx + 1 == step_num {
                adversarial.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    Ok(lines.join("\n"))
}

/// @ai:intent Parse the one- or two-digit step number at the start of a line
/// @ai:effects pure
fn leading_number(line: &str) -> Option<usize> {
    let digits: String = line.chars().take(2).take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// @ai:intent Which numbered section an item identifier points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Analysis,
    Goal,
    Step,
}

impl ItemKind {
    /// @ai:intent Segment name used inside identifiers
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Analysis => "Analysis",
            ItemKind::Goal => "Goal",
            ItemKind::Step => "Step",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "Analysis" => Some(ItemKind::Analysis),
            "Goal" => Some(ItemKind::Goal),
            "Step" => Some(ItemKind::Step),
            _ => None,
        }
    }
}

/// @ai:intent Batch identifier of the form Strategy_<n>_<Kind>_<k>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub strategy: u32,
    pub kind: ItemKind,
    pub index: u32,
}

/// Step-cloze identifier (`Strategy_2_Step_6`)
pub type StepId = ItemId;

impl ItemId {
    /// @ai:intent Create an identifier for a 1-based item of a strategy
    /// @ai:effects pure
    pub fn new(strategy: u32, kind: ItemKind, index: u32) -> Self {
        Self {
            strategy,
            kind,
            index,
        }
    }

    /// @ai:intent Create a step-cloze identifier
    /// @ai:effects pure
    pub fn step(strategy: u32, step: u32) -> Self {
        Self::new(strategy, ItemKind::Step, step)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Strategy_{}_{}_{}",
            self.strategy,
            self.kind.as_str(),
            self.index
        )
    }
}

impl std::str::FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::grammar(s, "expected an identifier like Strategy_2_Step_6");
        let segments: Vec<&str> = s.split('_').collect();

        if segments.len() != 4 || segments[0] != "Strategy" {
            return Err(invalid());
        }

        let strategy = segments[1].parse().map_err(|_| invalid())?;
        let kind = ItemKind::from_segment(segments[2]).ok_or_else(invalid)?;
        let index = segments[3].parse().map_err(|_| invalid())?;

        Ok(Self::new(strategy, kind, index))
    }
}

/// @ai:intent Strategy number that any Strategy_<n>_... identifier belongs to
/// @ai:effects pure
pub fn strategy_number_of(identifier: &str) -> Option<u32> {
    let mut segments = identifier.split('_');

    if segments.next()? != "Strategy" {
        return None;
    }
    segments.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRATEGY: &str = "1) Form a trust.\n2) Contribute the assets.\n3) Sell the assets.";

    #[test]
    fn test_strip_numbering_dense() {
        let items = strip_numbering("1) First\n\n2) Second\n").unwrap();
        assert_eq!(items, vec!["First", "Second"]);
    }

    #[test]
    fn test_strip_numbering_rejects_gap() {
        let err = strip_numbering("1) First\n3) Third").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.expected, "2) ");
    }

    #[test]
    fn test_strip_numbering_empty_section() {
        assert!(strip_numbering("   \n").unwrap().is_empty());
    }

    #[test]
    fn test_replace_first_middle_last() {
        assert_eq!(
            replace_adversarial_step(STRATEGY, "1) Form a partnership.").unwrap(),
            "1) Form a partnership.\n2) Contribute the assets.\n3) Sell the assets."
        );
        assert_eq!(
            replace_adversarial_step(STRATEGY, "2) Gift the assets.\n").unwrap(),
            "1) Form a trust.\n2) Gift the assets.\n3) Sell the assets."
        );
        assert_eq!(
            replace_adversarial_step(STRATEGY, "3) Hold the assets.").unwrap(),
            "1) Form a trust.\n2) Contribute the assets.\n3) Hold the assets."
        );
    }

    #[test]
    fn test_replace_two_digit_step() {
        let strategy: String = (1..=10)
            .map(|i| format!("{}) Step {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let replaced = replace_adversarial_step(&strategy, "10) Bad step").unwrap();
        assert!(replaced.ends_with("10) Bad step"));
        assert!(replaced.starts_with("1) Step 1"));
    }

    #[test]
    fn test_replace_rejects_out_of_range() {
        assert!(replace_adversarial_step(STRATEGY, "4) Extra").is_err());
        assert!(replace_adversarial_step(STRATEGY, "Missing number").is_err());
        assert!(replace_adversarial_step("1) Only", "1) Bad").is_err());
    }

    #[test]
    fn test_item_id_display_and_parse() {
        let id = ItemId::step(2, 6);
        assert_eq!(id.to_string(), "Strategy_2_Step_6");
        assert_eq!("Strategy_2_Step_6".parse::<ItemId>().unwrap(), id);
        assert_eq!(
            ItemId::new(4, ItemKind::Goal, 1).to_string(),
            "Strategy_4_Goal_1"
        );
        assert!("Strategy_2_Blank_6".parse::<ItemId>().is_err());
        assert!("Strategy_2_Step".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_strategy_number_of() {
        assert_eq!(strategy_number_of("Strategy_12_Analysis_3"), Some(12));
        assert_eq!(strategy_number_of("generate_1"), None);
    }
}
