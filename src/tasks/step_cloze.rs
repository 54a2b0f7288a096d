//! @ai:module:intent Step-cloze prompts: blank out one strategy step, then grade the filled-in step
//! @ai:module:layer application
//! @ai:module:public_api NShot, EXCLUDED_STRATEGIES, step_cloze_items, clean_answer, grading_prompt, grading_items
//! @ai:module:stateless true

use crate::batch::types::{BatchItem, ResponseItem};
use crate::corpus::{StepId, Strategy};
use crate::error::{Error, Result};
use crate::tasks::IGNORE_DOCTRINES;
use tracing::warn;

/// Strategies whose steps serve as worked examples, so they are never asked
pub const EXCLUDED_STRATEGIES: [u32; 2] = [1, 11];

/// (strategy number, step) of the worked examples, in the order they are shown
const N_SHOT_SOURCES: [(u32, u32); 2] = [(1, 3), (11, 4)];

const DIVIDER: &str = "-----------------------------------\n";

/// @ai:intent Number of worked examples shown before the actual task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NShot(u8);

impl NShot {
    /// @ai:pre n is 0, 1 or 2
    pub fn new(n: u8) -> Result<Self> {
        if usize::from(n) > N_SHOT_SOURCES.len() {
            return Err(Error::Config(format!("N-shot must be 0, 1 or 2, got {}", n)));
        }
        Ok(Self(n))
    }

    pub fn count(&self) -> usize {
        usize::from(self.0)
    }

    /// @ai:intent (strategy number, step) pairs of the examples to load
    /// @ai:effects pure
    pub fn sources(&self) -> &'static [(u32, u32)] {
        &N_SHOT_SOURCES[..self.count()]
    }
}

/// @ai:intent A strategy with one of its steps blanked out
#[derive(Debug, Clone, Copy)]
pub struct ClozeExample<'a> {
    pub strategy: &'a Strategy,
    pub step: u32,
}

fn header(n_shot: usize, position: usize) -> String {
    match (n_shot, position) {
        (0, _) => String::new(),
        (n, 0) if n > 1 => format!(
            "First, here are {} examples of the task being completed:\n{}",
            n, DIVIDER
        ),
        (1, 0) => format!(
            "{}First, here is an example of the task being completed:\n{}",
            DIVIDER, DIVIDER
        ),
        (n, p) if p == n => {
            format!("{}Now, here is the actual task for you:\n{}", DIVIDER, DIVIDER)
        }
        _ => format!(
            "{}Here is another example of the task being completed:\n{}",
            DIVIDER, DIVIDER
        ),
    }
}

/// @ai:intent Render one blanked strategy block
/// @ai:post returns (block text, text of the blanked step)
fn cloze_block(example: ClozeExample<'_>) -> Result<(String, String)> {
    let strategy = example.strategy;

    if !strategy.has_background() {
        return Err(Error::grammar(
            &strategy.file_name,
            "step-cloze needs background facts",
        ));
    }

    let steps = strategy.strategy_steps()?;
    if steps.len() < 2 {
        return Err(Error::grammar(
            &strategy.file_name,
            "step-cloze needs at least two strategy steps",
        ));
    }
    let blanked = strategy.step(example.step)?;

    let goal_count = strategy.goal_items()?.len();
    let (is_are, goal_goals) = if goal_count > 1 {
        ("are", "goals")
    } else {
        ("is", "goal")
    };
    let step_steps = if steps.len() == 2 { "step" } else { "steps" };

    let mut block = format!(
        "Here are the authorities to employ:\n\n{}\n\nHere are the background facts:\n\n{}\n\nHere {} the {} the tax strategy must meet:\n\n{}\n\nHere is a tax strategy that meets the {}:\n\n",
        strategy.authorities,
        strategy.background.trim(),
        is_are,
        goal_goals,
        strategy.goals,
        goal_goals
    );

    for (idx, step) in steps.iter().enumerate() {
        let number = idx as u32 + 1;
        if number == example.step {
            block.push_str(&format!("{}) [BLANK]\n", number));
        } else {
            block.push_str(&format!("{}) {}\n", number, step));
        }
    }

    block.push_str(&format!(
        "\nCome up with a strategy step that would replace [BLANK] and would meet the {}, \
         given the authorities, background facts, and other {}.  \
         Your answer must be a **single** sentence and cannot include your reasoning or any legal analysis.",
        goal_goals, step_steps
    ));

    Ok((block, blanked))
}

/// @ai:intent Full prompt: worked examples with answers, then the target with its step blanked
/// @ai:effects pure
pub fn step_cloze_prompt(
    examples: &[ClozeExample<'_>],
    target: ClozeExample<'_>,
) -> Result<String> {
    let n_shot = examples.len();
    let mut prompt = format!(
        "You will be filling in one missing step in a tax strategy that must meet a specified goal or goal(s). \
         You will be given background facts, particular tax-law authorities that the strategy should employ, \
         and other steps in a tax strategy that does meet the goal or goal(s). {}\n\n",
        IGNORE_DOCTRINES
    );

    for (position, example) in examples.iter().enumerate() {
        prompt.push_str(&header(n_shot, position));
        let (block, answer) = cloze_block(*example)?;
        prompt.push_str(&block);
        prompt.push_str(&format!("\nANSWER: {}\n\n", answer));
    }

    prompt.push_str(&header(n_shot, n_shot));
    let (block, _) = cloze_block(target)?;
    prompt.push_str(&block);

    Ok(prompt)
}

/// @ai:intent One item per step of every non-excluded strategy
/// @ai:pre examples are the loaded N-shot sources, in order
/// @ai:post identifiers are Strategy_<n>_Step_<k>
/// @ai:effects pure
pub fn step_cloze_items(
    strategies: &[Strategy],
    examples: &[ClozeExample<'_>],
) -> Result<Vec<BatchItem>> {
    let mut items = Vec::new();

    for strategy in strategies
        .iter()
        .filter(|s| !EXCLUDED_STRATEGIES.contains(&s.number))
    {
        let step_count = strategy.strategy_steps()?.len() as u32;

        for step in 1..=step_count {
            let target = ClozeExample { strategy, step };
            let id = StepId::step(strategy.number, step);
            items.push(BatchItem::single(
                id.to_string(),
                step_cloze_prompt(examples, target)?,
            ));
        }
    }

    Ok(items)
}

/// @ai:intent Reduce a model's answer to the single line that gets graded
/// @ai:post "answer:"/"answer" prefix removed; of multi-line answers, the longer of the first two lines
/// @ai:effects pure
pub fn clean_answer(raw: &str) -> String {
    let mut answer = raw.trim();

    for prefix in ["answer:", "answer"] {
        if answer
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            answer = answer[prefix.len()..].trim();
            break;
        }
    }

    let lines: Vec<&str> = answer.split('\n').collect();
    if lines.len() > 1 {
        warn!(answer, "Answer was longer than one line");
        return if lines[0].len() > lines[1].len() {
            lines[0].trim().to_string()
        } else {
            lines[1].trim().to_string()
        };
    }

    answer.to_string()
}

/// @ai:intent Critic prompt: few-shot grading instructions, the correct step and the answer
/// @ai:effects pure
pub fn grading_prompt(few_shot: &str, correct: &str, answer: &str) -> String {
    format!(
        "{}CORRECT ANSWER: {}\nANSWER TO GRADE: {}\n\
         What grade do you give this answer (3, 2, 1, or 0)?  Do **not** show your analysis.  \
         Answer with **only** one of the numbers 3, 2, 1 or 0.",
        few_shot, correct, answer
    )
}

/// @ai:intent Critic items for every retrieved step-cloze answer
/// @ai:pre correct_step resolves Strategy_<n>_Step_<k> to the original step text
/// @ai:effects pure
pub fn grading_items<F>(
    responses: &[ResponseItem],
    few_shot: &str,
    correct_step: F,
) -> Result<Vec<BatchItem>>
where
    F: Fn(&StepId) -> Result<String>,
{
    responses
        .iter()
        .map(|response| {
            let id: StepId = response.identifier.parse()?;
            let correct = correct_step(&id)?;
            let prompt = grading_prompt(few_shot, &correct, &clean_answer(&response.text));
            Ok(BatchItem::single(response.identifier.clone(), prompt))
        })
        .collect()
}

/// @ai:intent Resolve a step identifier against loaded strategies
/// @ai:effects pure
pub fn step_from(strategies: &[Strategy], id: &StepId) -> Result<String> {
    strategies
        .iter()
        .find(|s| s.number == id.strategy)
        .ok_or_else(|| Error::grammar(id.to_string(), "no strategy with this number"))?
        .step(id.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::TokenUsage;
    use crate::corpus::loader::tests::sample_strategy;
    use crate::corpus::parse_strategy;

    fn strategy(number: u32) -> Strategy {
        parse_strategy(&format!("{}_S.txt", number), &sample_strategy("S")).unwrap()
    }

    #[test]
    fn test_zero_shot_prompt_blanks_one_step() {
        let s = strategy(2);
        let prompt = step_cloze_prompt(&[], ClozeExample { strategy: &s, step: 2 }).unwrap();

        assert!(prompt.contains("1) Alice contributes the stock to a partnership.\n2) [BLANK]\n3) Alice receives"));
        assert!(!prompt.contains("The partnership holds the stock."));
        assert!(!prompt.contains(DIVIDER));
        assert!(prompt.contains("Here is the goal the tax strategy must meet"));
        assert!(prompt.ends_with("cannot include your reasoning or any legal analysis."));
    }

    #[test]
    fn test_two_shot_prompt_orders_examples() {
        let one = strategy(1);
        let eleven = strategy(11);
        let five = strategy(5);
        let examples = [
            ClozeExample { strategy: &one, step: 3 },
            ClozeExample { strategy: &eleven, step: 1 },
        ];

        let target = ClozeExample {
            strategy: &five,
            step: 1,
        };
        let prompt = step_cloze_prompt(&examples, target).unwrap();

        let first = prompt.find("First, here are 2 examples").unwrap();
        let another = prompt.find("Here is another example").unwrap();
        let actual = prompt.find("Now, here is the actual task for you").unwrap();
        assert!(first < another && another < actual);
        assert!(prompt.contains("\nANSWER: Alice receives a partnership interest.\n\n"));
        assert!(prompt.contains("\nANSWER: Alice contributes the stock to a partnership.\n\n"));
        // each block blanks one step and names [BLANK] in its instruction
        assert_eq!(prompt.matches("[BLANK]").count(), 6);
    }

    #[test]
    fn test_items_skip_example_strategies() {
        let strategies = vec![strategy(1), strategy(2), strategy(11)];
        let items = step_cloze_items(&strategies, &[]).unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["Strategy_2_Step_1", "Strategy_2_Step_2", "Strategy_2_Step_3"]);
    }

    #[test]
    fn test_n_shot_bounds() {
        assert_eq!(NShot::new(2).unwrap().sources(), &[(1, 3), (11, 4)]);
        assert!(NShot::new(0).unwrap().sources().is_empty());
        assert!(NShot::new(3).is_err());
    }

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("  Answer: Form a trust. "), "Form a trust.");
        assert_eq!(clean_answer("ANSWER Form a trust."), "Form a trust.");
        assert_eq!(clean_answer("Short\nA much longer second line"), "A much longer second line");
        assert_eq!(clean_answer("The longer first line\nShort\nThird"), "The longer first line");
        assert_eq!(clean_answer("Form a trust."), "Form a trust.");
    }

    #[test]
    fn test_grading_items_use_correct_step() {
        let strategies = vec![strategy(2)];
        let responses = vec![ResponseItem {
            identifier: "Strategy_2_Step_2".to_string(),
            text: "Answer: The partnership keeps the stock.".to_string(),
            usage: TokenUsage::default(),
        }];

        let items = grading_items(&responses, "RUBRIC\n", |id| step_from(&strategies, id)).unwrap();

        let prompt = items[0].primary_prompt().unwrap();
        assert!(prompt.starts_with(
            "RUBRIC\nCORRECT ANSWER: The partnership holds the stock.\nANSWER TO GRADE: The partnership keeps the stock.\n"
        ));
        assert!(prompt.ends_with("Answer with **only** one of the numbers 3, 2, 1 or 0."));
    }
}
