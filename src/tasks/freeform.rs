//! @ai:module:intent Free-form strategy generation and model grading of human-graded answers
//! @ai:module:layer application
//! @ai:module:public_api generation_item, GradedFreeform, load_graded, grading_item, draft_transcript
//! @ai:module:stateless true

use crate::batch::types::BatchItem;
use crate::corpus::Strategy;
use crate::error::{Error, Result};
use std::path::Path;
use walkdir::WalkDir;

const GENERATION_OPENING: &str = "You will be coming up with a tax strategy";
const AUTHORITIES_LINE: &str = "Here are the authorities you will be applying:";
const ANSWER_MARKER: &str = "\n=== BELOW IS THE STUDENT'S ANSWER: ===\n";

/// @ai:intent Prompt asking a model to devise a strategy from authorities, facts and goals
/// @ai:pre the strategy has background facts
/// @ai:effects pure
pub fn generation_prompt(strategy: &Strategy) -> Result<String> {
    if !strategy.has_background() {
        return Err(Error::grammar(
            &strategy.file_name,
            "generation needs background facts",
        ));
    }

    let (article, goal_goals, is_are) = if strategy.goal_items()?.len() > 1 {
        ("", "goals", "are")
    } else {
        ("a ", "goal", "is")
    };

    Ok(format!(
        "{} that meets {}specified {}, given background facts and particular tax-law authorities \
         that the strategy should employ to reach the {}.\n\n\
         {}\n\n{}\n\nHere are the background facts:\n\n{}\n\nHere {} the {} the tax strategy should meet:\n\n{}",
        GENERATION_OPENING,
        article,
        goal_goals,
        goal_goals,
        AUTHORITIES_LINE,
        strategy.authorities,
        strategy.background.trim(),
        is_are,
        goal_goals,
        strategy.goals
    ))
}

/// @ai:intent Single-item batch for free-form generation, keyed by strategy number
/// @ai:effects pure
pub fn generation_item(strategy: &Strategy) -> Result<BatchItem> {
    Ok(BatchItem::single(
        strategy.number.to_string(),
        generation_prompt(strategy)?,
    ))
}

/// @ai:intent Transcript of a generated answer in the layout human graders annotate
/// @ai:post lines 0 and 1 are empty `Grade=` / `Notes=` fields to be filled in by hand
/// @ai:effects pure
pub fn draft_transcript(timestamp: &str, testname: &str, prompt: &str, answer: &str) -> String {
    format!(
        "Grade=\nNotes=\n{}\ngenerate_strategy() {}\n****** user\n{}\n****** assistant\n{}\n",
        timestamp, testname, prompt, answer
    )
}

/// @ai:intent A free-form answer with its human grade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedFreeform {
    /// File stem, also the batch identifier
    pub identifier: String,
    pub human_grade: u8,
    pub notes: String,
    /// Authorities, facts, goals and the student's answer, re-headed for the grader
    pub body: String,
}

impl GradedFreeform {
    /// @ai:intent Parse a graded transcript file
    /// @ai:pre header lines: Grade=, Notes=, timestamp, context, `****** user`, generation prompt
    /// @ai:effects pure
    pub fn parse(file_name: &str, content: &str) -> Result<Self> {
        let err = |msg: &str| Error::grammar(file_name, msg);

        let identifier = file_name
            .strip_suffix(".txt")
            .ok_or_else(|| err("graded free-form files must end in .txt"))?
            .to_string();

        let lines: Vec<&str> = content.split('\n').collect();
        if lines.len() < 8 {
            return Err(err("graded free-form file is truncated"));
        }

        let grade = lines[0]
            .strip_prefix("Grade=")
            .ok_or_else(|| err("line 1 must start with Grade="))?
            .trim();
        let human_grade = match grade {
            "0" | "1" | "2" | "3" => grade.parse().map_err(|_| err("invalid grade"))?,
            _ => return Err(err("grade must be 0, 1, 2 or 3")),
        };

        let notes = lines[1]
            .strip_prefix("Notes=")
            .ok_or_else(|| err("line 2 must start with Notes="))?
            .trim()
            .to_string();

        if !lines[2].starts_with("20") {
            return Err(err("line 3 must be a timestamp"));
        }
        if !lines[3].starts_with("generate_strategy()") {
            return Err(err("line 4 must name generate_strategy()"));
        }
        if lines[4] != "****** user" {
            return Err(err("line 5 must be the user marker"));
        }
        if !lines[5].starts_with(GENERATION_OPENING) {
            return Err(err("line 6 must be the generation prompt"));
        }
        if !lines[6].trim().is_empty() {
            return Err(err("line 7 must be blank"));
        }
        if lines[7] != AUTHORITIES_LINE {
            return Err(err("line 8 must introduce the authorities"));
        }

        let body = format!("Here are the tax-law authorities:\n{}", lines[8..].join("\n"))
            .replace("****** assistant", ANSWER_MARKER);

        Ok(Self {
            identifier,
            human_grade,
            notes,
            body,
        })
    }

    /// @ai:intent Grader prompt: framing, the student's work and the rubric
    /// @ai:effects pure
    pub fn grading_prompt(&self, rubric: &str) -> String {
        format!(
            "You will be grading a U.S. tax-law strategy that a student came up with.  \
             The student was given tax-law authorities to use, background facts, and one or more \
             goals the strategy must achieve.\n\n\
             {}\n=== END OF THE STUDENT'S ANSWER ===\n\n=== YOUR TASK: ===\n\n{}",
            self.body.trim_end(),
            rubric
        )
    }

    /// @ai:intent Batch item asking a model to grade this answer
    /// @ai:effects pure
    pub fn grading_item(&self, rubric: &str) -> BatchItem {
        BatchItem::single(self.identifier.clone(), self.grading_prompt(rubric))
    }
}

/// @ai:intent Load graded answers from a directory, optionally only one file
/// @ai:post sorted by identifier
/// @ai:effects fs:read
pub fn load_graded(dir: &Path, only: Option<&str>) -> Result<Vec<GradedFreeform>> {
    let mut graded = Vec::new();

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(".txt") || only.is_some_and(|o| o != name) {
            continue;
        }

        let content = std::fs::read_to_string(entry.path()).map_err(|source| Error::FileRead {
            path: entry.path().to_path_buf(),
            source,
        })?;
        graded.push(GradedFreeform::parse(name, &content)?);
    }

    graded.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(graded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::corpus::loader::tests::sample_strategy;
    use crate::corpus::parse_strategy;
    use tempfile::TempDir;

    pub(crate) fn graded_file(grade: &str) -> String {
        format!(
            "Grade={}\n\
             Notes=misses the basis step\n\
             2025-06-01 14:03:09.123456\n\
             generate_strategy() generate_freeform_4\n\
             ****** user\n\
             You will be coming up with a tax strategy that meets a specified goal.\n\
             \n\
             Here are the authorities you will be applying:\n\
             \n\
             AUTHORITY:\n\
             IRC 721.\n\
             ****** assistant\n\
             1) Contribute the stock.\n",
            grade
        )
    }

    #[test]
    fn test_generation_prompt_singular_goal() {
        let strategy = parse_strategy("4_S.txt", &sample_strategy("S")).unwrap();
        let item = generation_item(&strategy).unwrap();

        assert_eq!(item.identifier, "4");
        let prompt = item.primary_prompt().unwrap();
        assert!(prompt.starts_with(
            "You will be coming up with a tax strategy that meets a specified goal, given background facts"
        ));
        assert!(prompt.contains("\n\nHere are the authorities you will be applying:\n\nAUTHORITY:"));
        assert!(prompt.ends_with("Here is the goal the tax strategy should meet:\n\n1) Alice defers recognizing the gain."));
    }

    #[test]
    fn test_parse_graded_file() {
        let graded = GradedFreeform::parse("4_o3_run1.txt", &graded_file("2")).unwrap();

        assert_eq!(graded.identifier, "4_o3_run1");
        assert_eq!(graded.human_grade, 2);
        assert_eq!(graded.notes, "misses the basis step");
        assert!(graded.body.starts_with("Here are the tax-law authorities:\n\nAUTHORITY:"));
        assert!(graded.body.contains(ANSWER_MARKER));

        let prompt = graded.grading_prompt("RUBRIC");
        assert!(prompt.contains("1) Contribute the stock.\n=== END OF THE STUDENT'S ANSWER ==="));
        assert!(prompt.ends_with("=== YOUR TASK: ===\n\nRUBRIC"));
    }

    #[test]
    fn test_parse_graded_rejects_bad_header() {
        assert!(GradedFreeform::parse("a.txt", &graded_file("4")).is_err());
        assert!(GradedFreeform::parse("a.txt", &graded_file("")).is_err());
        assert!(GradedFreeform::parse("a.md", &graded_file("1")).is_err());
        let broken = graded_file("1").replace("****** user", "****** system");
        assert!(GradedFreeform::parse("a.txt", &broken).is_err());
    }

    #[test]
    fn test_draft_transcript_parses_once_graded() {
        let draft = draft_transcript(
            "2025-06-01 14:03:09.123456",
            "generate_freeform_4",
            "You will be coming up with a tax strategy that meets a specified goal.\n\nHere are the authorities you will be applying:\n\nAUTHORITY:",
            "1) Do it.",
        );
        assert!(GradedFreeform::parse("d.txt", &draft).is_err());

        let graded = draft.replacen("Grade=", "Grade=3", 1);
        assert_eq!(GradedFreeform::parse("d.txt", &graded).unwrap().human_grade, 3);
    }

    #[test]
    fn test_load_graded_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), graded_file("1")).unwrap();
        std::fs::write(temp.path().join("a.txt"), graded_file("3")).unwrap();
        std::fs::write(temp.path().join("README.md"), "ignored").unwrap();

        let all = load_graded(temp.path(), None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].identifier, "a");

        let one = load_graded(temp.path(), Some("b.txt")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].human_grade, 1);
    }
}
