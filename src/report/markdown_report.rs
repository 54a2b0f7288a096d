//! @ai:module:intent Markdown report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::batch::types::TokenUsage;
use crate::metrics::{BinaryTally, GradeAgreement, GradeHistogram, GRADES_DESCENDING};
use crate::report::FinalReport;
use anyhow::Result;
use std::fmt::Write as FmtWrite;
use std::path::Path;

type FmtResult = std::result::Result<String, std::fmt::Error>;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    /// @ai:intent Generate Markdown report from a finalize result
    fn generate(&self, report: &FinalReport, output_path: &Path) -> Result<()>;
}

/// @ai:intent Generates Markdown reports from finalize results
pub struct MarkdownReporter;

impl MarkdownReporter {
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Render the whole report as Markdown
    /// @ai:effects pure
    pub fn render(report: &FinalReport) -> Result<String> {
        let body = match report {
            FinalReport::Binary(tally) => Self::binary_section(tally)?,
            FinalReport::StepCloze(histogram) => Self::histogram_section(histogram)?,
            FinalReport::Freeform(agreement) => Self::agreement_section(agreement)?,
        };
        let usage = match report {
            FinalReport::Binary(t) => t.usage,
            FinalReport::StepCloze(h) => h.usage,
            FinalReport::Freeform(a) => a.usage,
        };

        Ok(format!("{}{}", body, Self::usage_section(&usage)?))
    }

    fn binary_section(tally: &BinaryTally) -> FmtResult {
        let mut output = String::new();

        writeln!(output, "# Binary Results: {}", tally.test_name)?;
        writeln!(output)?;
        writeln!(output, "| Metric | Count |")?;
        writeln!(output, "|--------|-------|")?;
        writeln!(output, "| Responses | {} |", tally.total_responses)?;
        writeln!(output, "| Yes | {} |", tally.yes_responses)?;
        writeln!(output, "| Unknown | {} |", tally.unknown_responses)?;
        writeln!(output, "| Strategies | {} |", tally.strategies.len())?;
        writeln!(output, "| Strategies all Yes | {} |", tally.all_yes().len())?;
        writeln!(output)?;

        let all_yes: Vec<String> = tally.all_yes().iter().map(u32::to_string).collect();
        writeln!(output, "## Strategies All Yes")?;
        writeln!(output)?;
        if all_yes.is_empty() {
            writeln!(output, "None")?;
        } else {
            writeln!(output, "{}", all_yes.join(", "))?;
        }
        writeln!(output)?;

        Ok(output)
    }

    fn histogram_section(histogram: &GradeHistogram) -> FmtResult {
        let mut output = String::new();

        writeln!(output, "# Step-Cloze Grades: {}", histogram.test_name)?;
        writeln!(output)?;
        writeln!(output, "| Grade | Count |")?;
        writeln!(output, "|-------|-------|")?;
        for grade in GRADES_DESCENDING {
            writeln!(output, "| {} | {} |", grade, histogram.counts[usize::from(grade)])?;
        }
        writeln!(output, "| unknown | {} |", histogram.unknown)?;
        writeln!(output)?;
        writeln!(output, "**Total downloaded:** {}", histogram.total())?;
        writeln!(output)?;

        Ok(output)
    }

    fn agreement_section(agreement: &GradeAgreement) -> FmtResult {
        let mut output = String::new();

        writeln!(output, "# Free-Form Grading Agreement: {}", agreement.test_name)?;
        writeln!(output)?;
        writeln!(output, "| Metric | Value |")?;
        writeln!(output, "|--------|-------|")?;
        writeln!(output, "| Graded answers | {} |", agreement.pairs.len())?;
        writeln!(output, "| Average human grade | {:.3} |", agreement.average_human)?;
        writeln!(output, "| Average model grade | {:.3} |", agreement.average_model)?;
        writeln!(output, "| Grades equal | {} |", agreement.equal)?;
        writeln!(output, "| Human higher | {} |", agreement.human_higher)?;
        writeln!(output, "| Model higher | {} |", agreement.model_higher)?;
        match &agreement.correlation {
            Some(c) => {
                writeln!(output, "| Spearman's rho | {:.4} |", c.rho)?;
                writeln!(output, "| P-value | {:.4e} |", c.p_value)?;
            }
            None => writeln!(output, "| Spearman's rho | undefined |")?,
        }
        writeln!(output)?;

        writeln!(output, "## Confusion Matrix (columns from model)")?;
        writeln!(output)?;
        writeln!(output, "| | 3 | 2 | 1 | 0 | total |")?;
        writeln!(output, "|---|---|---|---|---|---|")?;
        for human in GRADES_DESCENDING {
            let row = &agreement.confusion[usize::from(human)];
            write!(output, "| human {} ", human)?;
            for model in GRADES_DESCENDING {
                write!(output, "| {} ", row[usize::from(model)])?;
            }
            writeln!(output, "| {} |", agreement.human_totals[usize::from(human)])?;
        }
        write!(output, "| total ")?;
        for model in GRADES_DESCENDING {
            write!(output, "| {} ", agreement.model_totals[usize::from(model)])?;
        }
        writeln!(output, "| {} |", agreement.pairs.len())?;
        writeln!(output)?;

        Ok(output)
    }

    fn usage_section(usage: &TokenUsage) -> FmtResult {
        let mut output = String::new();

        writeln!(output, "## Token Usage")?;
        writeln!(output)?;
        writeln!(output, "| Input | Reasoning | Output |")?;
        writeln!(output, "|-------|-----------|--------|")?;
        writeln!(
            output,
            "| {} | {} | {} |",
            usage.input_tokens, usage.reasoning_tokens, usage.output_tokens
        )?;

        Ok(output)
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:effects fs:write
    fn generate(&self, report: &FinalReport, output_path: &Path) -> Result<()> {
        std::fs::write(output_path, Self::render(report)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{agreement_from_pairs, GradedPair, StrategyStatus};

    #[test]
    fn test_binary_report_lists_all_yes() {
        let mut tally = BinaryTally {
            test_name: "analysis_verification".to_string(),
            total_responses: 3,
            yes_responses: 2,
            ..Default::default()
        };
        tally.strategies.insert(4, StrategyStatus::AllYes);
        tally.strategies.insert(7, StrategyStatus::No);
        tally.strategies.insert(9, StrategyStatus::AllYes);

        let markdown = MarkdownReporter::render(&FinalReport::Binary(tally)).unwrap();

        assert!(markdown.contains("| Strategies all Yes | 2 |"));
        assert!(markdown.contains("## Strategies All Yes\n\n4, 9\n"));
        assert!(markdown.contains("## Token Usage"));
    }

    #[test]
    fn test_confusion_rows_in_descending_grade_order() {
        let mut agreement = agreement_from_pairs(vec![
            ("a".to_string(), GradedPair { human: 3, model: 3 }),
            ("b".to_string(), GradedPair { human: 2, model: 1 }),
        ]);
        agreement.test_name = "freeform_grade".to_string();

        let markdown = MarkdownReporter::render(&FinalReport::Freeform(agreement)).unwrap();

        assert!(markdown.contains("| human 3 | 1 | 0 | 0 | 0 | 1 |"));
        assert!(markdown.contains("| human 2 | 0 | 0 | 1 | 0 | 1 |"));
        assert!(markdown.contains("| total | 1 | 0 | 1 | 0 | 2 |"));
        assert!(markdown.contains("| Spearman's rho | undefined |"));
    }
}
