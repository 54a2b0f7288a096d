//! @ai:module:intent Report generation for finalize-stage results
//! @ai:module:layer infrastructure
//! @ai:module:public_api FinalReport, ReportGenerator, JsonReporter, MarkdownReporter, ChartGenerator

pub mod charts;
pub mod json_report;
pub mod markdown_report;

pub use charts::{ChartGenerator, ChartGeneratorTrait};
pub use json_report::{JsonReporter, JsonReporterTrait};
pub use markdown_report::{MarkdownReporter, MarkdownReporterTrait};

use crate::metrics::{BinaryTally, GradeAgreement, GradeHistogram};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// @ai:intent Outcome of one finalize stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalReport {
    Binary(BinaryTally),
    StepCloze(GradeHistogram),
    Freeform(GradeAgreement),
}

impl FinalReport {
    pub fn test_name(&self) -> &str {
        match self {
            FinalReport::Binary(t) => &t.test_name,
            FinalReport::StepCloze(h) => &h.test_name,
            FinalReport::Freeform(a) => &a.test_name,
        }
    }
}

/// @ai:intent Combined report generator
pub struct ReportGenerator {
    json: JsonReporter,
    markdown: MarkdownReporter,
    charts: ChartGenerator,
}

impl ReportGenerator {
    /// @ai:intent Create a new report generator
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            json: JsonReporter::new(),
            markdown: MarkdownReporter::new(),
            charts: ChartGenerator::new(),
        }
    }

    /// @ai:intent Write <test>.json, <test>.md and any charts into the results directory
    /// @ai:post returns the paths written
    /// @ai:effects fs:write
    pub fn generate_all(&self, report: &FinalReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;

        let stem = report.test_name();
        let json_path = output_dir.join(format!("{}.json", stem));
        let markdown_path = output_dir.join(format!("{}.md", stem));

        self.json.generate(report, &json_path)?;
        self.markdown.generate(report, &markdown_path)?;

        let mut written = vec![json_path, markdown_path];
        written.extend(self.charts.generate_all(report, output_dir)?);

        tracing::info!("Reports generated in {}", output_dir.display());
        Ok(written)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_all_binary_has_no_chart() {
        let temp = TempDir::new().unwrap();
        let report = FinalReport::Binary(BinaryTally {
            test_name: "goal_verification_with_analysis_o3_2025-07-01at10.00.00".to_string(),
            ..Default::default()
        });

        let written = ReportGenerator::new().generate_all(&report, temp.path()).unwrap();

        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }
}
