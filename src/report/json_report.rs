//! @ai:module:intent JSON report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::report::FinalReport;
use anyhow::Result;
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    /// @ai:intent Generate JSON report from a finalize result
    fn generate(&self, report: &FinalReport, output_path: &Path) -> Result<()>;
}

/// @ai:intent Writes finalize results as pretty JSON
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:effects fs:write
    fn generate(&self, report: &FinalReport, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(output_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::GradeHistogram;
    use tempfile::TempDir;

    #[test]
    fn test_generate_json_report() {
        let reporter = JsonReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("results.json");

        let report = FinalReport::StepCloze(GradeHistogram {
            test_name: "step_cloze_grade_o3".to_string(),
            counts: [1, 0, 2, 5],
            unknown: 1,
            ..Default::default()
        });

        reporter.generate(&report, &output).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["kind"], "step_cloze");
        assert_eq!(value["counts"][3], 5);
        assert_eq!(value["unknown"], 1);
    }
}
