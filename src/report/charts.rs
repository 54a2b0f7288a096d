//! @ai:module:intent Grade-distribution charts for graded tests
//! @ai:module:layer infrastructure
//! @ai:module:public_api ChartGenerator
//! @ai:module:stateless true

use crate::metrics::{GradeAgreement, GradeHistogram, GRADES_DESCENDING};
use crate::report::FinalReport;
use anyhow::Result;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// @ai:intent Trait for chart generation
pub trait ChartGeneratorTrait: Send + Sync {
    /// @ai:intent Generate the charts that apply to a report
    /// @ai:post binary tallies produce no chart
    fn generate_all(&self, report: &FinalReport, output_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// @ai:intent Generates PNG bar charts of grade distributions
pub struct ChartGenerator;

impl ChartGenerator {
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Bar per critic grade, unknown last
    /// @ai:effects fs:write
    fn generate_histogram_chart(
        &self,
        histogram: &GradeHistogram,
        output_path: &Path,
    ) -> Result<()> {
        let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut bars: Vec<(String, u32)> = GRADES_DESCENDING
            .iter()
            .map(|g| (g.to_string(), histogram.counts[usize::from(*g)]))
            .collect();
        bars.push(("unknown".to_string(), histogram.unknown));

        let y_max = bars.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64 * 1.1;

        let mut chart = ChartBuilder::on(&root)
            .caption("Step-Cloze Grade Distribution", ("sans-serif", 25))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..bars.len() as i32, 0f64..y_max)?;

        chart
            .configure_mesh()
            .x_labels(bars.len())
            .y_desc("Answers")
            .x_desc("Grade")
            .x_label_formatter(&|x| {
                bars.get(*x as usize)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default()
            })
            .draw()?;

        chart.draw_series(bars.iter().enumerate().map(|(i, (_, count))| {
            Rectangle::new(
                [(i as i32, 0.0), (i as i32 + 1, f64::from(*count))],
                BLUE.mix(0.7).filled(),
            )
        }))?;

        root.present()?;
        Ok(())
    }

    /// @ai:intent Human and model grade counts side by side
    /// @ai:effects fs:write
    fn generate_agreement_chart(
        &self,
        agreement: &GradeAgreement,
        output_path: &Path,
    ) -> Result<()> {
        let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
        root.fill(&WHITE)?;

        let data: Vec<(u8, f64, f64)> = GRADES_DESCENDING
            .iter()
            .map(|g| {
                let idx = usize::from(*g);
                (
                    *g,
                    f64::from(agreement.human_totals[idx]),
                    f64::from(agreement.model_totals[idx]),
                )
            })
            .collect();

        let y_max = data
            .iter()
            .map(|(_, h, m)| h.max(*m))
            .fold(1.0, f64::max)
            * 1.1;

        let mut chart = ChartBuilder::on(&root)
            .caption("Human vs Model Grades", ("sans-serif", 25))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..data.len() as i32 * 3, 0f64..y_max)?;

        chart
            .configure_mesh()
            .y_desc("Answers")
            .x_desc("Grade")
            .x_label_formatter(&|x| {
                data.get((*x / 3) as usize)
                    .map(|(grade, _, _)| grade.to_string())
                    .unwrap_or_default()
            })
            .draw()?;

        chart
            .draw_series(data.iter().enumerate().map(|(i, (_, human, _))| {
                let x = i as i32 * 3;
                Rectangle::new([(x, 0.0), (x + 1, *human)], BLUE.mix(0.7).filled())
            }))?
            .label("Human")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.7).filled()));

        chart
            .draw_series(data.iter().enumerate().map(|(i, (_, _, model))| {
                let x = i as i32 * 3 + 1;
                Rectangle::new([(x, 0.0), (x + 1, *model)], GREEN.mix(0.7).filled())
            }))?
            .label("Model")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 20, y + 5)], GREEN.mix(0.7).filled())
            });

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}

impl Default for ChartGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartGeneratorTrait for ChartGenerator {
    /// @ai:effects fs:write
    fn generate_all(&self, report: &FinalReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let path = output_dir.join(format!("{}_grades.png", report.test_name()));

        match report {
            FinalReport::Binary(_) => return Ok(vec![]),
            FinalReport::StepCloze(histogram) => self.generate_histogram_chart(histogram, &path)?,
            FinalReport::Freeform(agreement) => self.generate_agreement_chart(agreement, &path)?,
        }

        tracing::info!("Generated chart: {}", path.display());
        Ok(vec![path])
    }
}
