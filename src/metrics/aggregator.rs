//! @ai:module:intent Turn retrieved answers into tallies, histograms and agreement stats
//! @ai:module:layer application
//! @ai:module:public_api MetricsAggregator
//! @ai:module:stateless true

use crate::batch::types::RetrievedBatch;
use crate::corpus::strategy_number_of;
use crate::error::{Error, Result};
use crate::metrics::grades::GradeExtractor;
use crate::metrics::spearman::spearman;
use crate::metrics::types::{
    BinaryTally, GradeAgreement, GradeHistogram, GradedPair, StrategyStatus,
};
use crate::runner::{classify_followup_answer, Answer};
use crate::tasks::GradedFreeform;
use std::collections::HashMap;
use tracing::{debug, warn};

/// @ai:intent Aggregates finalize-stage answers into summaries
pub struct MetricsAggregator {
    extractor: GradeExtractor,
}

impl MetricsAggregator {
    /// @ai:intent Create a new metrics aggregator
    /// @ai:effects pure
    pub fn new() -> Result<Self> {
        Ok(Self {
            extractor: GradeExtractor::new()?,
        })
    }

    /// @ai:intent Count yes/no answers of a clarified binary test
    /// @ai:pre every identifier is Strategy_<n>_...
    /// @ai:effects pure
    pub fn binary_tally(&self, test_name: &str, batch: &RetrievedBatch) -> Result<BinaryTally> {
        let mut tally = BinaryTally {
            test_name: test_name.to_string(),
            usage: batch.usage,
            ..Default::default()
        };

        for item in &batch.items {
            let number = strategy_number_of(&item.identifier)
                .ok_or_else(|| Error::UnknownIdentifier(item.identifier.clone()))?;
            let status = tally.strategies.entry(number).or_insert(StrategyStatus::AllYes);

            tally.total_responses += 1;
            match classify_followup_answer(&item.text) {
                Answer::Yes => tally.yes_responses += 1,
                Answer::No => *status = StrategyStatus::No,
                Answer::Undetermined => {
                    *status = StrategyStatus::Unknown;
                    tally.unknown_responses += 1;
                }
            }
            debug!(identifier = %item.identifier, response = %item.text, "Tallied answer");
        }

        Ok(tally)
    }

    /// @ai:intent Histogram of critic grades, unreadable grades counted as unknown
    /// @ai:effects pure
    pub fn grade_histogram(&self, test_name: &str, batch: &RetrievedBatch) -> GradeHistogram {
        let mut histogram = GradeHistogram {
            test_name: test_name.to_string(),
            usage: batch.usage,
            ..Default::default()
        };

        for item in &batch.items {
            match self.extractor.extract(&item.text) {
                Some(grade) => histogram.counts[usize::from(grade)] += 1,
                None => {
                    warn!(identifier = %item.identifier, "Unknown grade");
                    histogram.unknown += 1;
                }
            }
        }

        histogram
    }

    /// @ai:intent Compare model grades against the human grades of the graded files
    /// @ai:pre every response identifier names a graded file; every answer contains a grade
    /// @ai:effects pure
    pub fn grade_agreement(
        &self,
        test_name: &str,
        batch: &RetrievedBatch,
        graded: &[GradedFreeform],
    ) -> Result<GradeAgreement> {
        let human: HashMap<&str, u8> = graded
            .iter()
            .map(|g| (g.identifier.as_str(), g.human_grade))
            .collect();

        let pairs = batch
            .items
            .iter()
            .map(|item| {
                let identifier = item.identifier.strip_suffix(".txt").unwrap_or(&item.identifier);
                let human = *human
                    .get(identifier)
                    .ok_or_else(|| Error::UnknownIdentifier(item.identifier.clone()))?;
                let model = self
                    .extractor
                    .extract(&item.text)
                    .ok_or_else(|| Error::MissingGrade(item.identifier.clone()))?;
                Ok((identifier.to_string(), GradedPair { human, model }))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut agreement = agreement_from_pairs(pairs);
        agreement.test_name = test_name.to_string();
        agreement.usage = batch.usage;
        Ok(agreement)
    }
}

/// @ai:intent Agreement statistics over (identifier, human, model) grade pairs
/// @ai:effects pure
pub fn agreement_from_pairs(pairs: Vec<(String, GradedPair)>) -> GradeAgreement {
    let mut agreement = GradeAgreement::default();

    for (_, pair) in &pairs {
        let (h, m) = (usize::from(pair.human), usize::from(pair.model));
        agreement.confusion[h][m] += 1;
        agreement.human_totals[h] += 1;
        agreement.model_totals[m] += 1;

        match pair.human.cmp(&pair.model) {
            std::cmp::Ordering::Equal => agreement.equal += 1,
            std::cmp::Ordering::Greater => agreement.human_higher += 1,
            std::cmp::Ordering::Less => agreement.model_higher += 1,
        }
    }

    let humans: Vec<f64> = pairs.iter().map(|(_, p)| f64::from(p.human)).collect();
    let models: Vec<f64> = pairs.iter().map(|(_, p)| f64::from(p.model)).collect();

    agreement.average_human = average(&humans);
    agreement.average_model = average(&models);
    agreement.correlation = spearman(&humans, &models);
    agreement.pairs = pairs;
    agreement
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::{ResponseItem, TokenUsage};
    use crate::tasks::freeform::tests::graded_file;
    use pretty_assertions::assert_eq;

    fn batch(answers: &[(&str, &str)]) -> RetrievedBatch {
        RetrievedBatch {
            items: answers
                .iter()
                .map(|(id, text)| ResponseItem {
                    identifier: id.to_string(),
                    text: text.to_string(),
                    usage: TokenUsage::default(),
                })
                .collect(),
            usage: TokenUsage {
                input_tokens: 10,
                reasoning_tokens: 5,
                output_tokens: 2,
            },
            echoed_requests: vec![],
        }
    }

    #[test]
    fn test_binary_tally() {
        let aggregator = MetricsAggregator::new().unwrap();
        let retrieved = batch(&[
            ("Strategy_1_Goal_1", "Yes."),
            ("Strategy_1_Goal_2", "**Yes**"),
            ("Strategy_2_Goal_1", "No"),
            ("Strategy_3_Analysis_1", "Unclear"),
            ("Strategy_3_Analysis_2", "No."),
        ]);

        let tally = aggregator.binary_tally("t", &retrieved).unwrap();

        assert_eq!(tally.total_responses, 5);
        assert_eq!(tally.yes_responses, 2);
        assert_eq!(tally.unknown_responses, 1);
        assert_eq!(tally.strategies[&2], StrategyStatus::No);
        // later No replaces the earlier Unknown
        assert_eq!(tally.strategies[&3], StrategyStatus::No);
        assert_eq!(tally.all_yes(), vec![1]);
        assert_eq!(tally.usage.input_tokens, 10);
    }

    #[test]
    fn test_binary_tally_rejects_foreign_identifier() {
        let aggregator = MetricsAggregator::new().unwrap();
        let result = aggregator.binary_tally("t", &batch(&[("item-1", "Yes")]));
        assert!(matches!(result, Err(Error::UnknownIdentifier(_))));
    }

    #[test]
    fn test_grade_histogram() {
        let aggregator = MetricsAggregator::new().unwrap();
        let retrieved = batch(&[
            ("Strategy_2_Step_1", "3"),
            ("Strategy_2_Step_2", "Grade: 2"),
            ("Strategy_2_Step_3", "3"),
            ("Strategy_3_Step_1", "no idea"),
        ]);

        let histogram = aggregator.grade_histogram("t", &retrieved);

        assert_eq!(histogram.counts, [0, 0, 1, 2]);
        assert_eq!(histogram.unknown, 1);
        assert_eq!(histogram.total(), 4);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let pairs = [(3, 3), (2, 1), (1, 1), (0, 0)]
            .iter()
            .enumerate()
            .map(|(i, (h, m))| (i.to_string(), GradedPair { human: *h, model: *m }))
            .collect();

        let agreement = agreement_from_pairs(pairs);

        assert_eq!(agreement.equal, 3);
        assert_eq!(agreement.human_higher, 1);
        assert_eq!(agreement.model_higher, 0);
        assert_eq!(agreement.confusion[3][3], 1);
        assert_eq!(agreement.confusion[2][1], 1);
        assert_eq!(agreement.confusion[1][1], 1);
        assert_eq!(agreement.confusion[0][0], 1);
        assert_eq!(agreement.confusion.iter().flatten().sum::<u32>(), 4);
        assert_eq!(agreement.human_totals, [1, 1, 1, 1]);
        assert_eq!(agreement.model_totals, [1, 2, 0, 1]);
        assert!((agreement.average_human - 1.5).abs() < 1e-12);
        assert!((agreement.average_model - 1.25).abs() < 1e-12);
        assert!(agreement.correlation.is_some_and(|c| c.rho > 0.9));
    }

    #[test]
    fn test_grade_agreement_joins_graded_files() {
        let aggregator = MetricsAggregator::new().unwrap();
        let graded = vec![
            GradedFreeform::parse("a.txt", &graded_file("3")).unwrap(),
            GradedFreeform::parse("b.txt", &graded_file("0")).unwrap(),
        ];

        let agreement = aggregator
            .grade_agreement("t", &batch(&[("a", "Grade: 2"), ("b.txt", "0")]), &graded)
            .unwrap();
        assert_eq!(agreement.pairs[0], ("a".to_string(), GradedPair { human: 3, model: 2 }));
        assert_eq!(agreement.pairs[1].0, "b");
        assert_eq!(agreement.human_higher, 1);

        let missing = aggregator.grade_agreement("t", &batch(&[("a", "none")]), &graded);
        assert!(matches!(missing, Err(Error::MissingGrade(_))));

        let unknown = aggregator.grade_agreement("t", &batch(&[("z", "1")]), &graded);
        assert!(matches!(unknown, Err(Error::UnknownIdentifier(_))));
    }
}
