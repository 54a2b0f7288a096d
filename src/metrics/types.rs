//! @ai:module:intent Result types for the finalize stages of every task
//! @ai:module:layer domain
//! @ai:module:public_api StrategyStatus, BinaryTally, GradeHistogram, GradedPair, GradeAgreement
//! @ai:module:stateless true

use crate::batch::types::TokenUsage;
use crate::metrics::spearman::RankCorrelation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grades in display order
pub const GRADES_DESCENDING: [u8; 4] = [3, 2, 1, 0];

/// @ai:intent Verdict of one strategy across all of its yes/no items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    AllYes,
    No,
    Unknown,
}

/// @ai:intent Counts of a binary (yes/no) test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryTally {
    pub test_name: String,
    pub total_responses: u32,
    pub yes_responses: u32,
    pub unknown_responses: u32,
    /// Status per strategy number; a later No or Unknown replaces an earlier one
    pub strategies: BTreeMap<u32, StrategyStatus>,
    pub usage: TokenUsage,
}

impl BinaryTally {
    /// @ai:intent Strategies whose every item was answered Yes
    /// @ai:effects pure
    pub fn all_yes(&self) -> Vec<u32> {
        self.strategies
            .iter()
            .filter(|(_, status)| **status == StrategyStatus::AllYes)
            .map(|(number, _)| *number)
            .collect()
    }
}

/// @ai:intent Distribution of critic grades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeHistogram {
    pub test_name: String,
    /// Indexed by grade 0..=3
    pub counts: [u32; 4],
    pub unknown: u32,
    pub usage: TokenUsage,
}

impl GradeHistogram {
    pub fn total(&self) -> u32 {
        self.counts.iter().sum::<u32>() + self.unknown
    }
}

/// @ai:intent Human and model grade of one free-form answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedPair {
    pub human: u8,
    pub model: u8,
}

/// @ai:intent Agreement between human and model grades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeAgreement {
    pub test_name: String,
    /// (identifier, grades) in response order
    pub pairs: Vec<(String, GradedPair)>,
    pub average_human: f64,
    pub average_model: f64,
    pub equal: u32,
    pub human_higher: u32,
    pub model_higher: u32,
    /// confusion[human][model]
    pub confusion: [[u32; 4]; 4],
    pub human_totals: [u32; 4],
    pub model_totals: [u32; 4],
    pub correlation: Option<RankCorrelation>,
    pub usage: TokenUsage,
}
