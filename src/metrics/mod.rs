//! @ai:module:intent Grade extraction, tallies and agreement statistics
//! @ai:module:layer application
//! @ai:module:public_api MetricsAggregator, GradeExtractor, BinaryTally, GradeHistogram, GradeAgreement, spearman

pub mod aggregator;
pub mod grades;
pub mod spearman;
pub mod types;

pub use aggregator::{agreement_from_pairs, MetricsAggregator};
pub use grades::GradeExtractor;
pub use spearman::{spearman, RankCorrelation};
pub use types::{
    BinaryTally, GradeAgreement, GradeHistogram, GradedPair, StrategyStatus, GRADES_DESCENDING,
};
