//! @ai:module:intent Tabulate dataset composition (step counts, areas, strategy types)
//! @ai:module:layer application
//! @ai:module:public_api DatasetStats, ItemCountStats
//! @ai:module:stateless true

use crate::corpus::strategy::Strategy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent Min/max/mean of a per-strategy item count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCountStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl ItemCountStats {
    fn from_counts(counts: &[usize]) -> Self {
        if counts.is_empty() {
            return Self::default();
        }

        Self {
            min: counts.iter().copied().min().unwrap_or(0),
            max: counts.iter().copied().max().unwrap_or(0),
            mean: counts.iter().sum::<usize>() as f64 / counts.len() as f64,
        }
    }
}

/// @ai:intent Composition summary of the whole dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    /// (file name, strategy step count) in prefix order
    pub files: Vec<(String, usize)>,
    pub total_steps: usize,
    pub by_primary_area: BTreeMap<String, u32>,
    pub by_strategy_type: BTreeMap<String, u32>,
    pub strategy_steps: ItemCountStats,
    pub background_items: ItemCountStats,
    pub goal_items: ItemCountStats,
    pub analysis_items: ItemCountStats,
}

impl DatasetStats {
    /// @ai:intent Collect stats, validating every numbered section on the way
    /// @ai:effects pure
    pub fn collect(strategies: &[Strategy]) -> Result<Self> {
        let mut files = Vec::with_capacity(strategies.len());
        let mut by_primary_area = BTreeMap::new();
        let mut by_strategy_type = BTreeMap::new();
        let mut steps = Vec::new();
        let mut background = Vec::new();
        let mut goals = Vec::new();
        let mut analysis = Vec::new();

        for strategy in strategies {
            *by_primary_area
                .entry(strategy.primary_area.as_str().to_string())
                .or_insert(0) += 1;
            *by_strategy_type
                .entry(strategy.strategy_type.as_str().to_string())
                .or_insert(0) += 1;

            let step_count = strategy.strategy_steps()?.len();
            let stem = strategy
                .file_name
                .strip_suffix(".txt")
                .unwrap_or(&strategy.file_name)
                .to_string();
            files.push((stem, step_count));

            steps.push(step_count);
            background.push(strategy.background_items()?.len());
            goals.push(strategy.goal_items()?.len());
            analysis.push(strategy.analysis_items()?.len());
        }

        Ok(Self {
            total_steps: steps.iter().sum(),
            files,
            by_primary_area,
            by_strategy_type,
            strategy_steps: ItemCountStats::from_counts(&steps),
            background_items: ItemCountStats::from_counts(&background),
            goal_items: ItemCountStats::from_counts(&goals),
            analysis_items: ItemCountStats::from_counts(&analysis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::parse_strategy;
    use crate::corpus::loader::tests::sample_strategy;

    #[test]
    fn test_collect_counts() {
        let a = parse_strategy("1_A.txt", &sample_strategy("A")).unwrap();
        let b = parse_strategy(
            "2_B.txt",
            &sample_strategy("B").replace("Deferral\n\nNOTES", "Legal Cleverness\n\nNOTES"),
        )
        .unwrap();

        let stats = DatasetStats::collect(&[a, b]).unwrap();

        assert_eq!(stats.total_steps, 6);
        assert_eq!(stats.files[0], ("1_A".to_string(), 3));
        assert_eq!(stats.by_primary_area.get("Partnership"), Some(&2));
        assert_eq!(stats.by_strategy_type.get("Deferral"), Some(&1));
        assert_eq!(stats.by_strategy_type.get("Legal Cleverness"), Some(&1));
        assert_eq!(stats.goal_items.max, 1);
        assert!((stats.background_items.mean - 2.0).abs() < 0.01);
    }
}
