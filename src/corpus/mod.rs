//! @ai:module:intent Strategy dataset definitions and loading
//! @ai:module:layer domain
//! @ai:module:public_api Strategy, PrimaryArea, StrategyType, StrategyLoader, ItemId, DatasetStats

pub mod loader;
pub mod numbering;
pub mod stats;
pub mod strategy;

pub use loader::{parse_strategy, prefix_of, StrategyLoader, StrategyLoaderTrait};
pub use numbering::{
    replace_adversarial_step, strategy_number_of, strip_numbering, ItemId, ItemKind,
    NumberingError, StepId,
};
pub use stats::{DatasetStats, ItemCountStats};
pub use strategy::{PrimaryArea, Strategy, StrategyType};
