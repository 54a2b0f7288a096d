//! @ai:module:intent Strategy definitions for the tax-strategy dataset
//! @ai:module:layer domain
//! @ai:module:public_api Strategy, PrimaryArea, StrategyType
//! @ai:module:stateless true

use crate::corpus::numbering::strip_numbering;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// @ai:intent Primary area of tax law a strategy belongs to
/// @ai:effects pure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryArea {
    IncomeTax,
    Partnership,
    International,
    Corporate,
    EmployeeBenefits,
}

impl PrimaryArea {
    pub const ALL: [PrimaryArea; 5] = [
        PrimaryArea::IncomeTax,
        PrimaryArea::Partnership,
        PrimaryArea::International,
        PrimaryArea::Corporate,
        PrimaryArea::EmployeeBenefits,
    ];

    /// @ai:intent Convert area to the label used in strategy files
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryArea::IncomeTax => "Income Tax",
            PrimaryArea::Partnership => "Partnership",
            PrimaryArea::International => "International",
            PrimaryArea::Corporate => "Corporate",
            PrimaryArea::EmployeeBenefits => "Employee Benefits",
        }
    }

    /// @ai:intent Parse the label used in strategy files
    /// @ai:effects pure
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.as_str() == label)
    }
}

impl std::fmt::Display for PrimaryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @ai:intent Avoidance technique a strategy relies on
/// @ai:effects pure
///
/// The first three follow Stiglitz's taxonomy of tax avoidance; `LegalCleverness`
/// covers strategies that hinge on drafting rather than economics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    ArbitrageBetweenTaxpayers,
    ArbitrageBetweenRates,
    Deferral,
    LegalCleverness,
}

impl StrategyType {
    pub const ALL: [StrategyType; 4] = [
        StrategyType::ArbitrageBetweenTaxpayers,
        StrategyType::ArbitrageBetweenRates,
        StrategyType::Deferral,
        StrategyType::LegalCleverness,
    ];

    /// @ai:intent Convert type to the label used in strategy files
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::ArbitrageBetweenTaxpayers => "Arbitrage Between Taxpayers",
            StrategyType::ArbitrageBetweenRates => "Arbitrage Between Rates",
            StrategyType::Deferral => "Deferral",
            StrategyType::LegalCleverness => "Legal Cleverness",
        }
    }

    /// @ai:intent Parse the label used in strategy files
    /// @ai:effects pure
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// @ai:intent A parsed strategy file
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Numeric file prefix (`3` for `3_Foo.txt`)
    pub number: u32,
    pub file_name: String,
    /// Authorities block including its `AUTHORITY` header line(s)
    pub authorities: String,
    pub background: String,
    pub goals: String,
    pub strategy: String,
    pub analysis: String,
    pub adversarial_step: String,
    pub primary_area: PrimaryArea,
    pub strategy_type: StrategyType,
    pub notes: String,
}

impl Strategy {
    /// @ai:intent Goals with their numbering stripped
    /// @ai:effects pure
    pub fn goal_items(&self) -> Result<Vec<String>> {
        self.numbered("GOALS", &self.goals)
    }

    /// @ai:intent Strategy steps with their numbering stripped
    /// @ai:effects pure
    pub fn strategy_steps(&self) -> Result<Vec<String>> {
        self.numbered("STRATEGY", &self.strategy)
    }

    /// @ai:intent Text of the 1-based strategy step `index`
    /// @ai:effects pure
    pub fn step(&self, index: u32) -> Result<String> {
        let steps = self.strategy_steps()?;

        index
            .checked_sub(1)
            .and_then(|idx| steps.get(idx as usize))
            .cloned()
            .ok_or_else(|| {
                Error::grammar(
                    &self.file_name,
                    format!("step {} out of range (1..={})", index, steps.len()),
                )
            })
    }

    /// @ai:intent Analysis items with their numbering stripped
    /// @ai:effects pure
    pub fn analysis_items(&self) -> Result<Vec<String>> {
        self.numbered("ANALYSIS", &self.analysis)
    }

    /// @ai:intent Background facts with their numbering stripped
    /// @ai:effects pure
    pub fn background_items(&self) -> Result<Vec<String>> {
        self.numbered("BACKGROUND", &self.background)
    }

    /// @ai:intent Whether the strategy carries any background facts
    /// @ai:effects pure
    pub fn has_background(&self) -> bool {
        !self.background.trim().is_empty()
    }

    fn numbered(&self, section: &str, text: &str) -> Result<Vec<String>> {
        strip_numbering(text)
            .map_err(|e| Error::grammar(&self.file_name, format!("{} section: {}", section, e)))
    }
}
