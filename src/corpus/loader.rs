//! @ai:module:intent Strategy-file loader enforcing the dataset section grammar
//! @ai:module:layer infrastructure
//! @ai:module:public_api StrategyLoader, StrategyLoaderTrait, parse_strategy
//! @ai:module:stateless true

use crate::corpus::numbering::{ItemKind, StepId};
use crate::corpus::strategy::{PrimaryArea, Strategy, StrategyType};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BACKGROUND_HEADER: &str = "\nBACKGROUND:";
const GOALS_HEADER: &str = "\nGOALS:";
const STRATEGY_HEADER: &str = "\nSTRATEGY:";
const ANALYSIS_HEADER: &str = "\nANALYSIS (the analysis numbering below does NOT correspond to the strategy step numbering above):";
const ADVERSARIAL_HEADER: &str = "\nADVERSARIAL STRATEGY STEP(S):";
const PRIMARY_AREA_HEADER: &str = "\nPRIMARY TAX-LAW AREA:";
const STRATEGY_TYPE_HEADER: &str = "\nSTRATEGY TYPE:";
const NOTES_HEADER: &str = "\nNOTES:";

/// @ai:intent Trait for loading the strategy dataset
pub trait StrategyLoaderTrait: Send + Sync {
    /// @ai:intent Load every strategy, in prefix order
    fn load_all(&self, strategies_dir: &Path) -> Result<Vec<Strategy>>;

    /// @ai:intent Load one strategy or all of them
    fn load_selected(&self, strategies_dir: &Path, number: Option<u32>) -> Result<Vec<Strategy>>;

    /// @ai:intent Load a single strategy by its numeric prefix
    fn load_by_number(&self, strategies_dir: &Path, number: u32) -> Result<Option<Strategy>>;
}

/// @ai:intent Loads strategies from `<n>_<Title>.txt` files
/// @ai:effects pure (stateless)
pub struct StrategyLoader;

impl StrategyLoader {
    /// @ai:intent Create a new strategy loader
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent List strategy files ordered by prefix, stopping at the first gap
    /// @ai:post result[i] has prefix i + 1
    /// @ai:effects fs:read
    pub fn list_files(strategies_dir: &Path) -> Vec<PathBuf> {
        let by_prefix: HashMap<u32, PathBuf> = WalkDir::new(strategies_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();

                if !name.ends_with(".txt") {
                    return None;
                }
                let prefix = prefix_of(&name)?;
                Some((prefix, e.path().to_path_buf()))
            })
            .collect();

        (1..)
            .map_while(|prefix| by_prefix.get(&prefix).cloned())
            .collect()
    }

    /// @ai:intent Resolve the file name for a numeric prefix
    /// @ai:effects fs:read
    pub fn file_name_for(strategies_dir: &Path, number: u32) -> Option<String> {
        Self::list_files(strategies_dir)
            .into_iter()
            .nth(number.checked_sub(1)? as usize)
            .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
    }

    /// @ai:intent Parse a single strategy file
    /// @ai:pre path points to a readable strategy file
    /// @ai:effects fs:read
    fn parse_strategy_file(path: &Path) -> Result<Strategy> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        parse_strategy(&file_name, &content)
    }

    /// @ai:intent Look up the text of a single strategy step by identifier
    /// @ai:effects fs:read
    pub fn strategy_step(&self, strategies_dir: &Path, id: &StepId) -> Result<String> {
        if id.kind != ItemKind::Step {
            return Err(Error::grammar(id.to_string(), "not a step identifier"));
        }

        let strategy = self
            .load_by_number(strategies_dir, id.strategy)?
            .ok_or_else(|| Error::grammar(id.to_string(), "no strategy file with this number"))?;

        strategy.step(id.index)
    }
}

impl Default for StrategyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyLoaderTrait for StrategyLoader {
    /// @ai:intent Load every strategy, failing on the first grammar violation
    /// @ai:effects fs:read
    fn load_all(&self, strategies_dir: &Path) -> Result<Vec<Strategy>> {
        Self::list_files(strategies_dir)
            .iter()
            .map(|path| Self::parse_strategy_file(path))
            .collect()
    }

    /// @ai:intent Load one strategy or all of them
    /// @ai:effects fs:read
    fn load_selected(&self, strategies_dir: &Path, number: Option<u32>) -> Result<Vec<Strategy>> {
        match number {
            Some(n) => Ok(self.load_by_number(strategies_dir, n)?.into_iter().collect()),
            None => self.load_all(strategies_dir),
        }
    }

    /// @ai:intent Load a single strategy by its numeric prefix
    /// @ai:effects fs:read
    fn load_by_number(&self, strategies_dir: &Path, number: u32) -> Result<Option<Strategy>> {
        let path = match number.checked_sub(1) {
            Some(idx) => Self::list_files(strategies_dir).into_iter().nth(idx as usize),
            None => None,
        };

        path.map(|p| Self::parse_strategy_file(&p)).transpose()
    }
}

/// @ai:intent Numeric prefix of a strategy file name (`12` for `12_Foo.txt`)
/// @ai:effects pure
pub fn prefix_of(file_name: &str) -> Option<u32> {
    let (prefix, _) = file_name.split_once('_')?;
    prefix.parse().ok()
}

/// @ai:intent Parse strategy file content according to the section grammar
/// @ai:pre headers appear in the fixed order AUTHORITY, BACKGROUND, ..., NOTES
/// @ai:post category fields hold one of the allowed values
/// @ai:effects pure
pub fn parse_strategy(file_name: &str, content: &str) -> Result<Strategy> {
    let find = |header: &str, label: &str| -> Result<usize> {
        match content.find(header) {
            Some(idx) if idx > 0 => Ok(idx),
            _ => Err(Error::grammar(file_name, format!("expected {}", label))),
        }
    };

    let authority_idx = find("\nAUTHORITY", "AUTHORITY")?;
    let background_idx = find(BACKGROUND_HEADER, "BACKGROUND")?;
    let goals_idx = find(GOALS_HEADER, "GOALS")?;
    let strategy_idx = find(STRATEGY_HEADER, "STRATEGY")?;
    let analysis_idx = find(ANALYSIS_HEADER, "ANALYSIS")?;
    let adversarial_idx = find(ADVERSARIAL_HEADER, "ADVERSARIAL STRATEGY STEP(S)")?;
    let area_idx = find(PRIMARY_AREA_HEADER, "PRIMARY TAX-LAW AREA")?;
    let type_idx = find(STRATEGY_TYPE_HEADER, "STRATEGY TYPE")?;
    let notes_idx = find(NOTES_HEADER, "NOTES")?;

    let order = [
        authority_idx,
        background_idx,
        goals_idx,
        strategy_idx,
        analysis_idx,
        adversarial_idx,
        area_idx,
        type_idx,
        notes_idx,
    ];

    if order.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::grammar(file_name, "sections are out of order"));
    }

    let body = |start: usize, header: &str, end: usize| -> String {
        content[start + header.len()..end].trim().to_string()
    };

    let area_label = body(area_idx, PRIMARY_AREA_HEADER, type_idx);
    let primary_area = PrimaryArea::from_label(&area_label).ok_or_else(|| {
        Error::grammar(file_name, format!("invalid primary tax-law area {:?}", area_label))
    })?;

    let type_label = body(type_idx, STRATEGY_TYPE_HEADER, notes_idx);
    let strategy_type = StrategyType::from_label(&type_label).ok_or_else(|| {
        Error::grammar(file_name, format!("invalid strategy type {:?}", type_label))
    })?;

    Ok(Strategy {
        number: prefix_of(file_name).unwrap_or_default(),
        file_name: file_name.to_string(),
        authorities: content[authority_idx..background_idx].trim().to_string(),
        background: body(background_idx, BACKGROUND_HEADER, goals_idx),
        goals: body(goals_idx, GOALS_HEADER, strategy_idx),
        strategy: body(strategy_idx, STRATEGY_HEADER, analysis_idx),
        analysis: body(analysis_idx, ANALYSIS_HEADER, adversarial_idx),
        adversarial_step: body(adversarial_idx, ADVERSARIAL_HEADER, area_idx),
        primary_area,
        strategy_type,
        notes: content[notes_idx + NOTES_HEADER.len()..].trim().to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) fn sample_strategy(title: &str) -> String {
        format!(
            "{title}\n\
AUTHORITY:\n\
IRC 1001(a): gain is amount realized over basis.\n\
\n\
BACKGROUND:\n\
1) Alice owns stock with basis $10.\n\
2) The stock is worth $100.\n\
\n\
GOALS:\n\
1) Alice defers recognizing the gain.\n\
\n\
STRATEGY:\n\
1) Alice contributes the stock to a partnership.\n\
2) The partnership holds the stock.\n\
3) Alice receives a partnership interest.\n\
\n\
ANALYSIS (the analysis numbering below does NOT correspond to the strategy step numbering above):\n\
1) The contribution is nonrecognition under section 721.\n\
2) Alice takes a substituted basis.\n\
\n\
ADVERSARIAL STRATEGY STEP(S):\n\
2) The partnership sells the stock immediately.\n\
\n\
PRIMARY TAX-LAW AREA:\n\
Partnership\n\
\n\
STRATEGY TYPE:\n\
Deferral\n\
\n\
NOTES:\n\
Simplified example.\n"
        )
    }

    pub(crate) fn create_strategy_file(dir: &Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_parse_sections() {
        let strategy = parse_strategy("1_Deferral.txt", &sample_strategy("Deferral")).unwrap();

        assert_eq!(strategy.number, 1);
        assert!(strategy.authorities.starts_with("AUTHORITY:"));
        assert_eq!(strategy.goal_items().unwrap(), vec!["Alice defers recognizing the gain."]);
        assert_eq!(strategy.strategy_steps().unwrap().len(), 3);
        assert_eq!(strategy.analysis_items().unwrap().len(), 2);
        assert_eq!(
            strategy.adversarial_step,
            "2) The partnership sells the stock immediately."
        );
        assert_eq!(strategy.primary_area, PrimaryArea::Partnership);
        assert_eq!(strategy.strategy_type, StrategyType::Deferral);
        assert_eq!(strategy.notes, "Simplified example.");
    }

    #[test]
    fn test_missing_section_is_grammar_error() {
        let content = sample_strategy("X").replace("\nGOALS:", "\nOBJECTIVES:");
        let err = parse_strategy("1_X.txt", &content).unwrap_err();
        assert!(err.to_string().contains("expected GOALS"));
    }

    #[test]
    fn test_invalid_category_is_grammar_error() {
        let content = sample_strategy("X").replace("Partnership\n", "Estate Tax\n");
        let err = parse_strategy("1_X.txt", &content).unwrap_err();
        assert!(err.to_string().contains("primary tax-law area"));
    }

    #[test]
    fn test_list_files_stops_at_gap() {
        let temp = TempDir::new().unwrap();
        create_strategy_file(temp.path(), "1_A.txt", &sample_strategy("A"));
        create_strategy_file(temp.path(), "2_B.txt", &sample_strategy("B"));
        create_strategy_file(temp.path(), "4_D.txt", &sample_strategy("D"));
        create_strategy_file(temp.path(), "notes.md", "ignored");

        let files = StrategyLoader::list_files(temp.path());
        assert_eq!(files.len(), 2);
        assert!(files[1].ends_with("2_B.txt"));
        assert_eq!(
            StrategyLoader::file_name_for(temp.path(), 2).as_deref(),
            Some("2_B.txt")
        );
    }

    #[test]
    fn test_load_selected_and_step_lookup() {
        let temp = TempDir::new().unwrap();
        create_strategy_file(temp.path(), "1_A.txt", &sample_strategy("A"));
        create_strategy_file(temp.path(), "2_B.txt", &sample_strategy("B"));

        let loader = StrategyLoader::new();
        assert_eq!(loader.load_selected(temp.path(), None).unwrap().len(), 2);

        let selected = loader.load_selected(temp.path(), Some(2)).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].number, 2);

        let step = loader
            .strategy_step(temp.path(), &StepId::step(2, 3))
            .unwrap();
        assert_eq!(step, "Alice receives a partnership interest.");
        assert!(loader.strategy_step(temp.path(), &StepId::step(2, 4)).is_err());
    }
}
