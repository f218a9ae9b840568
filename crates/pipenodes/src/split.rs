use crate::schema::{default_of, keep_present, open_unit, parse, realign_typed};
use pipecore::{Config, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitConfig {
    /// Share of rows sent to the first output.
    pub fraction: f64,
    pub seed: Option<u64>,
    pub stratify: Option<String>,
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            fraction: 0.8,
            seed: None,
            stratify: None,
            shuffle: true,
        }
    }
}

/// Splits a dataset into two row-disjoint parts.
pub struct SplitOperation;

impl Operation for SplitOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Split
    }

    fn contract(&self) -> Contract {
        Contract::new(
            Ports::Single(PortType::Dataset),
            Ports::Dual([PortType::Dataset, PortType::Dataset]),
        )
        .provisional()
    }

    fn description(&self) -> &str {
        "Split rows into two datasets"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<SplitConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<SplitConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };
        open_unit(config.fraction)
            && config
                .stratify
                .as_deref()
                .map_or(true, |column| upstream.is_categorical(column))
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        match tree.input_dataset(0) {
            Some(upstream) => {
                realign_typed(config, |c: &mut SplitConfig| keep_present(&mut c.stratify, upstream))
            }
            None => config.clone(),
        }
    }
}
