use crate::schema::{default_of, keep_present, parse, realign_typed};
use pipecore::{Config, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleConfig {
    /// Number of rows; must be a positive integer.
    pub size: f64,
    pub replace: bool,
    /// Numeric column used as sampling weight.
    pub weight: Option<String>,
    pub seed: Option<u64>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            size: 100.0,
            replace: false,
            weight: None,
            seed: None,
        }
    }
}

/// Draws a random subset of rows.
pub struct SampleOperation;

impl Operation for SampleOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Sample
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::Dataset))
            .provisional()
    }

    fn description(&self) -> &str {
        "Sample rows"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<SampleConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<SampleConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };
        let whole = config.size.is_finite() && config.size.fract() == 0.0;
        whole
            && config.size >= 1.0
            && config
                .weight
                .as_deref()
                .map_or(true, |column| upstream.is_numeric(column))
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        match tree.input_dataset(0) {
            Some(upstream) => {
                realign_typed(config, |c: &mut SampleConfig| keep_present(&mut c.weight, upstream))
            }
            None => config.clone(),
        }
    }
}
