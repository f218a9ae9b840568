use crate::schema::{default_of, open_unit, parse};
use pipecore::{Config, OperationKind, PathTree, PortType, Predecessor, TargetKind};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MineConfig {
    pub target_attrs: Vec<String>,
    pub target_kind: TargetKind,
    /// Significance level for pattern quality tests.
    pub alpha: f64,
    pub max_depth: u32,
    pub min_support: u32,
    pub beam_width: u32,
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            target_attrs: Vec::new(),
            target_kind: TargetKind::Numerical,
            alpha: 0.05,
            max_depth: 3,
            min_support: 10,
            beam_width: 20,
        }
    }
}

/// Subgroup discovery over a dataset.
pub struct MineOperation;

impl Operation for MineOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Mine
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::PatternSet))
    }

    fn description(&self) -> &str {
        "Mine interesting subgroups for target attributes"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<MineConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<MineConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };

        let targets_fit = match config.target_kind {
            TargetKind::Numerical => {
                !config.target_attrs.is_empty()
                    && config.target_attrs.iter().all(|t| upstream.is_numeric(t))
            }
            TargetKind::Nominal => {
                config.target_attrs.len() == 1 && upstream.is_categorical(&config.target_attrs[0])
            }
        };

        targets_fit && open_unit(config.alpha) && config.max_depth >= 1 && config.beam_width >= 1
    }

    /// Works on the raw record: a malformed target list is reset too.
    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let Some(upstream) = tree.input_dataset(0) else {
            return config.clone();
        };
        let Some(fields) = config.as_object() else {
            return config.clone();
        };

        let still_valid = match fields.get("targetAttrs") {
            None => true,
            Some(Config::Array(targets)) => targets
                .iter()
                .all(|t| t.as_str().is_some_and(|t| upstream.has_column(t))),
            Some(_) => false,
        };
        if still_valid {
            return config.clone();
        }

        let mut fields = fields.clone();
        fields.insert("targetAttrs".to_string(), Config::Array(Vec::new()));
        Config::Object(fields)
    }
}
