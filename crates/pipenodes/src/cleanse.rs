//! Column-level cleansing: an ordered list of transforms applied to one
//! dataset.
//!
//! Transforms may introduce columns (rename, one-hot, rank, derive) that
//! later transforms depend on. Realignment replays the list against the
//! current upstream schema and drops every transform whose inputs are gone,
//! along with everything that depended on what it would have produced.

use crate::schema::{default_of, parse, realign_typed};
use pipecore::{ColumnType, Config, Dataset, OperationKind, PathTree, PortType, Predecessor, Value};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanseConfig {
    pub transforms: Vec<Transform>,
    /// Columns dropped from the output.
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    /// Editor bookkeeping; ignored when comparing configs.
    #[serde(default)]
    pub id: u32,
    pub attr: String,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(flatten)]
    pub op: TransformOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TransformOp {
    Rename {
        to: String,
    },
    OneHot {
        #[serde(default)]
        columns: Vec<String>,
    },
    Rank {
        to: String,
    },
    /// New column `attr` computed from `deps`.
    Derive {
        expression: String,
    },
    Fill {
        value: Value,
    },
    Cast {
        to: ColumnType,
    },
    Clip {
        #[serde(default)]
        lb: Option<f64>,
        #[serde(default)]
        ub: Option<f64>,
    },
    Filter {
        expression: String,
    },
    Normalize,
}

impl Transform {
    /// Columns this transform makes available to later transforms.
    pub fn introduced(&self) -> Vec<String> {
        match &self.op {
            TransformOp::Rename { to } | TransformOp::Rank { to } => vec![to.clone()],
            TransformOp::OneHot { columns } => columns.clone(),
            TransformOp::Derive { .. } => vec![self.attr.clone()],
            _ => Vec::new(),
        }
    }

    /// Columns that must exist before this transform runs.
    pub fn required(&self) -> Vec<&str> {
        let deps = self.deps.iter().map(String::as_str);
        match self.op {
            TransformOp::Derive { .. } => deps.collect(),
            _ => std::iter::once(self.attr.as_str()).chain(deps).collect(),
        }
    }

    fn well_formed(&self) -> bool {
        match &self.op {
            TransformOp::Rename { to } | TransformOp::Rank { to } => !to.trim().is_empty(),
            TransformOp::OneHot { columns } => !columns.is_empty(),
            TransformOp::Derive { expression } | TransformOp::Filter { expression } => {
                !self.attr.trim().is_empty() && !expression.trim().is_empty()
            }
            TransformOp::Clip { lb, ub } => match (lb, ub) {
                (Some(lb), Some(ub)) => lb <= ub,
                (None, None) => false,
                _ => true,
            },
            _ => true,
        }
    }
}

impl CleanseConfig {
    /// Replays the transforms over `upstream`, keeping those whose inputs are
    /// all reachable and filtering the deleted list likewise.
    pub fn replay(&mut self, upstream: &Dataset) {
        let mut introduced: HashSet<String> = HashSet::new();
        let mut invalidated: HashSet<String> = HashSet::new();

        self.transforms.retain(|transform| {
            let reachable = transform.required().iter().all(|column| {
                (upstream.has_column(column) || introduced.contains(*column))
                    && !invalidated.contains(*column)
            });
            if reachable {
                introduced.extend(transform.introduced());
            } else {
                invalidated.insert(transform.attr.clone());
                invalidated.extend(transform.introduced());
            }
            reachable
        });

        self.deleted.retain(|column| {
            (upstream.has_column(column) || introduced.contains(column))
                && !invalidated.contains(column)
        });
    }
}

/// Applies cleansing transforms to a dataset.
pub struct CleanseOperation;

impl Operation for CleanseOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Cleanse
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::Dataset))
            .provisional()
    }

    fn description(&self) -> &str {
        "Rename, derive, fill and filter columns"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<CleanseConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<CleanseConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };
        if !config.transforms.iter().all(Transform::well_formed) {
            return false;
        }
        let mut replayed = config.clone();
        replayed.replay(upstream);
        replayed == config
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let Some(upstream) = tree.input_dataset(0) else {
            return config.clone();
        };
        realign_typed(config, |c: &mut CleanseConfig| c.replay(upstream))
    }

    fn normalize(&self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(transforms) = config.get_mut("transforms").and_then(Config::as_array_mut) {
            for transform in transforms.iter_mut().filter_map(Config::as_object_mut) {
                transform.remove("id");
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{dataset, input, Bench};
    use pipecore::Readiness;
    use serde_json::json;

    fn chain() -> Config {
        json!({
            "transforms": [
                {"id": 1, "op": "rename", "attr": "a", "to": "x"},
                {"id": 2, "op": "derive", "attr": "y", "deps": ["x"], "expression": "x * 2"},
                {"id": 3, "op": "fill", "attr": "b", "value": 0},
                {"id": 4, "op": "clip", "attr": "y", "lb": 0.0}
            ],
            "deleted": ["b", "x"]
        })
    }

    #[test]
    fn transforms_deserialize_flat() {
        let config: CleanseConfig = serde_json::from_value(chain()).unwrap();
        assert_eq!(config.transforms.len(), 4);
        assert_eq!(
            config.transforms[0].op,
            TransformOp::Rename { to: "x".into() }
        );
        assert_eq!(config.transforms[1].required(), vec!["x"]);
        assert_eq!(config.transforms[1].introduced(), vec!["y".to_string()]);
    }

    #[test]
    fn intact_chain_is_ready_and_unchanged() {
        let bench = Bench::new(OperationKind::Cleanse, chain(), input(dataset(&["a", "b"])));
        assert_eq!(bench.readiness(), Readiness::Ok);
        assert_eq!(bench.realign(), chain());
    }

    #[test]
    fn missing_column_cascades_through_dependents() {
        let bench = Bench::new(OperationKind::Cleanse, chain(), input(dataset(&["b", "c"])));
        assert_eq!(bench.readiness(), Readiness::Unready);

        let repaired: CleanseConfig = serde_json::from_value(bench.realign()).unwrap();
        let kept: Vec<u32> = repaired.transforms.iter().map(|t| t.id).collect();
        // rename(a) goes, so derive(x) and clip(y) follow it.
        assert_eq!(kept, vec![3]);
        assert_eq!(repaired.deleted, vec!["b".to_string()]);
    }

    #[test]
    fn ids_do_not_affect_equality() {
        let op = CleanseOperation;
        let mut renumbered = chain();
        renumbered["transforms"][0]["id"] = json!(99);
        assert_eq!(op.normalize(&renumbered), op.normalize(&chain()));
        assert_ne!(renumbered, chain());
    }

    #[test]
    fn empty_clip_is_rejected() {
        let bench = Bench::new(
            OperationKind::Cleanse,
            json!({"transforms": [{"op": "clip", "attr": "a"}]}),
            input(dataset(&["a"])),
        );
        assert_eq!(bench.readiness(), Readiness::Unready);
    }
}
