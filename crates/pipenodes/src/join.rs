use crate::schema::{default_of, keep_present, parse, realign_typed};
use pipecore::{Config, NodeId, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinConfig {
    /// One row per key; entry `i` names the key column of the `i`-th
    /// connected input, counted in port order.
    pub join: Vec<Vec<Option<String>>>,
    /// Suffix appended to clashing column names, per connected input.
    pub suffixes: Vec<Option<String>>,
    pub how: JoinHow,
}

impl JoinConfig {
    /// Suffixes already used by Join nodes upstream of `tree`'s root.
    fn upstream_suffixes(tree: &PathTree) -> HashSet<String> {
        tree.children
            .iter()
            .flat_map(PathTree::walk)
            .filter(|t| t.node.kind == OperationKind::Join)
            .filter_map(|t| t.node.config.as_ref().and_then(parse::<JoinConfig>))
            .flat_map(|c| c.suffixes.into_iter().flatten())
            .collect()
    }

    /// `_<source>`, then `_<source><own>`, then `_<source><own>_<position>`,
    /// whichever is free first.
    fn default_suffix(source: NodeId, own: NodeId, position: usize, taken: &HashSet<String>) -> String {
        let mut suffix = format!("_{}", source);
        if taken.contains(&suffix) {
            suffix = format!("{}{}", suffix, own);
        }
        if taken.contains(&suffix) {
            suffix = format!("{}_{}", suffix, position);
        }
        suffix
    }
}

/// Joins two or more datasets on key columns.
pub struct JoinOperation;

impl Operation for JoinOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Join
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::DatasetList), Ports::Single(PortType::Dataset))
            .with_min_list_inputs(2)
    }

    fn description(&self) -> &str {
        "Join datasets on key columns"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<JoinConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let Some(config) = parse::<JoinConfig>(config) else {
            return false;
        };
        if config.join.is_empty() {
            return false;
        }

        let rows_resolve = config.join.iter().all(|row| {
            row.len() == predecessors.len()
                && row.iter().zip(predecessors).all(|(column, predecessor)| {
                    let dataset = predecessor.dataset();
                    match (column, dataset) {
                        (Some(column), Some(dataset)) => dataset.has_column(column),
                        _ => false,
                    }
                })
        });

        let mut seen = HashSet::new();
        let suffixes_distinct = config.suffixes.iter().flatten().all(|s| seen.insert(s));

        rows_resolve && suffixes_distinct
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let own = tree.id();
        let mut taken = JoinConfig::upstream_suffixes(tree);

        realign_typed(config, |c: &mut JoinConfig| {
            for row in &mut c.join {
                for (column, input) in row.iter_mut().zip(&tree.children) {
                    if let Some(dataset) = input.dataset() {
                        keep_present(column, dataset);
                    }
                }
            }

            if c.suffixes.len() < tree.children.len() {
                c.suffixes.resize(tree.children.len(), None);
            }
            taken.extend(c.suffixes.iter().flatten().cloned());
            for (position, (suffix, input)) in c.suffixes.iter_mut().zip(&tree.children).enumerate() {
                if suffix.is_none() {
                    let assigned = JoinConfig::default_suffix(input.id(), own, position, &taken);
                    taken.insert(assigned.clone());
                    *suffix = Some(assigned);
                }
            }
        })
    }
}
