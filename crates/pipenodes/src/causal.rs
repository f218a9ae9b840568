use crate::schema::{open_unit, parse, realign_typed};
use pipecore::{Config, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CausalEdgeKind {
    #[default]
    Directed,
    Undirected,
    /// Background knowledge: this edge must not appear.
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CausalEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: CausalEdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CausalConfig {
    /// Attribute -> included in the causal graph.
    pub nodes: BTreeMap<String, bool>,
    pub edges: Vec<CausalEdge>,
    pub alpha: f64,
    pub max_conditioning: u32,
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            alpha: 0.05,
            max_conditioning: 3,
        }
    }
}

/// Causal structure exploration over a dataset, optionally focused by a
/// pattern selection.
pub struct CausalOperation;

const DATA: usize = 0;

impl Operation for CausalOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Causal
    }

    fn contract(&self) -> Contract {
        Contract::new(
            Ports::Dual([PortType::Dataset, PortType::PatternSelection]),
            Ports::None,
        )
    }

    fn description(&self) -> &str {
        "Explore causal structure"
    }

    fn default_config(&self) -> Option<Config> {
        serde_json::to_value(CausalConfig::default()).ok()
    }

    /// The pattern-selection port is optional.
    fn check_arity(&self, predecessors: &[Predecessor<'_>]) -> bool {
        match predecessors {
            [_, _] => true,
            [only] => only.dest_port == DATA,
            _ => false,
        }
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let Some(config) = parse::<CausalConfig>(config) else {
            return false;
        };
        let Some(data) = Predecessor::on_port(predecessors, DATA).and_then(|p| p.dataset()) else {
            return false;
        };

        let included = config.nodes.iter().filter(|(_, on)| **on).count();
        included >= 2
            && config.nodes.keys().all(|attr| data.has_column(attr))
            && config
                .edges
                .iter()
                .all(|e| config.nodes.contains_key(&e.from) && config.nodes.contains_key(&e.to))
            && open_unit(config.alpha)
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let Some(data) = tree.input_dataset(DATA) else {
            return config.clone();
        };
        realign_typed(config, |c: &mut CausalConfig| {
            c.nodes.retain(|attr, _| data.has_column(attr));
            c.edges
                .retain(|e| data.has_column(&e.from) && data.has_column(&e.to));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{dataset, input, Bench};
    use pipecore::Readiness;
    use serde_json::json;

    fn config() -> Config {
        json!({
            "nodes": {"a": true, "b": true, "c": false},
            "edges": [
                {"from": "a", "to": "b"},
                {"from": "c", "to": "a", "kind": "forbidden"}
            ]
        })
    }

    #[test]
    fn dataset_alone_is_enough() {
        let bench = Bench::new(OperationKind::Causal, config(), input(dataset(&["a", "b", "c"])));
        assert_eq!(bench.readiness(), Readiness::Ok);
    }

    #[test]
    fn needs_two_included_attributes() {
        let mut config = config();
        config["nodes"]["b"] = json!(false);
        let bench = Bench::new(OperationKind::Causal, config, input(dataset(&["a", "b", "c"])));
        assert_eq!(bench.readiness(), Readiness::Unready);
    }

    #[test]
    fn realign_filters_nodes_and_edges() {
        let bench = Bench::new(OperationKind::Causal, config(), input(dataset(&["a", "b"])));
        let repaired: CausalConfig = serde_json::from_value(bench.realign()).unwrap();

        assert_eq!(repaired.nodes.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(repaired.edges.len(), 1);
        assert_eq!(repaired.edges[0].kind, CausalEdgeKind::Directed);
    }
}
