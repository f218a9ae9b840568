use crate::Slot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind-specific operation configuration, interpreted by the operation.
pub type Config = serde_json::Value;

/// Stable node identifier, assigned monotonically by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed catalogue of pipeline step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Load,
    Cleanse,
    Join,
    Aggregate,
    Split,
    Sample,
    Mine,
    Browse,
    Regression,
    Predict,
    Visualize,
    Causal,
    Export,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        OperationKind::Load,
        OperationKind::Cleanse,
        OperationKind::Join,
        OperationKind::Aggregate,
        OperationKind::Split,
        OperationKind::Sample,
        OperationKind::Mine,
        OperationKind::Browse,
        OperationKind::Regression,
        OperationKind::Predict,
        OperationKind::Visualize,
        OperationKind::Causal,
        OperationKind::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Load => "Load",
            OperationKind::Cleanse => "Cleanse",
            OperationKind::Join => "Join",
            OperationKind::Aggregate => "Aggregate",
            OperationKind::Split => "Split",
            OperationKind::Sample => "Sample",
            OperationKind::Mine => "Mine",
            OperationKind::Browse => "Browse",
            OperationKind::Regression => "Regression",
            OperationKind::Predict => "Predict",
            OperationKind::Visualize => "Visualize",
            OperationKind::Causal => "Causal",
            OperationKind::Export => "Export",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a node can currently be executed.
///
/// The variants carry no ordering; only identity matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    Ok,
    Unready,
    PredecessorMissing,
    PredecessorUnready,
    PredecessorNoOutput,
    Error,
}

impl Readiness {
    pub fn is_ok(&self) -> bool {
        matches!(self, Readiness::Ok)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A pipeline operation placed in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub kind: OperationKind,

    /// Kind-specific record; `None` means the node is unconfigured.
    pub config: Option<Config>,

    /// One slot per declared output port.
    pub outputs: Vec<Slot>,

    pub readiness: Readiness,

    /// The filled slots were synthesized by the engine rather than produced
    /// by an execution, and are rebuilt whenever the node is re-evaluated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub provisional: bool,
}

impl Node {
    pub fn new(id: NodeId, kind: OperationKind, output_arity: usize) -> Self {
        Self {
            id,
            kind,
            config: None,
            outputs: vec![None; output_arity],
            readiness: Readiness::Unready,
            provisional: false,
        }
    }

    pub fn with_config(mut self, config: Option<Config>) -> Self {
        self.config = config;
        self
    }

    /// Resets every output slot to the uninitialized placeholder.
    pub fn clear_outputs(&mut self) {
        for slot in &mut self.outputs {
            *slot = None;
        }
        self.provisional = false;
    }

    pub fn output(&self, port: usize) -> Option<&crate::Payload> {
        self.outputs.get(port).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId(7).to_string(), "7");
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in OperationKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
    }

    #[test]
    fn new_node_is_unready_with_empty_slots() {
        let node = Node::new(NodeId(3), OperationKind::Split, 2);
        assert_eq!(node.readiness, Readiness::Unready);
        assert_eq!(node.outputs, vec![None, None]);
        assert!(node.config.is_none());
    }

    #[test]
    fn null_config_deserializes_as_unconfigured() {
        let node: Node = serde_json::from_value(json!({
            "id": 1,
            "kind": "Cleanse",
            "config": null,
            "outputs": [null],
            "readiness": "Unready"
        }))
        .unwrap();
        assert!(node.config.is_none());
        assert_eq!(node.id, NodeId(1));
        assert!(!node.provisional);
    }

    #[test]
    fn clearing_outputs_drops_provisional_mark() {
        let mut node = Node::new(NodeId(2), OperationKind::Cleanse, 1);
        node.outputs[0] = Some(crate::Payload::Dataset(crate::Dataset::new("Cleanse2", ["a"])));
        node.provisional = true;
        assert_eq!(serde_json::to_value(&node).unwrap()["provisional"], json!(true));

        node.clear_outputs();
        assert!(node.outputs[0].is_none());
        assert!(!node.provisional);
        assert!(serde_json::to_value(&node).unwrap().get("provisional").is_none());
    }
}
