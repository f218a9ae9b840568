//! Small graphs for unit-testing single operations.

use crate::standard_registry;
use pipecore::{
    resolve_path, Config, Dataset, Edge, Graph, Node, NodeId, OperationKind, PathTree, Payload,
    Readiness,
};
use piperuntime::evaluate;

/// One ready producer per entry of `inputs`, wired in order to ports
/// `0..` of a consumer of `kind` configured with `config`.
pub struct Bench {
    pub graph: Graph,
    pub node: NodeId,
}

impl Bench {
    pub fn new(kind: OperationKind, config: Config, inputs: Vec<(usize, Payload)>) -> Self {
        let mut graph = Graph::new();
        let node = NodeId(100);

        for (index, (port, payload)) in inputs.into_iter().enumerate() {
            let producer = match payload {
                Payload::Dataset(_) => OperationKind::Load,
                Payload::PatternSet(_) => OperationKind::Mine,
                Payload::Model(_) => OperationKind::Regression,
                Payload::PatternSelection(_) => OperationKind::Browse,
            };
            let id = NodeId(index as u32);
            let mut source = Node::new(id, producer, 1);
            source.config = Some(serde_json::json!({}));
            source.readiness = Readiness::Ok;
            source.outputs[0] = Some(payload);
            graph.insert_node(source);
            graph.push_edge(Edge::new(id, 0, node, port));
        }

        graph.insert_node(Node::new(node, kind, 1).with_config(Some(config)));
        Self { graph, node }
    }

    pub fn tree(&self) -> PathTree {
        resolve_path(&self.graph, self.node, 0).unwrap()
    }

    pub fn readiness(&self) -> Readiness {
        evaluate(&self.graph, &standard_registry(), self.node)
    }

    /// Realigned config of the consumer.
    pub fn realign(&self) -> Config {
        let registry = standard_registry();
        let node = self.graph.node(self.node).unwrap();
        let config = node.config.clone().unwrap();
        registry.require(node.kind).unwrap().realign(&self.tree(), &config)
    }
}

pub fn dataset(columns: &[&str]) -> Dataset {
    Dataset::new("file", columns.iter().copied())
}

pub fn input(dataset: Dataset) -> Vec<(usize, Payload)> {
    vec![(0, Payload::Dataset(dataset))]
}
