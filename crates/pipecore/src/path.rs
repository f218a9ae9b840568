//! Upstream dependency trees.
//!
//! A [`PathTree`] is rooted at one node and has one child per incoming edge,
//! ordered by destination port. Shared ancestors are *not* deduplicated: a
//! node reachable along two branches appears once under each, because
//! realignment reads inputs positionally per port.

use crate::{Dataset, Graph, GraphError, Node, NodeId, PatternSet, Payload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathTree {
    #[serde(flatten)]
    pub node: Node,

    /// Output port of this node consumed by the parent (0 at the root).
    pub out_port: usize,

    /// Input port of the parent this subtree feeds; `None` at the root.
    pub dest_port: Option<usize>,

    pub children: Vec<PathTree>,
}

impl PathTree {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// The payload this subtree hands to its parent.
    pub fn output(&self) -> Option<&Payload> {
        self.node.output(self.out_port)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.output().and_then(Payload::as_dataset)
    }

    pub fn pattern_set(&self) -> Option<&PatternSet> {
        self.output().and_then(Payload::as_pattern_set)
    }

    /// The child feeding input `port`.
    pub fn input(&self, port: usize) -> Option<&PathTree> {
        self.children.iter().find(|c| c.dest_port == Some(port))
    }

    /// Dataset arriving on input `port`, if materialized.
    pub fn input_dataset(&self, port: usize) -> Option<&Dataset> {
        self.input(port).and_then(PathTree::dataset)
    }

    /// Pre-order walk over every node of the tree, repeats included.
    pub fn walk(&self) -> Vec<&PathTree> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Number of nodes in the tree, counting repeated ancestors each time.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(PathTree::size).sum::<usize>()
    }
}

/// Builds the upstream tree rooted at `node_id`, where `out_port` records
/// which output of the root is of interest to the caller.
pub fn resolve_path(graph: &Graph, node_id: NodeId, out_port: usize) -> Result<PathTree, GraphError> {
    let node = graph.require(node_id)?;
    Ok(build(graph, node, out_port, None))
}

fn build(graph: &Graph, node: &Node, out_port: usize, dest_port: Option<usize>) -> PathTree {
    let children = graph
        .predecessors(node.id)
        .into_iter()
        .map(|p| build(graph, p.node, p.source_port, Some(p.dest_port)))
        .collect();

    PathTree {
        node: node.clone(),
        out_port,
        dest_port,
        children,
    }
}
