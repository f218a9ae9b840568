//! Readiness evaluation.
//!
//! Readiness is a pure function of a node's config, its predecessors'
//! readiness and outputs, and the operation contract. Checks run in a fixed
//! order and the first failing one decides the state.

use crate::registry::OperationRegistry;
use pipecore::{Config, Graph, Node, NodeId, Predecessor, Readiness};

/// Computes the readiness of node `id` from the current graph.
pub fn evaluate(graph: &Graph, registry: &OperationRegistry, id: NodeId) -> Readiness {
    match graph.node(id) {
        Some(node) => evaluate_node(node, &graph.predecessors(id), registry),
        None => Readiness::Unready,
    }
}

/// Computes the readiness of `node` given its predecessors sorted by input
/// port.
pub fn evaluate_node(
    node: &Node,
    predecessors: &[Predecessor<'_>],
    registry: &OperationRegistry,
) -> Readiness {
    let config = match node.config.as_ref() {
        None | Some(Config::Null) => return Readiness::Unready,
        Some(config) => config,
    };

    let Some(operation) = registry.get(node.kind) else {
        tracing::warn!("Node {} has unregistered kind {}", node.id, node.kind);
        return Readiness::Unready;
    };

    if predecessors.iter().any(|p| !p.node.readiness.is_ok()) {
        return Readiness::PredecessorUnready;
    }

    let contract = operation.contract();
    if !contract.is_source() {
        if predecessors.is_empty() {
            return Readiness::PredecessorMissing;
        }
        if !contract.display && predecessors.iter().any(|p| p.payload().is_none()) {
            return Readiness::PredecessorNoOutput;
        }
    }

    if !operation.check_arity(predecessors) {
        return Readiness::PredecessorMissing;
    }

    if operation.validate(predecessors, config) {
        Readiness::Ok
    } else {
        Readiness::Unready
    }
}
