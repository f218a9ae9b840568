//! Graph mutations.
//!
//! Every edit is a [`Command`]; [`apply`] is the single transition function
//! from one graph value to the next. Commands that change a node's config,
//! inputs or outputs propagate through the node's affected set (the node
//! plus all its descendants) in topological order:
//!
//! - **Pass A** recomputes readiness and rebuilds provisional outputs for
//!   ready pass-through nodes.
//! - **Pass B** realigns every affected config against a path tree built from
//!   the Pass-A graph.
//!
//! The two passes repeat until Pass B leaves every config unchanged.

use crate::readiness::{evaluate, evaluate_node};
use crate::registry::{Operation, OperationRegistry};
use crate::runtime::EngineConfig;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use pipecore::{
    resolve_path, Config, Dataset, Edge, Graph, GraphError, Node, NodeError, NodeId,
    OperationKind, Payload, Readiness, Slot,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Closed set of edits accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    AddNode {
        kind: OperationKind,
        #[serde(default)]
        config: Option<Config>,
    },
    AddEdge {
        edge: Edge,
    },
    SetConfig {
        id: NodeId,
        config: Option<Config>,
    },
    SetOutput {
        id: NodeId,
        outputs: Vec<Slot>,
    },
    HandleNodeError {
        id: NodeId,
        error: NodeError,
    },
    Delete {
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        edges: Vec<usize>,
    },
    CopyPaste {
        nodes: Vec<NodeId>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "AddNode",
            Command::AddEdge { .. } => "AddEdge",
            Command::SetConfig { .. } => "SetConfig",
            Command::SetOutput { .. } => "SetOutput",
            Command::HandleNodeError { .. } => "HandleNodeError",
            Command::Delete { .. } => "Delete",
            Command::CopyPaste { .. } => "CopyPaste",
        }
    }
}

/// Applies `command` to `graph`, returning the next graph value.
///
/// On error the input graph is untouched and no partial state escapes.
pub fn apply(
    graph: &Graph,
    registry: &OperationRegistry,
    config: &EngineConfig,
    command: Command,
) -> Result<Graph, GraphError> {
    tracing::debug!("Applying {}", command.name());

    let mut next = graph.clone();
    let propagation = Propagation {
        registry,
        config,
        authoritative: None,
        failed: None,
    };

    match command {
        Command::AddNode { kind, config } => add_node(&mut next, registry, kind, config)?,
        Command::AddEdge { edge } => {
            validate_edge(&next, registry, &edge)?;
            next.push_edge(edge);
            propagation.run(&mut next, edge.dest_id)?;
        }
        Command::SetConfig { id, config } => {
            let node = next.require(id)?;
            let operation = registry.require(node.kind)?;
            if normalized(operation, &node.config) == normalized(operation, &config) {
                tracing::debug!("Config of node {} unchanged; skipping propagation", id);
                return Ok(next);
            }
            let node = next.require_mut(id)?;
            node.config = config;
            node.clear_outputs();
            propagation.run(&mut next, id)?;
        }
        Command::SetOutput { id, outputs } => {
            let node = next.require(id)?;
            let expected = registry.require(node.kind)?.contract().output_arity();
            if outputs.len() != expected {
                return Err(GraphError::OutputArity {
                    node: id,
                    expected,
                    actual: outputs.len(),
                });
            }
            let node = next.require_mut(id)?;
            node.outputs = outputs;
            node.provisional = false;
            Propagation {
                authoritative: Some(id),
                ..propagation
            }
            .run(&mut next, id)?;
        }
        Command::HandleNodeError { id, error } => {
            let node = next.require(id)?;
            let repaired = registry.require(node.kind)?.repair(node.config.as_ref(), &error);
            tracing::warn!("Node {} ({}) failed: {}", id, node.kind, error);

            let node = next.require_mut(id)?;
            node.config = repaired;
            node.clear_outputs();
            Propagation {
                failed: Some(id),
                ..propagation
            }
            .run(&mut next, id)?;
        }
        Command::Delete { nodes, edges } => delete(&mut next, registry, nodes, edges)?,
        Command::CopyPaste { nodes } => copy_paste(&mut next, registry, &nodes)?,
    }

    Ok(next)
}

fn normalized(operation: &dyn Operation, config: &Option<Config>) -> Option<Config> {
    match config {
        None | Some(Config::Null) => None,
        Some(config) => Some(operation.normalize(config)),
    }
}

fn add_node(
    graph: &mut Graph,
    registry: &OperationRegistry,
    kind: OperationKind,
    config: Option<Config>,
) -> Result<(), GraphError> {
    let operation = registry.require(kind)?;
    let id = graph.allocate_id();
    let config = config.or_else(|| operation.default_config());

    let mut node = Node::new(id, kind, operation.contract().output_arity()).with_config(config);
    node.readiness = evaluate_node(&node, &[], registry);

    tracing::debug!("Added node {} ({}) as {}", id, kind, node.readiness);
    graph.insert_node(node);
    Ok(())
}

/// Structural checks for a new edge: endpoints exist and differ, the edge is
/// new, both ports exist with compatible types, the input port is free and
/// the edge closes no cycle.
pub fn validate_edge(
    graph: &Graph,
    registry: &OperationRegistry,
    edge: &Edge,
) -> Result<(), GraphError> {
    let source = graph.require(edge.source_id)?;
    let dest = graph.require(edge.dest_id)?;

    if source.id == dest.id {
        return Err(GraphError::SelfLoop(source.id));
    }
    if graph.has_edge(edge) {
        return Err(GraphError::DuplicateEdge {
            source_id: edge.source_id,
            source_port: edge.source_port,
            dest_id: edge.dest_id,
            dest_port: edge.dest_port,
        });
    }

    let output = registry
        .require(source.kind)?
        .contract()
        .outputs
        .port_type(edge.source_port)
        .ok_or(GraphError::PortOutOfRange {
            node: source.id,
            kind: source.kind,
            direction: "output",
            port: edge.source_port,
        })?;
    let input = registry
        .require(dest.kind)?
        .contract()
        .inputs
        .port_type(edge.dest_port)
        .ok_or(GraphError::PortOutOfRange {
            node: dest.id,
            kind: dest.kind,
            direction: "input",
            port: edge.dest_port,
        })?;
    if !input.accepts(output) {
        return Err(GraphError::IncompatiblePorts { output, input });
    }

    if graph
        .edges()
        .iter()
        .any(|e| e.dest_id == edge.dest_id && e.dest_port == edge.dest_port)
    {
        return Err(GraphError::PortOccupied {
            node: dest.id,
            port: edge.dest_port,
        });
    }

    if graph.reaches(edge.dest_id, edge.source_id) {
        return Err(GraphError::CyclicDependency {
            source_id: edge.source_id,
            dest_id: edge.dest_id,
        });
    }

    Ok(())
}

/// Removes the focused nodes and edges, plus every edge touching a removed
/// node. Survivors downstream of a removed edge get their readiness
/// recomputed; configs are left alone since no upstream schema changed.
///
/// All new states are computed before any is written, so each affected node
/// is judged against the readiness its parents held when the command began.
fn delete(
    graph: &mut Graph,
    registry: &OperationRegistry,
    nodes: Vec<NodeId>,
    edges: Vec<usize>,
) -> Result<(), GraphError> {
    for id in &nodes {
        graph.require(*id)?;
    }
    let edge_count = graph.edges().len();
    if let Some(&index) = edges.iter().find(|&&index| index >= edge_count) {
        return Err(GraphError::EdgeNotFound(index));
    }

    let doomed: HashSet<NodeId> = nodes.into_iter().collect();
    let focused: HashSet<usize> = edges.into_iter().collect();

    let removed = graph.drain_edges(|index, edge| {
        !focused.contains(&index) && !doomed.iter().any(|id| edge.touches(*id))
    });
    for id in &doomed {
        graph.remove_node(*id);
    }

    let mut affected = BTreeSet::new();
    for edge in &removed {
        if graph.contains(edge.dest_id) {
            affected.insert(edge.dest_id);
            affected.extend(graph.descendants(edge.dest_id));
        }
    }

    let order = topological_order(graph, &affected)?;
    let updates: Vec<(NodeId, Readiness)> = order
        .iter()
        .map(|&id| (id, evaluate(graph, registry, id)))
        .collect();

    for (id, readiness) in updates {
        if let Some(node) = graph.node_mut(id) {
            node.readiness = readiness;
        }
    }

    tracing::debug!(
        "Deleted {} nodes and {} edges; {} nodes re-evaluated",
        doomed.len(),
        removed.len(),
        order.len()
    );
    Ok(())
}

/// Clones the given nodes under fresh ids with their config and outputs but
/// no edges.
fn copy_paste(
    graph: &mut Graph,
    registry: &OperationRegistry,
    nodes: &[NodeId],
) -> Result<(), GraphError> {
    let originals = nodes
        .iter()
        .map(|id| graph.require(*id).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    for original in originals {
        let id = graph.allocate_id();
        let mut copy = Node { id, ..original };
        copy.readiness = evaluate_node(&copy, &[], registry);
        tracing::debug!("Pasted node {} as {} ({})", original.id, id, copy.readiness);
        graph.insert_node(copy);
    }

    Ok(())
}

/// Re-evaluates the readiness of every node, ancestors first.
pub fn reevaluate_all(graph: &mut Graph, registry: &OperationRegistry) -> Result<(), GraphError> {
    let all: BTreeSet<NodeId> = graph.node_ids().collect();
    for id in topological_order(graph, &all)? {
        let readiness = evaluate(graph, registry, id);
        graph.require_mut(id)?.readiness = readiness;
    }
    Ok(())
}

/// Orders `subset` so that every node comes after its ancestors within the
/// subset.
pub fn topological_order(
    graph: &Graph,
    subset: &BTreeSet<NodeId>,
) -> Result<Vec<NodeId>, GraphError> {
    let mut dag = DiGraph::<NodeId, ()>::new();
    let mut node_to_index: HashMap<NodeId, NodeIndex> = HashMap::new();

    for &id in subset {
        node_to_index.insert(id, dag.add_node(id));
    }
    for edge in graph.edges() {
        if let (Some(&from), Some(&to)) = (
            node_to_index.get(&edge.source_id),
            node_to_index.get(&edge.dest_id),
        ) {
            dag.add_edge(from, to, ());
        }
    }

    toposort(&dag, None)
        .map(|order| order.into_iter().map(|idx| dag[idx]).collect())
        .map_err(|cycle| {
            let id = dag[cycle.node_id()];
            GraphError::CyclicDependency {
                source_id: id,
                dest_id: id,
            }
        })
}

/// Per-command propagation settings.
#[derive(Clone, Copy)]
struct Propagation<'a> {
    registry: &'a OperationRegistry,
    config: &'a EngineConfig,
    /// Target of a `SetOutput`; its outputs are never replaced.
    authoritative: Option<NodeId>,
    /// Target of a `HandleNodeError`; held at `Error` while it would run.
    failed: Option<NodeId>,
}

impl Propagation<'_> {
    /// Upper bound on refresh/realign rounds for one command.
    const MAX_ROUNDS: usize = 8;

    /// Alternates Pass A (readiness and provisional outputs) and Pass B
    /// (realignment) over the affected set until no config changes, so the
    /// stored readiness always matches the final configs.
    fn run(&self, graph: &mut Graph, root: NodeId) -> Result<(), GraphError> {
        let mut affected = graph.descendants(root);
        affected.insert(root);
        let order = topological_order(graph, &affected)?;

        for round in 1..=Self::MAX_ROUNDS {
            for &id in &order {
                self.refresh(graph, id)?;
            }
            let mut realigned = 0;
            for &id in &order {
                if self.realign(graph, id)? {
                    realigned += 1;
                }
            }
            if realigned == 0 {
                tracing::debug!(
                    "Propagated from node {} over {} nodes in {} round(s)",
                    root,
                    order.len(),
                    round
                );
                return Ok(());
            }
        }

        tracing::warn!(
            "Realignment from node {} did not settle after {} rounds",
            root,
            Self::MAX_ROUNDS
        );
        Ok(())
    }

    /// Pass A for one node. Synthesized slots are dropped and rebuilt from
    /// the current upstream; slots from an execution are left alone.
    fn refresh(&self, graph: &mut Graph, id: NodeId) -> Result<(), GraphError> {
        let mut readiness = evaluate(graph, self.registry, id);
        if self.failed == Some(id) && readiness.is_ok() {
            readiness = Readiness::Error;
        }

        let node = graph.require_mut(id)?;
        if node.readiness != readiness {
            tracing::debug!("Node {} readiness {} -> {}", id, node.readiness, readiness);
            node.readiness = readiness;
        }
        if node.provisional && self.authoritative != Some(id) {
            node.clear_outputs();
        }

        let provisional = if readiness.is_ok() && self.authoritative != Some(id) {
            self.provisional_output(graph, id)
        } else {
            None
        };
        if let Some(payload) = provisional {
            let node = graph.require_mut(id)?;
            for slot in node.outputs.iter_mut().filter(|slot| slot.is_none()) {
                *slot = Some(payload.clone());
            }
            node.provisional = true;
        }
        Ok(())
    }

    /// Pass-through dataset for a ready node whose slots are still empty.
    fn provisional_output(&self, graph: &Graph, id: NodeId) -> Option<Payload> {
        if !self.config.provisional_outputs {
            return None;
        }
        let node = graph.node(id)?;
        let contract = self.registry.get(node.kind)?.contract();
        if !contract.provisional_output || node.outputs.iter().all(Option::is_some) {
            return None;
        }

        let predecessors = graph.predecessors(id);
        let upstream = predecessors.first()?.dataset()?;
        let mut preview = upstream.preview.clone();
        preview.truncate(self.config.preview_rows);

        Some(Payload::Dataset(Dataset {
            name: format!("{}{}", node.kind, id),
            columns: upstream.columns.clone(),
            col_types: upstream.col_types.clone(),
            preview,
            is_available: upstream.is_available,
            options: Default::default(),
        }))
    }

    /// Pass B for one node; reports whether the config changed.
    fn realign(&self, graph: &mut Graph, id: NodeId) -> Result<bool, GraphError> {
        let node = graph.require(id)?;
        let current = match node.config.as_ref() {
            None | Some(Config::Null) => return Ok(false),
            Some(config) => config,
        };
        let Some(operation) = self.registry.get(node.kind) else {
            return Ok(false);
        };

        let tree = resolve_path(graph, id, 0)?;
        let repaired = operation.realign(&tree, current);
        if &repaired == current {
            return Ok(false);
        }
        tracing::debug!("Realigned config of node {} ({})", id, node.kind);
        graph.require_mut(id)?.config = Some(repaired);
        Ok(true)
    }
}
