use crate::{Dataset, GraphError, Model, Node, NodeId, PatternSet, Payload};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Connection from an output port of one node to an input port of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source_id: NodeId,
    pub source_port: usize,
    pub dest_id: NodeId,
    pub dest_port: usize,
}

impl Edge {
    pub fn new(source_id: NodeId, source_port: usize, dest_id: NodeId, dest_port: usize) -> Self {
        Self {
            source_id,
            source_port,
            dest_id,
            dest_port,
        }
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source_id == id || self.dest_id == id
    }
}

/// An upstream node as seen from one of its consumers.
#[derive(Debug, Clone, Copy)]
pub struct Predecessor<'a> {
    pub node: &'a Node,
    /// Output port of `node` feeding the consumer.
    pub source_port: usize,
    /// Input port of the consumer.
    pub dest_port: usize,
}

impl<'a> Predecessor<'a> {
    /// The designated output slot, if it has been materialized.
    pub fn payload(&self) -> Option<&'a Payload> {
        self.node.output(self.source_port)
    }

    pub fn dataset(&self) -> Option<&'a Dataset> {
        self.payload().and_then(Payload::as_dataset)
    }

    pub fn pattern_set(&self) -> Option<&'a PatternSet> {
        self.payload().and_then(Payload::as_pattern_set)
    }

    pub fn model(&self) -> Option<&'a Model> {
        self.payload().and_then(Payload::as_model)
    }

    /// Finds the predecessor attached to input `port`.
    pub fn on_port<'p>(predecessors: &'p [Predecessor<'a>], port: usize) -> Option<&'p Predecessor<'a>> {
        predecessors.iter().find(|p| p.dest_port == port)
    }
}

/// The graph store: nodes keyed by id, edges in insertion order, and the id
/// counter.
///
/// Mutations here are structural only; keeping readiness and configuration
/// consistent is the job of the runtime's command layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    next_id: u32,
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Reserves the next node id.
    pub fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Get a node or return `NodeNotFound`.
    pub fn require(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn require_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Flattened node projection for views.
    pub fn node_list(&self) -> Vec<&Node> {
        self.nodes.values().collect()
    }

    /// Flattened edge projection for views.
    pub fn edge_list(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    pub fn insert_node(&mut self, node: Node) {
        if node.id.0 >= self.next_id {
            self.next_id = node.id.0 + 1;
        }
        self.nodes.insert(node.id, node);
    }

    /// Removes a node without touching its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Keeps only the edges for which `keep` returns true; returns the others.
    pub fn drain_edges<F>(&mut self, mut keep: F) -> Vec<Edge>
    where
        F: FnMut(usize, &Edge) -> bool,
    {
        let mut kept = Vec::with_capacity(self.edges.len());
        let mut removed = Vec::new();
        for (index, edge) in self.edges.drain(..).enumerate() {
            if keep(index, &edge) {
                kept.push(edge);
            } else {
                removed.push(edge);
            }
        }
        self.edges = kept;
        removed
    }

    pub fn has_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// Incoming edges of `id`, sorted by destination port.
    pub fn incoming(&self, id: NodeId) -> Vec<&Edge> {
        let mut incoming: Vec<&Edge> = self.edges.iter().filter(|e| e.dest_id == id).collect();
        incoming.sort_by_key(|e| e.dest_port);
        incoming
    }

    /// Resolved predecessors of `id`, sorted by destination port.
    pub fn predecessors(&self, id: NodeId) -> Vec<Predecessor<'_>> {
        self.incoming(id)
            .into_iter()
            .filter_map(|edge| {
                self.nodes.get(&edge.source_id).map(|node| Predecessor {
                    node,
                    source_port: edge.source_port,
                    dest_port: edge.dest_port,
                })
            })
            .collect()
    }

    pub fn successors(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.source_id == id)
            .map(|e| e.dest_id)
            .collect()
    }

    /// All nodes reachable from `id` through edges, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = self.successors(id).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if next == id || !seen.insert(next) {
                continue;
            }
            queue.extend(self.successors(next));
        }
        seen
    }

    /// Whether `to` is reachable from `from` (a node reaches itself).
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        from == to || self.descendants(from).contains(&to)
    }
}

/// The persisted shape of a graph.
///
/// Readiness and outputs are stored but never trusted on restore; the
/// runtime re-evaluates every node after [`GraphDocument::into_graph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub next_id: u32,
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph.edges.clone(),
            next_id: graph.next_id,
        }
    }
}

impl GraphDocument {
    /// Rebuilds the graph store, checking the structural invariants: unique
    /// node ids, an id counter above every id, edges between existing
    /// distinct nodes, no duplicate edges and no cycles.
    pub fn into_graph(self) -> Result<Graph, GraphError> {
        let mut graph = Graph::new();

        for node in self.nodes {
            if graph.contains(node.id) {
                return Err(GraphError::InvalidDocument(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
            if node.id.0 >= self.next_id {
                return Err(GraphError::InvalidDocument(format!(
                    "node id {} is not below nextId {}",
                    node.id, self.next_id
                )));
            }
            graph.insert_node(node);
        }
        graph.next_id = self.next_id;

        let mut seen = HashSet::new();
        for edge in self.edges {
            for end in [edge.source_id, edge.dest_id] {
                if !graph.contains(end) {
                    return Err(GraphError::InvalidDocument(format!(
                        "edge references missing node {}",
                        end
                    )));
                }
            }
            if edge.source_id == edge.dest_id {
                return Err(GraphError::SelfLoop(edge.source_id));
            }
            if !seen.insert(edge) {
                return Err(GraphError::DuplicateEdge {
                    source_id: edge.source_id,
                    source_port: edge.source_port,
                    dest_id: edge.dest_id,
                    dest_port: edge.dest_port,
                });
            }
            if graph.reaches(edge.dest_id, edge.source_id) {
                return Err(GraphError::CyclicDependency {
                    source_id: edge.source_id,
                    dest_id: edge.dest_id,
                });
            }
            graph.push_edge(edge);
        }

        tracing::debug!(
            "Rebuilt graph with {} nodes and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }
}
