use crate::command::{apply, reevaluate_all, Command};
use crate::registry::OperationRegistry;
use chrono::Utc;
use pipecore::{
    resolve_path, Config, Edge, EventBus, Graph, GraphDocument, GraphError, GraphEvent, NodeError,
    NodeId, OperationKind, PathTree, Readiness, Slot,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Owns one pipeline graph and applies commands to it.
///
/// Every successful command replaces the graph value and publishes the
/// difference as [`GraphEvent`]s.
pub struct GraphEngine {
    graph: Graph,
    registry: Arc<OperationRegistry>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
}

impl GraphEngine {
    /// Create an empty engine with default settings
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Create an empty engine with custom configuration
    pub fn with_config(registry: Arc<OperationRegistry>, config: EngineConfig) -> Self {
        Self::from_graph(Graph::new(), registry, config)
    }

    /// Rebuild an engine from a persisted document.
    ///
    /// Persisted readiness is not trusted: output slots are resized to each
    /// kind's arity and every node is re-evaluated, ancestors first.
    pub fn restore(
        document: GraphDocument,
        registry: Arc<OperationRegistry>,
        config: EngineConfig,
    ) -> Result<Self, GraphError> {
        let mut graph = document.into_graph()?;

        let ids: Vec<NodeId> = graph.node_ids().collect();
        for id in ids {
            let node = graph.require_mut(id)?;
            let arity = registry.require(node.kind)?.contract().output_arity();
            node.outputs.resize(arity, None);
            if node.outputs.iter().all(Option::is_none) {
                node.provisional = false;
            }
        }
        reevaluate_all(&mut graph, &registry)?;

        tracing::info!("Restored graph with {} nodes", graph.node_ids().count());
        Ok(Self::from_graph(graph, registry, config))
    }

    fn from_graph(graph: Graph, registry: Arc<OperationRegistry>, config: EngineConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            graph,
            registry,
            config,
            event_bus,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot for persistence
    pub fn document(&self) -> GraphDocument {
        GraphDocument::from(&self.graph)
    }

    pub fn readiness(&self, id: NodeId) -> Option<Readiness> {
        self.graph.node(id).map(|node| node.readiness)
    }

    pub fn resolve_path(&self, id: NodeId, out_port: usize) -> Result<PathTree, GraphError> {
        resolve_path(&self.graph, id, out_port)
    }

    /// Apply a command; on error the graph is left as it was.
    pub fn dispatch(&mut self, command: Command) -> Result<(), GraphError> {
        let name = command.name();
        let next = apply(&self.graph, &self.registry, &self.config, command)?;
        let previous = std::mem::replace(&mut self.graph, next);
        let published = self.publish_changes(&previous);
        tracing::debug!("{} applied; {} events published", name, published);
        Ok(())
    }

    /// Adds a node and returns its id.
    pub fn add_node(
        &mut self,
        kind: OperationKind,
        config: Option<Config>,
    ) -> Result<NodeId, GraphError> {
        let id = NodeId(self.graph.next_id());
        self.dispatch(Command::AddNode { kind, config })?;
        Ok(id)
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        self.dispatch(Command::AddEdge { edge })
    }

    pub fn connect(&mut self, source: NodeId, dest: NodeId, dest_port: usize) -> Result<(), GraphError> {
        self.add_edge(Edge::new(source, 0, dest, dest_port))
    }

    pub fn set_config(&mut self, id: NodeId, config: Option<Config>) -> Result<(), GraphError> {
        self.dispatch(Command::SetConfig { id, config })
    }

    pub fn set_output(&mut self, id: NodeId, outputs: Vec<Slot>) -> Result<(), GraphError> {
        self.dispatch(Command::SetOutput { id, outputs })
    }

    pub fn handle_error(&mut self, id: NodeId, error: NodeError) -> Result<(), GraphError> {
        self.dispatch(Command::HandleNodeError { id, error })
    }

    pub fn delete(&mut self, nodes: Vec<NodeId>, edges: Vec<usize>) -> Result<(), GraphError> {
        self.dispatch(Command::Delete { nodes, edges })
    }

    /// Pastes copies of `nodes` and returns the new ids in order.
    pub fn copy_paste(&mut self, nodes: Vec<NodeId>) -> Result<Vec<NodeId>, GraphError> {
        let first = self.graph.next_id();
        self.dispatch(Command::CopyPaste { nodes })?;
        Ok((first..self.graph.next_id()).map(NodeId).collect())
    }

    /// Subscribe to graph change and run events
    pub fn subscribe_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    fn publish_changes(&self, previous: &Graph) -> usize {
        let timestamp = Utc::now();
        let mut events = Vec::new();

        for node in previous.nodes() {
            if !self.graph.contains(node.id) {
                events.push(GraphEvent::NodeRemoved {
                    node_id: node.id,
                    timestamp,
                });
            }
        }
        for edge in previous.edges() {
            if !self.graph.has_edge(edge) {
                events.push(GraphEvent::EdgeRemoved {
                    edge: *edge,
                    timestamp,
                });
            }
        }

        for node in self.graph.nodes() {
            let Some(before) = previous.node(node.id) else {
                events.push(GraphEvent::NodeAdded {
                    node_id: node.id,
                    kind: node.kind,
                    timestamp,
                });
                continue;
            };
            if before.readiness != node.readiness {
                events.push(GraphEvent::ReadinessChanged {
                    node_id: node.id,
                    from: before.readiness,
                    to: node.readiness,
                    timestamp,
                });
            }
            if before.config != node.config {
                events.push(GraphEvent::ConfigChanged {
                    node_id: node.id,
                    timestamp,
                });
            }
            if before.outputs != node.outputs {
                events.push(GraphEvent::OutputChanged {
                    node_id: node.id,
                    timestamp,
                });
            }
        }
        for edge in self.graph.edges() {
            if !previous.has_edge(edge) {
                events.push(GraphEvent::EdgeAdded {
                    edge: *edge,
                    timestamp,
                });
            }
        }

        let count = events.len();
        for event in events {
            self.event_bus.emit(event);
        }
        count
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Synthesize pass-through datasets for newly ready nodes.
    pub provisional_outputs: bool,
    /// Rows kept in a provisional dataset's preview.
    pub preview_rows: usize,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provisional_outputs: true,
            preview_rows: 20,
            event_buffer_size: 1000,
        }
    }
}
