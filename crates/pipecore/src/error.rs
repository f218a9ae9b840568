use crate::{NodeId, OperationKind, PortType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by the execution collaborator for a single node.
///
/// These never escape the engine: they are folded into a config repair
/// through the `HandleNodeError` command.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::ExecutionFailed {
            message: message.into(),
        }
    }

    pub fn is_file_not_found(&self) -> bool {
        matches!(self, NodeError::FileNotFound { .. })
    }
}

/// Structural errors raised by graph mutations and document restore.
///
/// A command that fails with one of these leaves the graph untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge not found at index {0}")]
    EdgeNotFound(usize),

    #[error("No operation registered for kind {0}")]
    UnknownKind(OperationKind),

    #[error("Edge from node {0} to itself")]
    SelfLoop(NodeId),

    #[error("Edge {source_id}:{source_port} -> {dest_id}:{dest_port} already exists")]
    DuplicateEdge {
        source_id: NodeId,
        source_port: usize,
        dest_id: NodeId,
        dest_port: usize,
    },

    #[error("Input port {port} of node {node} is already connected")]
    PortOccupied { node: NodeId, port: usize },

    #[error("Edge {source_id} -> {dest_id} would create a cycle")]
    CyclicDependency { source_id: NodeId, dest_id: NodeId },

    #[error("Node {node} ({kind}) has no {direction} port {port}")]
    PortOutOfRange {
        node: NodeId,
        kind: OperationKind,
        direction: &'static str,
        port: usize,
    },

    #[error("Output of type {output} cannot feed an input of type {input}")]
    IncompatiblePorts { output: PortType, input: PortType },

    #[error("Node {node} expects {expected} output slots, got {actual}")]
    OutputArity {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid graph document: {0}")]
    InvalidDocument(String),
}
