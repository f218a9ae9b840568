//! Core abstractions for the pipeline graph engine
//!
//! This crate provides the data model every other component depends on:
//! nodes, edges, payloads flowing between ports, the graph store itself and
//! the upstream path tree. It performs no execution.

mod error;
pub mod events;
mod graph;
mod node;
mod path;
mod payload;
mod value;

pub use error::{GraphError, NodeError, PipeError};
pub use graph::{Edge, Graph, GraphDocument, Predecessor};
pub use node::{Config, Node, NodeId, OperationKind, Readiness};
pub use path::{resolve_path, PathTree};
pub use payload::{
    ColumnType, Constraint, Dataset, Model, Pattern, PatternGroup, PatternSelection,
    PatternSet, Payload, PortType, SelectionFilter, Slot, TargetKind,
};
pub use value::Value;
pub use events::*;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipeError>;
