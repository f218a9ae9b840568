//! Pipeline consistency runtime
//!
//! This crate provides the operation registry, the readiness evaluator, the
//! command layer that keeps a graph consistent after every edit, the
//! [`GraphEngine`] that owns a graph, and the async [`PipelineRunner`] that
//! feeds execution results back into it.

mod command;
mod executor;
mod readiness;
mod registry;
mod runtime;

#[cfg(test)]
mod testing;

pub use command::{apply, reevaluate_all, topological_order, validate_edge, Command};
pub use executor::{OperationExecutor, PipelineRunner, RunReport};
pub use readiness::{evaluate, evaluate_node};
pub use registry::{Contract, Operation, OperationRegistry, Ports};
pub use runtime::{EngineConfig, GraphEngine};
