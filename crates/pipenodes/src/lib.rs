//! Standard operation library
//!
//! The built-in pipeline operation kinds: their port contracts, validators,
//! realignment rules, default configs and error repairs.

mod aggregate;
mod browse;
mod causal;
mod cleanse;
mod export;
mod join;
mod load;
mod mine;
mod predict;
mod regression;
mod sample;
mod schema;
mod split;
mod visualize;

#[cfg(test)]
mod fixtures;

pub use aggregate::{AggregateConfig, AggregateFunction, AggregateGroup, AggregateOperation};
pub use browse::BrowseOperation;
pub use causal::{CausalConfig, CausalEdge, CausalEdgeKind, CausalOperation};
pub use cleanse::{CleanseConfig, CleanseOperation, Transform, TransformOp};
pub use export::{ExportConfig, ExportFormat, ExportOperation};
pub use join::{JoinConfig, JoinHow, JoinOperation};
pub use load::{LoadConfig, LoadOperation};
pub use mine::{MineConfig, MineOperation};
pub use predict::{PredictConfig, PredictOperation};
pub use regression::{ModelFamily, RegressionConfig, RegressionOperation};
pub use sample::{SampleConfig, SampleOperation};
pub use split::{SplitConfig, SplitOperation};
pub use visualize::{Chart, VisualizeConfig, VisualizeOperation};

use piperuntime::OperationRegistry;
use std::sync::Arc;

/// Register all standard operations with a registry
pub fn register_all(registry: &mut OperationRegistry) {
    registry.register(Arc::new(LoadOperation));
    registry.register(Arc::new(CleanseOperation));
    registry.register(Arc::new(JoinOperation));
    registry.register(Arc::new(AggregateOperation));
    registry.register(Arc::new(SplitOperation));
    registry.register(Arc::new(SampleOperation));
    registry.register(Arc::new(MineOperation));
    registry.register(Arc::new(BrowseOperation));
    registry.register(Arc::new(RegressionOperation));
    registry.register(Arc::new(PredictOperation));
    registry.register(Arc::new(VisualizeOperation));
    registry.register(Arc::new(CausalOperation));
    registry.register(Arc::new(ExportOperation));
}

/// A registry holding every standard operation.
pub fn standard_registry() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    register_all(&mut registry);
    registry
}
