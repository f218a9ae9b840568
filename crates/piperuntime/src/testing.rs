//! Minimal operations shared by the unit tests of this crate.

use crate::registry::{Contract, Operation, OperationRegistry, Ports};
use pipecore::{Config, Dataset, OperationKind, Payload, PortType, Predecessor, Slot};
use serde_json::json;
use std::sync::Arc;

/// Source; ready when its config carries `"ok": true`.
pub struct Source;

/// Pass-through; ready when the optional `column` exists upstream.
pub struct Step;

/// Two or more datasets in, one out.
pub struct Merge;

impl Operation for Source {
    fn kind(&self) -> OperationKind {
        OperationKind::Load
    }
    fn contract(&self) -> Contract {
        Contract::new(Ports::None, Ports::Single(PortType::Dataset))
    }
    fn default_config(&self) -> Option<Config> {
        None
    }
    fn validate(&self, _: &[Predecessor<'_>], config: &Config) -> bool {
        config["ok"] == json!(true)
    }
}

impl Operation for Step {
    fn kind(&self) -> OperationKind {
        OperationKind::Cleanse
    }
    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::Dataset))
            .provisional()
    }
    fn default_config(&self) -> Option<Config> {
        Some(json!({}))
    }
    fn validate(&self, preds: &[Predecessor<'_>], config: &Config) -> bool {
        match config.get("column").and_then(Config::as_str) {
            Some(column) => preds[0].dataset().map(|d| d.has_column(column)).unwrap_or(false),
            None => true,
        }
    }
}

impl Operation for Merge {
    fn kind(&self) -> OperationKind {
        OperationKind::Join
    }
    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::DatasetList), Ports::Single(PortType::Dataset))
            .with_min_list_inputs(2)
    }
    fn default_config(&self) -> Option<Config> {
        Some(json!({}))
    }
    fn validate(&self, _: &[Predecessor<'_>], _: &Config) -> bool {
        true
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn registry() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry.register(Arc::new(Source));
    registry.register(Arc::new(Step));
    registry.register(Arc::new(Merge));
    registry
}

pub fn dataset(columns: &[&str]) -> Slot {
    Some(Payload::Dataset(Dataset::new("file", columns.iter().copied())))
}
