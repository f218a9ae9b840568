use crate::schema::parse;
use pipecore::{Config, NodeError, OperationKind, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadConfig {
    pub path: String,
    /// Cleared when the backend reports the file missing.
    pub is_available: bool,
    pub delimiter: Option<String>,
    pub has_header: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            is_available: false,
            delimiter: None,
            has_header: true,
        }
    }
}

/// Reads a file into a dataset. The only source kind.
pub struct LoadOperation;

impl Operation for LoadOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Load
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::None, Ports::Single(PortType::Dataset))
    }

    fn description(&self) -> &str {
        "Load a tabular file"
    }

    /// New Load nodes stay unconfigured until a file is picked.
    fn default_config(&self) -> Option<Config> {
        None
    }

    fn validate(&self, _predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        parse::<LoadConfig>(config)
            .map(|c| !c.path.trim().is_empty() && c.is_available)
            .unwrap_or(false)
    }

    fn repair(&self, config: Option<&Config>, error: &NodeError) -> Option<Config> {
        match config {
            Some(Config::Object(fields)) if error.is_file_not_found() => {
                tracing::debug!("Marking load path unavailable after: {}", error);
                let mut fields = fields.clone();
                fields.insert("isAvailable".to_string(), Config::Bool(false));
                Some(Config::Object(fields))
            }
            _ => self.default_config(),
        }
    }
}
