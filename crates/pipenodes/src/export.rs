use crate::schema::{default_of, parse};
use pipecore::{Config, OperationKind, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub path: String,
    pub format: ExportFormat,
    pub overwrite: bool,
}

/// Writes a dataset to a file.
pub struct ExportOperation;

impl Operation for ExportOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Export
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::None)
    }

    fn description(&self) -> &str {
        "Write a dataset to a file"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<ExportConfig>()
    }

    fn validate(&self, _predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        parse::<ExportConfig>(config)
            .map(|c| !c.path.trim().is_empty())
            .unwrap_or(false)
    }
}
