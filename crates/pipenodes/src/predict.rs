use crate::schema::{default_of, parse};
use pipecore::{Config, OperationKind, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictConfig {
    pub output_column: String,
    pub include_probabilities: bool,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            output_column: "prediction".to_string(),
            include_probabilities: false,
        }
    }
}

/// Scores a dataset with a fitted model.
pub struct PredictOperation;

const MODEL: usize = 0;
const DATA: usize = 1;

impl Operation for PredictOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Predict
    }

    fn contract(&self) -> Contract {
        Contract::new(
            Ports::Dual([PortType::Model, PortType::Dataset]),
            Ports::Single(PortType::Dataset),
        )
    }

    fn description(&self) -> &str {
        "Apply a model to a dataset"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<PredictConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let Some(config) = parse::<PredictConfig>(config) else {
            return false;
        };
        let model = Predecessor::on_port(predecessors, MODEL).and_then(|p| p.model());
        let data = Predecessor::on_port(predecessors, DATA).and_then(|p| p.dataset());
        let (Some(model), Some(data)) = (model, data) else {
            return false;
        };

        let column = config.output_column.trim();
        !column.is_empty()
            && !data.has_column(column)
            && model.predictors.iter().all(|p| data.has_column(p))
    }
}
