use crate::schema::{default_of, keep_present, parse, present, realign_typed};
use pipecore::{Config, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    #[default]
    Linear,
    Logistic,
    Poisson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegressionConfig {
    pub target: Option<String>,
    pub predictors: Vec<String>,
    pub family: ModelFamily,
    /// Held-out share in `[0, 1)`.
    pub test_fraction: f64,
    pub regularization: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            target: None,
            predictors: Vec::new(),
            family: ModelFamily::Linear,
            test_fraction: 0.2,
            regularization: 0.0,
        }
    }
}

/// Fits a regression model.
pub struct RegressionOperation;

impl Operation for RegressionOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Regression
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::Model))
    }

    fn description(&self) -> &str {
        "Fit a regression model"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<RegressionConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<RegressionConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };
        if !present(&config.target, upstream) {
            return false;
        }
        let target = config.target.as_deref().unwrap_or_default();

        let target_fits = match config.family {
            ModelFamily::Linear | ModelFamily::Poisson => upstream.is_numeric(target),
            ModelFamily::Logistic => true,
        };

        target_fits
            && !config.predictors.is_empty()
            && config
                .predictors
                .iter()
                .all(|p| p != target && upstream.has_column(p))
            && (0.0..1.0).contains(&config.test_fraction)
            && config.regularization >= 0.0
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let Some(upstream) = tree.input_dataset(0) else {
            return config.clone();
        };
        realign_typed(config, |c: &mut RegressionConfig| {
            keep_present(&mut c.target, upstream);
            c.predictors.retain(|p| upstream.has_column(p));
        })
    }
}
