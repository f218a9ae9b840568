use crate::schema::{default_of, parse, realign_typed};
use pipecore::{Config, Dataset, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart", rename_all = "lowercase")]
pub enum Chart {
    Histogram {
        attr: String,
        #[serde(default = "default_bins")]
        bins: u32,
    },
    Bar {
        attr: String,
    },
    Scatter {
        x: String,
        y: String,
        #[serde(default)]
        color: Option<String>,
    },
    Box {
        attr: String,
        #[serde(default)]
        group: Option<String>,
    },
    Line {
        x: String,
        y: String,
    },
    Heatmap {
        x: String,
        y: String,
    },
}

fn default_bins() -> u32 {
    20
}

impl Chart {
    /// Whether the chart can be drawn from `data`.
    pub fn fits(&self, data: &Dataset) -> bool {
        match self {
            Chart::Histogram { attr, bins } => data.is_numeric(attr) && (1..=1000).contains(bins),
            Chart::Bar { attr } => data.is_categorical(attr),
            Chart::Scatter { x, y, color } => {
                data.is_numeric(x)
                    && data.is_numeric(y)
                    && color.as_deref().map_or(true, |c| data.has_column(c))
            }
            Chart::Box { attr, group } => {
                data.is_numeric(attr) && group.as_deref().map_or(true, |g| data.is_categorical(g))
            }
            Chart::Line { x, y } => data.has_column(x) && data.is_numeric(y),
            Chart::Heatmap { x, y } => data.is_categorical(x) && data.is_categorical(y),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualizeConfig {
    pub charts: Vec<Chart>,
}

/// Charts over a dataset. Display kind: ready before upstream data exists.
pub struct VisualizeOperation;

impl Operation for VisualizeOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Visualize
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::None).display()
    }

    fn description(&self) -> &str {
        "Plot charts of a dataset"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<VisualizeConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let Some(config) = parse::<VisualizeConfig>(config) else {
            return false;
        };
        match predecessors.first().and_then(|p| p.dataset()) {
            Some(data) => config.charts.iter().all(|chart| chart.fits(data)),
            None => true,
        }
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let Some(data) = tree.input_dataset(0) else {
            return config.clone();
        };
        realign_typed(config, |c: &mut VisualizeConfig| {
            c.charts.retain(|chart| chart.fits(data))
        })
    }
}
