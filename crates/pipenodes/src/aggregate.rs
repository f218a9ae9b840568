use crate::schema::{default_of, keep_present, parse, present, realign_typed};
use pipecore::{Config, Dataset, OperationKind, PathTree, PortType, Predecessor};
use piperuntime::{Contract, Operation, Ports};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Sum,
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Count,
    Std,
    First,
    Last,
}

impl AggregateFunction {
    pub fn needs_numeric(&self) -> bool {
        matches!(
            self,
            AggregateFunction::Sum
                | AggregateFunction::Mean
                | AggregateFunction::Median
                | AggregateFunction::Std
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateGroup {
    pub function: AggregateFunction,
    pub attrs: Vec<String>,
    /// Output column name per attribute, overriding the generated one.
    pub bind: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateConfig {
    pub key: Option<String>,
    pub groups: Vec<AggregateGroup>,
}

impl AggregateConfig {
    fn realign(&mut self, upstream: &Dataset) {
        keep_present(&mut self.key, upstream);
        for group in &mut self.groups {
            group.attrs.retain(|attr| upstream.has_column(attr));
            group.bind.retain(|attr, _| upstream.has_column(attr));
        }
    }
}

/// Groups a dataset by a key column.
pub struct AggregateOperation;

impl Operation for AggregateOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Aggregate
    }

    fn contract(&self) -> Contract {
        Contract::new(Ports::Single(PortType::Dataset), Ports::Single(PortType::Dataset))
    }

    fn description(&self) -> &str {
        "Group rows by a key and aggregate"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<AggregateConfig>()
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let (Some(config), Some(upstream)) = (
            parse::<AggregateConfig>(config),
            predecessors.first().and_then(|p| p.dataset()),
        ) else {
            return false;
        };

        present(&config.key, upstream)
            && config.groups.iter().any(|g| !g.attrs.is_empty())
            && config.groups.iter().all(|group| {
                group.attrs.iter().all(|attr| {
                    upstream.has_column(attr)
                        && (!group.function.needs_numeric() || upstream.is_numeric(attr))
                }) && group.bind.values().all(|name| !name.trim().is_empty())
            })
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        match tree.input_dataset(0) {
            Some(upstream) => realign_typed(config, |c: &mut AggregateConfig| c.realign(upstream)),
            None => config.clone(),
        }
    }
}
