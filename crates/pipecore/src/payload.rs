//! Payloads carried by output slots.
//!
//! Every output port of a node holds a [`Slot`]: either nothing yet (the
//! uninitialized placeholder) or one of the tagged [`Payload`] variants.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub type Slot = Option<Payload>;

/// Types a port can declare in an operation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Dataset,
    /// Homogeneous, unbounded-arity collection of datasets (multi-input kinds).
    DatasetList,
    PatternSet,
    Model,
    PatternSelection,
}

impl PortType {
    /// Whether an output of type `output` may feed an input declared as `self`.
    pub fn accepts(self, output: PortType) -> bool {
        self == output || (self == PortType::DatasetList && output == PortType::Dataset)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    Dataset(Dataset),
    PatternSet(PatternSet),
    PatternSelection(PatternSelection),
    Model(Model),
}

impl Payload {
    pub fn port_type(&self) -> PortType {
        match self {
            Payload::Dataset(_) => PortType::Dataset,
            Payload::PatternSet(_) => PortType::PatternSet,
            Payload::PatternSelection(_) => PortType::PatternSelection,
            Payload::Model(_) => PortType::Model,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Payload::Dataset(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_pattern_set(&self) -> Option<&PatternSet> {
        match self {
            Payload::PatternSet(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Payload::Model(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Numerical,
    Nominal,
    Ordinal,
    DateTime,
    Index,
}

impl ColumnType {
    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnType::Nominal | ColumnType::Ordinal)
    }
}

/// Tabular payload: schema, per-column type and a few preview rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<String>,
    pub col_types: HashMap<String, ColumnType>,
    pub preview: Vec<Vec<Value>>,
    pub is_available: bool,
    pub options: HashMap<String, Value>,
}

impl Dataset {
    /// Creates an available dataset with the given columns, all `Numerical`.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let col_types = columns
            .iter()
            .map(|c| (c.clone(), ColumnType::Numerical))
            .collect();
        Self {
            name: name.into(),
            columns,
            col_types,
            preview: Vec::new(),
            is_available: true,
            options: HashMap::new(),
        }
    }

    pub fn with_type(mut self, column: &str, column_type: ColumnType) -> Self {
        self.col_types.insert(column.to_string(), column_type);
        self
    }

    pub fn with_preview(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.preview = rows;
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        if !self.has_column(column) {
            return None;
        }
        self.col_types.get(column).copied()
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.column_type(column) == Some(ColumnType::Numerical)
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.column_type(column)
            .map(|t| t.is_categorical())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[default]
    Numerical,
    Nominal,
}

/// A constraint on one attribute of a mined pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Categories {
        #[serde(rename = "in")]
        values: Vec<String>,
    },
    Range {
        lb: Option<f64>,
        ub: Option<f64>,
    },
}

impl Constraint {
    /// Canonical form used for structural matching: category sets sorted and
    /// deduplicated, intervals unchanged.
    pub fn canonical(&self) -> Constraint {
        match self {
            Constraint::Categories { values } => {
                let mut values = values.clone();
                values.sort();
                values.dedup();
                Constraint::Categories { values }
            }
            range => range.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: u32,
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub quality: f64,
}

impl Pattern {
    /// Canonical constraint set over the core (non-target) attributes.
    pub fn core_constraints(&self, target_attrs: &[String]) -> BTreeMap<String, Constraint> {
        self.constraints
            .iter()
            .filter(|(attr, _)| !target_attrs.contains(attr))
            .map(|(attr, c)| (attr.clone(), c.canonical()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternSet {
    pub target_attrs: Vec<String>,
    pub target_kind: TargetKind,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternGroup {
    pub name: String,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionFilter {
    pub min_quality: Option<f64>,
    pub attributes: Vec<String>,
}

/// A curated subset of a pattern set, organised in named groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternSelection {
    pub target_attrs: Vec<String>,
    pub target_kind: Option<TargetKind>,
    pub groups: Vec<PatternGroup>,
    pub filter: SelectionFilter,
}

impl PatternSelection {
    /// An empty selection bound to the targets of `patterns`.
    pub fn bound_to(patterns: &PatternSet) -> Self {
        Self {
            target_attrs: patterns.target_attrs.clone(),
            target_kind: Some(patterns.target_kind),
            groups: Vec::new(),
            filter: SelectionFilter::default(),
        }
    }
}

/// Handle to a fitted model held by the execution backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Model {
    pub handle: String,
    pub family: String,
    pub target: String,
    pub predictors: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}
