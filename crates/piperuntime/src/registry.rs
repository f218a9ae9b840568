use pipecore::{Config, GraphError, NodeError, OperationKind, PathTree, PortType, Predecessor};
use std::collections::HashMap;
use std::sync::Arc;

/// Ports declared on one side of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ports {
    None,
    Single(PortType),
    /// Ordered pair; a connection's port is the index of its type.
    Dual([PortType; 2]),
}

impl Ports {
    /// Declared number of ports (a `DatasetList` counts as one).
    pub fn arity(&self) -> usize {
        match self {
            Ports::None => 0,
            Ports::Single(_) => 1,
            Ports::Dual(_) => 2,
        }
    }

    /// Declared type of port `port`. A `DatasetList` input spans every port.
    pub fn port_type(&self, port: usize) -> Option<PortType> {
        match self {
            Ports::None => None,
            Ports::Single(PortType::DatasetList) => Some(PortType::DatasetList),
            Ports::Single(t) => (port == 0).then_some(*t),
            Ports::Dual(types) => types.get(port).copied(),
        }
    }

    /// Index of the first port accepting an output of type `output`.
    pub fn port_for(&self, output: PortType) -> Option<usize> {
        match self {
            Ports::None => None,
            Ports::Single(t) => t.accepts(output).then_some(0),
            Ports::Dual(types) => types.iter().position(|t| t.accepts(output)),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Ports::Single(PortType::DatasetList))
    }
}

/// Static metadata of an operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    pub inputs: Ports,
    pub outputs: Ports,
    /// Minimum number of datasets on a `DatasetList` input.
    pub min_list_inputs: usize,
    /// Display kinds: readiness does not wait on upstream data.
    pub display: bool,
    /// Newly ready nodes get a provisional pass-through dataset.
    pub provisional_output: bool,
}

impl Contract {
    pub fn new(inputs: Ports, outputs: Ports) -> Self {
        Self {
            inputs,
            outputs,
            min_list_inputs: 1,
            display: false,
            provisional_output: false,
        }
    }

    pub fn with_min_list_inputs(mut self, min: usize) -> Self {
        self.min_list_inputs = min;
        self
    }

    pub fn display(mut self) -> Self {
        self.display = true;
        self
    }

    pub fn provisional(mut self) -> Self {
        self.provisional_output = true;
        self
    }

    pub fn is_source(&self) -> bool {
        self.inputs == Ports::None
    }

    pub fn dual_input(&self) -> bool {
        matches!(self.inputs, Ports::Dual(_))
    }

    pub fn dual_output(&self) -> bool {
        matches!(self.outputs, Ports::Dual(_))
    }

    pub fn output_arity(&self) -> usize {
        self.outputs.arity()
    }

    /// Whether `count` connected predecessors satisfy the declared arity.
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.inputs.is_list() {
            count >= self.min_list_inputs
        } else {
            count == self.inputs.arity()
        }
    }
}

/// One operation kind: its contract plus the rules that keep a node of that
/// kind consistent with its upstream schema.
pub trait Operation: Send + Sync {
    fn kind(&self) -> OperationKind;

    fn contract(&self) -> Contract;

    fn description(&self) -> &str {
        ""
    }

    /// Config installed by `AddNode` when none is given. `None` leaves the
    /// node unconfigured.
    fn default_config(&self) -> Option<Config>;

    /// Arity check over the connected predecessors, sorted by input port.
    fn check_arity(&self, predecessors: &[Predecessor<'_>]) -> bool {
        self.contract().accepts_arity(predecessors.len())
    }

    /// Kind-specific validation; `true` means the node may run.
    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool;

    /// Repairs `config` against the upstream schema found in `tree`. Never
    /// fails: stale references are pruned or reset.
    fn realign(&self, _tree: &PathTree, config: &Config) -> Config {
        config.clone()
    }

    /// Form used for change detection; volatile bookkeeping is stripped.
    fn normalize(&self, config: &Config) -> Config {
        config.clone()
    }

    /// Config to install after the execution collaborator reported `error`.
    fn repair(&self, _config: Option<&Config>, _error: &NodeError) -> Option<Config> {
        self.default_config()
    }
}

/// Registry of available operation kinds
pub struct OperationRegistry {
    operations: HashMap<OperationKind, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation, replacing any previous one of the same kind
    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        let kind = operation.kind();
        tracing::info!("Registering operation kind: {}", kind);
        if self.operations.insert(kind, operation).is_some() {
            tracing::warn!("Operation kind {} was already registered; replaced", kind);
        }
    }

    pub fn get(&self, kind: OperationKind) -> Option<&dyn Operation> {
        self.operations.get(&kind).map(|op| op.as_ref())
    }

    pub fn require(&self, kind: OperationKind) -> Result<&dyn Operation, GraphError> {
        self.get(kind).ok_or(GraphError::UnknownKind(kind))
    }

    pub fn contract(&self, kind: OperationKind) -> Option<Contract> {
        self.get(kind).map(|op| op.contract())
    }

    /// Get all registered kinds, in catalogue order
    pub fn kinds(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<_> = self.operations.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
