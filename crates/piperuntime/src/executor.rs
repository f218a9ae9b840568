use crate::command::{apply, Command};
use crate::runtime::GraphEngine;
use async_trait::async_trait;
use chrono::Utc;
use pipecore::{GraphEvent, Node, NodeError, NodeId, PathTree, PipeError, RunId, Slot};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// The backend that actually computes node outputs.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Runs `node` on `inputs` (one slot per connected input, in port order)
    /// and returns one slot per output port.
    async fn execute(&self, node: &Node, inputs: Vec<Slot>) -> Result<Vec<Slot>, NodeError>;
}

/// Result of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: RunId,
    pub target: NodeId,
    /// Nodes that produced outputs, in execution order.
    pub executed: Vec<NodeId>,
    /// The node whose failure stopped the run.
    pub failed: Option<(NodeId, NodeError)>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Drives an [`OperationExecutor`] over the upstream tree of a node.
///
/// Ancestors run depth-first before the node that consumes them, each at most
/// once per run. Results are staged on a copy of the graph and only
/// dispatched to the engine once the run ends, so a cancelled run leaves the
/// engine untouched.
pub struct PipelineRunner<E> {
    executor: E,
    node_timeout: Option<Duration>,
}

#[derive(Default)]
struct Staged {
    commands: Vec<Command>,
    executed: Vec<NodeId>,
    failed: Option<(NodeId, NodeError)>,
}

impl<E: OperationExecutor> PipelineRunner<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            node_timeout: None,
        }
    }

    /// Fail any single node that runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.node_timeout = Some(limit);
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Execute `target` and everything upstream of it.
    pub async fn run(
        &self,
        engine: &mut GraphEngine,
        target: NodeId,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipeError> {
        let run_id = RunId::new_v4();
        let start_time = Instant::now();

        let tree = engine.resolve_path(target, 0)?;
        let order = execution_order(&tree);

        engine.event_bus().emit(GraphEvent::RunStarted {
            run_id,
            node_id: target,
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Starting run {} for node {} over {} nodes",
            run_id,
            target,
            order.len()
        );

        let staged = self.execute_staged(engine, &order, run_id, cancel).await;
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                tracing::error!("Run {} aborted: {}", run_id, e);
                engine.event_bus().emit(GraphEvent::RunCompleted {
                    run_id,
                    success: false,
                    duration_ms: start_time.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        for command in staged.commands {
            engine.dispatch(command)?;
        }

        let report = RunReport {
            run_id,
            target,
            executed: staged.executed,
            failed: staged.failed,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        engine.event_bus().emit(GraphEvent::RunCompleted {
            run_id,
            success: report.success(),
            duration_ms: report.duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Run {} finished in {}ms ({} nodes executed)",
            run_id,
            report.duration_ms,
            report.executed.len()
        );

        Ok(report)
    }

    async fn execute_staged(
        &self,
        engine: &GraphEngine,
        order: &[NodeId],
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<Staged, PipeError> {
        let mut graph = engine.graph().clone();
        let mut staged = Staged::default();

        for &id in order {
            let node = graph.require(id)?.clone();
            if !node.readiness.is_ok() {
                return Err(PipeError::Execution(format!(
                    "Node {} is not ready: {}",
                    id, node.readiness
                )));
            }

            let inputs: Vec<Slot> = graph
                .predecessors(id)
                .iter()
                .map(|p| p.payload().cloned())
                .collect();

            let start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("Run {} cancelled at node {}", run_id, id);
                    return Err(PipeError::Node(NodeError::Cancelled));
                }
                outcome = self.execute_node(&node, inputs) => outcome,
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let command = match outcome {
                Ok(outputs) => {
                    tracing::info!("Node {} completed in {}ms", id, duration_ms);
                    engine.event_bus().emit(GraphEvent::NodeExecuted {
                        run_id,
                        node_id: id,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    staged.executed.push(id);
                    Command::SetOutput { id, outputs }
                }
                Err(error) => {
                    tracing::error!("Node {} failed: {}", id, error);
                    engine.event_bus().emit(GraphEvent::NodeFailed {
                        run_id,
                        node_id: id,
                        error: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    staged.failed = Some((id, error.clone()));
                    Command::HandleNodeError { id, error }
                }
            };

            graph = apply(&graph, engine.registry(), engine.config(), command.clone())?;
            staged.commands.push(command);

            if staged.failed.is_some() {
                break;
            }
        }

        Ok(staged)
    }

    async fn execute_node(&self, node: &Node, inputs: Vec<Slot>) -> Result<Vec<Slot>, NodeError> {
        let task = self.executor.execute(node, inputs);
        match self.node_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .unwrap_or(Err(NodeError::Timeout {
                    seconds: limit.as_secs(),
                })),
            None => task.await,
        }
    }
}

/// Post-order over the tree with repeated ancestors kept only the first time.
fn execution_order(tree: &PathTree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    visit(tree, &mut order, &mut seen);
    order
}

fn visit(tree: &PathTree, order: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>) {
    for child in &tree.children {
        visit(child, order, seen);
    }
    if seen.insert(tree.id()) {
        order.push(tree.id());
    }
}
