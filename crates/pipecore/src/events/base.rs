use crate::{Edge, NodeId, OperationKind, Readiness};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Change notifications published to view collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphEvent {
    NodeAdded {
        node_id: NodeId,
        kind: OperationKind,
        timestamp: DateTime<Utc>,
    },
    NodeRemoved {
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    EdgeAdded {
        edge: Edge,
        timestamp: DateTime<Utc>,
    },
    EdgeRemoved {
        edge: Edge,
        timestamp: DateTime<Utc>,
    },
    ReadinessChanged {
        node_id: NodeId,
        from: Readiness,
        to: Readiness,
        timestamp: DateTime<Utc>,
    },
    ConfigChanged {
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    OutputChanged {
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    RunStarted {
        run_id: RunId,
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    NodeExecuted {
        run_id: RunId,
        node_id: NodeId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: RunId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for graph events
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; dropped silently when nobody is listening.
    pub fn emit(&self, event: GraphEvent) {
        let _ = self.sender.send(event);
    }
}
