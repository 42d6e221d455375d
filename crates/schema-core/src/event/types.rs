//! Tipos de evento de una corrida y estructura `FlowEvent`.
//!
//! Cada corrida del `WorkflowEngine` deja una traza append-only en un
//! `EventStore`. La traza es observacional: el estado de la corrida viaja en
//! `WorkflowState`, no se reconstruye desde aquí.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ErrorClass;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Primer evento de una corrida.
    FlowInitialized { graph_hash: String, entry: String },
    NodeStarted { node: String, attempt: u32 },
    /// El nodo terminó; `schema_fingerprint` corresponde al estado devuelto.
    NodeFinished { node: String, schema_fingerprint: String },
    /// Error definitivo de un nodo (ya agotados los reintentos).
    NodeFailed { node: String, class: ErrorClass, error: String },
    RetryScheduled { node: String, attempt: u32, delay_ms: u64, reason: String },
    BranchesDispatched { node: String, branch: String, count: usize },
    BranchFinished { branch: String, index: usize, success: bool },
    /// Cierre con fingerprint del esquema final y número de nodos ejecutados.
    FlowCompleted { schema_fingerprint: String, executed_nodes: usize },
    FlowFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub seq: u64, // orden de append dentro de la corrida
    pub run_id: Uuid,
    pub kind: FlowEventKind,
    pub ts: DateTime<Utc>,
}

impl FlowEventKind {
    /// Letra compacta por variante, útil para asserts sobre la traza.
    pub fn code(&self) -> &'static str {
        match self {
            FlowEventKind::FlowInitialized { .. } => "I",
            FlowEventKind::NodeStarted { .. } => "S",
            FlowEventKind::NodeFinished { .. } => "F",
            FlowEventKind::NodeFailed { .. } => "X",
            FlowEventKind::RetryScheduled { .. } => "R",
            FlowEventKind::BranchesDispatched { .. } => "B",
            FlowEventKind::BranchFinished { .. } => "b",
            FlowEventKind::FlowCompleted { .. } => "C",
            FlowEventKind::FlowFailed { .. } => "E",
        }
    }
}
