//! Errores del orquestador y su clasificación para la política de reintentos.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::ModelError;
use crate::repo::RepositoryError;
use crate::sql::ExecutorError;

/// Error devuelto por un nodo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Salida del modelo o datos inválidos; recuperable reintentando.
    #[error("validation error: {0}")]
    Validation(String),
    /// Timeouts, cortes de red, rate limits.
    #[error("transient error: {0}")]
    Transient(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: i64, actual: i64 },
    /// Terminación intencional; nunca se reintenta.
    #[error("workflow terminated: {0}")]
    Termination(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Transient,
    Execution,
    Conflict,
    Termination,
}

impl ErrorClass {
    /// Sólo los errores esperables del dominio se reintentan automáticamente.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Validation | ErrorClass::Transient)
    }
}

pub fn classify_error(err: &NodeError) -> ErrorClass {
    match err {
        NodeError::Validation(_) => ErrorClass::Validation,
        NodeError::Transient(_) => ErrorClass::Transient,
        NodeError::Execution(_) => ErrorClass::Execution,
        NodeError::VersionConflict { .. } => ErrorClass::Conflict,
        NodeError::Termination(_) => ErrorClass::Termination,
    }
}

/// Error fatal de una corrida completa.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("recursion limit of {limit} node executions exceeded")]
    RecursionLimitExceeded { limit: usize },
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("unknown branch node '{0}'")]
    UnknownBranch(String),
    #[error("node '{0}' returned fan-out but has no fan-out edge")]
    MissingFanOutEdge(String),
    #[error("invalid graph: {0}")]
    Graph(String),
    #[error("node '{node}' failed: {source}")]
    Node { node: String, source: NodeError },
}

/// Fallo registrado en el estado antes de derivar al nodo manejador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub node: String,
    pub class: ErrorClass,
    pub message: String,
}

impl WorkflowFailure {
    pub fn new(node: &str, err: &NodeError) -> Self {
        Self { node: node.to_string(),
               class: classify_error(err),
               message: err.to_string() }
    }
}

impl From<RepositoryError> for NodeError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::VersionConflict { expected, actual } => NodeError::VersionConflict { expected, actual },
            RepositoryError::Patch { .. } => NodeError::Validation(e.to_string()),
            RepositoryError::Unavailable(_) => NodeError::Transient(e.to_string()),
            other => NodeError::Execution(other.to_string()),
        }
    }
}

impl From<ModelError> for NodeError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::MalformedToolArguments { .. } => NodeError::Validation(e.to_string()),
            ModelError::ScriptExhausted => NodeError::Termination(e.to_string()),
            other if other.is_retryable() => NodeError::Transient(other.to_string()),
            other => NodeError::Execution(other.to_string()),
        }
    }
}

impl From<ExecutorError> for NodeError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Extension { .. } => NodeError::Termination(e.to_string()),
            ExecutorError::Connection(_) => NodeError::Transient(e.to_string()),
            ExecutorError::Internal(_) => NodeError::Execution(e.to_string()),
        }
    }
}
