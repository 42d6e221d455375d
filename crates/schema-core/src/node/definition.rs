use async_trait::async_trait;

use super::Transition;
use crate::errors::NodeError;
use crate::model::{BranchOutput, BranchState, WorkflowState};

/// Nodo del grafo. Cada `run` es un punto de suspensión (modelo, base de
/// datos, repositorio) y nunca muta el estado recibido.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    fn id(&self) -> &str;
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError>;
}

/// Nodo que se ejecuta una vez por rama de un fan-out, con estado aislado.
#[async_trait]
pub trait BranchNode: Send + Sync {
    fn id(&self) -> &str;
    async fn run(&self, branch: &BranchState) -> Result<BranchOutput, NodeError>;
}
