use crate::model::{BranchState, WorkflowState};

/// Salida de un nodo: el estado nuevo y cómo sigue la corrida.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Sigue la arista declarada para el nodo.
    Continue(WorkflowState),
    /// Salta a un nodo concreto, ignorando la arista.
    Goto(WorkflowState, String),
    /// Despacha una rama por elemento; la arista de fan-out indica el nodo
    /// rama y el nodo reduce.
    FanOut(WorkflowState, Vec<BranchState>),
    /// Termina la corrida.
    End(WorkflowState),
}

impl Transition {
    pub fn state(&self) -> &WorkflowState {
        match self {
            Transition::Continue(s) | Transition::Goto(s, _) | Transition::FanOut(s, _) | Transition::End(s) => s,
        }
    }

    pub fn goto(state: WorkflowState, node: &str) -> Self {
        Transition::Goto(state, node.to_string())
    }
}

/// Destino elegido por una arista condicional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Node(String),
    End,
}

impl Route {
    pub fn to(node: &str) -> Self {
        Route::Node(node.to_string())
    }
}
