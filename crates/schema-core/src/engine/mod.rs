//! Orquestador: grafo de nodos, reintentos y fan-out.

pub mod builder;
pub mod core;
pub mod retry;

pub use builder::{Edge, Graph, GraphBuilder, Router};
pub use self::core::WorkflowEngine;
pub use retry::{run_with_retry, RetryPolicy};
