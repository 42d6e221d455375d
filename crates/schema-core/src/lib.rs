//! Núcleo del orquestador de diseño de esquemas.
//!
//! - `engine`: grafo de nodos asíncronos con aristas directas, condicionales
//!   y fan-out, reintentos por nodo y límite de recursión.
//! - `model`: `WorkflowState` inmutable y estado aislado de ramas.
//! - `repo`: repositorio de versiones con concurrencia optimista y replay.
//! - `llm` / `sql`: interfaces hacia los colaboradores externos (modelo y
//!   motor SQL) con implementaciones guionadas para tests.
//! - `event`: traza append-only de cada corrida.

pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod llm;
pub mod model;
pub mod node;
pub mod repo;
pub mod sql;

pub use engine::{Graph, GraphBuilder, RetryPolicy, WorkflowEngine};
pub use errors::{classify_error, ErrorClass, NodeError, WorkflowError, WorkflowFailure};
pub use model::{BranchOutput, BranchState, WorkflowConfig, WorkflowState};
pub use node::{BranchNode, Route, Transition, WorkflowNode};
pub use repo::{InMemorySchemaRepository, SchemaRepository};
