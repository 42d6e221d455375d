//! schema-adapters: nodos concretos del flujo de diseño y QA.
//!
//! Este crate conecta el núcleo (`schema-core`) con el dominio:
//! - `tools`: herramientas ofrecidas al modelo y parsing de sus argumentos.
//! - `prompts`: textos de sistema y mensajes de corrección.
//! - `pgtap`: scripts pgTAP por caso de prueba y lectura de salida TAP.
//! - `nodes`: un `WorkflowNode` (o `BranchNode`) por paso del flujo.
//! - `graphs`: ensamblado de los grafos de diseño, QA y pipeline completo.

pub mod graphs;
pub mod nodes;
pub mod pgtap;
pub mod prompts;
pub mod tools;

pub use graphs::{design_graph, pipeline_graph, qa_graph, Deps};
pub use tools::ToolError;
