//! schemaflow
//!
//! Capa de aplicación del diseñador de esquemas:
//! - `config`: límites del flujo desde variables de entorno (`.env`).
//! - `errors`: error de aplicación que agrupa los de cada crate.
//! - `bootstrap`: ensamblado de dependencias (memoria o Postgres) y corrida
//!   de una sesión.

pub mod bootstrap;
pub mod config;
pub mod errors;

pub use bootstrap::{in_memory_deps, open_session, postgres_deps, run_session, FlowKind};
pub use config::AppConfig;
pub use errors::AppError;
