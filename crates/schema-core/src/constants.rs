//! Constantes del orquestador.
//!
//! `ENGINE_VERSION` entra en el hash de la definición del grafo: un cambio de
//! versión produce un `graph_hash` distinto aunque los nodos no cambien.

pub const ENGINE_VERSION: &str = "SF1.0";

/// Clave del contador de reintentos de ejecución DDL en
/// `WorkflowState::retry_counts`.
pub const DDL_EXECUTION_RETRY_KEY: &str = "ddlExecutionRetry";

/// Clave del contador de conflictos de versión al hacer commit.
pub const VERSION_CONFLICT_RETRY_KEY: &str = "versionConflictRetry";

pub const DEFAULT_MAX_DDL_EXECUTION_RETRIES: u32 = 1;
pub const DEFAULT_MAX_VERSION_CONFLICT_RETRIES: u32 = 2;
pub const DEFAULT_MAX_PATCH_REPAIRS: u32 = 2;
/// Ejecuciones de nodo permitidas por corrida antes de abortar.
pub const DEFAULT_RECURSION_LIMIT: usize = 50;
pub const DEFAULT_TEST_CONCURRENCY: usize = 4;
