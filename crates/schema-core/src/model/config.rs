use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_DDL_EXECUTION_RETRIES, DEFAULT_MAX_PATCH_REPAIRS,
                       DEFAULT_MAX_VERSION_CONFLICT_RETRIES, DEFAULT_RECURSION_LIMIT, DEFAULT_TEST_CONCURRENCY};
use crate::engine::RetryPolicy;

/// Límites de una corrida. Se construye desde el entorno en la capa de
/// aplicación; los defaults coinciden con los valores observados en
/// producción.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub max_ddl_execution_retries: u32,
    pub max_version_conflict_retries: u32,
    /// Rondas de auto-corrección cuando el patch del modelo no aplica.
    pub max_patch_repairs: u32,
    pub recursion_limit: usize,
    pub node_retry: RetryPolicy,
    pub test_concurrency: usize,
    pub required_extensions: Vec<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { max_ddl_execution_retries: DEFAULT_MAX_DDL_EXECUTION_RETRIES,
               max_version_conflict_retries: DEFAULT_MAX_VERSION_CONFLICT_RETRIES,
               max_patch_repairs: DEFAULT_MAX_PATCH_REPAIRS,
               recursion_limit: DEFAULT_RECURSION_LIMIT,
               node_retry: RetryPolicy::default(),
               test_concurrency: DEFAULT_TEST_CONCURRENCY,
               required_extensions: Vec::new() }
    }
}
