use thiserror::Error;

use schema_core::repo::RepositoryError;
use schema_core::WorkflowError;
use schema_persistence::PersistenceError;

/// Errores de la capa de aplicación.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error del flujo: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Error de repositorio: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_variant_format() {
        let err = AppError::Config("SCHEMAFLOW_TEST_CONCURRENCY".into());
        assert_eq!(err.to_string(), "Error de configuración: SCHEMAFLOW_TEST_CONCURRENCY");
    }

    #[test]
    fn repository_errors_convert() {
        let err: AppError = RepositoryError::Storage("down".into()).into();
        assert_eq!(err.to_string(), "Error de repositorio: storage error: down");
    }
}
