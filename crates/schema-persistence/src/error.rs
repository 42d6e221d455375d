//! Errores de persistencia.
//! Mapea errores de Diesel / conexión a variantes semánticas y de ahí a
//! `RepositoryError` / `ExecutorError` del núcleo.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use schema_core::repo::RepositoryError;
use schema_core::sql::ExecutorError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("invalid stored document: {0}")]
    Corrupt(String),
    /// Error de dominio producido dentro de una transacción.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::CheckViolation => Self::CheckViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::ClosedConnection => Self::TransientIo(info.message().to_string()),
                other => Self::Unknown(format!("db error kind {:?}: {}", other, info.message())),
            },
            DieselError::DeserializationError(e) => Self::Unknown(format!("deser: {e}")),
            DieselError::SerializationError(e) => Self::Unknown(format!("ser: {e}")),
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            DieselError::QueryBuilderError(e) => Self::Unknown(format!("query builder: {e}")),
            other => Self::Unknown(format!("unhandled diesel error: {other:?}")),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corrupt(e.to_string())
    }
}

impl From<PersistenceError> for RepositoryError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Repository(inner) => inner,
            PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => {
                RepositoryError::Unavailable(e.to_string())
            }
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ExecutorError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => {
                ExecutorError::Connection(e.to_string())
            }
            other => ExecutorError::Internal(other.to_string()),
        }
    }
}
