//! Errores del dominio: aplicación de patches y validación estructural.
use thiserror::Error;

/// Error devuelto por el motor de patches.
///
/// Todas las variantes son recuperables localmente: el mensaje se reenvía al
/// modelo para que corrija la operación.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid JSON pointer '{path}': {reason}")]
    InvalidPointer { path: String, reason: String },
    #[error("forbidden path segment '{segment}' in '{path}'")]
    ForbiddenSegment { path: String, segment: String },
    #[error("path '{path}' does not resolve")]
    Unresolvable { path: String },
    #[error("array index '{index}' out of bounds in '{path}'")]
    IndexOutOfBounds { path: String, index: String },
    #[error("cannot move '{from}' into its own child '{path}'")]
    MoveIntoChild { from: String, path: String },
    #[error("test operation failed at '{path}'")]
    TestFailed { path: String },
    #[error("cannot remove the document root")]
    RemoveRoot,
    #[error("patch produced an invalid schema document: {0}")]
    InvalidDocument(#[from] SchemaError),
}

/// Violación estructural de un documento de esquema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{kind} key '{key}' does not match its name '{name}'")]
    KeyMismatch { kind: &'static str, key: String, name: String },
    #[error("column '{table}.{column}' has an empty type")]
    EmptyColumnType { table: String, column: String },
    #[error("document does not deserialize: {0}")]
    Shape(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::Shape(e.to_string())
    }
}
