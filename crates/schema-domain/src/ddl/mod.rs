//! Deparser: documento de esquema → sentencias DDL de PostgreSQL.
//!
//! Puro y determinista. Los problemas no abortan la generación: se acumulan
//! en `DdlOutput::errors` y la sentencia afectada se omite.

mod deparser;
pub mod literal;

use thiserror::Error;

pub use deparser::to_ddl;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeparseError {
    #[error("column '{table}.{column}' has an empty type")]
    EmptyColumnType { table: String, column: String },
    #[error("enum '{name}' has no values")]
    EmptyEnum { name: String },
    #[error("{object} on table '{table}' references missing column '{column}'")]
    MissingColumn { table: String, object: String, column: String },
    #[error("{object} on table '{table}' has no columns")]
    EmptyColumnList { table: String, object: String },
    #[error("foreign key '{constraint}' on '{table}' references missing table '{target}'")]
    MissingTargetTable { table: String, constraint: String, target: String },
    #[error("foreign key '{constraint}' on '{table}' references missing column '{target}.{column}'")]
    MissingTargetColumn { table: String, constraint: String, target: String, column: String },
    #[error("foreign key '{constraint}' on '{table}' has {local} local columns but {target} target columns")]
    ColumnCountMismatch { table: String, constraint: String, local: usize, target: usize },
}

/// Resultado del deparser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlOutput {
    pub statements: Vec<String>,
    pub errors: Vec<DeparseError>,
}

impl DdlOutput {
    /// Texto DDL completo, una sentencia por bloque.
    pub fn sql(&self) -> String {
        self.statements.join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
