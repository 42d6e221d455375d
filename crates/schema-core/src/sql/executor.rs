use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Extensión requerida no disponible: precondición de entorno.
    #[error("required extension '{name}' could not be enabled: {reason}")]
    Extension { name: String, reason: String },
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("executor error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    Rows { rows: Vec<Value> },
    Affected { count: u64 },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub affected_rows: Option<u64>,
}

/// Resultado por sentencia de nivel superior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResult {
    pub success: bool,
    pub sql: String,
    pub outcome: QueryOutcome,
    pub metadata: QueryMetadata,
}

impl SqlResult {
    pub fn from_outcome(sql: impl Into<String>, outcome: QueryOutcome, execution_time_ms: u64) -> Self {
        let affected_rows = match &outcome {
            QueryOutcome::Rows { rows } => Some(rows.len() as u64),
            QueryOutcome::Affected { count } => Some(*count),
            QueryOutcome::Error { .. } => None,
        };
        Self { success: !matches!(outcome, QueryOutcome::Error { .. }),
               sql: sql.into(),
               outcome,
               metadata: QueryMetadata { execution_time_ms,
                                         timestamp: Utc::now(),
                                         affected_rows } }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            QueryOutcome::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn rows(&self) -> &[Value] {
        match &self.outcome {
            QueryOutcome::Rows { rows } => rows,
            _ => &[],
        }
    }
}

/// Texto de fallo acumulado para reinyectar en el prompt:
/// `SQL: <stmt>\nError: <msg>` por cada sentencia fallida.
pub fn failure_reason(results: &[SqlResult]) -> Option<String> {
    let parts: Vec<String> = results.iter()
                                    .filter_map(|r| r.error_message().map(|m| format!("SQL: {}\nError: {}", r.sql, m)))
                                    .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Única frontera que habla con un motor SQL real.
///
/// La ejecución no es fail-fast: cada sentencia produce su `SqlResult` aunque
/// alguna anterior haya fallado. `Err` queda reservado a fallos de entorno.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, required_extensions: &[String]) -> Result<Vec<SqlResult>, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_lists_only_failures() {
        let results = vec![SqlResult::from_outcome("CREATE TABLE a ()", QueryOutcome::Affected { count: 0 }, 1),
                           SqlResult::from_outcome("CREATE TABLE b (x nope)",
                                                   QueryOutcome::Error { message: "type \"nope\" does not exist".into() },
                                                   1)];
        assert_eq!(failure_reason(&results).unwrap(),
                   "SQL: CREATE TABLE b (x nope)\nError: type \"nope\" does not exist");
        assert!(failure_reason(&results[..1]).is_none());
        assert!(!results[1].success);
        assert_eq!(results[1].metadata.affected_rows, None);
    }
}
