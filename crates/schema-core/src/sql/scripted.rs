//! Executor sin base de datos: cada sentencia se resuelve con una función.

use std::time::Instant;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use super::splitter::{is_transaction_control, split_statements};
use super::{ExecutorError, QueryOutcome, SqlExecutor, SqlResult};

type StatementFn = Box<dyn Fn(&str) -> QueryOutcome + Send + Sync>;

pub struct ScriptedSqlExecutor {
    on_statement: StatementFn,
    available_extensions: Option<Vec<String>>,
    batches: Mutex<Vec<String>>,
}

impl ScriptedSqlExecutor {
    pub fn new<F>(on_statement: F) -> Self
        where F: Fn(&str) -> QueryOutcome + Send + Sync + 'static
    {
        Self { on_statement: Box::new(on_statement),
               available_extensions: None,
               batches: Mutex::new(Vec::new()) }
    }

    /// Toda sentencia tiene éxito sin filas.
    pub fn accepting() -> Self {
        Self::new(|_| QueryOutcome::Affected { count: 0 })
    }

    /// Falla las sentencias que contienen `needle`.
    pub fn failing_on(needle: &str, message: &str) -> Self {
        let (needle, message) = (needle.to_string(), message.to_string());
        Self::new(move |stmt| {
            if stmt.contains(&needle) {
                QueryOutcome::Error { message: message.clone() }
            } else {
                QueryOutcome::Affected { count: 0 }
            }
        })
    }

    /// Restringe las extensiones disponibles (sin restricción por defecto).
    pub fn with_available_extensions(mut self, names: &[&str]) -> Self {
        self.available_extensions = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Scripts recibidos, en orden.
    pub async fn batches(&self) -> Vec<String> {
        self.batches.lock().await.clone()
    }
}

#[async_trait]
impl SqlExecutor for ScriptedSqlExecutor {
    async fn execute(&self, sql: &str, required_extensions: &[String]) -> Result<Vec<SqlResult>, ExecutorError> {
        if let Some(available) = &self.available_extensions {
            if let Some(missing) = required_extensions.iter().find(|e| !available.contains(e)) {
                return Err(ExecutorError::Extension { name: missing.clone(),
                                                      reason: "extension is not available".into() });
            }
        }
        self.batches.lock().await.push(sql.to_string());
        let mut results = Vec::new();
        for stmt in split_statements(sql) {
            let started = Instant::now();
            let outcome = if is_transaction_control(&stmt) {
                QueryOutcome::Affected { count: 0 }
            } else {
                (self.on_statement)(&stmt)
            };
            results.push(SqlResult::from_outcome(stmt, outcome, started.elapsed().as_millis() as u64));
        }
        debug!("scripted executor ran {} statements", results.len());
        Ok(results)
    }
}
