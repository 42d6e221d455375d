//! `SqlExecutor` sobre Postgres.
//!
//! Todo el lote corre en una transacción propia con un `SAVEPOINT` por
//! sentencia: un fallo revierte solo esa sentencia y la ejecución continúa.
//! Al final la transacción se revierte salvo que se pida confirmarla.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_types::Jsonb;
use log::{debug, warn};
use serde_json::Value;

use schema_core::sql::{is_transaction_control, returns_rows, split_statements, ExecutorError, QueryOutcome, SqlExecutor,
                       SqlResult};

use super::ConnectionProvider;
use crate::config::DbConfig;

const SAVEPOINT: &str = "sf_stmt";
const ROWS_SAVEPOINT: &str = "sf_rows";

#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Jsonb)]
    j: Value,
}

pub struct PgSqlExecutor<P: ConnectionProvider> {
    provider: Arc<P>,
    commit: bool,
}

impl<P: ConnectionProvider> PgSqlExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider),
               commit: false }
    }

    /// Confirma los cambios del lote en lugar de revertirlos.
    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn from_config(provider: P, config: &DbConfig) -> Self {
        Self::new(provider).with_commit(config.commit_validation)
    }
}

fn error_message(err: &DieselError) -> String {
    match err {
        DieselError::DatabaseError(_, info) => info.message().to_string(),
        other => other.to_string(),
    }
}

fn ensure_extensions(conn: &mut PgConnection, names: &[String]) -> Result<(), ExecutorError> {
    for name in names {
        let sql = format!("CREATE EXTENSION IF NOT EXISTS \"{}\"", name.replace('"', "\"\""));
        conn.batch_execute(&sql)
            .map_err(|e| ExecutorError::Extension { name: name.clone(),
                                                    reason: error_message(&e) })?;
    }
    Ok(())
}

fn run_statement(conn: &mut PgConnection, stmt: &str) -> Result<QueryOutcome, DieselError> {
    if returns_rows(stmt) {
        if let Some(rows) = fetch_rows(conn, stmt)? {
            return Ok(QueryOutcome::Rows { rows });
        }
    }
    let count = diesel::sql_query(stmt).execute(conn)?;
    Ok(QueryOutcome::Affected { count: count as u64 })
}

/// Lee las filas envolviendo la sentencia en `row_to_json`, bajo su propio
/// savepoint. Postgres rechaza la forma envuelta para CTEs que modifican datos
/// o `SELECT ... INTO`; en ese caso se revierte y devuelve `None` para que la
/// sentencia corra tal cual en el nivel superior.
fn fetch_rows(conn: &mut PgConnection, stmt: &str) -> Result<Option<Vec<Value>>, DieselError> {
    let body = stmt.trim().trim_end_matches(';');
    conn.batch_execute(&format!("SAVEPOINT {ROWS_SAVEPOINT}"))?;
    // el salto de línea evita que un comentario final `--` se trague el cierre
    let wrapped = format!("SELECT row_to_json(t) AS j FROM (\n{body}\n) t");
    match diesel::sql_query(wrapped).load::<JsonRow>(conn) {
        Ok(rows) => {
            conn.batch_execute(&format!("RELEASE SAVEPOINT {ROWS_SAVEPOINT}"))?;
            Ok(Some(rows.into_iter().map(|r| r.j).collect()))
        }
        Err(e) => {
            debug!("row fetch rejected ({}); running statement unwrapped", error_message(&e));
            conn.batch_execute(&format!("ROLLBACK TO SAVEPOINT {ROWS_SAVEPOINT}"))?;
            conn.batch_execute(&format!("RELEASE SAVEPOINT {ROWS_SAVEPOINT}"))?;
            Ok(None)
        }
    }
}

/// Corre una sentencia aislada por savepoint.
fn run_isolated(conn: &mut PgConnection, stmt: &str) -> Result<QueryOutcome, ExecutorError> {
    let internal = |e: DieselError| ExecutorError::Internal(error_message(&e));
    conn.batch_execute(&format!("SAVEPOINT {SAVEPOINT}")).map_err(internal)?;
    match run_statement(conn, stmt) {
        Ok(outcome) => {
            conn.batch_execute(&format!("RELEASE SAVEPOINT {SAVEPOINT}")).map_err(internal)?;
            Ok(outcome)
        }
        Err(e) => {
            conn.batch_execute(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT}")).map_err(internal)?;
            Ok(QueryOutcome::Error { message: error_message(&e) })
        }
    }
}

fn run_batch(conn: &mut PgConnection, sql: &str, commit: bool) -> Result<Vec<SqlResult>, ExecutorError> {
    conn.batch_execute("BEGIN").map_err(|e| ExecutorError::Connection(error_message(&e)))?;
    let mut results = Vec::new();
    for stmt in split_statements(sql) {
        let started = Instant::now();
        let outcome = if is_transaction_control(&stmt) {
            QueryOutcome::Affected { count: 0 }
        } else {
            match run_isolated(conn, &stmt) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = conn.batch_execute("ROLLBACK");
                    return Err(e);
                }
            }
        };
        results.push(SqlResult::from_outcome(stmt, outcome, started.elapsed().as_millis() as u64));
    }
    let end = if commit { "COMMIT" } else { "ROLLBACK" };
    conn.batch_execute(end).map_err(|e| ExecutorError::Internal(error_message(&e)))?;
    Ok(results)
}

#[async_trait]
impl<P: ConnectionProvider> SqlExecutor for PgSqlExecutor<P> {
    async fn execute(&self, sql: &str, required_extensions: &[String]) -> Result<Vec<SqlResult>, ExecutorError> {
        let provider = self.provider.clone();
        let (sql, extensions, commit) = (sql.to_string(), required_extensions.to_vec(), self.commit);
        let results = tokio::task::spawn_blocking(move || {
                          let mut conn = provider.connection()?;
                          ensure_extensions(&mut conn, &extensions)?;
                          run_batch(&mut conn, &sql, commit)
                      }).await
                        .map_err(|e| ExecutorError::Internal(format!("blocking task failed: {e}")))??;
        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!("{failed} of {} statement(s) failed", results.len());
        }
        debug!("postgres executor ran {} statement(s) (commit={commit})", results.len());
        Ok(results)
    }
}
