//! Ejecución de SQL de validación contra un motor real.

pub mod executor;
pub mod scripted;
pub mod splitter;

pub use executor::{failure_reason, ExecutorError, QueryMetadata, QueryOutcome, SqlExecutor, SqlResult};
pub use scripted::ScriptedSqlExecutor;
pub use splitter::{first_keyword, is_transaction_control, returns_rows, split_statements};
