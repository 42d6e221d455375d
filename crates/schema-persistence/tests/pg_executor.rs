
use schema_core::sql::{ExecutorError, QueryOutcome, SqlExecutor};
use schema_domain::{to_ddl, Schema};
use schema_persistence::PgSqlExecutor;
use serde_json::json;

use test_support::provider;

#[tokio::test]
async fn failed_statement_does_not_abort_the_batch() {
    let Some(provider) = provider("failed_statement_does_not_abort_the_batch") else { return };
    let executor = PgSqlExecutor::new(provider);
    let sql = "CREATE TABLE sf_exec_batch (id int PRIMARY KEY);\n\
               INSERT INTO sf_exec_batch VALUES (1);\n\
               INSERT INTO sf_exec_batch VALUES (1);\n\
               SELECT count(*) AS n FROM sf_exec_batch;";
    let results = executor.execute(sql, &[]).await.expect("execute");

    assert_eq!(results.len(), 4);
    assert_eq!(results.iter().map(|r| r.success).collect::<Vec<_>>(), vec![true, true, false, true]);
    assert!(results[2].error_message().unwrap().contains("duplicate key"));
    assert_eq!(results[1].outcome, QueryOutcome::Affected { count: 1 });
    assert_eq!(results[3].rows(), &[json!({"n": 1})]);

    // el lote se revierte: la tabla no sobrevive
    let again = executor.execute("SELECT 1 AS one FROM sf_exec_batch", &[]).await.unwrap();
    assert!(!again[0].success);
}

#[tokio::test]
async fn transaction_control_is_ignored() {
    let Some(provider) = provider("transaction_control_is_ignored") else { return };
    let executor = PgSqlExecutor::new(provider);
    let results = executor.execute("BEGIN; SELECT 2 AS two; COMMIT;", &[]).await.unwrap();
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[1].rows(), &[json!({"two": 2})]);
}

#[tokio::test]
async fn unknown_extension_is_an_environment_error() {
    let Some(provider) = provider("unknown_extension_is_an_environment_error") else { return };
    let executor = PgSqlExecutor::new(provider);
    let err = executor.execute("SELECT 1", &["sf_no_such_extension".to_string()]).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Extension { ref name, .. } if name == "sf_no_such_extension"));
}

#[tokio::test]
async fn executed_ddl_matches_the_document() {
    let Some(provider) = provider("executed_ddl_matches_the_document") else { return };
    let executor = PgSqlExecutor::new(provider);
    let schema = Schema::from_value(json!({"tables": {"sf_rt_items": {
                     "columns": {
                         "id": {"type": "bigint", "notNull": true},
                         "label": {"type": "text", "notNull": false, "default": "untitled"},
                         "done": {"type": "boolean", "notNull": true, "default": false}
                     },
                     "constraints": {"sf_rt_items_pkey": {"type": "PRIMARY KEY", "columnNames": ["id"]}}
                 }}}))
                 .unwrap();
    let ddl = to_ddl(&schema);
    assert!(!ddl.has_errors());
    let columns_query = "SELECT column_name AS name, data_type AS type, is_nullable AS nullable, column_default AS dflt \
                 FROM information_schema.columns WHERE table_name = 'sf_rt_items' ORDER BY ordinal_position";
    let results = executor.execute(&format!("{}\n\n{columns_query};", ddl.sql()), &[]).await.unwrap();

    assert!(results.iter().all(|r| r.success), "{results:?}");
    let columns = results.last().unwrap().rows();
    assert_eq!(columns.len(), 3);
    let table = schema.table("sf_rt_items").unwrap();
    for (row, (name, column)) in columns.iter().zip(table.columns.iter()) {
        assert_eq!(row["name"], json!(name));
        assert_eq!(row["nullable"], json!(if column.not_null { "NO" } else { "YES" }));
    }
    assert_eq!(columns[0]["type"], json!("bigint"));
    assert_eq!(columns[1]["dflt"], json!("'untitled'::text"));
    assert_eq!(columns[2]["dflt"], json!("false"));
}

#[tokio::test]
async fn trailing_comment_keeps_rows_readable() {
    let Some(provider) = provider("trailing_comment_keeps_rows_readable") else { return };
    let executor = PgSqlExecutor::new(provider);
    let sql = "CREATE TABLE sf_comment_rows (id int PRIMARY KEY);\n\
               INSERT INTO sf_comment_rows VALUES (7);\n\
               SELECT id FROM sf_comment_rows -- verify row exists\n";
    let results = executor.execute(sql, &[]).await.unwrap();

    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert_eq!(results[2].rows(), &[json!({"id": 7})]);
}

#[tokio::test]
async fn data_modifying_cte_runs_at_top_level() {
    let Some(provider) = provider("data_modifying_cte_runs_at_top_level") else { return };
    let executor = PgSqlExecutor::new(provider);
    let sql = "CREATE TABLE sf_cte_rows (id serial PRIMARY KEY, label text);\n\
               WITH ins AS (INSERT INTO sf_cte_rows (label) VALUES ('a') RETURNING id) SELECT id FROM ins;\n\
               SELECT count(*) AS n FROM sf_cte_rows;";
    let results = executor.execute(sql, &[]).await.unwrap();

    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert!(matches!(results[1].outcome, QueryOutcome::Affected { .. }));
    // el insert corrió una sola vez
    assert_eq!(results[2].rows(), &[json!({"n": 1})]);
}
