//! Validación del esquema con el DML generado y ejecución de pgTAP.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde_json::json;

use schema_core::model::{DmlFailure, ValidationReport};
use schema_core::repo::{NewTimelineItem, TimelineKind};
use schema_core::sql::{split_statements, ExecutorError};
use schema_core::{NodeError, Transition, WorkflowNode, WorkflowState};
use schema_domain::TestResult;

use super::{required_extensions, upsert_artifact, Deps, RUN_TESTS, VALIDATE_SCHEMA};
use crate::pgtap::{build_script, parse_tap, PGTAP_EXTENSION};

/// Ejecuta el DDL seguido del DML de cada caso, un lote por caso, y registra
/// qué sentencias DML fallaron.
pub struct ValidateSchemaNode {
    deps: Deps,
}

impl ValidateSchemaNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for ValidateSchemaNode {
    fn id(&self) -> &str {
        VALIDATE_SCHEMA
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let extensions = required_extensions(&self.deps.config, state.working_schema());
        let ddl_statements = split_statements(&state.ddl).len();
        let mut report = ValidationReport { ddl_ok: true,
                                            ..Default::default() };

        if state.testcases.is_empty() {
            let results = self.deps.executor.execute(&state.ddl, &extensions).await?;
            report.ddl_ok = results.iter().all(|r| r.success);
            report.executed_statements = results.len();
        }
        for testcase in &state.testcases {
            let batch = format!("{}\n\n{}", state.ddl, testcase.sql());
            let results = self.deps.executor.execute(&batch, &extensions).await?;
            let (ddl_part, dml_part) = results.split_at(ddl_statements.min(results.len()));
            report.ddl_ok &= ddl_part.iter().all(|r| r.success);
            report.executed_statements += results.len();
            report.dml_failures
                  .extend(dml_part.iter()
                                  .filter_map(|r| r.error_message().map(|m| (r, m)))
                                  .map(|(r, message)| DmlFailure { testcase_id: testcase.id,
                                                                   sql: r.sql.clone(),
                                                                   error: message.to_string() }));
        }
        info!("validated {} test cases: ddl_ok={}, {} DML failures",
              state.testcases.len(),
              report.ddl_ok,
              report.dml_failures.len());

        self.deps
            .repository
            .create_timeline_item(NewTimelineItem::new(state.session_id,
                                                       TimelineKind::QueryResult,
                                                       format!("DML validation: {} failure(s)",
                                                               report.dml_failures.len()))
                                      .with_payload(json!({
                                          "ddlOk": report.ddl_ok,
                                          "executedStatements": report.executed_statements,
                                          "dmlFailures": report.dml_failures.len(),
                                      })))
            .await?;

        let mut next = state.clone();
        next.schema_validation = Some(report);
        Ok(Transition::Continue(next))
    }
}

/// Un script pgTAP por caso, con concurrencia acotada; cada caso recibe un
/// `TestResult` nuevo. Un error del ejecutor falla sólo ese caso, salvo una
/// extensión ausente, que termina la corrida.
pub struct RunTestsNode {
    deps: Deps,
}

impl RunTestsNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for RunTestsNode {
    fn id(&self) -> &str {
        RUN_TESTS
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        if state.testcases.is_empty() {
            debug!("no test cases to run");
            return Ok(Transition::Continue(state.clone()));
        }
        let mut extensions = required_extensions(&self.deps.config, state.working_schema());
        if !extensions.iter().any(|e| e == PGTAP_EXTENSION) {
            extensions.push(PGTAP_EXTENSION.to_string());
        }

        let runs = state.testcases.iter().enumerate().map(|(i, testcase)| {
                                                         let script = build_script(&state.ddl, testcase);
                                                         let executor = self.deps.executor.clone();
                                                         let extensions = extensions.clone();
                                                         async move {
                                                             let result = match executor.execute(&script, &extensions).await {
                                                                 Ok(results) => {
                                                                     let report = parse_tap(&results);
                                                                     TestResult::now(report.success(), report.message())
                                                                 }
                                                                 Err(e @ ExecutorError::Extension { .. }) => return Err(e),
                                                                 Err(e) => {
                                                                     warn!("test case {i} could not run: {e}");
                                                                     TestResult::now(false, e.to_string())
                                                                 }
                                                             };
                                                             Ok::<_, ExecutorError>((i, result))
                                                         }
                                                     })
                                                     .collect::<Vec<_>>();
        let outcomes: Vec<Result<(usize, TestResult), ExecutorError>> =
            stream::iter(runs).buffer_unordered(self.deps.config.test_concurrency.max(1))
                              .collect()
                              .await;

        let mut next = state.clone();
        for outcome in outcomes {
            let (i, result) = outcome?;
            next.testcases[i] = next.testcases[i].with_result(result);
        }
        let passed = next.testcases
                         .iter()
                         .filter(|tc| tc.last_result().is_some_and(|r| r.success))
                         .count();
        info!("pgTAP: {passed} of {} test cases passed", next.testcases.len());

        self.deps
            .repository
            .create_timeline_item(NewTimelineItem::new(state.session_id,
                                                       TimelineKind::TestRun,
                                                       format!("{passed} of {} test cases passed",
                                                               next.testcases.len()))
                                      .with_payload(json!({
                                          "passed": passed,
                                          "total": next.testcases.len(),
                                      })))
            .await?;
        let testcases = next.testcases.clone();
        upsert_artifact(self.deps.repository.as_ref(), state.session_id, move |mut content| {
            content.testcases = testcases;
            content
        }).await?;
        Ok(Transition::Continue(next))
    }
}
