use async_trait::async_trait;
use log::info;
use serde_json::json;

use schema_core::constants::DDL_EXECUTION_RETRY_KEY;
use schema_core::llm::Message;
use schema_core::repo::{NewTimelineItem, TimelineKind};
use schema_core::{NodeError, Transition, WorkflowNode, WorkflowState};

use super::{Deps, FINALIZE};

/// Nodo terminal y manejador de errores: deja exactamente un resumen, un
/// mensaje del asistente y una entrada de timeline por corrida.
pub struct FinalizeNode {
    deps: Deps,
}

impl FinalizeNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

fn summarize(state: &WorkflowState) -> (String, TimelineKind) {
    if let Some(failure) = &state.failure {
        return (format!("The workflow stopped at {}: {}", failure.node, failure.message), TimelineKind::Error);
    }
    if state.ddl_execution_failed {
        let reason = state.ddl_execution_failure_reason.as_deref().unwrap_or("unknown error");
        return (format!("The schema could not be validated after {} redesign attempt(s). Last error:\n\n{reason}",
                        state.retry_count(DDL_EXECUTION_RETRY_KEY)),
                TimelineKind::Error);
    }

    let mut text = format!("Schema is at version {} with {} table(s).",
                           state.latest_version_number,
                           state.schema.tables.len());
    if !state.testcases.is_empty() {
        let passed = state.testcases
                          .iter()
                          .filter(|tc| tc.last_result().is_some_and(|r| r.success))
                          .count();
        text.push_str(&format!(" {passed} of {} test case(s) passed.", state.testcases.len()));
    }
    if let Some(report) = &state.schema_validation {
        if !report.dml_failures.is_empty() {
            text.push_str(&format!(" {} DML statement(s) failed validation.", report.dml_failures.len()));
        }
    }
    if !state.branch_failures.is_empty() {
        text.push_str(&format!(" {} requirement(s) produced no test cases.", state.branch_failures.len()));
    }
    (text, TimelineKind::AssistantMessage)
}

#[async_trait]
impl WorkflowNode for FinalizeNode {
    fn id(&self) -> &str {
        FINALIZE
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        if state.summary.is_some() {
            return Ok(Transition::End(state.clone()));
        }
        let (summary, kind) = summarize(state);
        info!("run {} finished: {summary}", state.run_id);
        self.deps
            .repository
            .create_timeline_item(NewTimelineItem::new(state.session_id, kind, summary.clone())
                                      .with_payload(json!({
                                          "runId": state.run_id,
                                          "versionNumber": state.latest_version_number,
                                          "failed": state.is_failed(),
                                      })))
            .await?;

        let mut next = state.with_message(Message::assistant(summary.clone()));
        next.summary = Some(summary);
        Ok(Transition::End(next))
    }
}
