//! Generación del DDL desde el documento de trabajo y su ejecución de prueba.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::json;

use schema_core::constants::DDL_EXECUTION_RETRY_KEY;
use schema_core::hashing::schema_fingerprint;
use schema_core::repo::{NewTimelineItem, TimelineKind};
use schema_core::sql::failure_reason;
use schema_core::{NodeError, Route, Transition, WorkflowNode, WorkflowState};
use schema_domain::to_ddl;

use super::{required_extensions, Deps, DESIGN_SCHEMA, EXECUTE_DDL, FINALIZE, GENERATE_DDL};

/// Arista condicional tras generar o ejecutar DDL: éxito sigue a
/// `on_success`; un fallo vuelve al diseño mientras queden reintentos y si no
/// termina en `finalize`.
pub fn route_after_ddl(on_success: &'static str,
                       max_retries: u32)
                       -> impl Fn(&WorkflowState) -> Route + Send + Sync + 'static {
    move |state| {
        if !state.ddl_execution_failed {
            Route::to(on_success)
        } else if state.retry_count(DDL_EXECUTION_RETRY_KEY) < max_retries {
            Route::to(DESIGN_SCHEMA)
        } else {
            Route::to(FINALIZE)
        }
    }
}

pub struct GenerateDdlNode;

#[async_trait]
impl WorkflowNode for GenerateDdlNode {
    fn id(&self) -> &str {
        GENERATE_DDL
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let output = to_ddl(state.working_schema());
        let mut next = state.clone();
        next.ddl = output.sql();
        // statements que no se pudieron generar cuentan como fallo de DDL
        if output.has_errors() {
            let reason = output.errors
                               .iter()
                               .map(|e| format!("DDL generation error: {e}"))
                               .collect::<Vec<_>>()
                               .join("\n\n");
            warn!("{} statements could not be generated", output.errors.len());
            next.ddl_execution_failed = true;
            next.ddl_execution_failure_reason = Some(reason);
        }
        Ok(Transition::Continue(next))
    }
}

pub struct ExecuteDdlNode {
    deps: Deps,
}

impl ExecuteDdlNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for ExecuteDdlNode {
    fn id(&self) -> &str {
        EXECUTE_DDL
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let extensions = required_extensions(&self.deps.config, state.working_schema());
        let results = self.deps.executor.execute(&state.ddl, &extensions).await?;
        let reason = failure_reason(&results);
        let failed = results.iter().filter(|r| !r.success).count();
        info!("executed {} DDL statements, {failed} failed", results.len());

        let content = match &reason {
            Some(_) => format!("DDL validation failed: {failed} of {} statements", results.len()),
            None => format!("DDL validated: {} statements", results.len()),
        };
        self.deps
            .repository
            .create_timeline_item(NewTimelineItem::new(state.session_id, TimelineKind::QueryResult, content)
                                      .with_payload(json!({
                                          "statements": results.len(),
                                          "failed": failed,
                                          "schemaFingerprint": schema_fingerprint(state.working_schema()),
                                      })))
            .await?;

        let mut next = state.clone();
        next.ddl_execution_failed = reason.is_some();
        next.ddl_execution_failure_reason = reason;
        next.ddl_results = results;
        Ok(Transition::Continue(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_core::repo::SchemaSnapshot;
    use schema_domain::Schema;
    use uuid::Uuid;

    fn state() -> WorkflowState {
        WorkflowState::new(SchemaSnapshot { schema_id: Uuid::new_v4(),
                                            session_id: Uuid::new_v4(),
                                            schema: Schema::empty(),
                                            latest_version_number: 0 },
                           "x")
    }

    #[test]
    fn router_bounds_redesigns() {
        let route = route_after_ddl("commitVersion", 1);
        let mut s = state();
        assert_eq!(route(&s), Route::to("commitVersion"));
        s.ddl_execution_failed = true;
        assert_eq!(route(&s), Route::to(DESIGN_SCHEMA));
        let s = s.with_retry_incremented(DDL_EXECUTION_RETRY_KEY);
        assert_eq!(route(&s), Route::to(FINALIZE));
    }

    #[tokio::test]
    async fn empty_schema_generates_empty_ddl() {
        let out = GenerateDdlNode.run(&state()).await.unwrap();
        assert_eq!(out.state().ddl, "");
        assert!(!out.state().ddl_execution_failed);
    }
}
