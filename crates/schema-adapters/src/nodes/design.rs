//! Diseño del esquema por tool calls con auto-corrección de patches.
//!
//! El nodo trabaja sobre el documento de trabajo (candidato previo o esquema
//! comprometido) y acumula las operaciones aceptadas en un nuevo candidato.
//! Nada se persiste aquí: el commit ocurre después de validar el DDL.

use async_trait::async_trait;
use log::{debug, info, warn};

use schema_core::constants::DDL_EXECUTION_RETRY_KEY;
use schema_core::llm::{invoke, ChatRequest, Message, ToolCall};
use schema_core::model::SchemaCandidate;
use schema_core::{NodeError, Transition, WorkflowNode, WorkflowState};
use schema_domain::{apply_patch, PatchOperation, Schema};

use super::{Deps, DESIGN_SCHEMA};
use crate::prompts::{ddl_failure, design_system, patch_rejected, PATCH_APPLIED};
use crate::tools::{parse_schema_design, schema_design_tool, ToolError, SCHEMA_DESIGN_TOOL};

pub struct DesignSchemaNode {
    deps: Deps,
}

impl DesignSchemaNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

fn apply_call(schema: &Schema, call: &ToolCall) -> Result<(Vec<PatchOperation>, Schema), String> {
    let ops = parse_schema_design(call).map_err(|e| e.to_string())?;
    let next = apply_patch(schema, &ops).map_err(|e| e.to_string())?;
    Ok((ops, next))
}

#[async_trait]
impl WorkflowNode for DesignSchemaNode {
    fn id(&self) -> &str {
        DESIGN_SCHEMA
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let mut next = state.clone();
        if state.ddl_execution_failed {
            let reason = state.ddl_execution_failure_reason.as_deref().unwrap_or("unknown error");
            next = next.with_retry_incremented(DDL_EXECUTION_RETRY_KEY)
                       .with_message(Message::user(ddl_failure(reason)));
            next.ddl_execution_failed = false;
            next.ddl_execution_failure_reason = None;
            info!("redesigning after DDL failure (attempt {})", next.retry_count(DDL_EXECUTION_RETRY_KEY));
        }

        let mut working = next.working_schema().clone();
        let mut operations = next.candidate.as_ref().map(|c| c.operations.clone()).unwrap_or_default();
        let system = design_system(&working, next.analyzed_requirements.as_ref());
        let mut conversation = next.messages.clone();
        let max_rounds = self.deps.config.max_patch_repairs + 1;

        let mut round = 0;
        loop {
            round += 1;
            let request = ChatRequest::new(system.clone()).with_messages(conversation.clone())
                                                          .with_tool(schema_design_tool());
            let reply = invoke(self.deps.model.as_ref(), request).await?;
            let calls: Vec<ToolCall> = reply.calls_named(SCHEMA_DESIGN_TOOL).cloned().collect();
            conversation.push(Message::from(reply));
            if calls.is_empty() {
                return Err(ToolError::NotCalled(SCHEMA_DESIGN_TOOL).into());
            }

            let mut rejected: Option<String> = None;
            for call in &calls {
                if rejected.is_some() {
                    conversation.push(Message::tool(call.id.clone(), "Skipped: an earlier patch was rejected."));
                    continue;
                }
                match apply_call(&working, call) {
                    Ok((ops, schema)) => {
                        debug!("applied {} operations from {}", ops.len(), call.id);
                        working = schema;
                        operations.extend(ops);
                        conversation.push(Message::tool(call.id.clone(), PATCH_APPLIED));
                    }
                    Err(reason) => {
                        conversation.push(Message::tool(call.id.clone(), patch_rejected(&reason)));
                        rejected = Some(reason);
                    }
                }
            }

            match rejected {
                None => break,
                Some(reason) if round >= max_rounds => {
                    return Err(NodeError::Validation(format!("schema patch still rejected after {round} rounds: {reason}")));
                }
                Some(reason) => warn!("patch rejected (round {round}/{max_rounds}): {reason}"),
            }
        }

        next.messages = conversation;
        next.candidate = Some(SchemaCandidate { schema: working,
                                                operations });
        Ok(Transition::Continue(next))
    }
}
