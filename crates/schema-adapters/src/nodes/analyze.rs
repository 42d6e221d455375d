use async_trait::async_trait;
use log::info;

use schema_core::llm::{invoke, ChatRequest, Message};
use schema_core::{NodeError, Transition, WorkflowNode, WorkflowState};

use super::{upsert_artifact, Deps, ANALYZE_REQUIREMENTS};
use crate::prompts::ANALYZE_SYSTEM;
use crate::tools::{parse_requirements, save_requirements_tool, ToolError, SAVE_REQUIREMENTS_TOOL};

/// Extrae objetivo y requerimientos del pedido del usuario y los persiste en
/// el artifact de la sesión.
pub struct AnalyzeRequirementsNode {
    deps: Deps,
}

impl AnalyzeRequirementsNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for AnalyzeRequirementsNode {
    fn id(&self) -> &str {
        ANALYZE_REQUIREMENTS
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let request = ChatRequest::new(ANALYZE_SYSTEM).with_messages(state.messages.clone())
                                                      .with_tool(save_requirements_tool());
        let reply = invoke(self.deps.model.as_ref(), request).await?;
        let call = reply.calls_named(SAVE_REQUIREMENTS_TOOL)
                        .next()
                        .cloned()
                        .ok_or(ToolError::NotCalled(SAVE_REQUIREMENTS_TOOL))?;
        let analysis = parse_requirements(&call)?;
        info!("analyzed {} requirements for session {}", analysis.requirements.len(), state.session_id);

        let saved = analysis.clone();
        upsert_artifact(self.deps.repository.as_ref(), state.session_id, move |mut content| {
            content.analysis = saved;
            content.testcases.clear();
            content
        }).await?;

        let mut next = state.with_message(Message::from(reply))
                            .with_message(Message::tool(call.id.clone(), "Requirements saved."));
        next.analyzed_requirements = Some(analysis);
        Ok(Transition::Continue(next))
    }
}
