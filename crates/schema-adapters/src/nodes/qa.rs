//! Map-reduce de generación de casos de prueba: una rama aislada por
//! requerimiento y un reduce que junta los resultados.

use async_trait::async_trait;
use log::{info, warn};

use schema_core::llm::{invoke, ChatRequest, Message};
use schema_core::model::{BranchOutput, BranchState};
use schema_core::{BranchNode, NodeError, Transition, WorkflowNode, WorkflowState};
use schema_domain::{to_ddl, RequirementRef, Testcase};

use super::{upsert_artifact, Deps, APPLY_GENERATED_SQLS, DISTRIBUTE_REQUIREMENTS, TESTCASE_GENERATION};
use crate::prompts::{testcase_request, testcase_system};
use crate::tools::{parse_testcase, save_testcase_tool, ToolError, SAVE_TESTCASE_TOOL};

pub struct DistributeRequirementsNode {
    deps: Deps,
}

impl DistributeRequirementsNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for DistributeRequirementsNode {
    fn id(&self) -> &str {
        DISTRIBUTE_REQUIREMENTS
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let analysis = match &state.analyzed_requirements {
            Some(a) => a.clone(),
            None => self.deps
                        .repository
                        .get_artifact(state.session_id)
                        .await?
                        .map(|a| a.content.analysis)
                        .unwrap_or_default(),
        };
        if analysis.is_empty() {
            warn!("session {} has no analyzed requirements; no test cases will be generated", state.session_id);
        }

        let schema = state.working_schema().clone();
        let ddl = to_ddl(&schema).sql();
        let branches: Vec<BranchState> = analysis.requirements
                                                 .iter()
                                                 .enumerate()
                                                 .map(|(i, item)| BranchState::new(i, item.clone(), schema.clone(), ddl.clone()))
                                                 .collect();
        info!("distributing {} requirements", branches.len());

        let mut next = state.clone();
        next.analyzed_requirements = Some(analysis);
        next.ddl = ddl;
        next.branch_outputs.clear();
        next.branch_failures.clear();
        Ok(Transition::FanOut(next, branches))
    }
}

/// Rama: genera los casos de un único requerimiento partiendo de un
/// historial vacío.
pub struct TestcaseGenerationNode {
    deps: Deps,
}

impl TestcaseGenerationNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl BranchNode for TestcaseGenerationNode {
    fn id(&self) -> &str {
        TESTCASE_GENERATION
    }

    async fn run(&self, branch: &BranchState) -> Result<BranchOutput, NodeError> {
        let mut messages = branch.messages.clone();
        messages.push(Message::user(testcase_request(&branch.requirement)));
        let request = ChatRequest::new(testcase_system(&branch.ddl)).with_messages(messages)
                                                                    .with_tool(save_testcase_tool());
        let reply = invoke(self.deps.model.as_ref(), request).await?;

        let requirement = RequirementRef::from(&branch.requirement);
        let testcases = reply.calls_named(SAVE_TESTCASE_TOOL)
                             .map(|call| parse_testcase(call, requirement.clone()))
                             .collect::<Result<Vec<Testcase>, ToolError>>()?;
        if testcases.is_empty() {
            return Err(ToolError::NotCalled(SAVE_TESTCASE_TOOL).into());
        }
        Ok(BranchOutput { index: branch.index,
                          requirement: branch.requirement.clone(),
                          testcases })
    }
}

/// Reduce: corre sólo cuando todas las ramas terminaron.
pub struct ApplyGeneratedSqlsNode {
    deps: Deps,
}

impl ApplyGeneratedSqlsNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for ApplyGeneratedSqlsNode {
    fn id(&self) -> &str {
        APPLY_GENERATED_SQLS
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        for failure in &state.branch_failures {
            warn!("requirement {} ('{}') produced no test cases: {}",
                  failure.index, failure.requirement.requirement, failure.message);
        }
        let mut next = state.clone();
        next.testcases
            .extend(state.branch_outputs.iter().flat_map(|o| o.testcases.iter().cloned()));
        next.branch_outputs.clear();
        info!("collected {} test cases ({} branches failed)",
              next.testcases.len(),
              state.branch_failures.len());

        let (analysis, testcases) = (next.analyzed_requirements.clone(), next.testcases.clone());
        upsert_artifact(self.deps.repository.as_ref(), state.session_id, move |mut content| {
            if let Some(analysis) = analysis {
                content.analysis = analysis;
            }
            content.testcases = testcases;
            content
        }).await?;
        Ok(Transition::Continue(next))
    }
}
