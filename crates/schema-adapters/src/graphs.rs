//! Ensamblado de los grafos del flujo.
//!
//! - diseño: `designSchema → generateDdl → executeDdl → commitVersion → finalize`
//!   con vuelta a `designSchema` mientras queden reintentos de DDL.
//! - QA: `distributeRequirements → [testcaseGeneration]* → applyGeneratedSqls
//!   → validateSchema → runTests → finalize`.
//! - pipeline: `analyzeRequirements`, luego diseño y, tras el commit, QA.
//!
//! `finalize` es siempre el manejador de errores.

use schema_core::{Graph, GraphBuilder, WorkflowError};

pub use crate::nodes::Deps;
use crate::nodes::*;

fn with_design(builder: GraphBuilder, deps: &Deps, after_commit: &str) -> GraphBuilder {
    let max = deps.config.max_ddl_execution_retries;
    builder.node(DesignSchemaNode::new(deps.clone()))
           .node(GenerateDdlNode)
           .node(ExecuteDdlNode::new(deps.clone()))
           .node(CommitVersionNode::new(deps.clone()))
           .edge(DESIGN_SCHEMA, GENERATE_DDL)
           .conditional(GENERATE_DDL, route_after_ddl(EXECUTE_DDL, max))
           .conditional(EXECUTE_DDL, route_after_ddl(COMMIT_VERSION, max))
           .edge(COMMIT_VERSION, after_commit)
}

fn with_qa(builder: GraphBuilder, deps: &Deps) -> GraphBuilder {
    builder.node(DistributeRequirementsNode::new(deps.clone()))
           .branch(TestcaseGenerationNode::new(deps.clone()))
           .node(ApplyGeneratedSqlsNode::new(deps.clone()))
           .node(ValidateSchemaNode::new(deps.clone()))
           .node(RunTestsNode::new(deps.clone()))
           .fan_out(DISTRIBUTE_REQUIREMENTS, TESTCASE_GENERATION, APPLY_GENERATED_SQLS)
           .edge(APPLY_GENERATED_SQLS, VALIDATE_SCHEMA)
           .edge(VALIDATE_SCHEMA, RUN_TESTS)
           .edge(RUN_TESTS, FINALIZE)
}

fn with_finalize(builder: GraphBuilder, deps: &Deps) -> GraphBuilder {
    builder.node(FinalizeNode::new(deps.clone()))
           .end(FINALIZE)
           .error_handler(FINALIZE)
}

pub fn design_graph(deps: &Deps) -> Result<Graph, WorkflowError> {
    let builder = with_design(GraphBuilder::new(), deps, FINALIZE).entry(DESIGN_SCHEMA);
    with_finalize(builder, deps).build()
}

pub fn qa_graph(deps: &Deps) -> Result<Graph, WorkflowError> {
    let builder = with_qa(GraphBuilder::new(), deps).entry(DISTRIBUTE_REQUIREMENTS);
    with_finalize(builder, deps).build()
}

pub fn pipeline_graph(deps: &Deps) -> Result<Graph, WorkflowError> {
    let builder = GraphBuilder::new().node(AnalyzeRequirementsNode::new(deps.clone()))
                                     .entry(ANALYZE_REQUIREMENTS)
                                     .edge(ANALYZE_REQUIREMENTS, DESIGN_SCHEMA);
    let builder = with_qa(with_design(builder, deps, DISTRIBUTE_REQUIREMENTS), deps);
    with_finalize(builder, deps).build()
}
