//! Nodos concretos del flujo. Cada nodo recibe las dependencias compartidas
//! (`Deps`) al construirse y no guarda estado entre ejecuciones.

use std::sync::Arc;

use schema_core::llm::ChatModel;
use schema_core::repo::{Artifact, RepositoryError, RequirementsArtifact, SchemaRepository};
use schema_core::sql::SqlExecutor;
use schema_core::WorkflowConfig;
use schema_domain::Schema;
use uuid::Uuid;

pub mod analyze;
pub mod commit;
pub mod ddl;
pub mod design;
pub mod finalize;
pub mod qa;
pub mod validate;

pub use analyze::AnalyzeRequirementsNode;
pub use commit::CommitVersionNode;
pub use ddl::{route_after_ddl, ExecuteDdlNode, GenerateDdlNode};
pub use design::DesignSchemaNode;
pub use finalize::FinalizeNode;
pub use qa::{ApplyGeneratedSqlsNode, DistributeRequirementsNode, TestcaseGenerationNode};
pub use validate::{RunTestsNode, ValidateSchemaNode};

pub const ANALYZE_REQUIREMENTS: &str = "analyzeRequirements";
pub const DESIGN_SCHEMA: &str = "designSchema";
pub const GENERATE_DDL: &str = "generateDdl";
pub const EXECUTE_DDL: &str = "executeDdl";
pub const COMMIT_VERSION: &str = "commitVersion";
pub const FINALIZE: &str = "finalize";
pub const DISTRIBUTE_REQUIREMENTS: &str = "distributeRequirements";
pub const TESTCASE_GENERATION: &str = "testcaseGeneration";
pub const APPLY_GENERATED_SQLS: &str = "applyGeneratedSqls";
pub const VALIDATE_SCHEMA: &str = "validateSchema";
pub const RUN_TESTS: &str = "runTests";

/// Colaboradores externos y límites compartidos por todos los nodos.
#[derive(Clone)]
pub struct Deps {
    pub model: Arc<dyn ChatModel>,
    pub repository: Arc<dyn SchemaRepository>,
    pub executor: Arc<dyn SqlExecutor>,
    pub config: WorkflowConfig,
}

impl Deps {
    pub fn new(model: Arc<dyn ChatModel>,
               repository: Arc<dyn SchemaRepository>,
               executor: Arc<dyn SqlExecutor>,
               config: WorkflowConfig)
               -> Self {
        Self { model,
               repository,
               executor,
               config }
    }
}

/// Crea o actualiza el artifact de la sesión aplicando `change` sobre el
/// contenido vigente (o uno vacío).
pub(crate) async fn upsert_artifact<F>(repository: &dyn SchemaRepository,
                                       session_id: Uuid,
                                       change: F)
                                       -> Result<Artifact, RepositoryError>
    where F: FnOnce(RequirementsArtifact) -> RequirementsArtifact
{
    match repository.get_artifact(session_id).await? {
        Some(existing) => repository.update_artifact(session_id, change(existing.content)).await,
        None => repository.create_artifact(session_id, change(RequirementsArtifact::default())).await,
    }
}

/// Extensiones que el executor debe asegurar: las configuradas más las que
/// declara el documento, sin repetir.
pub(crate) fn required_extensions(config: &WorkflowConfig, schema: &Schema) -> Vec<String> {
    let mut extensions = config.required_extensions.clone();
    for name in schema.extension_names() {
        if !extensions.contains(&name) {
            extensions.push(name);
        }
    }
    extensions
}
