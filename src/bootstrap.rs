//! Ensamblado de dependencias y arranque de sesiones.
//!
//! El backend se elige por configuración: con `DATABASE_URL` se usan el
//! repositorio y el executor Postgres; sin ella, el repositorio en memoria y
//! un executor provisto por el llamador.

use std::sync::Arc;

use log::info;
use uuid::Uuid;

use schema_adapters::{design_graph, pipeline_graph, qa_graph, Deps};
use schema_core::llm::ChatModel;
use schema_core::repo::{NewTimelineItem, RepositoryError, SchemaRepository, SchemaSnapshot, TimelineKind};
use schema_core::sql::SqlExecutor;
use schema_core::{Graph, InMemorySchemaRepository, WorkflowEngine, WorkflowError, WorkflowState};
use schema_domain::Schema;
use schema_persistence::{build_pool, DbConfig, PgSchemaRepository, PgSqlExecutor, PoolProvider};

use crate::config::AppConfig;
use crate::errors::AppError;

/// Grafo a ejecutar en una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowKind {
    /// Análisis, diseño y QA.
    #[default]
    Pipeline,
    Design,
    Qa,
}

impl FlowKind {
    pub fn graph(self, deps: &Deps) -> Result<Graph, WorkflowError> {
        match self {
            FlowKind::Pipeline => pipeline_graph(deps),
            FlowKind::Design => design_graph(deps),
            FlowKind::Qa => qa_graph(deps),
        }
    }
}

pub fn in_memory_deps(model: Arc<dyn ChatModel>, executor: Arc<dyn SqlExecutor>, config: &AppConfig) -> Deps {
    Deps::new(model,
              Arc::new(InMemorySchemaRepository::new()),
              executor,
              config.workflow.clone())
}

/// Dependencias respaldadas por Postgres. El pool corre las migraciones
/// pendientes al construirse.
pub fn postgres_deps(model: Arc<dyn ChatModel>, config: &AppConfig) -> Result<Deps, AppError> {
    let db = DbConfig::from_env()?;
    let url = config.database_url.clone().unwrap_or_else(|| db.url.clone());
    let pool = build_pool(&url, db.min_connections, db.max_connections)?;
    let repository = PgSchemaRepository::new(PoolProvider { pool: pool.clone() });
    let executor = PgSqlExecutor::from_config(PoolProvider { pool }, &db);
    info!("using postgres backend (commit_validation={})", db.commit_validation);
    Ok(Deps::new(model, Arc::new(repository), Arc::new(executor), config.workflow.clone()))
}

/// Esquema vigente de la sesión; si no existe se crea vacío.
pub async fn open_session(repository: &dyn SchemaRepository, session_id: Uuid) -> Result<SchemaSnapshot, AppError> {
    match repository.get_schema(session_id).await {
        Ok(snapshot) => Ok(snapshot),
        Err(RepositoryError::NotFound { .. }) => {
            info!("starting new design session {session_id}");
            match repository.create_schema(session_id, Schema::empty()).await {
                Err(RepositoryError::AlreadyExists(_)) => Ok(repository.get_schema(session_id).await?),
                other => Ok(other?),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Registra el mensaje del usuario en la línea de tiempo y ejecuta el flujo.
pub async fn run_session(deps: &Deps, kind: FlowKind, session_id: Uuid, input: &str) -> Result<WorkflowState, AppError> {
    let snapshot = open_session(deps.repository.as_ref(), session_id).await?;
    deps.repository
        .create_timeline_item(NewTimelineItem::new(session_id, TimelineKind::UserMessage, input))
        .await?;
    let engine = WorkflowEngine::new(kind.graph(deps)?).with_config(&deps.config);
    let state = engine.run(WorkflowState::new(snapshot, input)).await?;
    info!("session {session_id} finished at version {}", state.latest_version_number);
    Ok(state)
}
