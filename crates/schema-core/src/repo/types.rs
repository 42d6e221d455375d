//! Contrato del repositorio de versiones de esquema.
//!
//! El esquema vigente de una sesión es siempre `snapshot inicial + patches de
//! todas las versiones en orden ascendente`. Las versiones son append-only:
//! un rollback agrega una versión nueva, nunca reescribe historia.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use schema_domain::{AnalyzedRequirements, PatchError, PatchOperation, Schema, Testcase};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },
    #[error("schema for session '{0}' already exists")]
    AlreadyExists(Uuid),
    #[error("version conflict: expected latest {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },
    #[error("patch of version {version} does not apply: {source}")]
    Patch { version: i64, source: PatchError },
    #[error("cannot roll back to version {target} (latest is {latest})")]
    InvalidRollback { target: i64, latest: i64 },
    #[error("storage temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Esquema reconstruido de una sesión.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub schema_id: Uuid,
    pub session_id: Uuid,
    pub schema: Schema,
    pub latest_version_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersionParams {
    pub schema_id: Uuid,
    /// Número que el llamador cree vigente; se compara en el commit.
    pub expected_latest_version_number: i64,
    pub patch: Vec<PatchOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResult {
    pub version_number: i64,
    pub schema: Schema,
}

/// Fila de versión persistida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub schema_id: Uuid,
    pub number: i64,
    pub patch: Vec<PatchOperation>,
    pub reverse_patch: Vec<PatchOperation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    UserMessage,
    AssistantMessage,
    SchemaVersion,
    QueryResult,
    TestRun,
    Error,
}

impl TimelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineKind::UserMessage => "user_message",
            TimelineKind::AssistantMessage => "assistant_message",
            TimelineKind::SchemaVersion => "schema_version",
            TimelineKind::QueryResult => "query_result",
            TimelineKind::TestRun => "test_run",
            TimelineKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
                 "user_message" => TimelineKind::UserMessage,
                 "assistant_message" => TimelineKind::AssistantMessage,
                 "schema_version" => TimelineKind::SchemaVersion,
                 "query_result" => TimelineKind::QueryResult,
                 "test_run" => TimelineKind::TestRun,
                 "error" => TimelineKind::Error,
                 _ => return None,
             })
    }
}

/// Item a registrar. El `id` se fija al construirlo y sirve de clave de
/// idempotencia: reenviar el mismo item no duplica la entrada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimelineItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: TimelineKind,
    pub content: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: TimelineKind,
    pub content: String,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Contenido del artifact de requerimientos de una sesión.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementsArtifact {
    pub analysis: AnalyzedRequirements,
    #[serde(default)]
    pub testcases: Vec<Testcase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub session_id: Uuid,
    pub content: RequirementsArtifact,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewTimelineItem {
    pub fn new(session_id: Uuid, kind: TimelineKind, content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               session_id,
               kind,
               content: content.into(),
               payload: None }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// Crea el esquema de una sesión con su snapshot inicial (versión 0).
    async fn create_schema(&self, session_id: Uuid, initial: Schema) -> Result<SchemaSnapshot, RepositoryError>;
    /// Reconstruye el esquema vigente por replay. Sin efectos.
    async fn get_schema(&self, session_id: Uuid) -> Result<SchemaSnapshot, RepositoryError>;
    /// Agrega una versión con control optimista de concurrencia.
    async fn create_version(&self, params: CreateVersionParams) -> Result<VersionResult, RepositoryError>;
    async fn list_versions(&self, schema_id: Uuid) -> Result<Vec<SchemaVersion>, RepositoryError>;
    /// Agrega una versión que devuelve el documento al estado de `target`.
    async fn rollback_to(&self,
                         schema_id: Uuid,
                         target: i64,
                         expected_latest_version_number: i64)
                         -> Result<VersionResult, RepositoryError>;
    async fn create_timeline_item(&self, item: NewTimelineItem) -> Result<TimelineItem, RepositoryError>;
    async fn list_timeline_items(&self, session_id: Uuid) -> Result<Vec<TimelineItem>, RepositoryError>;
    async fn create_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError>;
    async fn update_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError>;
    async fn get_artifact(&self, session_id: Uuid) -> Result<Option<Artifact>, RepositoryError>;
}
