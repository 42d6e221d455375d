use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use schema_domain::Schema;

use super::versioning::{prepare_rollback, prepare_version, replay};
use super::{Artifact, CreateVersionParams, NewTimelineItem, RepositoryError, RequirementsArtifact, SchemaRepository,
            SchemaSnapshot, SchemaVersion, TimelineItem, VersionResult};

struct SchemaRecord {
    session_id: Uuid,
    initial: Schema,
    latest: i64,
    versions: Vec<SchemaVersion>,
}

#[derive(Default)]
struct Inner {
    schemas: HashMap<Uuid, SchemaRecord>,
    by_session: HashMap<Uuid, Uuid>,
    timeline: Vec<TimelineItem>,
    artifacts: HashMap<Uuid, Artifact>,
}

/// Repositorio en memoria. El compare-and-swap del número de versión ocurre
/// bajo el lock de escritura.
#[derive(Default)]
pub struct InMemorySchemaRepository {
    inner: RwLock<Inner>,
}

impl InMemorySchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &'static str, id: Uuid) -> RepositoryError {
    RepositoryError::NotFound { what, id: id.to_string() }
}

impl Inner {
    fn record_mut(&mut self, schema_id: Uuid) -> Result<&mut SchemaRecord, RepositoryError> {
        self.schemas.get_mut(&schema_id).ok_or_else(|| not_found("schema", schema_id))
    }

    fn append(&mut self, schema_id: Uuid, expected: i64, patch: Vec<schema_domain::PatchOperation>)
              -> Result<VersionResult, RepositoryError> {
        let record = self.record_mut(schema_id)?;
        let prepared = prepare_version(&record.initial, &record.versions, record.latest, expected, &patch)?;
        record.versions.push(SchemaVersion { schema_id,
                                             number: prepared.number,
                                             patch,
                                             reverse_patch: prepared.reverse_patch,
                                             created_at: Utc::now() });
        record.latest = prepared.number;
        debug!("schema {schema_id} advanced to version {}", prepared.number);
        Ok(VersionResult { version_number: prepared.number,
                           schema: prepared.schema })
    }
}

#[async_trait]
impl SchemaRepository for InMemorySchemaRepository {
    async fn create_schema(&self, session_id: Uuid, initial: Schema) -> Result<SchemaSnapshot, RepositoryError> {
        initial.validate()
               .map_err(|e| RepositoryError::Patch { version: 0, source: e.into() })?;
        let mut inner = self.inner.write().await;
        if inner.by_session.contains_key(&session_id) {
            return Err(RepositoryError::AlreadyExists(session_id));
        }
        let schema_id = Uuid::new_v4();
        inner.schemas.insert(schema_id,
                             SchemaRecord { session_id,
                                            initial: initial.clone(),
                                            latest: 0,
                                            versions: Vec::new() });
        inner.by_session.insert(session_id, schema_id);
        Ok(SchemaSnapshot { schema_id,
                            session_id,
                            schema: initial,
                            latest_version_number: 0 })
    }

    async fn get_schema(&self, session_id: Uuid) -> Result<SchemaSnapshot, RepositoryError> {
        let inner = self.inner.read().await;
        let schema_id = *inner.by_session.get(&session_id).ok_or_else(|| not_found("session", session_id))?;
        let record = inner.schemas.get(&schema_id).ok_or_else(|| not_found("schema", schema_id))?;
        Ok(SchemaSnapshot { schema_id,
                            session_id: record.session_id,
                            schema: replay(&record.initial, &record.versions)?,
                            latest_version_number: record.latest })
    }

    async fn create_version(&self, params: CreateVersionParams) -> Result<VersionResult, RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.append(params.schema_id, params.expected_latest_version_number, params.patch)
    }

    async fn list_versions(&self, schema_id: Uuid) -> Result<Vec<SchemaVersion>, RepositoryError> {
        let inner = self.inner.read().await;
        let record = inner.schemas.get(&schema_id).ok_or_else(|| not_found("schema", schema_id))?;
        Ok(record.versions.clone())
    }

    async fn rollback_to(&self, schema_id: Uuid, target: i64, expected: i64) -> Result<VersionResult, RepositoryError> {
        let mut inner = self.inner.write().await;
        let record = inner.record_mut(schema_id)?;
        let patch = prepare_rollback(&record.initial, &record.versions, record.latest, expected, target)?;
        inner.append(schema_id, expected, patch)
    }

    async fn create_timeline_item(&self, item: NewTimelineItem) -> Result<TimelineItem, RepositoryError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.timeline.iter().find(|t| t.id == item.id) {
            return Ok(existing.clone());
        }
        let stored = TimelineItem { id: item.id,
                                    session_id: item.session_id,
                                    kind: item.kind,
                                    content: item.content,
                                    payload: item.payload,
                                    created_at: Utc::now() };
        inner.timeline.push(stored.clone());
        Ok(stored)
    }

    async fn list_timeline_items(&self, session_id: Uuid) -> Result<Vec<TimelineItem>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.timeline.iter().filter(|t| t.session_id == session_id).cloned().collect())
    }

    async fn create_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError> {
        let now = Utc::now();
        let artifact = Artifact { session_id,
                                  content,
                                  created_at: now,
                                  updated_at: now };
        self.inner.write().await.artifacts.insert(session_id, artifact.clone());
        Ok(artifact)
    }

    async fn update_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError> {
        let mut inner = self.inner.write().await;
        let artifact = inner.artifacts.get_mut(&session_id).ok_or_else(|| not_found("artifact", session_id))?;
        artifact.content = content;
        artifact.updated_at = Utc::now();
        Ok(artifact.clone())
    }

    async fn get_artifact(&self, session_id: Uuid) -> Result<Option<Artifact>, RepositoryError> {
        Ok(self.inner.read().await.artifacts.get(&session_id).cloned())
    }
}
