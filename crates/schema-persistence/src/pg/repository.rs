//! `SchemaRepository` sobre Postgres.
//!
//! El commit de versión bloquea la fila de `design_schemas` (`FOR UPDATE`),
//! valida el patch contra el replay completo y escribe versión y contador en
//! la misma transacción. El `UPDATE` condicionado al número leído y la
//! restricción `UNIQUE (schema_id, number)` cubren cualquier carrera residual
//! como `VersionConflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

use schema_core::repo::{prepare_rollback, prepare_version, replay, Artifact, CreateVersionParams, NewTimelineItem,
                        RepositoryError, RequirementsArtifact, SchemaRepository, SchemaSnapshot, SchemaVersion,
                        TimelineItem, TimelineKind, VersionResult};
use schema_domain::{PatchOperation, Schema};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{artifacts, design_schemas, schema_versions, timeline_items};

pub struct PgSchemaRepository<P: ConnectionProvider> {
    provider: Arc<P>,
}

impl<P: ConnectionProvider> PgSchemaRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider) }
    }

    /// Corre `f` con una conexión del pool fuera del runtime async,
    /// reintentando errores transitorios.
    async fn blocking<T, F>(&self, mut f: F) -> Result<T, RepositoryError>
        where T: Send + 'static,
              F: FnMut(&mut PgConnection) -> Result<T, PersistenceError> + Send + 'static
    {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || {
            with_retry(|| {
                let mut conn = provider.connection()?;
                f(&mut *conn)
            })
        }).await
          .map_err(|e| RepositoryError::Storage(format!("blocking task failed: {e}")))?
          .map_err(RepositoryError::from)
    }
}

fn not_found(what: &'static str, id: Uuid) -> PersistenceError {
    RepositoryError::NotFound { what, id: id.to_string() }.into()
}

fn decode_schema(value: Value) -> Result<Schema, PersistenceError> {
    Schema::from_value(value).map_err(|e| PersistenceError::Corrupt(format!("initial snapshot: {e}")))
}

/// `(schema_id, initial_snapshot, latest_version_number)` de una sesión.
fn find_by_session(conn: &mut PgConnection, session_id: Uuid) -> Result<(Uuid, Value, i64), PersistenceError> {
    design_schemas::table.filter(design_schemas::session_id.eq(session_id))
                         .select((design_schemas::id,
                                  design_schemas::initial_snapshot,
                                  design_schemas::latest_version_number))
                         .first(conn)
                         .optional()?
                         .ok_or_else(|| not_found("session", session_id))
}

/// Bloquea la fila del esquema hasta el fin de la transacción.
fn lock_schema(conn: &mut PgConnection, schema_id: Uuid) -> Result<(Value, i64), PersistenceError> {
    design_schemas::table.find(schema_id)
                         .select((design_schemas::initial_snapshot, design_schemas::latest_version_number))
                         .for_update()
                         .first(conn)
                         .optional()?
                         .ok_or_else(|| not_found("schema", schema_id))
}

fn load_versions(conn: &mut PgConnection, schema_id: Uuid) -> Result<Vec<SchemaVersion>, PersistenceError> {
    let rows: Vec<(Uuid, i64, Value, Value, DateTime<Utc>)> =
        schema_versions::table.filter(schema_versions::schema_id.eq(schema_id))
                              .order(schema_versions::number.asc())
                              .select((schema_versions::schema_id,
                                       schema_versions::number,
                                       schema_versions::patch,
                                       schema_versions::reverse_patch,
                                       schema_versions::created_at))
                              .load(conn)?;
    rows.into_iter()
        .map(|(schema_id, number, patch, reverse_patch, created_at)| {
            Ok(SchemaVersion { schema_id,
                               number,
                               patch: serde_json::from_value(patch)?,
                               reverse_patch: serde_json::from_value(reverse_patch)?,
                               created_at })
        })
        .collect()
}

/// Agrega una versión bajo bloqueo. Con `rollback_target` el patch se
/// calcula desde los patches inversos en lugar de venir del llamador.
fn append_version(conn: &mut PgConnection,
                  schema_id: Uuid,
                  expected: i64,
                  patch: &[PatchOperation],
                  rollback_target: Option<i64>)
                  -> Result<VersionResult, PersistenceError> {
    conn.transaction::<_, PersistenceError, _>(|tx| {
            let (initial, latest) = lock_schema(tx, schema_id)?;
            let initial = decode_schema(initial)?;
            let history = load_versions(tx, schema_id)?;
            let patch = match rollback_target {
                Some(target) => prepare_rollback(&initial, &history, latest, expected, target)?,
                None => patch.to_vec(),
            };
            let prepared = prepare_version(&initial, &history, latest, expected, &patch)?;

            diesel::insert_into(schema_versions::table).values((schema_versions::schema_id.eq(schema_id),
                                                                 schema_versions::number.eq(prepared.number),
                                                                 schema_versions::patch.eq(serde_json::to_value(&patch)?),
                                                                 schema_versions::reverse_patch
                                                                     .eq(serde_json::to_value(&prepared.reverse_patch)?)))
                                                       .execute(tx)
                                                       .map_err(|e| match PersistenceError::from(e) {
                                                           PersistenceError::UniqueViolation(_) => {
                                                               RepositoryError::VersionConflict { expected,
                                                                                                  actual: prepared.number }
                                                                   .into()
                                                           }
                                                           other => other,
                                                       })?;
            let updated = diesel::update(design_schemas::table.filter(design_schemas::id.eq(schema_id))
                                                              .filter(design_schemas::latest_version_number.eq(latest)))
                              .set((design_schemas::latest_version_number.eq(prepared.number),
                                    design_schemas::current_snapshot.eq(prepared.schema.to_value()),
                                    design_schemas::updated_at.eq(Utc::now())))
                              .execute(tx)?;
            if updated != 1 {
                return Err(RepositoryError::VersionConflict { expected,
                                                              actual: prepared.number }
                           .into());
            }
            debug!("schema {schema_id} advanced to version {}", prepared.number);
            Ok(VersionResult { version_number: prepared.number,
                               schema: prepared.schema })
        })
}

fn artifact_from_row(row: (Uuid, Value, DateTime<Utc>, DateTime<Utc>)) -> Result<Artifact, PersistenceError> {
    let (session_id, content, created_at, updated_at) = row;
    Ok(Artifact { session_id,
                  content: serde_json::from_value(content)?,
                  created_at,
                  updated_at })
}

#[async_trait]
impl<P: ConnectionProvider> SchemaRepository for PgSchemaRepository<P> {
    async fn create_schema(&self, session_id: Uuid, initial: Schema) -> Result<SchemaSnapshot, RepositoryError> {
        initial.validate()
               .map_err(|e| RepositoryError::Patch { version: 0, source: e.into() })?;
        let snapshot = initial.to_value();
        let schema_id = self.blocking(move |conn| {
                                let schema_id = Uuid::new_v4();
                                diesel::insert_into(design_schemas::table)
                                    .values((design_schemas::id.eq(schema_id),
                                             design_schemas::session_id.eq(session_id),
                                             design_schemas::initial_snapshot.eq(&snapshot),
                                             design_schemas::current_snapshot.eq(&snapshot)))
                                    .execute(conn)
                                    .map_err(|e| match PersistenceError::from(e) {
                                        PersistenceError::UniqueViolation(_) => RepositoryError::AlreadyExists(session_id).into(),
                                        other => other,
                                    })?;
                                Ok(schema_id)
                            })
                            .await?;
        info!("created schema {schema_id} for session {session_id}");
        Ok(SchemaSnapshot { schema_id,
                            session_id,
                            schema: initial,
                            latest_version_number: 0 })
    }

    async fn get_schema(&self, session_id: Uuid) -> Result<SchemaSnapshot, RepositoryError> {
        self.blocking(move |conn| {
                conn.build_transaction().read_only().run(|tx| {
                                                        let (schema_id, initial, latest) = find_by_session(tx, session_id)?;
                                                        let versions = load_versions(tx, schema_id)?;
                                                        let schema = replay(&decode_schema(initial)?, &versions)?;
                                                        Ok(SchemaSnapshot { schema_id,
                                                                            session_id,
                                                                            schema,
                                                                            latest_version_number: latest })
                                                    })
            })
            .await
    }

    async fn create_version(&self, params: CreateVersionParams) -> Result<VersionResult, RepositoryError> {
        self.blocking(move |conn| {
                append_version(conn,
                               params.schema_id,
                               params.expected_latest_version_number,
                               &params.patch,
                               None)
            })
            .await
    }

    async fn list_versions(&self, schema_id: Uuid) -> Result<Vec<SchemaVersion>, RepositoryError> {
        self.blocking(move |conn| {
                let exists: i64 = design_schemas::table.filter(design_schemas::id.eq(schema_id))
                                                       .count()
                                                       .get_result(conn)?;
                if exists == 0 {
                    return Err(not_found("schema", schema_id));
                }
                load_versions(conn, schema_id)
            })
            .await
    }

    async fn rollback_to(&self, schema_id: Uuid, target: i64, expected: i64) -> Result<VersionResult, RepositoryError> {
        let result = self.blocking(move |conn| append_version(conn, schema_id, expected, &[], Some(target)))
                         .await?;
        info!("schema {schema_id} rolled back to version {target} as version {}", result.version_number);
        Ok(result)
    }

    async fn create_timeline_item(&self, item: NewTimelineItem) -> Result<TimelineItem, RepositoryError> {
        self.blocking(move |conn| {
                // idempotente por id: un reintento tras un commit sin acuse no duplica
                diesel::insert_into(timeline_items::table).values((timeline_items::id.eq(item.id),
                                                                   timeline_items::session_id.eq(item.session_id),
                                                                   timeline_items::kind.eq(item.kind.as_str()),
                                                                   timeline_items::content.eq(&item.content),
                                                                   timeline_items::payload.eq(&item.payload)))
                                                          .on_conflict(timeline_items::id)
                                                          .do_nothing()
                                                          .execute(conn)?;
                let (session_id, kind, content, payload, created_at): (Uuid, String, String, Option<Value>, DateTime<Utc>) =
                    timeline_items::table.filter(timeline_items::id.eq(item.id))
                                         .select((timeline_items::session_id,
                                                  timeline_items::kind,
                                                  timeline_items::content,
                                                  timeline_items::payload,
                                                  timeline_items::created_at))
                                         .first(conn)?;
                let kind = TimelineKind::parse(&kind).ok_or_else(|| {
                                                         PersistenceError::Corrupt(format!("timeline kind '{kind}'"))
                                                     })?;
                Ok(TimelineItem { id: item.id,
                                  session_id,
                                  kind,
                                  content,
                                  payload,
                                  created_at })
            })
            .await
    }

    async fn list_timeline_items(&self, session_id: Uuid) -> Result<Vec<TimelineItem>, RepositoryError> {
        self.blocking(move |conn| {
                let rows: Vec<(Uuid, String, String, Option<Value>, DateTime<Utc>)> =
                    timeline_items::table.filter(timeline_items::session_id.eq(session_id))
                                         .order(timeline_items::seq.asc())
                                         .select((timeline_items::id,
                                                  timeline_items::kind,
                                                  timeline_items::content,
                                                  timeline_items::payload,
                                                  timeline_items::created_at))
                                         .load(conn)?;
                rows.into_iter()
                    .map(|(id, kind, content, payload, created_at)| {
                        let kind = TimelineKind::parse(&kind).ok_or_else(|| {
                                                                 PersistenceError::Corrupt(format!("timeline kind '{kind}'"))
                                                             })?;
                        Ok(TimelineItem { id,
                                          session_id,
                                          kind,
                                          content,
                                          payload,
                                          created_at })
                    })
                    .collect()
            })
            .await
    }

    async fn create_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError> {
        let content = serde_json::to_value(&content).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        self.blocking(move |conn| {
                let now = Utc::now();
                let row = diesel::insert_into(artifacts::table)
                              .values((artifacts::session_id.eq(session_id),
                                       artifacts::content.eq(&content),
                                       artifacts::created_at.eq(now),
                                       artifacts::updated_at.eq(now)))
                              .on_conflict(artifacts::session_id)
                              .do_update()
                              .set((artifacts::content.eq(&content), artifacts::updated_at.eq(now)))
                              .returning((artifacts::session_id,
                                          artifacts::content,
                                          artifacts::created_at,
                                          artifacts::updated_at))
                              .get_result(conn)?;
                artifact_from_row(row)
            })
            .await
    }

    async fn update_artifact(&self, session_id: Uuid, content: RequirementsArtifact) -> Result<Artifact, RepositoryError> {
        let content = serde_json::to_value(&content).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        self.blocking(move |conn| {
                let row = diesel::update(artifacts::table.find(session_id))
                              .set((artifacts::content.eq(&content), artifacts::updated_at.eq(Utc::now())))
                              .returning((artifacts::session_id,
                                          artifacts::content,
                                          artifacts::created_at,
                                          artifacts::updated_at))
                              .get_result(conn)
                              .optional()?
                              .ok_or_else(|| not_found("artifact", session_id))?;
                artifact_from_row(row)
            })
            .await
    }

    async fn get_artifact(&self, session_id: Uuid) -> Result<Option<Artifact>, RepositoryError> {
        self.blocking(move |conn| {
                artifacts::table.find(session_id)
                                .select((artifacts::session_id,
                                         artifacts::content,
                                         artifacts::created_at,
                                         artifacts::updated_at))
                                .first(conn)
                                .optional()?
                                .map(artifact_from_row)
                                .transpose()
            })
            .await
    }
}
