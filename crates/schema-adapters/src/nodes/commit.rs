//! Commit del candidato validado como nueva versión.
//!
//! Un conflicto de versión no es fatal mientras queden reintentos: se relee el
//! esquema vigente, se descarta el candidato y se vuelve al diseño.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::json;

use schema_core::constants::VERSION_CONFLICT_RETRY_KEY;
use schema_core::hashing::schema_fingerprint;
use schema_core::llm::Message;
use schema_core::repo::{CreateVersionParams, NewTimelineItem, RepositoryError, TimelineKind};
use schema_core::{NodeError, Transition, WorkflowNode, WorkflowState};

use super::{Deps, COMMIT_VERSION, DESIGN_SCHEMA};
use crate::prompts::version_conflict;

pub struct CommitVersionNode {
    deps: Deps,
}

impl CommitVersionNode {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl WorkflowNode for CommitVersionNode {
    fn id(&self) -> &str {
        COMMIT_VERSION
    }

    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let candidate = match &state.candidate {
            Some(c) if !c.operations.is_empty() => c,
            _ => {
                info!("nothing to commit for session {}", state.session_id);
                let mut next = state.clone();
                next.candidate = None;
                return Ok(Transition::Continue(next));
            }
        };

        let params = CreateVersionParams { schema_id: state.schema_id,
                                           expected_latest_version_number: state.latest_version_number,
                                           patch: candidate.operations.clone() };
        match self.deps.repository.create_version(params).await {
            Ok(version) => {
                info!("committed version {} of schema {}", version.version_number, state.schema_id);
                let fingerprint = schema_fingerprint(&version.schema);
                self.deps
                    .repository
                    .create_timeline_item(NewTimelineItem::new(state.session_id,
                                                               TimelineKind::SchemaVersion,
                                                               format!("Schema version {}", version.version_number))
                                              .with_payload(json!({
                                                  "versionNumber": version.version_number,
                                                  "operations": candidate.operations.len(),
                                                  "schemaFingerprint": fingerprint,
                                              })))
                    .await?;
                let mut next = state.clone();
                next.schema = version.schema;
                next.latest_version_number = version.version_number;
                next.candidate = None;
                Ok(Transition::Continue(next))
            }
            Err(RepositoryError::VersionConflict { expected, actual }) => {
                let attempts = state.retry_count(VERSION_CONFLICT_RETRY_KEY);
                if attempts >= self.deps.config.max_version_conflict_retries {
                    return Err(NodeError::VersionConflict { expected, actual });
                }
                warn!("version conflict on schema {} (expected {expected}, found {actual}); redesigning",
                      state.schema_id);
                let latest = self.deps.repository.get_schema(state.session_id).await?;
                let mut next = state.with_retry_incremented(VERSION_CONFLICT_RETRY_KEY)
                                    .with_message(Message::user(version_conflict(latest.latest_version_number)));
                next.schema = latest.schema;
                next.latest_version_number = latest.latest_version_number;
                next.candidate = None;
                Ok(Transition::goto(next, DESIGN_SCHEMA))
            }
            Err(other) => Err(other.into()),
        }
    }
}
