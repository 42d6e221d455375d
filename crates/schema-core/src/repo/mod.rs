pub mod memory;
pub mod types;
pub mod versioning;

pub use memory::InMemorySchemaRepository;
pub use types::{Artifact, CreateVersionParams, NewTimelineItem, RepositoryError, RequirementsArtifact, SchemaRepository,
                SchemaSnapshot, SchemaVersion, TimelineItem, TimelineKind, VersionResult};
pub use versioning::{prepare_rollback, prepare_version, replay, rollback_patch, PreparedVersion};
