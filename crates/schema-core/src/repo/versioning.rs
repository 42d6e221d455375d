//! Replay de versiones y composición de patches inversos. Compartido por
//! todas las implementaciones de `SchemaRepository`.

use schema_domain::{apply_patch, diff, PatchOperation, Schema};

use super::{RepositoryError, SchemaVersion};

/// Aplica en orden ascendente los patches de `versions` sobre `initial`.
pub fn replay(initial: &Schema, versions: &[SchemaVersion]) -> Result<Schema, RepositoryError> {
    let mut ordered: Vec<&SchemaVersion> = versions.iter().collect();
    ordered.sort_by_key(|v| v.number);
    let mut current = initial.clone();
    for version in ordered {
        current = apply_patch(&current, &version.patch).map_err(|source| RepositoryError::Patch { version: version.number,
                                                                                                    source })?;
    }
    Ok(current)
}

/// Versión candidata aún no persistida.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedVersion {
    pub number: i64,
    pub schema: Schema,
    pub reverse_patch: Vec<PatchOperation>,
}

/// Valida un patch nuevo contra la historia completa.
///
/// `latest` es el número vigente leído bajo el mismo lock/transacción que
/// escribirá la versión.
pub fn prepare_version(initial: &Schema,
                       history: &[SchemaVersion],
                       latest: i64,
                       expected: i64,
                       patch: &[PatchOperation])
                       -> Result<PreparedVersion, RepositoryError> {
    if latest != expected {
        return Err(RepositoryError::VersionConflict { expected, actual: latest });
    }
    let current = replay(initial, history)?;
    let number = latest + 1;
    let schema = apply_patch(&current, patch).map_err(|source| RepositoryError::Patch { version: number, source })?;
    let reverse_patch = diff(&schema, &current);
    Ok(PreparedVersion { number,
                         schema,
                         reverse_patch })
}

/// Patch que devuelve el documento de `latest` a `target`: concatenación de
/// los patches inversos desde la última versión hasta `target + 1`.
pub fn rollback_patch(history: &[SchemaVersion], target: i64, latest: i64) -> Result<Vec<PatchOperation>, RepositoryError> {
    if target < 0 || target >= latest {
        return Err(RepositoryError::InvalidRollback { target, latest });
    }
    let mut newer: Vec<&SchemaVersion> = history.iter().filter(|v| v.number > target).collect();
    newer.sort_by_key(|v| std::cmp::Reverse(v.number));
    Ok(newer.into_iter().flat_map(|v| v.reverse_patch.iter().cloned()).collect())
}

/// Patch de rollback verificado contra el replay: aplicado sobre el documento
/// vigente debe dar exactamente el documento de `target`.
pub fn prepare_rollback(initial: &Schema,
                        history: &[SchemaVersion],
                        latest: i64,
                        expected: i64,
                        target: i64)
                        -> Result<Vec<PatchOperation>, RepositoryError> {
    if latest != expected {
        return Err(RepositoryError::VersionConflict { expected, actual: latest });
    }
    let patch = rollback_patch(history, target, latest)?;
    let current = replay(initial, history)?;
    let at_target: Vec<SchemaVersion> = history.iter().filter(|v| v.number <= target).cloned().collect();
    let expected_doc = replay(initial, &at_target)?;
    let rolled = apply_patch(&current, &patch).map_err(|source| RepositoryError::Patch { version: latest + 1, source })?;
    if rolled != expected_doc {
        return Err(RepositoryError::Storage(format!("reverse patches do not reproduce version {target}")));
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn version(number: i64, patch: serde_json::Value, reverse: serde_json::Value) -> SchemaVersion {
        SchemaVersion { schema_id: Uuid::nil(),
                        number,
                        patch: serde_json::from_value(patch).unwrap(),
                        reverse_patch: serde_json::from_value(reverse).unwrap(),
                        created_at: Utc::now() }
    }

    #[test]
    fn replay_sorts_by_number() {
        let history = vec![version(2,
                                   json!([{"op": "add", "path": "/tables/a/columns/x", "value": {"type": "int"}}]),
                                   json!([])),
                           version(1, json!([{"op": "add", "path": "/tables/a", "value": {"name": "a"}}]), json!([]))];
        let schema = replay(&Schema::empty(), &history).unwrap();
        assert!(schema.table("a").unwrap().has_column("x"));
    }

    #[test]
    fn stale_expectation_is_a_conflict() {
        let err = prepare_version(&Schema::empty(), &[], 3, 2, &[]).unwrap_err();
        assert_eq!(err, RepositoryError::VersionConflict { expected: 2, actual: 3 });
    }

    #[test]
    fn rollback_bounds_are_checked() {
        assert!(rollback_patch(&[], 1, 1).is_err());
        assert!(rollback_patch(&[], -1, 1).is_err());
        assert!(rollback_patch(&[], 0, 1).unwrap().is_empty());
    }
}
