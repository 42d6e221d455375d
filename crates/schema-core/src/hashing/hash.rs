use blake3::Hasher;
use serde_json::Value;

use super::to_canonical_json;
use schema_domain::Schema;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash de la forma canónica de un valor JSON.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Fingerprint de un documento de esquema (independiente del orden de claves).
pub fn schema_fingerprint(schema: &Schema) -> String {
    hash_value(&schema.to_value())
}
