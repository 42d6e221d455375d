use serde_json::Value;

use super::operation::PatchOperation;
use super::pointer::escape_segment;
use crate::schema::Schema;

/// Operaciones que transforman `from` en `to`.
///
/// Se comparan objetos miembro a miembro; los arrays y escalares distintos se
/// reemplazan completos. El repositorio guarda `diff(nuevo, anterior)` como
/// patch inverso de cada versión.
pub fn diff(from: &Schema, to: &Schema) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_values(&from.to_value(), &to.to_value(), "", &mut ops);
    ops
}

fn diff_values(from: &Value, to: &Value, path: &str, ops: &mut Vec<PatchOperation>) {
    match (from, to) {
        (Value::Object(a), Value::Object(b)) => {
            for key in a.keys() {
                if !b.contains_key(key) {
                    ops.push(PatchOperation::remove(child(path, key)));
                }
            }
            for (key, b_value) in b {
                match a.get(key) {
                    Some(a_value) => diff_values(a_value, b_value, &child(path, key), ops),
                    None => ops.push(PatchOperation::add(child(path, key), b_value.clone())),
                }
            }
        }
        _ if from == to => {}
        _ => ops.push(PatchOperation::replace(path, to.clone())),
    }
}

fn child(path: &str, key: &str) -> String {
    format!("{path}/{}", escape_segment(key))
}
