use serde_json::{Map, Value};

use super::operation::PatchOperation;
use super::pointer::{parse_index, parse_pointer};
use crate::error::PatchError;
use crate::schema::Schema;

/// Aplica `operations` en orden sobre una copia de `schema`.
///
/// Devuelve el documento resultante sólo si todas las operaciones se aplican
/// y el JSON final deserializa y valida como `Schema`.
pub fn apply_patch(schema: &Schema, operations: &[PatchOperation]) -> Result<Schema, PatchError> {
    let mut doc = schema.to_value();
    apply_to_value(&mut doc, operations)?;
    Ok(Schema::from_value(doc)?)
}

/// Aplica las operaciones sobre un `Value` arbitrario. Si alguna falla el
/// valor puede quedar a medio modificar; `apply_patch` sólo lo usa sobre una
/// copia.
pub fn apply_to_value(doc: &mut Value, operations: &[PatchOperation]) -> Result<(), PatchError> {
    for op in operations {
        apply_one(doc, op)?;
    }
    Ok(())
}

fn apply_one(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    match op {
        PatchOperation::Add { path, value } => {
            let segments = parse_pointer(path)?;
            ensure_parents(doc, path, &segments)?;
            add(doc, path, &segments, value.clone())
        }
        PatchOperation::Replace { path, value } => {
            let segments = parse_pointer(path)?;
            ensure_parents(doc, path, &segments)?;
            replace(doc, path, &segments, value.clone())
        }
        PatchOperation::Remove { path } => {
            let segments = parse_pointer(path)?;
            remove(doc, path, &segments).map(|_| ())
        }
        PatchOperation::Move { from, path } => {
            let from_segments = parse_pointer(from)?;
            let segments = parse_pointer(path)?;
            if from_segments == segments {
                return get(doc, &from_segments).map(|_| ())
                                               .ok_or_else(|| PatchError::Unresolvable { path: from.clone() });
            }
            if segments.len() > from_segments.len() && segments.starts_with(&from_segments) {
                return Err(PatchError::MoveIntoChild { from: from.clone(),
                                                       path: path.clone() });
            }
            let value = remove(doc, from, &from_segments)?;
            add(doc, path, &segments, value)
        }
        PatchOperation::Copy { from, path } => {
            let from_segments = parse_pointer(from)?;
            let segments = parse_pointer(path)?;
            let value = get(doc, &from_segments).cloned()
                                                .ok_or_else(|| PatchError::Unresolvable { path: from.clone() })?;
            add(doc, path, &segments, value)
        }
        PatchOperation::Test { path, value } => {
            let segments = parse_pointer(path)?;
            match get(doc, &segments) {
                Some(actual) if actual == value => Ok(()),
                _ => Err(PatchError::TestFailed { path: path.clone() }),
            }
        }
    }
}

/// Huecos máximos que `ensure_parents` rellena en un array.
const MAX_ARRAY_GAP: usize = 16;

/// Crea los contenedores intermedios ausentes de `segments[..n-1]`.
///
/// El tipo de cada contenedor nuevo depende del segmento siguiente: índice
/// decimal o `-` → array (rellenado con objetos vacíos hasta el índice), en
/// otro caso objeto. Los valores existentes no se tocan; si un intermedio es
/// escalar la operación fallará después al resolver el padre.
///
/// Un índice que deja más de `MAX_ARRAY_GAP` huecos se rechaza antes de
/// reservar nada.
fn ensure_parents(doc: &mut Value, path: &str, segments: &[String]) -> Result<(), PatchError> {
    if segments.len() < 2 {
        return Ok(());
    }
    let mut cursor = doc;
    for (i, segment) in segments[..segments.len() - 1].iter().enumerate() {
        let next = &segments[i + 1];
        let wants_array = next == "-" || parse_index(next).is_some();
        cursor = match cursor {
            Value::Object(map) => map.entry(segment.clone()).or_insert_with(|| container(wants_array)),
            Value::Array(items) => {
                let idx = if segment == "-" {
                    items.len()
                } else {
                    match parse_index(segment) {
                        Some(idx) => idx,
                        None => return Ok(()),
                    }
                };
                if idx > items.len() + MAX_ARRAY_GAP {
                    return Err(PatchError::IndexOutOfBounds { path: path.to_string(),
                                                              index: segment.clone() });
                }
                while items.len() < idx {
                    items.push(Value::Object(Map::new()));
                }
                if items.len() == idx {
                    items.push(container(wants_array));
                }
                &mut items[idx]
            }
            _ => return Ok(()),
        };
    }
    Ok(())
}

fn container(array: bool) -> Value {
    if array {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn get<'a>(doc: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut cursor = doc;
    for segment in segments {
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn get_mut<'a>(doc: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut cursor = doc;
    for segment in segments {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn split_last<'a>(path: &str, segments: &'a [String]) -> Result<(&'a [String], &'a String), PatchError> {
    match segments.split_last() {
        Some((last, parent)) => Ok((parent, last)),
        None => Err(PatchError::Unresolvable { path: path.to_string() }),
    }
}

fn add(doc: &mut Value, path: &str, segments: &[String], value: Value) -> Result<(), PatchError> {
    if segments.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = split_last(path, segments)?;
    match get_mut(doc, parent) {
        Some(Value::Object(map)) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Some(Value::Array(items)) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            match parse_index(last) {
                Some(idx) if idx <= items.len() => {
                    items.insert(idx, value);
                    Ok(())
                }
                _ => Err(PatchError::IndexOutOfBounds { path: path.to_string(),
                                                        index: last.clone() }),
            }
        }
        _ => Err(PatchError::Unresolvable { path: path.to_string() }),
    }
}

fn replace(doc: &mut Value, path: &str, segments: &[String], value: Value) -> Result<(), PatchError> {
    if segments.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = split_last(path, segments)?;
    match get_mut(doc, parent) {
        Some(Value::Object(map)) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Some(Value::Array(items)) => match parse_index(last) {
            Some(idx) if idx < items.len() => {
                items[idx] = value;
                Ok(())
            }
            _ => Err(PatchError::IndexOutOfBounds { path: path.to_string(),
                                                    index: last.clone() }),
        },
        _ => Err(PatchError::Unresolvable { path: path.to_string() }),
    }
}

fn remove(doc: &mut Value, path: &str, segments: &[String]) -> Result<Value, PatchError> {
    if segments.is_empty() {
        return Err(PatchError::RemoveRoot);
    }
    let (parent, last) = split_last(path, segments)?;
    match get_mut(doc, parent) {
        Some(Value::Object(map)) => map.shift_remove(last.as_str())
                                       .ok_or_else(|| PatchError::Unresolvable { path: path.to_string() }),
        Some(Value::Array(items)) => match parse_index(last) {
            Some(idx) if idx < items.len() => Ok(items.remove(idx)),
            _ => Err(PatchError::IndexOutOfBounds { path: path.to_string(),
                                                    index: last.clone() }),
        },
        _ => Err(PatchError::Unresolvable { path: path.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops(v: Value) -> Vec<PatchOperation> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn add_creates_missing_objects() {
        let mut doc = json!({});
        apply_to_value(&mut doc, &ops(json!([{"op": "add", "path": "/a/b/c", "value": 1}]))).unwrap();
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn add_creates_padded_arrays_for_numeric_segments() {
        let mut doc = json!({});
        apply_to_value(&mut doc, &ops(json!([{"op": "add", "path": "/list/2/x", "value": true}]))).unwrap();
        assert_eq!(doc, json!({"list": [{}, {}, {"x": true}]}));
    }

    #[test]
    fn huge_intermediate_index_is_rejected_without_padding() {
        let mut doc = json!({"tables": {"t": {"columns": {"c": {"check": []}}}}});
        let err = apply_to_value(&mut doc,
                                 &ops(json!([{"op": "add",
                                              "path": "/tables/t/columns/c/check/20000000/x",
                                              "value": 1}]))).unwrap_err();
        assert!(matches!(err, PatchError::IndexOutOfBounds { ref index, .. } if index == "20000000"));
        assert_eq!(doc["tables"]["t"]["columns"]["c"]["check"], json!([]));

        let err = apply_to_value(&mut json!({}), &ops(json!([{"op": "add", "path": "/list/17/x", "value": 1}])));
        assert!(matches!(err, Err(PatchError::IndexOutOfBounds { .. })));
        apply_to_value(&mut json!({}), &ops(json!([{"op": "add", "path": "/list/16/x", "value": 1}]))).unwrap();
    }

    #[test]
    fn dash_appends() {
        let mut doc = json!({"v": [1]});
        apply_to_value(&mut doc, &ops(json!([{"op": "add", "path": "/v/-", "value": 2}]))).unwrap();
        assert_eq!(doc, json!({"v": [1, 2]}));
    }

    #[test]
    fn remove_never_creates_structure() {
        let mut doc = json!({});
        let err = apply_to_value(&mut doc, &ops(json!([{"op": "remove", "path": "/a/b"}]))).unwrap_err();
        assert!(matches!(err, PatchError::Unresolvable { .. }));
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn replace_sets_missing_member() {
        let mut doc = json!({"a": {}});
        apply_to_value(&mut doc, &ops(json!([{"op": "replace", "path": "/a/k", "value": "v"}]))).unwrap();
        assert_eq!(doc, json!({"a": {"k": "v"}}));
    }

    #[test]
    fn move_and_copy() {
        let mut doc = json!({"a": {"x": 1}, "b": {}});
        apply_to_value(&mut doc,
                       &ops(json!([
                           {"op": "copy", "from": "/a/x", "path": "/b/y"},
                           {"op": "move", "from": "/a/x", "path": "/b/z"}
                       ]))).unwrap();
        assert_eq!(doc, json!({"a": {}, "b": {"y": 1, "z": 1}}));
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let mut doc = json!({"a": {"b": {}}});
        let err = apply_to_value(&mut doc, &ops(json!([{"op": "move", "from": "/a", "path": "/a/b/c"}]))).unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoChild { .. }));
    }

    #[test]
    fn test_op_compares_deeply() {
        let mut doc = json!({"a": [1, {"b": 2}]});
        apply_to_value(&mut doc, &ops(json!([{"op": "test", "path": "/a", "value": [1, {"b": 2}]}]))).unwrap();
        let err = apply_to_value(&mut doc, &ops(json!([{"op": "test", "path": "/a/1/b", "value": 3}]))).unwrap_err();
        assert_eq!(err, PatchError::TestFailed { path: "/a/1/b".into() });
    }

    #[test]
    fn forbidden_segment_in_from_is_rejected() {
        let mut doc = json!({"a": 1});
        let err = apply_to_value(&mut doc, &ops(json!([{"op": "copy", "from": "/__proto__", "path": "/b"}]))).unwrap_err();
        assert!(matches!(err, PatchError::ForbiddenSegment { .. }));
    }

    #[test]
    fn remove_keeps_member_order() {
        let mut doc = json!({"a": 1, "b": 2, "c": 3});
        apply_to_value(&mut doc, &ops(json!([{"op": "remove", "path": "/a"}]))).unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }
}
