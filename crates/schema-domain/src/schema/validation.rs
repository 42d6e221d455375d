use serde_json::Value;

use super::Schema;
use crate::error::SchemaError;

/// Completa `name` ausente con la clave del mapa contenedor.
///
/// Los patches que crean estructura intermedia (`/tables/users/columns/id`)
/// dejan objetos sin `name`; la clave es la única fuente posible.
pub(super) fn fill_missing_names(doc: &mut Value) {
    let Some(root) = doc.as_object_mut() else { return };
    for section in ["enums", "extensions"] {
        if let Some(Value::Object(entries)) = root.get_mut(section) {
            for (key, entry) in entries.iter_mut() {
                fill_name(key, entry);
            }
        }
    }
    let Some(Value::Object(tables)) = root.get_mut("tables") else { return };
    for (table_key, table) in tables.iter_mut() {
        fill_name(table_key, table);
        let Some(table) = table.as_object_mut() else { continue };
        for section in ["columns", "constraints", "indexes"] {
            if let Some(Value::Object(entries)) = table.get_mut(section) {
                for (key, entry) in entries.iter_mut() {
                    fill_name(key, entry);
                }
            }
        }
    }
}

fn fill_name(key: &str, entry: &mut Value) {
    if let Value::Object(map) = entry {
        map.entry("name").or_insert_with(|| Value::String(key.to_string()));
    }
}

pub(super) fn validate(schema: &Schema) -> Result<(), SchemaError> {
    for (key, table) in &schema.tables {
        check_key("table", key, &table.name)?;
        for (ckey, column) in &table.columns {
            check_key("column", ckey, &column.name)?;
            if column.data_type.trim().is_empty() {
                return Err(SchemaError::EmptyColumnType { table: table.name.clone(),
                                                          column: column.name.clone() });
            }
        }
        for (ckey, constraint) in &table.constraints {
            check_key("constraint", ckey, constraint.name())?;
        }
        for (ikey, index) in &table.indexes {
            check_key("index", ikey, &index.name)?;
        }
    }
    for (key, e) in &schema.enums {
        check_key("enum", key, &e.name)?;
    }
    for (key, e) in &schema.extensions {
        check_key("extension", key, &e.name)?;
    }
    Ok(())
}

fn check_key(kind: &'static str, key: &str, name: &str) -> Result<(), SchemaError> {
    if key == name {
        Ok(())
    } else {
        Err(SchemaError::KeyMismatch { kind,
                                       key: key.to_string(),
                                       name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_mismatch_is_reported() {
        let err = Schema::from_value(json!({
            "tables": { "users": { "name": "people", "columns": {} } }
        })).unwrap_err();
        assert_eq!(err,
                   SchemaError::KeyMismatch { kind: "table",
                                              key: "users".into(),
                                              name: "people".into() });
    }

    #[test]
    fn empty_column_type_is_rejected() {
        let err = Schema::from_value(json!({
            "tables": { "t": { "columns": { "c": { "type": " " } } } }
        })).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyColumnType { .. }));
    }
}
