//! Modelo del documento de esquema (tablas, columnas, constraints, índices,
//! enums y extensiones).
//!
//! El documento es un agregado inmutable: toda modificación pasa por el motor
//! de patches (`crate::patch`) que produce un documento nuevo. Los mapas usan
//! `IndexMap` para conservar el orden de inserción; así la serialización y el
//! DDL generado son deterministas.

mod constraint;
mod validation;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

pub use constraint::{Constraint, ForeignKeyAction};

/// Documento raíz.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
    #[serde(default)]
    pub enums: IndexMap<String, EnumType>,
    /// Extensiones requeridas por el esquema (p.ej. `uuid-ossp`).
    #[serde(default)]
    pub extensions: IndexMap<String, Extension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
    #[serde(default)]
    pub constraints: IndexMap<String, Constraint>,
    #[serde(default)]
    pub indexes: IndexMap<String, Index>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Nombre de tipo libre (`uuid`, `varchar(255)`, `timestamptz`, ...).
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Valor por defecto de una columna tal como llega en el documento.
///
/// Los strings pueden ser literales (`'active'`) o expresiones SQL
/// (`gen_random_uuid()`); el deparser decide cómo renderizarlos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Index {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    /// Método de acceso (`btree`, `gin`, ...). Vacío = default del motor.
    #[serde(default, rename = "type")]
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumType {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Extension {
    pub name: String,
}

impl Schema {
    /// Documento vacío (`{"tables": {}, "enums": {}, "extensions": {}}`).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Nombres de extensiones declaradas, en orden.
    pub fn extension_names(&self) -> Vec<String> {
        self.extensions.values().map(|e| e.name.clone()).collect()
    }

    /// Representación JSON del documento (forma sobre la que operan los
    /// patches).
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("schema documents always serialize")
    }

    /// Construye un documento desde JSON aplicando normalización de nombres,
    /// deserialización estricta y validación estructural.
    pub fn from_value(mut value: Value) -> Result<Self, SchemaError> {
        validation::fill_missing_names(&mut value);
        let schema: Schema = serde_json::from_value(value)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Valida las invariantes estructurales del documento.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validation::validate(self)
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               columns: IndexMap::new(),
               constraints: IndexMap::new(),
               indexes: IndexMap::new(),
               comment: None }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint.name().to_string(), constraint);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self { name: name.into(),
               data_type: data_type.into(),
               not_null: false,
               default: None,
               check: None,
               comment: None }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }
}

impl From<&str> for DefaultValue {
    fn from(s: &str) -> Self {
        DefaultValue::Text(s.to_string())
    }
}

impl From<bool> for DefaultValue {
    fn from(b: bool) -> Self {
        DefaultValue::Bool(b)
    }
}

impl From<i64> for DefaultValue {
    fn from(n: i64) -> Self {
        DefaultValue::Number(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_serializes_all_sections() {
        let v = Schema::empty().to_value();
        assert_eq!(v, json!({"tables": {}, "enums": {}, "extensions": {}}));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Schema::from_value(json!({"tables": {}, "views": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::Shape(_)));
    }

    #[test]
    fn missing_names_are_taken_from_keys() {
        let schema = Schema::from_value(json!({
            "tables": { "users": { "columns": { "id": { "type": "uuid", "notNull": true } } } }
        })).expect("valid document");
        let users = schema.table("users").expect("users");
        assert_eq!(users.name, "users");
        assert_eq!(users.columns["id"].name, "id");
        assert!(users.columns["id"].not_null);
    }

    #[test]
    fn default_value_keeps_json_shape() {
        let col: Column = serde_json::from_value(json!({"name": "n", "type": "int", "default": 3})).unwrap();
        assert_eq!(col.default, Some(DefaultValue::Number(3.into())));
        let col: Column = serde_json::from_value(json!({"name": "b", "type": "bool", "default": false})).unwrap();
        assert_eq!(col.default, Some(DefaultValue::Bool(false)));
    }
}
