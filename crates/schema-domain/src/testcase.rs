//! Casos de prueba generados por requerimiento.
//!
//! Un `Testcase` sólo crece: se le añaden operaciones DML o resultados de
//! ejecución, siempre devolviendo un valor nuevo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::requirements::{RequirementItem, RequirementKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DmlKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl DmlKind {
    /// Deduce el tipo a partir de la primera palabra de la sentencia.
    pub fn infer(sql: &str) -> Option<Self> {
        let first = sql.split_whitespace().next()?.to_ascii_uppercase();
        match first.as_str() {
            "INSERT" => Some(DmlKind::Insert),
            "UPDATE" => Some(DmlKind::Update),
            "DELETE" => Some(DmlKind::Delete),
            "SELECT" | "WITH" => Some(DmlKind::Select),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmlOperation {
    pub operation_type: DmlKind,
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

/// Vínculo del caso con el requerimiento que lo originó.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRef {
    #[serde(rename = "type")]
    pub kind: RequirementKind,
    pub category: String,
    pub requirement: String,
}

impl From<&RequirementItem> for RequirementRef {
    fn from(item: &RequirementItem) -> Self {
        Self { kind: item.kind,
               category: item.category.clone(),
               requirement: item.requirement.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testcase {
    pub id: Uuid,
    pub requirement: RequirementRef,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub dml_operations: Vec<DmlOperation>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl Testcase {
    pub fn new(requirement: RequirementRef, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               requirement,
               title: title.into(),
               description: description.into(),
               dml_operations: Vec::new(),
               test_results: Vec::new() }
    }

    pub fn with_dml(&self, operation: DmlOperation) -> Self {
        let mut next = self.clone();
        next.dml_operations.push(operation);
        next
    }

    pub fn with_result(&self, result: TestResult) -> Self {
        let mut next = self.clone();
        next.test_results.push(result);
        next
    }

    pub fn last_result(&self) -> Option<&TestResult> {
        self.test_results.last()
    }

    /// SQL de todas las operaciones DML, separado por líneas.
    pub fn sql(&self) -> String {
        self.dml_operations
            .iter()
            .map(|op| {
                let sql = op.sql.trim();
                if sql.ends_with(';') {
                    sql.to_string()
                } else {
                    format!("{sql};")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TestResult {
    pub fn now(success: bool, message: impl Into<String>) -> Self {
        Self { executed_at: Utc::now(),
               success,
               message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Testcase {
        let req = RequirementItem::functional("users", "users register with an email");
        Testcase::new((&req).into(), "register user", "inserts a user")
    }

    #[test]
    fn with_helpers_do_not_mutate_original() {
        let tc = sample();
        let next = tc.with_dml(DmlOperation { operation_type: DmlKind::Insert,
                                              sql: "INSERT INTO users (email) VALUES ('a@b.c')".into(),
                                              description: None })
                     .with_result(TestResult::now(true, "ok"));
        assert!(tc.dml_operations.is_empty());
        assert_eq!(next.dml_operations.len(), 1);
        assert_eq!(next.test_results.len(), 1);
        assert_eq!(next.id, tc.id);
    }

    #[test]
    fn serializes_camel_case() {
        let tc = sample();
        let v = serde_json::to_value(&tc).unwrap();
        assert!(v.get("dmlOperations").is_some());
        assert_eq!(v["requirement"]["type"], "functional");
    }

    #[test]
    fn infers_dml_kind() {
        assert_eq!(DmlKind::infer("  insert into x values (1)"), Some(DmlKind::Insert));
        assert_eq!(DmlKind::infer("WITH a AS (SELECT 1) SELECT * FROM a"), Some(DmlKind::Select));
        assert_eq!(DmlKind::infer("CREATE TABLE x ()"), None);
    }
}
