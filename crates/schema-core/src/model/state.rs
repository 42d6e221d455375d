//! Estado inmutable que viaja entre nodos.
//!
//! Cada nodo recibe `&WorkflowState` y devuelve un valor nuevo dentro de su
//! `Transition`; nada se comparte mutable entre nodos ni entre ramas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schema_domain::{AnalyzedRequirements, PatchOperation, Schema, Testcase};

use super::{BranchFailure, BranchOutput};
use crate::errors::WorkflowFailure;
use crate::llm::Message;
use crate::repo::SchemaSnapshot;
use crate::sql::SqlResult;

/// Documento propuesto por el diseño y aún no validado contra la base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCandidate {
    pub schema: Schema,
    /// Operaciones acumuladas desde el esquema comprometido.
    pub operations: Vec<PatchOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmlFailure {
    pub testcase_id: Uuid,
    pub sql: String,
    pub error: String,
}

/// Resultado de ejecutar DDL + DML de todos los casos.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ddl_ok: bool,
    pub executed_statements: usize,
    pub dml_failures: Vec<DmlFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub schema_id: Uuid,
    pub user_input: String,
    /// Último esquema comprometido en el repositorio.
    pub schema: Schema,
    pub latest_version_number: i64,
    pub candidate: Option<SchemaCandidate>,
    pub messages: Vec<Message>,
    pub retry_counts: BTreeMap<String, u32>,
    pub ddl: String,
    pub ddl_results: Vec<SqlResult>,
    pub ddl_execution_failed: bool,
    pub ddl_execution_failure_reason: Option<String>,
    pub analyzed_requirements: Option<AnalyzedRequirements>,
    pub testcases: Vec<Testcase>,
    pub branch_outputs: Vec<BranchOutput>,
    pub branch_failures: Vec<BranchFailure>,
    pub schema_validation: Option<ValidationReport>,
    pub failure: Option<WorkflowFailure>,
    pub summary: Option<String>,
}

impl WorkflowState {
    /// Estado inicial de una corrida a partir del esquema vigente de la sesión.
    pub fn new(snapshot: SchemaSnapshot, user_input: impl Into<String>) -> Self {
        let user_input = user_input.into();
        Self { run_id: Uuid::new_v4(),
               session_id: snapshot.session_id,
               schema_id: snapshot.schema_id,
               messages: vec![Message::user(user_input.clone())],
               user_input,
               schema: snapshot.schema,
               latest_version_number: snapshot.latest_version_number,
               candidate: None,
               retry_counts: BTreeMap::new(),
               ddl: String::new(),
               ddl_results: Vec::new(),
               ddl_execution_failed: false,
               ddl_execution_failure_reason: None,
               analyzed_requirements: None,
               testcases: Vec::new(),
               branch_outputs: Vec::new(),
               branch_failures: Vec::new(),
               schema_validation: None,
               failure: None,
               summary: None }
    }

    pub fn retry_count(&self, key: &str) -> u32 {
        self.retry_counts.get(key).copied().unwrap_or(0)
    }

    pub fn with_retry_incremented(&self, key: &str) -> Self {
        let mut next = self.clone();
        *next.retry_counts.entry(key.to_string()).or_insert(0) += 1;
        next
    }

    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }

    pub fn with_failure(&self, failure: WorkflowFailure) -> Self {
        let mut next = self.clone();
        next.failure = Some(failure);
        next
    }

    /// Documento con el que trabajan los nodos posteriores al diseño: el
    /// candidato si lo hay, si no el comprometido.
    pub fn working_schema(&self) -> &Schema {
        self.candidate.as_ref().map(|c| &c.schema).unwrap_or(&self.schema)
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some() || self.ddl_execution_failed
    }
}
