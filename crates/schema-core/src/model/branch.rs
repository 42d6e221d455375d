use serde::{Deserialize, Serialize};

use schema_domain::{RequirementItem, Schema, Testcase};

use crate::llm::Message;

/// Estado aislado de una rama del fan-out: sólo su requerimiento, el esquema
/// y el DDL vigentes, y un historial propio que arranca vacío.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchState {
    pub index: usize,
    pub requirement: RequirementItem,
    pub schema: Schema,
    pub ddl: String,
    pub messages: Vec<Message>,
}

impl BranchState {
    pub fn new(index: usize, requirement: RequirementItem, schema: Schema, ddl: String) -> Self {
        Self { index,
               requirement,
               schema,
               ddl,
               messages: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutput {
    pub index: usize,
    pub requirement: RequirementItem,
    pub testcases: Vec<Testcase>,
}

/// Rama que falló definitivamente (tras reintentos).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub index: usize,
    pub requirement: RequirementItem,
    pub message: String,
}
