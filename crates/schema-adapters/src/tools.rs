//! Herramientas ofrecidas al modelo y lectura de sus argumentos.
//!
//! El modelo nunca devuelve texto libre para cambios estructurados: cada
//! salida útil llega como tool call y se deserializa aquí a tipos de dominio.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use schema_core::llm::{ToolCall, ToolSpec};
use schema_core::NodeError;
use schema_domain::{AnalyzedRequirements, DmlKind, DmlOperation, PatchOperation, RequirementRef, Testcase};

pub const SCHEMA_DESIGN_TOOL: &str = "schemaDesignTool";
pub const SAVE_REQUIREMENTS_TOOL: &str = "saveRequirementsTool";
pub const SAVE_TESTCASE_TOOL: &str = "saveTestcaseTool";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
    #[error("the model did not call {0}")]
    NotCalled(&'static str),
}

impl From<ToolError> for NodeError {
    fn from(e: ToolError) -> Self {
        NodeError::Validation(e.to_string())
    }
}

pub fn schema_design_tool() -> ToolSpec {
    ToolSpec { name: SCHEMA_DESIGN_TOOL.to_string(),
               description: "Apply JSON Patch operations (RFC 6902) to the schema document.".to_string(),
               parameters: json!({
                   "type": "object",
                   "properties": {
                       "operations": {
                           "type": "array",
                           "items": {
                               "type": "object",
                               "properties": {
                                   "op": {"type": "string", "enum": ["add", "remove", "replace", "move", "copy", "test"]},
                                   "path": {"type": "string"},
                                   "from": {"type": "string"},
                                   "value": {}
                               },
                               "required": ["op", "path"]
                           }
                       }
                   },
                   "required": ["operations"]
               }) }
}

pub fn save_requirements_tool() -> ToolSpec {
    ToolSpec { name: SAVE_REQUIREMENTS_TOOL.to_string(),
               description: "Save the business goal and the analyzed requirements.".to_string(),
               parameters: json!({
                   "type": "object",
                   "properties": {
                       "goal": {"type": "string"},
                       "requirements": {
                           "type": "array",
                           "items": {
                               "type": "object",
                               "properties": {
                                   "type": {"type": "string", "enum": ["functional", "non_functional"]},
                                   "category": {"type": "string"},
                                   "requirement": {"type": "string"}
                               },
                               "required": ["type", "category", "requirement"]
                           }
                       }
                   },
                   "required": ["goal", "requirements"]
               }) }
}

pub fn save_testcase_tool() -> ToolSpec {
    ToolSpec { name: SAVE_TESTCASE_TOOL.to_string(),
               description: "Save one test case with the DML that exercises the requirement.".to_string(),
               parameters: json!({
                   "type": "object",
                   "properties": {
                       "title": {"type": "string"},
                       "description": {"type": "string"},
                       "dmlOperation": {
                           "type": "object",
                           "properties": {
                               "operationType": {"type": "string", "enum": ["INSERT", "UPDATE", "DELETE", "SELECT"]},
                               "sql": {"type": "string"},
                               "description": {"type": "string"}
                           },
                           "required": ["sql"]
                       }
                   },
                   "required": ["title", "description", "dmlOperation"]
               }) }
}

#[derive(Deserialize)]
struct SchemaDesignArgs {
    operations: Vec<PatchOperation>,
}

pub fn parse_schema_design(call: &ToolCall) -> Result<Vec<PatchOperation>, ToolError> {
    let args: SchemaDesignArgs = serde_json::from_value(call.arguments.clone()).map_err(|e| invalid(SCHEMA_DESIGN_TOOL, e))?;
    Ok(args.operations)
}

pub fn parse_requirements(call: &ToolCall) -> Result<AnalyzedRequirements, ToolError> {
    let analysis: AnalyzedRequirements =
        serde_json::from_value(call.arguments.clone()).map_err(|e| invalid(SAVE_REQUIREMENTS_TOOL, e))?;
    if analysis.goal.trim().is_empty() {
        return Err(ToolError::InvalidArguments { tool: SAVE_REQUIREMENTS_TOOL,
                                                 reason: "goal is empty".into() });
    }
    Ok(analysis)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DmlArgs {
    operation_type: Option<DmlKind>,
    sql: String,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestcaseArgs {
    title: String,
    description: String,
    dml_operation: DmlArgs,
}

/// Convierte una llamada a `saveTestcaseTool` en un `Testcase` ligado a su
/// requerimiento. Si falta `operationType` se deduce del SQL.
pub fn parse_testcase(call: &ToolCall, requirement: RequirementRef) -> Result<Testcase, ToolError> {
    let args: TestcaseArgs = serde_json::from_value(call.arguments.clone()).map_err(|e| invalid(SAVE_TESTCASE_TOOL, e))?;
    let sql = args.dml_operation.sql.trim().to_string();
    if sql.is_empty() {
        return Err(ToolError::InvalidArguments { tool: SAVE_TESTCASE_TOOL,
                                                 reason: "dmlOperation.sql is empty".into() });
    }
    let operation_type = match args.dml_operation.operation_type.or_else(|| DmlKind::infer(&sql)) {
        Some(kind) => kind,
        None => {
            return Err(ToolError::InvalidArguments { tool: SAVE_TESTCASE_TOOL,
                                                     reason: format!("cannot infer operation type of '{sql}'") })
        }
    };
    let op = DmlOperation { operation_type,
                            sql,
                            description: args.dml_operation.description };
    Ok(Testcase::new(requirement, args.title, args.description).with_dml(op))
}

fn invalid(tool: &'static str, e: serde_json::Error) -> ToolError {
    ToolError::InvalidArguments { tool,
                                  reason: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_domain::RequirementItem;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall { id: "call_0".into(),
                   name: name.into(),
                   arguments }
    }

    #[test]
    fn parses_design_operations() {
        let ops = parse_schema_design(&call(SCHEMA_DESIGN_TOOL,
                                            json!({"operations": [{"op": "remove", "path": "/tables/a"}]}))).unwrap();
        assert_eq!(ops, vec![PatchOperation::remove("/tables/a")]);

        let err = parse_schema_design(&call(SCHEMA_DESIGN_TOOL, json!({"ops": []}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool: SCHEMA_DESIGN_TOOL, .. }));
    }

    #[test]
    fn testcase_infers_missing_operation_type() {
        let req = RequirementItem::functional("users", "register");
        let tc = parse_testcase(&call(SAVE_TESTCASE_TOOL,
                                      json!({"title": "t", "description": "d",
                                             "dmlOperation": {"sql": "insert into users default values"}})),
                                (&req).into()).unwrap();
        assert_eq!(tc.dml_operations[0].operation_type, DmlKind::Insert);
        assert_eq!(tc.requirement.category, "users");

        let err = parse_testcase(&call(SAVE_TESTCASE_TOOL,
                                       json!({"title": "t", "description": "d",
                                              "dmlOperation": {"sql": "vacuum"}})),
                                 (&req).into()).unwrap_err();
        assert!(err.to_string().contains("cannot infer"));
    }

    #[test]
    fn empty_goal_is_rejected() {
        let err = parse_requirements(&call(SAVE_REQUIREMENTS_TOOL, json!({"goal": " ", "requirements": []}))).unwrap_err();
        assert_eq!(NodeError::from(err.clone()), NodeError::Validation(err.to_string()));
    }
}
