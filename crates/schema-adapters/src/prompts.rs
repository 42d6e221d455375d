//! Prompts de sistema y mensajes de corrección enviados al modelo.

use schema_domain::{AnalyzedRequirements, RequirementItem, Schema};

pub const ANALYZE_SYSTEM: &str = "You are a database requirements analyst. Read the user's request, state the \
                                  business goal in one sentence and list concrete functional and non-functional \
                                  requirements. Save them with saveRequirementsTool.";

pub const DESIGN_SYSTEM: &str = "You are a PostgreSQL schema designer. Change the schema document only through \
                                 schemaDesignTool, using JSON Patch operations whose paths address \
                                 /tables/<table>/columns/<column>, /tables/<table>/constraints/<name>, \
                                 /tables/<table>/indexes/<name>, /enums/<name> and /extensions/<name>. Column \
                                 defaults that are SQL expressions (e.g. gen_random_uuid(), now()) are written \
                                 verbatim; text defaults are plain strings.";

pub const TESTCASE_SYSTEM: &str = "You are a QA engineer for a PostgreSQL schema. For the given requirement write \
                                   test cases whose DML exercises it against the DDL below. Save each one with \
                                   saveTestcaseTool.";

/// Prompt de diseño con el documento actual y, si existen, los requerimientos.
pub fn design_system(schema: &Schema, requirements: Option<&AnalyzedRequirements>) -> String {
    let mut out = format!("{DESIGN_SYSTEM}\n\nCurrent schema document:\n{:#}", schema.to_value());
    if let Some(req) = requirements.filter(|r| !r.is_empty()) {
        out.push_str("\n\nRequirements:\n");
        out.push_str(&req.render());
    }
    out
}

pub fn testcase_system(ddl: &str) -> String {
    format!("{TESTCASE_SYSTEM}\n\nDDL:\n{ddl}")
}

pub fn testcase_request(requirement: &RequirementItem) -> String {
    format!("Requirement ({}, {}): {}",
            requirement.kind.as_str(),
            requirement.category,
            requirement.requirement)
}

pub fn ddl_failure(reason: &str) -> String {
    format!("The DDL generated from the schema failed to execute:\n\n{reason}\n\nFix the schema with schemaDesignTool.")
}

pub fn patch_rejected(reason: &str) -> String {
    format!("Patch rejected: {reason}. No change was applied; send corrected operations.")
}

pub const PATCH_APPLIED: &str = "Patch applied.";

pub fn version_conflict(latest_version_number: i64) -> String {
    format!("The schema was changed concurrently and is now at version {latest_version_number}. The document above \
             is the latest one; apply your changes to it again.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_prompt_embeds_document() {
        let text = design_system(&Schema::empty(), None);
        assert!(text.contains("\"tables\": {}"));
        assert!(!text.contains("Requirements:"));
    }
}
