//! Scripts pgTAP por caso de prueba y lectura de su salida TAP.
//!
//! Un script es el DDL vigente seguido de `plan(n)`, un `lives_ok` por cada
//! operación DML del caso y `finish()`. Las funciones pgTAP devuelven filas de
//! texto (`ok 1 - ...`, `not ok 2 - ...`, `# ...`) que se recogen de todas las
//! columnas de todas las filas.

use serde_json::Value;

use schema_core::sql::SqlResult;
use schema_domain::Testcase;

pub const PGTAP_EXTENSION: &str = "pgtap";

const TAG: &str = "sftest";

/// Resumen de la salida TAP de un script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TapReport {
    pub planned: Option<usize>,
    pub passed: usize,
    pub failed: Vec<String>,
    pub diagnostics: Vec<String>,
    /// Sentencias del script que fallaron fuera de pgTAP (p. ej. el DDL).
    pub errors: Vec<String>,
}

impl TapReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
        && self.errors.is_empty()
        && self.passed > 0
        && self.planned.map_or(true, |n| n == self.passed)
    }

    /// Mensaje para el `TestResult` del caso.
    pub fn message(&self) -> String {
        if self.success() {
            return format!("{} of {} assertions passed", self.passed, self.planned.unwrap_or(self.passed));
        }
        let mut lines: Vec<String> = Vec::new();
        lines.extend(self.errors.iter().cloned());
        lines.extend(self.failed.iter().cloned());
        lines.extend(self.diagnostics.iter().cloned());
        if lines.is_empty() {
            lines.push(format!("planned {} assertions, {} passed",
                               self.planned.map_or_else(|| "?".to_string(), |n| n.to_string()),
                               self.passed));
        }
        lines.join("\n")
    }
}

/// Delimitador dollar-quote que no aparece en `sql`.
fn dollar_tag(sql: &str) -> String {
    let mut n = 0usize;
    loop {
        let tag = if n == 0 { format!("${TAG}$") } else { format!("${TAG}{n}$") };
        if !sql.contains(&tag) {
            return tag;
        }
        n += 1;
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn build_script(ddl: &str, testcase: &Testcase) -> String {
    let mut out = String::new();
    if !ddl.trim().is_empty() {
        out.push_str(ddl.trim_end());
        out.push_str("\n\n");
    }
    out.push_str(&format!("SELECT plan({});\n", testcase.dml_operations.len()));
    for op in &testcase.dml_operations {
        let sql = op.sql.trim().trim_end_matches(';');
        let tag = dollar_tag(sql);
        let description = op.description.as_deref().unwrap_or(&testcase.title);
        out.push_str(&format!("SELECT lives_ok({tag}{sql}{tag}, {});\n", quote_text(description)));
    }
    out.push_str("SELECT * FROM finish();\n");
    out
}

fn text_cells(row: &Value) -> Vec<&str> {
    match row {
        Value::String(s) => vec![s.as_str()],
        Value::Object(map) => map.values().filter_map(Value::as_str).collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

pub fn parse_tap(results: &[SqlResult]) -> TapReport {
    let mut report = TapReport::default();
    for result in results {
        if let Some(message) = result.error_message() {
            report.errors.push(format!("SQL: {}\nError: {}", result.sql, message));
            continue;
        }
        for row in result.rows() {
            for cell in text_cells(row) {
                for line in cell.lines().map(str::trim) {
                    if let Some(count) = line.strip_prefix("1..") {
                        report.planned = count.trim().parse().ok();
                    } else if line.starts_with("not ok") {
                        report.failed.push(line.to_string());
                    } else if line.starts_with("ok") {
                        report.passed += 1;
                    } else if line.starts_with('#') {
                        report.diagnostics.push(line.to_string());
                    }
                }
            }
        }
    }
    report
}
