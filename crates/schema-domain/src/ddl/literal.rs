use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::DefaultValue;

/// Llamada a función: `gen_random_uuid()`, `now()`, `pg_catalog.nextval('s')`.
static FUNCTION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*\(.*\)$").expect("valid function-call regex"));

const BARE_KEYWORDS: [&str; 8] = ["current_timestamp",
                                  "current_date",
                                  "current_time",
                                  "localtimestamp",
                                  "localtime",
                                  "current_user",
                                  "session_user",
                                  "null"];

/// Identificador entre comillas dobles, duplicando las comillas internas.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Literal de texto entre comillas simples, duplicando las internas.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn quote_ident_list(names: &[String]) -> String {
    names.iter().map(|n| quote_ident(n)).collect::<Vec<_>>().join(", ")
}

/// ¿Se emite el texto sin comillas?
pub fn is_sql_expression(text: &str) -> bool {
    let trimmed = text.trim();
    FUNCTION_CALL.is_match(trimmed) || BARE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(trimmed))
}

/// Render de un valor por defecto para la cláusula `DEFAULT`.
pub fn render_default(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Bool(true) => "TRUE".to_string(),
        DefaultValue::Bool(false) => "FALSE".to_string(),
        DefaultValue::Number(n) => n.to_string(),
        DefaultValue::Text(text) if is_sql_expression(text) => text.trim().to_string(),
        DefaultValue::Text(text) => quote_literal(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_calls_are_not_quoted() {
        assert_eq!(render_default(&"gen_random_uuid()".into()), "gen_random_uuid()");
        assert_eq!(render_default(&"now()".into()), "now()");
        assert_eq!(render_default(&"nextval('seq'::regclass)".into()), "nextval('seq'::regclass)");
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(render_default(&"CURRENT_TIMESTAMP".into()), "CURRENT_TIMESTAMP");
        assert_eq!(render_default(&"null".into()), "null");
    }

    #[test]
    fn plain_text_is_quoted_and_escaped() {
        assert_eq!(render_default(&"active".into()), "'active'");
        assert_eq!(render_default(&"it's".into()), "'it''s'");
        assert_eq!(render_default(&"hello world()x".into()), "'hello world()x'");
    }

    #[test]
    fn scalars_render_bare() {
        assert_eq!(render_default(&true.into()), "TRUE");
        assert_eq!(render_default(&false.into()), "FALSE");
        assert_eq!(render_default(&42i64.into()), "42");
    }

    #[test]
    fn identifiers_double_embedded_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
