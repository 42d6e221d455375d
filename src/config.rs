//! Configuración central de la aplicación.
//! Carga `.env` una sola vez y traduce las variables `SCHEMAFLOW_*` a los
//! límites del flujo (`WorkflowConfig`). Las ausentes toman el valor por
//! defecto; un valor presente pero inválido es un error.
use std::env;
use std::str::FromStr;

use once_cell::sync::Lazy;

use schema_core::{RetryPolicy, WorkflowConfig};

use crate::errors::AppError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub workflow: WorkflowConfig,
    /// `DATABASE_URL`; sin ella se usa el backend en memoria.
    pub database_url: Option<String>,
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, AppError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim()
                        .parse()
                        .map_err(|_| AppError::Config(format!("{name}: invalid value '{raw}'"))),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = WorkflowConfig::default();
        let node_retry = RetryPolicy { max_attempts: parse(&lookup,
                                                           "SCHEMAFLOW_NODE_MAX_ATTEMPTS",
                                                           defaults.node_retry.max_attempts)?,
                                       ..defaults.node_retry.clone() };
        if node_retry.max_attempts == 0 {
            return Err(AppError::Config("SCHEMAFLOW_NODE_MAX_ATTEMPTS must be at least 1".into()));
        }
        let required_extensions = lookup("SCHEMAFLOW_REQUIRED_EXTENSIONS").map(|raw| {
                                                                              raw.split(',')
                                                                                 .map(str::trim)
                                                                                 .filter(|s| !s.is_empty())
                                                                                 .map(String::from)
                                                                                 .collect()
                                                                          })
                                                                          .unwrap_or_default();
        let workflow = WorkflowConfig { max_ddl_execution_retries: parse(&lookup,
                                                                         "SCHEMAFLOW_MAX_DDL_RETRIES",
                                                                         defaults.max_ddl_execution_retries)?,
                                        max_version_conflict_retries: parse(&lookup,
                                                                            "SCHEMAFLOW_MAX_CONFLICT_RETRIES",
                                                                            defaults.max_version_conflict_retries)?,
                                        max_patch_repairs: parse(&lookup,
                                                                 "SCHEMAFLOW_MAX_PATCH_REPAIRS",
                                                                 defaults.max_patch_repairs)?,
                                        recursion_limit: parse(&lookup,
                                                               "SCHEMAFLOW_RECURSION_LIMIT",
                                                               defaults.recursion_limit)?,
                                        node_retry,
                                        test_concurrency: parse(&lookup,
                                                                "SCHEMAFLOW_TEST_CONCURRENCY",
                                                                defaults.test_concurrency)?,
                                        required_extensions };
        Ok(Self { workflow,
                  database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_variables_use_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.workflow, WorkflowConfig::default());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn variables_override_bounds() {
        let cfg = AppConfig::from_lookup(lookup(&[("SCHEMAFLOW_MAX_DDL_RETRIES", "3"),
                                                  ("SCHEMAFLOW_RECURSION_LIMIT", " 80 "),
                                                  ("SCHEMAFLOW_REQUIRED_EXTENSIONS", "pgcrypto, ,pgtap"),
                                                  ("DATABASE_URL", "postgres://localhost/sf")])).unwrap();
        assert_eq!(cfg.workflow.max_ddl_execution_retries, 3);
        assert_eq!(cfg.workflow.recursion_limit, 80);
        assert_eq!(cfg.workflow.required_extensions, vec!["pgcrypto", "pgtap"]);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/sf"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("SCHEMAFLOW_TEST_CONCURRENCY", "many")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("SCHEMAFLOW_TEST_CONCURRENCY")));
        assert!(AppConfig::from_lookup(lookup(&[("SCHEMAFLOW_NODE_MAX_ATTEMPTS", "0")])).is_err());
    }
}
