use serde::{Deserialize, Serialize};

/// Constraint de tabla, discriminado por el campo `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Constraint {
    #[serde(rename = "PRIMARY KEY", rename_all = "camelCase")]
    PrimaryKey { name: String, column_names: Vec<String> },
    #[serde(rename = "FOREIGN KEY", rename_all = "camelCase")]
    ForeignKey {
        name: String,
        column_names: Vec<String>,
        target_table_name: String,
        target_column_names: Vec<String>,
        #[serde(default)]
        update_constraint: ForeignKeyAction,
        #[serde(default)]
        delete_constraint: ForeignKeyAction,
    },
    #[serde(rename = "UNIQUE", rename_all = "camelCase")]
    Unique { name: String, column_names: Vec<String> },
    /// `detail` es la expresión booleana tal cual (`price >= 0`).
    #[serde(rename = "CHECK")]
    Check { name: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    #[default]
    NoAction,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::PrimaryKey { name, .. }
            | Constraint::ForeignKey { name, .. }
            | Constraint::Unique { name, .. }
            | Constraint::Check { name, .. } => name,
        }
    }

    /// Etiqueta SQL del tipo de constraint.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey { .. } => "PRIMARY KEY",
            Constraint::ForeignKey { .. } => "FOREIGN KEY",
            Constraint::Unique { .. } => "UNIQUE",
            Constraint::Check { .. } => "CHECK",
        }
    }

    /// Columnas locales referenciadas (vacío para CHECK).
    pub fn column_names(&self) -> &[String] {
        match self {
            Constraint::PrimaryKey { column_names, .. }
            | Constraint::ForeignKey { column_names, .. }
            | Constraint::Unique { column_names, .. } => column_names,
            Constraint::Check { .. } => &[],
        }
    }

    pub fn primary_key(name: impl Into<String>, columns: &[&str]) -> Self {
        Constraint::PrimaryKey { name: name.into(),
                                 column_names: columns.iter().map(|c| c.to_string()).collect() }
    }

    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Constraint::Unique { name: name.into(),
                             column_names: columns.iter().map(|c| c.to_string()).collect() }
    }

    pub fn foreign_key(name: impl Into<String>,
                       columns: &[&str],
                       target_table: impl Into<String>,
                       target_columns: &[&str],
                       on_delete: ForeignKeyAction)
                       -> Self {
        Constraint::ForeignKey { name: name.into(),
                                 column_names: columns.iter().map(|c| c.to_string()).collect(),
                                 target_table_name: target_table.into(),
                                 target_column_names: target_columns.iter().map(|c| c.to_string()).collect(),
                                 update_constraint: ForeignKeyAction::NoAction,
                                 delete_constraint: on_delete }
    }
}
