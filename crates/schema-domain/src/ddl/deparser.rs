use super::literal::{quote_ident, quote_ident_list, quote_literal, render_default};
use super::{DdlOutput, DeparseError};
use crate::schema::{Column, Constraint, EnumType, Index, Schema, Table};

/// Genera el DDL del documento.
///
/// Orden: enums, `CREATE TABLE`, comentarios, índices, PK/UNIQUE/CHECK y por
/// último foreign keys (así toda tabla referenciada existe ya).
pub fn to_ddl(schema: &Schema) -> DdlOutput {
    let mut out = DdlOutput::default();
    if schema.tables.is_empty() {
        return out;
    }

    for e in schema.enums.values() {
        match create_enum(e) {
            Ok(stmts) => out.statements.extend(stmts),
            Err(err) => out.errors.push(err),
        }
    }
    for table in schema.tables.values() {
        match create_table(table) {
            Ok(stmt) => out.statements.push(stmt),
            Err(err) => out.errors.push(err),
        }
    }
    for table in schema.tables.values() {
        out.statements.extend(comments(table));
    }
    for table in schema.tables.values() {
        for index in table.indexes.values() {
            match create_index(table, index) {
                Ok(stmt) => out.statements.push(stmt),
                Err(err) => out.errors.push(err),
            }
        }
    }
    for table in schema.tables.values() {
        for constraint in table.constraints.values() {
            if matches!(constraint, Constraint::ForeignKey { .. }) {
                continue;
            }
            match add_constraint(schema, table, constraint) {
                Ok(stmt) => out.statements.push(stmt),
                Err(err) => out.errors.push(err),
            }
        }
    }
    for table in schema.tables.values() {
        for constraint in table.constraints.values() {
            if let Constraint::ForeignKey { .. } = constraint {
                match add_constraint(schema, table, constraint) {
                    Ok(stmt) => out.statements.push(stmt),
                    Err(err) => out.errors.push(err),
                }
            }
        }
    }
    out
}

fn create_enum(e: &EnumType) -> Result<Vec<String>, DeparseError> {
    if e.values.is_empty() {
        return Err(DeparseError::EmptyEnum { name: e.name.clone() });
    }
    let values = e.values.iter().map(|v| quote_literal(v)).collect::<Vec<_>>().join(", ");
    let mut stmts = vec![format!("CREATE TYPE {} AS ENUM ({});", quote_ident(&e.name), values)];
    if let Some(comment) = &e.comment {
        stmts.push(format!("COMMENT ON TYPE {} IS {};", quote_ident(&e.name), quote_literal(comment)));
    }
    Ok(stmts)
}

fn create_table(table: &Table) -> Result<String, DeparseError> {
    let mut lines = Vec::with_capacity(table.columns.len());
    for column in table.columns.values() {
        lines.push(format!("  {}", column_definition(table, column)?));
    }
    if lines.is_empty() {
        return Ok(format!("CREATE TABLE {} ();", quote_ident(&table.name)));
    }
    Ok(format!("CREATE TABLE {} (\n{}\n);", quote_ident(&table.name), lines.join(",\n")))
}

fn column_definition(table: &Table, column: &Column) -> Result<String, DeparseError> {
    let data_type = column.data_type.trim();
    if data_type.is_empty() {
        return Err(DeparseError::EmptyColumnType { table: table.name.clone(),
                                                   column: column.name.clone() });
    }
    let mut def = format!("{} {}", quote_ident(&column.name), data_type);
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&render_default(default));
    }
    if column.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(check) = &column.check {
        def.push_str(&format!(" CHECK ({check})"));
    }
    Ok(def)
}

fn comments(table: &Table) -> Vec<String> {
    let mut stmts = Vec::new();
    if let Some(comment) = &table.comment {
        stmts.push(format!("COMMENT ON TABLE {} IS {};", quote_ident(&table.name), quote_literal(comment)));
    }
    for column in table.columns.values() {
        if let Some(comment) = &column.comment {
            stmts.push(format!("COMMENT ON COLUMN {}.{} IS {};",
                               quote_ident(&table.name),
                               quote_ident(&column.name),
                               quote_literal(comment)));
        }
    }
    stmts
}

fn create_index(table: &Table, index: &Index) -> Result<String, DeparseError> {
    let object = format!("index '{}'", index.name);
    check_local_columns(table, &object, &index.columns)?;
    let unique = if index.unique { "UNIQUE " } else { "" };
    let method = if index.method.trim().is_empty() {
        String::new()
    } else {
        format!(" USING {}", index.method.trim())
    };
    Ok(format!("CREATE {unique}INDEX {} ON {}{method} ({});",
               quote_ident(&index.name),
               quote_ident(&table.name),
               quote_ident_list(&index.columns)))
}

fn add_constraint(schema: &Schema, table: &Table, constraint: &Constraint) -> Result<String, DeparseError> {
    let prefix = format!("ALTER TABLE {} ADD CONSTRAINT {}", quote_ident(&table.name), quote_ident(constraint.name()));
    let object = format!("constraint '{}'", constraint.name());
    match constraint {
        Constraint::PrimaryKey { column_names, .. } => {
            check_local_columns(table, &object, column_names)?;
            Ok(format!("{prefix} PRIMARY KEY ({});", quote_ident_list(column_names)))
        }
        Constraint::Unique { column_names, .. } => {
            check_local_columns(table, &object, column_names)?;
            Ok(format!("{prefix} UNIQUE ({});", quote_ident_list(column_names)))
        }
        Constraint::Check { detail, .. } => Ok(format!("{prefix} CHECK ({detail});")),
        Constraint::ForeignKey { name,
                                 column_names,
                                 target_table_name,
                                 target_column_names,
                                 update_constraint,
                                 delete_constraint, } => {
            check_local_columns(table, &object, column_names)?;
            let Some(target) = schema.table(target_table_name) else {
                return Err(DeparseError::MissingTargetTable { table: table.name.clone(),
                                                              constraint: name.clone(),
                                                              target: target_table_name.clone() });
            };
            if let Some(missing) = target_column_names.iter().find(|c| !target.has_column(c)) {
                return Err(DeparseError::MissingTargetColumn { table: table.name.clone(),
                                                               constraint: name.clone(),
                                                               target: target_table_name.clone(),
                                                               column: missing.clone() });
            }
            if column_names.len() != target_column_names.len() {
                return Err(DeparseError::ColumnCountMismatch { table: table.name.clone(),
                                                               constraint: name.clone(),
                                                               local: column_names.len(),
                                                               target: target_column_names.len() });
            }
            Ok(format!("{prefix} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {};",
                       quote_ident_list(column_names),
                       quote_ident(target_table_name),
                       quote_ident_list(target_column_names),
                       update_constraint.as_sql(),
                       delete_constraint.as_sql()))
        }
    }
}

fn check_local_columns(table: &Table, object: &str, columns: &[String]) -> Result<(), DeparseError> {
    if columns.is_empty() {
        return Err(DeparseError::EmptyColumnList { table: table.name.clone(),
                                                   object: object.to_string() });
    }
    match columns.iter().find(|c| !table.has_column(c)) {
        Some(missing) => Err(DeparseError::MissingColumn { table: table.name.clone(),
                                                           object: object.to_string(),
                                                           column: missing.clone() }),
        None => Ok(()),
    }
}
