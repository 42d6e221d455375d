use schema_domain::{apply_patch, to_ddl, Column, Constraint, DeparseError, ForeignKeyAction, Index, PatchOperation,
                    Schema, Table};
use serde_json::json;

fn blog_schema() -> Schema {
    let mut s = Schema::empty();
    s.tables.insert("users".into(),
                    Table::new("users").with_column(Column::new("id", "uuid").not_null()
                                                                             .with_default("gen_random_uuid()".into()))
                                       .with_column(Column::new("email", "text").not_null())
                                       .with_column(Column::new("status", "text").with_default("active".into()))
                                       .with_constraint(Constraint::primary_key("users_pkey", &["id"]))
                                       .with_constraint(Constraint::unique("users_email_key", &["email"])));
    s.tables.insert("posts".into(),
                    Table::new("posts").with_column(Column::new("id", "bigint").not_null())
                                       .with_column(Column::new("user_id", "uuid").not_null())
                                       .with_constraint(Constraint::foreign_key("posts_user_fk",
                                                                                &["user_id"],
                                                                                "users",
                                                                                &["id"],
                                                                                ForeignKeyAction::Cascade))
                                       .with_index(Index { name: "posts_user_idx".into(),
                                                           columns: vec!["user_id".into()],
                                                           unique: false,
                                                           method: "btree".into() }));
    s
}

#[test]
fn empty_schema_yields_empty_ddl() {
    let out = to_ddl(&Schema::empty());
    assert!(out.statements.is_empty());
    assert!(out.errors.is_empty());
    assert_eq!(out.sql(), "");
}

#[test]
fn users_table_keeps_function_default_unquoted() {
    let out = to_ddl(&blog_schema());
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let users = &out.statements[0];
    assert!(users.starts_with("CREATE TABLE \"users\" (\n"));
    assert!(users.contains("\"id\" uuid DEFAULT gen_random_uuid() NOT NULL"));
    assert!(users.contains("\"status\" text DEFAULT 'active'"));
}

#[test]
fn statements_follow_dependency_order() {
    let out = to_ddl(&blog_schema());
    let pos = |needle: &str| {
        out.statements
           .iter()
           .position(|s| s.contains(needle))
           .unwrap_or_else(|| panic!("missing {needle}"))
    };
    assert!(pos("CREATE TABLE \"posts\"") < pos("CREATE INDEX"));
    assert!(pos("CREATE INDEX") < pos("PRIMARY KEY"));
    assert!(pos("PRIMARY KEY") < pos("FOREIGN KEY"));
    assert!(out.statements
               .last()
               .unwrap()
               .ends_with("REFERENCES \"users\" (\"id\") ON UPDATE NO ACTION ON DELETE CASCADE;"));
    assert!(out.sql().contains("CREATE INDEX \"posts_user_idx\" ON \"posts\" USING btree (\"user_id\");"));
}

#[test]
fn broken_references_are_reported_and_skipped() {
    let mut s = blog_schema();
    let posts = s.tables.get_mut("posts").unwrap();
    posts.constraints.insert("posts_author_fk".into(),
                             Constraint::foreign_key("posts_author_fk", &["user_id"], "authors", &["id"], ForeignKeyAction::NoAction));
    posts.indexes.insert("bad_idx".into(),
                         Index { name: "bad_idx".into(),
                                 columns: vec!["nope".into()],
                                 unique: true,
                                 method: String::new() });

    let out = to_ddl(&s);
    assert_eq!(out.errors.len(), 2);
    assert!(out.errors.iter().any(|e| matches!(e, DeparseError::MissingTargetTable { target, .. } if target == "authors")));
    assert!(out.errors.iter().any(|e| matches!(e, DeparseError::MissingColumn { column, .. } if column == "nope")));
    assert!(!out.sql().contains("authors"));
    assert!(!out.sql().contains("bad_idx"));
}

#[test]
fn enums_and_comments_are_rendered() {
    let patch: Vec<PatchOperation> = serde_json::from_value(json!([
        {"op": "add", "path": "/enums/mood", "value": {"name": "mood", "values": ["happy", "it's ok"]}},
        {"op": "add", "path": "/tables/we\"ird",
         "value": {"name": "we\"ird", "comment": "odd table",
                   "columns": {"m": {"name": "m", "type": "mood", "comment": "feeling", "check": "m <> 'happy'"}}}}
    ])).unwrap();
    let schema = apply_patch(&Schema::empty(), &patch).unwrap();
    let out = to_ddl(&schema);
    assert_eq!(out.statements[0], "CREATE TYPE \"mood\" AS ENUM ('happy', 'it''s ok');");
    assert!(out.statements[1].contains("CREATE TABLE \"we\"\"ird\""));
    assert!(out.statements[1].contains("\"m\" mood CHECK (m <> 'happy')"));
    assert!(out.sql().contains("COMMENT ON TABLE \"we\"\"ird\" IS 'odd table';"));
    assert!(out.sql().contains("COMMENT ON COLUMN \"we\"\"ird\".\"m\" IS 'feeling';"));
}

#[test]
fn deparse_is_deterministic() {
    assert_eq!(to_ddl(&blog_schema()), to_ddl(&blog_schema()));
}
