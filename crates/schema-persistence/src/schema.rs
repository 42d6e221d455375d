//! Tablas Diesel. Deben coincidir con `migrations/`.

diesel::table! {
    design_schemas (id) {
        id -> Uuid,
        session_id -> Uuid,
        initial_snapshot -> Jsonb,
        current_snapshot -> Jsonb,
        latest_version_number -> BigInt,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    schema_versions (id) {
        id -> BigInt,
        schema_id -> Uuid,
        number -> BigInt,
        patch -> Jsonb,
        reverse_patch -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    timeline_items (seq) {
        seq -> BigInt,
        id -> Uuid,
        session_id -> Uuid,
        kind -> Text,
        content -> Text,
        payload -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    artifacts (session_id) {
        session_id -> Uuid,
        content -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(schema_versions -> design_schemas (schema_id));

diesel::allow_tables_to_appear_in_same_query!(design_schemas, schema_versions, timeline_items, artifacts,);
