//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. When a
//! migration changes a table, regenerate them with `diesel print-schema` or
//! edit them by hand.

diesel::table! {
    /// User accounts.
    users (id) {
        id -> Uuid,
        /// Login name, unique across accounts.
        username -> Varchar,
        is_staff -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// User-scoped experiment facts, unique per `(user_id, experiment_id, key)`.
    experiment_data (id) {
        id -> Int8,
        user_id -> Uuid,
        experiment_id -> Int4,
        key -> Varchar,
        value -> Text,
        created_at -> Timestamptz,
        modified_at -> Timestamptz,
    }
}

diesel::table! {
    /// Global experiment facts, unique per `(experiment_id, key)`.
    experiment_key_values (id) {
        id -> Int8,
        experiment_id -> Int4,
        key -> Varchar,
        value -> Text,
        created_at -> Timestamptz,
        modified_at -> Timestamptz,
    }
}

diesel::joinable!(experiment_data -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(users, experiment_data, experiment_key_values);
