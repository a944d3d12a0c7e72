//! Test fixtures for catalog integration tests
//!
//! Table definitions resembling a small web application's schema.

use schemaheal_core::{ColumnSchema, ConstraintKind, ConstraintSchema, IndexSchema, TableSchema};

/// Users table with a primary key and a unique email
pub fn users_table() -> TableSchema {
    TableSchema::new("users")
        .with_column(ColumnSchema::new("id", "bigint").not_null().with_default("nextval('users_id_seq'::regclass)"))
        .with_column(ColumnSchema::new("email", "character varying(255)").not_null())
        .with_column(ColumnSchema::new("display_name", "text"))
        .with_index(IndexSchema::new("users_pkey", vec!["id".into()]).primary())
        .with_index(IndexSchema::new("users_email_key", vec!["email".into()]).unique())
        .with_constraint(ConstraintSchema {
            name: "users_pkey".into(),
            kind: ConstraintKind::PrimaryKey,
            columns: vec!["id".into()],
        })
}

/// Orders table without an index on `user_id`
pub fn orders_table() -> TableSchema {
    TableSchema::new("orders")
        .with_column(ColumnSchema::new("id", "bigint").not_null())
        .with_column(ColumnSchema::new("user_id", "bigint").not_null())
        .with_column(ColumnSchema::new("total", "numeric(12,2)"))
        .with_column(ColumnSchema::new("status", "text").with_default("'pending'::text"))
        .with_index(IndexSchema::new("orders_pkey", vec!["id".into()]).primary())
}

/// Events table whose `occurred_at` column is stored as text
pub fn events_table() -> TableSchema {
    TableSchema::new("events")
        .with_column(ColumnSchema::new("id", "bigint").not_null())
        .with_column(ColumnSchema::new("occurred_at", "text"))
        .with_column(ColumnSchema::new("payload", "jsonb"))
}
