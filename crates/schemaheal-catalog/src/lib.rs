//! Database catalog access for schema healing
//!
//! This crate reads the live schema through a [`CatalogAdapter`] and executes
//! corrective DDL through the same adapter.
//!
//! ## Features
//!
//! - `postgres` (default) - PostgreSQL support via tokio-postgres
//!
//! ## Example
//!
//! ```rust,ignore
//! use schemaheal_catalog::{PostgresAdapter, SchemaIntrospector};
//!
//! let adapter = Arc::new(PostgresAdapter::connect(&config.database).await?);
//! let introspector = SchemaIntrospector::from_config(adapter, &config.database);
//! let snapshot = introspector.introspect(&CancellationToken::new()).await?;
//! ```

pub mod adapter;
pub mod introspector;
pub mod mock;
pub mod postgres;

pub use adapter::{CatalogAdapter, CatalogError, TableIdentifier};
pub use introspector::{Backoff, IntrospectionError, SchemaIntrospector};
pub use mock::{ExecutionRecord, MockAdapter};
pub use postgres::{redact_url, PostgresAdapter};
