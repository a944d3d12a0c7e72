//! Catalog adapter trait for reading and altering the live schema

use schemaheal_core::TableSchema;
use std::fmt;
use std::time::Duration;

/// Identifies a table within a database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    /// Schema name (`public` by default)
    pub schema: String,

    /// Table name
    pub table: String,
}

impl TableIdentifier {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Get qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Errors that can occur when talking to the catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Statement failed: {0}")]
    ExecutionError(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CatalogError {
    /// Whether the database could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }
}

/// Trait for adapters that can introspect and alter a database schema
#[async_trait::async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Test the connection to the database
    async fn test_connection(&self) -> Result<(), CatalogError>;

    /// List base tables in a schema
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, CatalogError>;

    /// Fetch columns, indexes and constraints of one table
    async fn fetch_table(&self, table: &TableIdentifier) -> Result<TableSchema, CatalogError>;

    /// Execute statements in a single transaction.
    ///
    /// Either every statement takes effect or none does. The transaction is
    /// rolled back if it has not committed within `timeout`.
    async fn execute_ddl(&self, statements: &[String], timeout: Duration) -> Result<(), CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_identifier() {
        let table = TableIdentifier::new("public", "users");
        assert_eq!(table.schema, "public");
        assert_eq!(table.table, "users");
        assert_eq!(table.fqn(), "public.users");
        assert_eq!(table.to_string(), "public.users");
    }

    #[test]
    fn unavailable_errors() {
        assert!(CatalogError::ConnectionError("refused".into()).is_unavailable());
        assert!(CatalogError::Timeout(Duration::from_secs(30)).is_unavailable());
        assert!(!CatalogError::ExecutionError("syntax".into()).is_unavailable());
    }
}
