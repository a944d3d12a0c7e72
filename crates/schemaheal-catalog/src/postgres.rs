//! PostgreSQL catalog adapter
//!
//! Reads tables from `information_schema` and indexes from `pg_index`, and
//! executes fixes inside a transaction with `statement_timeout` set. Connections
//! come from a `deadpool-postgres` pool capped at `database.pool_size`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let adapter = PostgresAdapter::connect(&config.database).await?;
//! let tables = adapter.list_tables("public").await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::adapter::{CatalogAdapter, CatalogError, TableIdentifier};
use schemaheal_core::{DatabaseConfig, TableSchema};
use std::time::Duration;

#[cfg(feature = "postgres")]
use schemaheal_core::{ColumnSchema, ConstraintKind, ConstraintSchema, IndexSchema};

#[cfg(feature = "postgres")]
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};

#[cfg(feature = "postgres")]
use tokio_postgres::{Config as PgConfig, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(feature = "postgres")]
const LIST_TABLES: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

#[cfg(feature = "postgres")]
const FETCH_COLUMNS: &str = r#"
    SELECT
        column_name::text,
        data_type::text,
        udt_name::text,
        is_nullable::text,
        column_default::text,
        character_maximum_length::int4,
        numeric_precision::int4,
        numeric_scale::int4
    FROM information_schema.columns
    WHERE table_schema = $1
      AND table_name = $2
    ORDER BY ordinal_position
"#;

#[cfg(feature = "postgres")]
const FETCH_INDEXES: &str = r#"
    SELECT
        i.relname::text,
        ix.indisunique,
        ix.indisprimary,
        array_agg(a.attname::text ORDER BY k.ord) AS columns
    FROM pg_class t
    JOIN pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_index ix ON ix.indrelid = t.oid
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
    JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
    WHERE n.nspname = $1
      AND t.relname = $2
    GROUP BY i.relname, ix.indisunique, ix.indisprimary
    ORDER BY i.relname
"#;

#[cfg(feature = "postgres")]
const FETCH_CONSTRAINTS: &str = r#"
    SELECT
        tc.constraint_name::text,
        tc.constraint_type::text,
        COALESCE(
            array_agg(kcu.column_name::text ORDER BY kcu.ordinal_position)
                FILTER (WHERE kcu.column_name IS NOT NULL),
            '{}'
        ) AS columns
    FROM information_schema.table_constraints tc
    LEFT JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_schema = tc.constraint_schema
     AND kcu.constraint_name = tc.constraint_name
     AND kcu.table_name = tc.table_name
    WHERE tc.table_schema = $1
      AND tc.table_name = $2
    GROUP BY tc.constraint_name, tc.constraint_type
    ORDER BY tc.constraint_name
"#;

/// Hide the password in a connection URL or key/value connection string
pub fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let rest = &url[scheme_end + 3..];
        let authority_end = rest.find('/').unwrap_or(rest.len());
        if let Some(at) = rest[..authority_end].rfind('@') {
            let userinfo = &rest[..at];
            if let Some(colon) = userinfo.find(':') {
                return format!(
                    "{}{}:***{}",
                    &url[..scheme_end + 3],
                    &userinfo[..colon],
                    &rest[at..]
                );
            }
        }
        return url.to_string();
    }

    url.split_whitespace()
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("password") => format!("{}=***", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declared type text as `information_schema` would spell a full type
#[cfg(feature = "postgres")]
fn declared_type(
    data_type: &str,
    udt_name: &str,
    char_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    if data_type == "ARRAY" {
        // _int4 -> int4[]
        return format!("{}[]", udt_name.trim_start_matches('_'));
    }

    match (data_type, char_length, precision, scale) {
        ("character varying" | "character", Some(n), _, _) => format!("{}({})", data_type, n),
        ("numeric", _, Some(p), Some(s)) => format!("numeric({},{})", p, s),
        ("numeric", _, Some(p), None) => format!("numeric({})", p),
        _ => data_type.to_string(),
    }
}

#[cfg(feature = "postgres")]
fn map_pg_error(context: &str, e: tokio_postgres::Error) -> CatalogError {
    let message = e.to_string();
    if e.is_closed() {
        CatalogError::ConnectionError(format!("{}: {}", context, message))
    } else if message.contains("permission denied") {
        CatalogError::PermissionDenied(format!("{}: {}", context, message))
    } else if message.contains("statement timeout") || message.contains("canceling statement") {
        CatalogError::ExecutionError(format!("{}: statement timeout", context))
    } else {
        CatalogError::QueryError(format!("{}: {}", context, message))
    }
}

#[cfg(feature = "postgres")]
fn map_pool_error(context: &str, e: PoolError) -> CatalogError {
    CatalogError::ConnectionError(format!("{}: {}", context, e))
}

/// Build a pool holding at most `size` connections, opened lazily on checkout
#[cfg(feature = "postgres")]
fn build_pool(config: PgConfig, tls: bool, size: usize) -> Result<Pool, CatalogError> {
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let manager = if tls {
        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| CatalogError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;
        Manager::from_config(config, MakeTlsConnector::new(connector), manager_config)
    } else {
        Manager::from_config(config, NoTls, manager_config)
    };

    Pool::builder(manager)
        .max_size(size.max(1))
        .build()
        .map_err(|e| CatalogError::ConfigError(format!("Failed to build connection pool: {}", e)))
}

/// PostgreSQL catalog adapter
#[cfg(feature = "postgres")]
pub struct PostgresAdapter {
    pool: Pool,

    /// Connection URL with the password hidden, for logs
    display_url: String,
}

#[cfg(feature = "postgres")]
impl PostgresAdapter {
    /// Open a pool of up to `pool_size` connections using the configured URL
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CatalogError> {
        let url = config
            .resolve_url()
            .ok_or_else(|| CatalogError::ConfigError("no database URL configured".to_string()))?;
        Self::from_connection_string(&url, config.tls, config.pool_size).await
    }

    /// Open a pool from a URL or key/value connection string
    pub async fn from_connection_string(conn_str: &str, tls: bool, pool_size: usize) -> Result<Self, CatalogError> {
        let display_url = redact_url(conn_str);
        let config: PgConfig = conn_str
            .parse()
            .map_err(|e| CatalogError::ConfigError(format!("Invalid connection string {}: {}", display_url, e)))?;

        let pool = build_pool(config, tls, pool_size)?;

        // Fail fast on a bad URL or unreachable server
        drop(pool.get().await.map_err(|e| map_pool_error(&format!("connect to {}", display_url), e))?);
        tracing::info!(url = %display_url, pool_size = pool.status().max_size, tls, "connected to PostgreSQL");

        Ok(Self { pool, display_url })
    }

    async fn client(&self) -> Result<Object, CatalogError> {
        self.pool.get().await.map_err(|e| map_pool_error("checkout connection", e))
    }

    pub fn display_url(&self) -> &str {
        &self.display_url
    }
}

#[cfg(feature = "postgres")]
#[async_trait::async_trait]
impl CatalogAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        let client = self.client().await?;
        client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| map_pg_error("Connection test failed", e))?;
        Ok(())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, CatalogError> {
        let client = self.client().await?;
        let rows = client
            .query(LIST_TABLES, &[&schema])
            .await
            .map_err(|e| map_pg_error("list tables", e))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn fetch_table(&self, table: &TableIdentifier) -> Result<TableSchema, CatalogError> {
        let client = self.client().await?;
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 2] = [&table.schema, &table.table];

        let rows = client
            .query(FETCH_COLUMNS, &params)
            .await
            .map_err(|e| map_pg_error(&format!("fetch columns of {}", table), e))?;

        if rows.is_empty() {
            return Err(CatalogError::TableNotFound(table.fqn()));
        }

        let mut schema = TableSchema::new(table.table.clone());
        for row in &rows {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let udt_name: String = row.get(2);
            let is_nullable: String = row.get(3);
            let default: Option<String> = row.get(4);

            let declared = declared_type(&data_type, &udt_name, row.get(5), row.get(6), row.get(7));
            let mut column = ColumnSchema::new(name, declared);
            if is_nullable.eq_ignore_ascii_case("NO") {
                column = column.not_null();
            }
            if let Some(default) = default {
                column = column.with_default(default);
            }
            schema = schema.with_column(column);
        }

        let indexes = client
            .query(FETCH_INDEXES, &params)
            .await
            .map_err(|e| map_pg_error(&format!("fetch indexes of {}", table), e))?;

        for row in &indexes {
            let mut index = IndexSchema::new(row.get::<_, String>(0), row.get::<_, Vec<String>>(3));
            if row.get::<_, bool>(1) {
                index = index.unique();
            }
            if row.get::<_, bool>(2) {
                index = index.primary();
            }
            schema = schema.with_index(index);
        }

        let constraints = client
            .query(FETCH_CONSTRAINTS, &params)
            .await
            .map_err(|e| map_pg_error(&format!("fetch constraints of {}", table), e))?;

        for row in &constraints {
            let name: String = row.get(0);
            let kind: String = row.get(1);
            // NOT NULL shows up as a generated CHECK constraint
            if name.ends_with("_not_null") {
                continue;
            }
            if let Some(kind) = ConstraintKind::from_catalog(&kind) {
                schema = schema.with_constraint(ConstraintSchema {
                    name,
                    kind,
                    columns: row.get(2),
                });
            }
        }

        Ok(schema)
    }

    async fn execute_ddl(&self, statements: &[String], timeout: Duration) -> Result<(), CatalogError> {
        let mut client = self.client().await?;

        let work = async {
            let tx = client
                .transaction()
                .await
                .map_err(|e| map_pg_error("begin", e))?;

            tx.batch_execute(&format!("SET LOCAL statement_timeout = {}", timeout.as_millis()))
                .await
                .map_err(|e| map_pg_error("set statement_timeout", e))?;

            for statement in statements {
                tx.batch_execute(statement)
                    .await
                    .map_err(|e| CatalogError::ExecutionError(e.to_string()))?;
            }

            tx.commit().await.map_err(|e| map_pg_error("commit", e))
        };

        // Dropping an uncommitted transaction rolls it back
        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout(timeout)),
        }
    }
}

/// PostgreSQL adapter placeholder when the `postgres` feature is disabled
#[cfg(not(feature = "postgres"))]
pub struct PostgresAdapter {
    _phantom: std::marker::PhantomData<()>,
}

#[cfg(not(feature = "postgres"))]
impl PostgresAdapter {
    pub async fn connect(_config: &DatabaseConfig) -> Result<Self, CatalogError> {
        Err(CatalogError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string(),
        ))
    }
}

#[cfg(not(feature = "postgres"))]
#[async_trait::async_trait]
impl CatalogAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        Err(CatalogError::ConfigError("PostgreSQL support not compiled".to_string()))
    }

    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, CatalogError> {
        Err(CatalogError::ConfigError("PostgreSQL support not compiled".to_string()))
    }

    async fn fetch_table(&self, _table: &TableIdentifier) -> Result<TableSchema, CatalogError> {
        Err(CatalogError::ConfigError("PostgreSQL support not compiled".to_string()))
    }

    async fn execute_ddl(&self, _statements: &[String], _timeout: Duration) -> Result<(), CatalogError> {
        Err(CatalogError::ConfigError("PostgreSQL support not compiled".to_string()))
    }
}
