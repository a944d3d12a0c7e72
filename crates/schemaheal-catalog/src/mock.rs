//! In-memory catalog adapter for testing
//!
//! Holds table schemas in memory and interprets the DDL it is asked to
//! execute with sqlparser, so fixes can be applied and re-introspected
//! without a database. It's useful for:
//! - Unit testing drift detection and reconciliation
//! - Verifying that synthesized DDL is idempotent and atomic
//! - Simulating outages, slow queries and failing statements
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schemaheal_catalog::{CatalogAdapter, MockAdapter, TableIdentifier};
//!
//! let adapter = MockAdapter::new();
//! adapter
//!     .execute_ddl(&["CREATE TABLE users (id BIGSERIAL PRIMARY KEY)".into()], timeout)
//!     .await?;
//!
//! let users = adapter.fetch_table(&TableIdentifier::new("public", "users")).await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Database goes away
//! adapter.set_available(false);
//!
//! // Statements mentioning `audit_log` fail after earlier ones ran
//! adapter.fail_statements_matching("audit_log").await;
//!
//! // Every operation takes 100ms
//! let adapter = MockAdapter::new().with_latency(100);
//! ```

use crate::adapter::{CatalogAdapter, CatalogError, TableIdentifier};
use schemaheal_core::{ColumnSchema, ConstraintKind, ConstraintSchema, IndexSchema, TableSchema};
use sqlparser::ast::{
    AlterColumnOperation, AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable, DataType, Expr,
    Ident, ObjectName, Statement, TableConstraint,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// One `execute_ddl` call as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub statements: Vec<String>,
    pub started: Instant,
    pub finished: Instant,
    pub success: bool,
}

impl ExecutionRecord {
    /// Whether two executions were in flight at the same time
    pub fn overlaps(&self, other: &ExecutionRecord) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

/// In-memory catalog adapter
///
/// Clones share state, so a test can keep a handle while the monitor owns
/// another.
#[derive(Clone)]
pub struct MockAdapter {
    /// Tables by qualified name
    tables: Arc<RwLock<HashMap<String, TableSchema>>>,

    /// Errors to return when fetching specific tables
    errors: Arc<RwLock<HashMap<String, CatalogError>>>,

    /// Substrings that make a statement fail
    statement_failures: Arc<RwLock<Vec<String>>>,

    executions: Arc<RwLock<Vec<ExecutionRecord>>>,

    available: Arc<AtomicBool>,

    /// Simulated latency per operation (milliseconds)
    latency_ms: u64,

    /// Schema for unqualified names
    default_schema: String,
}

impl MockAdapter {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            statement_failures: Arc::new(RwLock::new(Vec::new())),
            executions: Arc::new(RwLock::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
            latency_ms: 0,
            default_schema: "public".to_string(),
        }
    }

    /// Delay every operation by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Resolve unqualified names in `schema`
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Add or replace a table in the default schema
    pub async fn add_table(&self, table: TableSchema) {
        let id = TableIdentifier::new(self.default_schema.clone(), table.name.clone());
        self.tables.write().await.insert(id.fqn(), table);
    }

    /// Current state of one table
    pub async fn table(&self, name: &str) -> Option<TableSchema> {
        let id = TableIdentifier::new(self.default_schema.clone(), name);
        self.tables.read().await.get(&id.fqn()).cloned()
    }

    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Return `error` whenever `table` is fetched
    pub async fn add_error_for_table(&self, table: TableIdentifier, error: CatalogError) {
        self.errors.write().await.insert(table.fqn(), error);
    }

    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
        self.statement_failures.write().await.clear();
    }

    /// Fail any statement containing `pattern`
    pub async fn fail_statements_matching(&self, pattern: impl Into<String>) {
        self.statement_failures.write().await.push(pattern.into());
    }

    /// Simulate the database going away or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Every `execute_ddl` call so far, in completion order
    pub async fn executions(&self) -> Vec<ExecutionRecord> {
        self.executions.read().await.clone()
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::ConnectionError(
                "Simulated connection failure".to_string(),
            ))
        }
    }

    /// Apply statements to a copy of the catalog; the copy replaces the
    /// catalog only if every statement succeeded.
    async fn apply_all(&self, statements: &[String]) -> Result<(), CatalogError> {
        let failures = self.statement_failures.read().await.clone();
        let mut tables = self.tables.write().await;
        let mut working = tables.clone();

        for sql in statements {
            if let Some(pattern) = failures.iter().find(|p| sql.contains(p.as_str())) {
                return Err(CatalogError::ExecutionError(format!(
                    "Simulated failure for statement matching '{}'",
                    pattern
                )));
            }

            let parsed = Parser::parse_sql(&PostgreSqlDialect {}, sql)
                .map_err(|e| CatalogError::ExecutionError(format!("syntax error: {}", e)))?;
            for statement in &parsed {
                apply_statement(&mut working, &self.default_schema, statement)?;
            }
        }

        *tables = working;
        Ok(())
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.simulate_latency().await;
        self.check_available()
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, CatalogError> {
        self.simulate_latency().await;
        self.check_available()?;

        let prefix = format!("{}.", schema);
        let mut names: Vec<String> = self
            .tables
            .read()
            .await
            .keys()
            .filter_map(|fqn| fqn.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn fetch_table(&self, table: &TableIdentifier) -> Result<TableSchema, CatalogError> {
        self.simulate_latency().await;
        self.check_available()?;

        if let Some(error) = self.errors.read().await.get(&table.fqn()) {
            return Err(error.clone());
        }

        self.tables
            .read()
            .await
            .get(&table.fqn())
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table.fqn()))
    }

    async fn execute_ddl(&self, statements: &[String], timeout: Duration) -> Result<(), CatalogError> {
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, self.simulate_latency()).await {
            Err(_) => Err(CatalogError::Timeout(timeout)),
            Ok(()) => match self.check_available() {
                Ok(()) => self.apply_all(statements).await,
                Err(e) => Err(e),
            },
        };

        self.executions.write().await.push(ExecutionRecord {
            statements: statements.to_vec(),
            started,
            finished: Instant::now(),
            success: result.is_ok(),
        });

        result
    }
}

fn ident_name(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

/// Qualified key for an object name, resolving unqualified names in `schema`
fn qualify(name: &ObjectName, schema: &str) -> (String, String) {
    let parts: Vec<String> = name.0.iter().map(ident_name).collect();
    match parts.as_slice() {
        [.., schema_name, table] => (format!("{}.{}", schema_name, table), table.clone()),
        [table] => (format!("{}.{}", schema, table), table.clone()),
        [] => (String::new(), String::new()),
    }
}

/// Declared type as the catalog reports it
fn declared_type(data_type: &DataType) -> (String, Option<String>) {
    let rendered = data_type.to_string().to_lowercase();
    match rendered.as_str() {
        "bigserial" | "serial8" => ("bigint".to_string(), Some("nextval()".to_string())),
        "serial" | "serial4" => ("integer".to_string(), Some("nextval()".to_string())),
        "smallserial" | "serial2" => ("smallint".to_string(), Some("nextval()".to_string())),
        _ => (rendered, None),
    }
}

fn column_schema(def: &ColumnDef) -> (ColumnSchema, bool) {
    let (declared, serial_default) = declared_type(&def.data_type);
    let mut column = ColumnSchema::new(ident_name(&def.name), declared);
    if let Some(default) = serial_default {
        column = column.with_default(default);
    }

    let mut primary = false;
    for option in &def.options {
        match &option.option {
            ColumnOption::NotNull => column = column.not_null(),
            ColumnOption::Default(expr) => column = column.with_default(expr.to_string()),
            ColumnOption::Unique { is_primary: true, .. } => {
                primary = true;
                column = column.not_null();
            }
            _ => {}
        }
    }

    (column, primary)
}

fn index_exists(tables: &HashMap<String, TableSchema>, name: &str) -> bool {
    tables
        .values()
        .any(|t| t.indexes.iter().any(|index| index.name == name))
}

fn apply_statement(
    tables: &mut HashMap<String, TableSchema>,
    schema: &str,
    statement: &Statement,
) -> Result<(), CatalogError> {
    match statement {
        Statement::CreateTable(CreateTable {
            name,
            columns,
            constraints,
            if_not_exists,
            ..
        }) => {
            let (key, table_name) = qualify(name, schema);
            if tables.contains_key(&key) {
                return if *if_not_exists {
                    Ok(())
                } else {
                    Err(CatalogError::ExecutionError(format!(
                        "relation \"{}\" already exists",
                        table_name
                    )))
                };
            }

            let mut table = TableSchema::new(table_name.clone());
            let mut primary_columns = Vec::new();
            for def in columns {
                let (column, primary) = column_schema(def);
                if primary {
                    primary_columns.push(column.name.clone());
                }
                table = table.with_column(column);
            }

            for constraint in constraints {
                if let TableConstraint::PrimaryKey { columns, .. } = constraint {
                    primary_columns.extend(columns.iter().map(ident_name));
                }
            }

            if !primary_columns.is_empty() {
                let pkey = format!("{}_pkey", table_name);
                for column in &mut table.columns {
                    if primary_columns.contains(&column.name) {
                        column.nullable = false;
                    }
                }
                table = table
                    .with_index(IndexSchema::new(pkey.clone(), primary_columns.clone()).primary())
                    .with_constraint(ConstraintSchema {
                        name: pkey,
                        kind: ConstraintKind::PrimaryKey,
                        columns: primary_columns,
                    });
            }

            tables.insert(key, table);
            Ok(())
        }

        Statement::AlterTable { name, operations, .. } => {
            let (key, table_name) = qualify(name, schema);
            let table = tables.get_mut(&key).ok_or_else(|| {
                CatalogError::ExecutionError(format!("relation \"{}\" does not exist", table_name))
            })?;

            for operation in operations {
                match operation {
                    AlterTableOperation::AddColumn {
                        if_not_exists,
                        column_def,
                        ..
                    } => {
                        let (column, _) = column_schema(column_def);
                        if table.find_column(&column.name).is_some() {
                            if *if_not_exists {
                                continue;
                            }
                            return Err(CatalogError::ExecutionError(format!(
                                "column \"{}\" of relation \"{}\" already exists",
                                column.name, table_name
                            )));
                        }
                        table.columns.push(column);
                    }
                    AlterTableOperation::AlterColumn {
                        column_name,
                        op: AlterColumnOperation::SetDataType { data_type, .. },
                    } => {
                        let column_name = ident_name(column_name);
                        let column = table
                            .columns
                            .iter_mut()
                            .find(|c| c.name == column_name)
                            .ok_or_else(|| {
                                CatalogError::ExecutionError(format!(
                                    "column \"{}\" of relation \"{}\" does not exist",
                                    column_name, table_name
                                ))
                            })?;
                        let (declared, _) = declared_type(data_type);
                        let nullable = column.nullable;
                        let default = column.default.clone();
                        *column = ColumnSchema::new(column_name, declared);
                        column.nullable = nullable;
                        column.default = default;
                    }
                    other => {
                        return Err(CatalogError::ExecutionError(format!(
                            "unsupported ALTER TABLE operation: {}",
                            other
                        )))
                    }
                }
            }
            Ok(())
        }

        Statement::CreateIndex(CreateIndex {
            name,
            table_name,
            columns,
            unique,
            if_not_exists,
            ..
        }) => {
            let (key, table) = qualify(table_name, schema);
            let index_name = name
                .as_ref()
                .and_then(|n| n.0.last().map(ident_name))
                .unwrap_or_else(|| format!("{}_idx", table));

            if index_exists(tables, &index_name) {
                return if *if_not_exists {
                    Ok(())
                } else {
                    Err(CatalogError::ExecutionError(format!(
                        "relation \"{}\" already exists",
                        index_name
                    )))
                };
            }

            let target = tables.get_mut(&key).ok_or_else(|| {
                CatalogError::ExecutionError(format!("relation \"{}\" does not exist", table))
            })?;

            let mut index_columns = Vec::new();
            for column in columns {
                let name = match &column.expr {
                    Expr::Identifier(ident) => ident_name(ident),
                    other => {
                        return Err(CatalogError::ExecutionError(format!(
                            "unsupported index expression: {}",
                            other
                        )))
                    }
                };
                if target.find_column(&name).is_none() {
                    return Err(CatalogError::ExecutionError(format!(
                        "column \"{}\" does not exist",
                        name
                    )));
                }
                index_columns.push(name);
            }

            let mut index = IndexSchema::new(index_name, index_columns);
            if *unique {
                index = index.unique();
            }
            target.indexes.push(index);
            Ok(())
        }

        other => Err(CatalogError::ExecutionError(format!(
            "unsupported statement: {}",
            other
        ))),
    }
}
