//! Live schema capture
//!
//! Lists the tables of one schema and fetches each of them with bounded
//! concurrency. A snapshot is produced only if every table was fetched; the
//! last published snapshot is kept untouched when a capture fails.

use crate::adapter::{CatalogAdapter, CatalogError, TableIdentifier};
use schemaheal_core::{DatabaseConfig, MonitorConfig, SchemaSnapshot, TableSchema};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Errors that abort an introspection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntrospectionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("introspection cancelled")]
    Cancelled,

    #[error("introspection task failed: {0}")]
    Task(String),
}

/// Exponential retry delay: `base * 2^(n-1)`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            Duration::from_secs(config.backoff_base_secs),
            Duration::from_secs(config.backoff_max_secs),
        )
    }

    /// Delay after `failures` consecutive failures (zero when none)
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(failures - 1).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).unwrap_or(self.max).min(self.max)
    }
}

/// Captures and retains schema snapshots
pub struct SchemaIntrospector {
    adapter: Arc<dyn CatalogAdapter>,
    schema: String,
    concurrency: usize,
    timeout: Duration,
    current: RwLock<Option<Arc<SchemaSnapshot>>>,
}

impl SchemaIntrospector {
    pub fn new(adapter: Arc<dyn CatalogAdapter>, schema: impl Into<String>) -> Self {
        Self {
            adapter,
            schema: schema.into(),
            concurrency: 4,
            timeout: Duration::from_secs(30),
            current: RwLock::new(None),
        }
    }

    pub fn from_config(adapter: Arc<dyn CatalogAdapter>, config: &DatabaseConfig) -> Self {
        Self::new(adapter, config.schema.clone())
            .with_concurrency(config.introspection_concurrency)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn CatalogAdapter> {
        &self.adapter
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Per-query timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Last published snapshot
    pub fn current(&self) -> Option<Arc<SchemaSnapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the published snapshot
    pub fn publish(&self, snapshot: Arc<SchemaSnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }

    /// Capture and publish in one step
    pub async fn introspect(&self, cancel: &CancellationToken) -> Result<Arc<SchemaSnapshot>, IntrospectionError> {
        let snapshot = Arc::new(self.capture(cancel).await?);
        self.publish(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Read every table of the schema without publishing
    #[tracing::instrument(skip(self, cancel), fields(schema = %self.schema, adapter = self.adapter.name()))]
    pub async fn capture(&self, cancel: &CancellationToken) -> Result<SchemaSnapshot, IntrospectionError> {
        let started = Instant::now();

        let names = tokio::select! {
            _ = cancel.cancelled() => return Err(IntrospectionError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.adapter.list_tables(&self.schema)) => match result {
                Ok(names) => names?,
                Err(_) => {
                    return Err(IntrospectionError::Timeout {
                        operation: "list tables".to_string(),
                        timeout: self.timeout,
                    })
                }
            },
        };

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for name in names.into_iter().filter(|n| !n.starts_with("pg_")) {
            let adapter = Arc::clone(&self.adapter);
            let permits = Arc::clone(&permits);
            let table = TableIdentifier::new(self.schema.clone(), name);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| IntrospectionError::Task(e.to_string()))?;

                match tokio::time::timeout(timeout, adapter.fetch_table(&table)).await {
                    Ok(result) => result.map_err(IntrospectionError::from),
                    Err(_) => Err(IntrospectionError::Timeout {
                        operation: format!("fetch {}", table),
                        timeout,
                    }),
                }
            });
        }

        let mut tables: Vec<TableSchema> = Vec::new();
        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(IntrospectionError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else { break };
            let result = joined.map_err(|e| IntrospectionError::Task(e.to_string()))?;

            match result {
                Ok(table) => tables.push(table),
                Err(error) => {
                    tasks.abort_all();
                    tracing::warn!(%error, "introspection failed");
                    return Err(error);
                }
            }
        }

        let snapshot = SchemaSnapshot::new(self.schema.clone(), tables);
        tracing::info!(
            tables = snapshot.table_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "schema captured"
        );

        Ok(snapshot)
    }
}
