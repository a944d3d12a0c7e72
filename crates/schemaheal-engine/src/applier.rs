//! Transactional fix application
//!
//! Fixes on the same table run one at a time; fixes on different tables run
//! concurrently. Each attempt appends exactly one [`FixExecution`].

use crate::store::{IssueStore, StoreError};
use crate::validator::ValidatedFix;
use chrono::Utc;
use schemaheal_catalog::{CatalogAdapter, CatalogError};
use schemaheal_core::FixExecution;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The statement failed and was rolled back; the attempt is recorded
    #[error("fix {} failed on '{}': {source}", execution.fix_id, execution.table)]
    Execution {
        execution: Box<FixExecution>,
        #[source]
        source: CatalogError,
    },

    #[error("failed to record execution: {0}")]
    Audit(#[from] StoreError),
}

/// Applies validated fixes through a catalog adapter
pub struct FixApplier {
    adapter: Arc<dyn CatalogAdapter>,
    store: Arc<dyn IssueStore>,
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FixApplier {
    pub fn new(adapter: Arc<dyn CatalogAdapter>, store: Arc<dyn IssueStore>, timeout: Duration) -> Self {
        Self {
            adapter,
            store,
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Execute one fix under its table's lock.
    ///
    /// The DDL runs in a single transaction; on error or timeout nothing is
    /// committed. The execution record is written before the lock is released.
    #[tracing::instrument(skip(self, validated), fields(fix_id = %validated.fix().id, table = %validated.fix().table))]
    pub async fn apply(&self, validated: ValidatedFix) -> Result<FixExecution, ApplyError> {
        let fix = validated.into_fix();
        let lock = self.table_lock(&fix.table);
        let _guard = lock.lock().await;

        let applied_at = Utc::now();
        let started = Instant::now();
        let result = self
            .adapter
            .execute_ddl(std::slice::from_ref(&fix.ddl), self.timeout)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                let execution = FixExecution::succeeded(&fix, applied_at, duration_ms);
                self.store.append_execution(&execution)?;
                tracing::info!(issue_id = %fix.issue_id, duration_ms, "fix applied");
                Ok(execution)
            }
            Err(error) => {
                let execution = FixExecution::failed(&fix, applied_at, duration_ms, error.to_string());
                self.store.append_execution(&execution)?;
                tracing::warn!(issue_id = %fix.issue_id, %error, "fix failed, rolled back");
                Err(ApplyError::Execution {
                    execution: Box::new(execution),
                    source: error,
                })
            }
        }
    }

    fn table_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(table.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::synthesizer::FixSynthesizer;
    use crate::validator::{Approval, FixValidator};
    use schemaheal_catalog::MockAdapter;
    use schemaheal_core::{Evidence, Issue, IssueType, Location};

    fn validated(table: &str) -> ValidatedFix {
        let issue = Issue::new(
            IssueType::MissingTable,
            table,
            None,
            Evidence::new(1, vec![Location::with_line("app.py", 1)], "used"),
            Utc::now(),
        );
        let fix = FixSynthesizer::new().synthesize(&issue, Utc::now()).unwrap();
        FixValidator::new(2).validate(&issue, fix, Approval::Automatic).unwrap()
    }

    #[tokio::test]
    async fn test_apply_records_success() {
        let adapter = MockAdapter::new();
        let store = Arc::new(MemoryStore::new());
        let applier = FixApplier::new(Arc::new(adapter.clone()), store.clone(), Duration::from_secs(5));

        let execution = applier.apply(validated("deployment_test")).await.unwrap();

        assert!(execution.success);
        assert_eq!(execution.rollback_sql.as_deref(), Some("DROP TABLE IF EXISTS deployment_test"));
        assert!(adapter.table("deployment_test").await.is_some());
        assert_eq!(store.load_executions().unwrap(), vec![execution]);
    }

    #[tokio::test]
    async fn test_apply_records_failure() {
        let adapter = MockAdapter::new();
        adapter.fail_statements_matching("deployment_test").await;
        let store = Arc::new(MemoryStore::new());
        let applier = FixApplier::new(Arc::new(adapter.clone()), store.clone(), Duration::from_secs(5));

        let err = applier.apply(validated("deployment_test")).await.unwrap_err();

        let ApplyError::Execution { execution, .. } = err else {
            panic!("expected an execution failure");
        };
        assert!(!execution.success);
        assert!(execution.error_message.is_some());
        assert!(adapter.table("deployment_test").await.is_none());

        let recorded = store.load_executions().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].success);
    }
}
