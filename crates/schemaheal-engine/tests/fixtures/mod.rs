//! Test fixtures for engine integration tests
//!
//! Each test gets its own project directory with a `src/` tree and a state
//! directory, plus an in-memory catalog.

#![allow(dead_code)]

use schemaheal_catalog::MockAdapter;
use schemaheal_core::{ColumnSchema, Config, IndexSchema, TableSchema};
use schemaheal_engine::{HealthMonitor, IssueStore, JsonFileStore, MemoryStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Query against a table that does not exist yet
pub const DEPLOYMENT_CHECK: &str = r#"
def check_deployment(cur):
    cur.execute("SELECT * FROM deployment_test")
    return cur.fetchall()
"#;

/// Two call sites binding `int(...)` to `sessions.user_id`
pub const SESSION_LOOKUPS: &str = r#"
def session_token(cur, user_id):
    cur.execute("SELECT token FROM sessions WHERE user_id = %s", (int(user_id),))
    return cur.fetchone()


def session_expiry(cur, user_id):
    cur.execute("SELECT expires_at FROM sessions WHERE user_id = %s", (int(user_id),))
    return cur.fetchone()
"#;

pub struct Project {
    pub dir: TempDir,
    pub config: Config,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();

        let mut config = Config::default();
        config.project_root = dir.path().to_path_buf();
        config.source_root = "src".into();
        config.state.dir = ".schemaheal".into();
        config.monitor.retry_ceiling = 3;

        Self { dir, config }
    }

    pub fn with_source(self, file: &str, contents: &str) -> Self {
        write_source(self.dir.path(), file, contents);
        self
    }

    pub fn auto_apply(mut self) -> Self {
        self.config.monitor.auto_apply = true;
        self
    }

    pub fn monitor(&self, adapter: &MockAdapter) -> HealthMonitor {
        HealthMonitor::new(&self.config, Arc::new(adapter.clone()), Arc::new(MemoryStore::new())).unwrap()
    }

    pub fn file_store(&self) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::open(self.config.state_path()).unwrap())
    }

    pub fn persistent_monitor(&self, adapter: &MockAdapter) -> HealthMonitor {
        let store: Arc<dyn IssueStore> = self.file_store();
        HealthMonitor::new(&self.config, Arc::new(adapter.clone()), store).unwrap()
    }
}

pub fn write_source(root: &Path, file: &str, contents: &str) {
    let path = root.join("src").join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// `sessions` with `user_id` stored as text and already indexed
pub fn sessions_table() -> TableSchema {
    TableSchema::new("sessions")
        .with_column(ColumnSchema::new("id", "bigint").not_null())
        .with_column(ColumnSchema::new("user_id", "text"))
        .with_column(ColumnSchema::new("token", "text"))
        .with_column(ColumnSchema::new("expires_at", "timestamp with time zone"))
        .with_index(IndexSchema::new("sessions_pkey", vec!["id".into()]).primary())
        .with_index(IndexSchema::new("sessions_user_id_idx", vec!["user_id".into()]))
}

pub fn users_table() -> TableSchema {
    TableSchema::new("users")
        .with_column(ColumnSchema::new("id", "bigint").not_null())
        .with_column(ColumnSchema::new("email", "text"))
        .with_index(IndexSchema::new("users_pkey", vec!["id".into()]).primary())
}
