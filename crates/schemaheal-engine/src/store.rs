//! Issue and audit persistence
//!
//! `issues.json` holds the whole record set and is replaced atomically through
//! a temporary file. `fix_executions.jsonl` is append-only, one execution per
//! line.

use schemaheal_core::{FixExecution, Issue};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const ISSUES_FILE: &str = "issues.json";
pub const EXECUTIONS_FILE: &str = "fix_executions.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn serde(path: &Path, source: serde_json::Error) -> Self {
        Self::Serde {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable record of issues and fix executions
pub trait IssueStore: Send + Sync {
    fn load_issues(&self) -> Result<Vec<Issue>, StoreError>;

    /// Replace the whole issue record set
    fn save_issues(&self, issues: &[Issue]) -> Result<(), StoreError>;

    fn append_execution(&self, execution: &FixExecution) -> Result<(), StoreError>;

    fn load_executions(&self) -> Result<Vec<FixExecution>, StoreError>;
}

/// In-memory store for tests and `--mock` runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    issues: Mutex<Vec<Issue>>,
    executions: Mutex<Vec<FixExecution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IssueStore for MemoryStore {
    fn load_issues(&self) -> Result<Vec<Issue>, StoreError> {
        Ok(lock(&self.issues).clone())
    }

    fn save_issues(&self, issues: &[Issue]) -> Result<(), StoreError> {
        *lock(&self.issues) = issues.to_vec();
        Ok(())
    }

    fn append_execution(&self, execution: &FixExecution) -> Result<(), StoreError> {
        lock(&self.executions).push(execution.clone());
        Ok(())
    }

    fn load_executions(&self) -> Result<Vec<FixExecution>, StoreError> {
        Ok(lock(&self.executions).clone())
    }
}

/// Files under the state directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,

    /// Serializes writers within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn issues_path(&self) -> PathBuf {
        self.dir.join(ISSUES_FILE)
    }

    pub fn executions_path(&self) -> PathBuf {
        self.dir.join(EXECUTIONS_FILE)
    }
}

impl IssueStore for JsonFileStore {
    fn load_issues(&self) -> Result<Vec<Issue>, StoreError> {
        let path = self.issues_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&contents).map_err(|e| StoreError::serde(&path, e))
    }

    fn save_issues(&self, issues: &[Issue]) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let path = self.issues_path();
        let tmp = self.dir.join(format!("{}.tmp", ISSUES_FILE));

        let json = serde_json::to_string_pretty(issues).map_err(|e| StoreError::serde(&path, e))?;
        std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!(issues = issues.len(), path = %path.display(), "issues saved");
        Ok(())
    }

    fn append_execution(&self, execution: &FixExecution) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let path = self.executions_path();

        let mut line = serde_json::to_string(execution).map_err(|e| StoreError::serde(&path, e))?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| StoreError::io(&path, e))?;
        file.sync_data().map_err(|e| StoreError::io(&path, e))
    }

    fn load_executions(&self) -> Result<Vec<FixExecution>, StoreError> {
        let path = self.executions_path();
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut executions = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| StoreError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            executions.push(serde_json::from_str(&line).map_err(|e| StoreError::serde(&path, e))?);
        }
        Ok(executions)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use schemaheal_core::{DdlStatement, Evidence, Fix, Identifier, IssueType, Location};

    fn issue(table: &str) -> Issue {
        Issue::new(
            IssueType::MissingTable,
            table,
            None,
            Evidence::new(1, vec![Location::with_line("app.py", 1)], "used"),
            Utc::now(),
        )
    }

    fn execution(issue: &Issue, success: bool) -> FixExecution {
        let statement = DdlStatement::CreateTable {
            table: Identifier::new(issue.table.as_str()).unwrap(),
            columns: Vec::new(),
        };
        let fix = Fix::new(issue, statement, Utc::now());
        if success {
            FixExecution::succeeded(&fix, Utc::now(), 12)
        } else {
            FixExecution::failed(&fix, Utc::now(), 3, "permission denied")
        }
    }

    #[test]
    fn test_missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("state")).unwrap();

        assert!(store.load_issues().unwrap().is_empty());
        assert!(store.load_executions().unwrap().is_empty());
    }

    #[test]
    fn test_issues_replace_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        store.save_issues(&[issue("a"), issue("b")]).unwrap();
        store.save_issues(&[issue("c")]).unwrap();

        let loaded = store.load_issues().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].table, "c");
        assert!(!dir.path().join("issues.json.tmp").exists());
    }

    #[test]
    fn test_executions_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let issue = issue("deployment_test");

        store.append_execution(&execution(&issue, true)).unwrap();
        store.append_execution(&execution(&issue, false)).unwrap();

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let executions = reopened.load_executions().unwrap();
        assert_eq!(executions.len(), 2);
        assert!(executions[0].success);
        assert_eq!(executions[1].error_message.as_deref(), Some("permission denied"));

        let raw = std::fs::read_to_string(reopened.executions_path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_corrupt_issues_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(store.issues_path(), "{not json").unwrap();

        assert!(matches!(store.load_issues(), Err(StoreError::Serde { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.save_issues(&[issue("a")]).unwrap();
        assert_eq!(store.load_issues().unwrap().len(), 1);
    }
}
