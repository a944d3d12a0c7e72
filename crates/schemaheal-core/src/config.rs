//! Configuration schema (schemaheal.toml)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQL dialect used to parse extracted statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectConfig {
    /// PostgreSQL SQL dialect
    Postgres,

    /// Generic SQL
    Generic,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self::Postgres
    }
}

/// Source scanning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// File extensions to scan (without the dot)
    pub extensions: Vec<String>,

    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,

    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// Worker threads for parsing (0 = one per core)
    pub workers: usize,

    /// Tables never reported (glob patterns)
    pub ignore_tables: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: ["py", "js", "ts", "jsx", "tsx", "rs", "go", "rb", "php", "java", "sql"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_dirs: [".git", "node_modules", "target", "venv", ".venv", "__pycache__", "dist", "build"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 1024 * 1024,
            workers: 0,
            ignore_tables: Vec::new(),
        }
    }
}

impl ScannerConfig {
    /// Check if a table matches any ignore pattern
    pub fn is_table_ignored(&self, table: &str) -> bool {
        self.ignore_tables.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, table)
            } else {
                pattern == table
            }
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; environment variables take precedence
    pub url: Option<String>,

    /// Schema to introspect and heal
    pub schema: String,

    pub pool_size: usize,

    /// Connect over TLS
    pub tls: bool,

    /// Per-statement timeout in seconds
    pub timeout_secs: u64,

    /// Tables introspected in parallel
    pub introspection_concurrency: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schema: "public".to_string(),
            pool_size: 4,
            tls: false,
            timeout_secs: 30,
            introspection_concurrency: 4,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL.
    ///
    /// `SCHEMAHEAL_DATABASE_URL`, then `DATABASE_URL`, then the configured url.
    pub fn resolve_url(&self) -> Option<String> {
        std::env::var("SCHEMAHEAL_DATABASE_URL")
            .ok()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.is_empty())
            .or_else(|| self.url.clone())
    }
}

/// Type inference settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Independent call sites required before a type change or index is proposed
    pub min_evidence: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { min_evidence: 2 }
    }
}

/// Health monitor scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between scheduled cycles
    pub interval_secs: u64,

    /// Apply additive fixes without approval
    pub auto_apply: bool,

    pub backoff_base_secs: u64,

    pub backoff_max_secs: u64,

    /// Consecutive failures before scheduled cycles pause
    pub retry_ceiling: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            auto_apply: false,
            backoff_base_secs: 5,
            backoff_max_secs: 300,
            retry_ceiling: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the control surface
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Where issues and the execution log are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".schemaheal"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the application source tree, relative to the project root
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    #[serde(default)]
    pub dialect: DialectConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub state: StateConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            dialect: DialectConfig::default(),
            scanner: ScannerConfig::default(),
            database: DatabaseConfig::default(),
            inference: InferenceConfig::default(),
            monitor: MonitorConfig::default(),
            server: ServerConfig::default(),
            state: StateConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.min_evidence == 0 {
            return Err(ConfigError::Invalid("inference.min_evidence must be at least 1".into()));
        }
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Invalid("monitor.interval_secs must be at least 1".into()));
        }
        if self.monitor.backoff_base_secs > self.monitor.backoff_max_secs {
            return Err(ConfigError::Invalid(
                "monitor.backoff_base_secs exceeds monitor.backoff_max_secs".into(),
            ));
        }
        if self.database.pool_size == 0 || self.database.introspection_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_size and database.introspection_concurrency must be at least 1".into(),
            ));
        }
        if self.database.timeout_secs == 0 {
            return Err(ConfigError::Invalid("database.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Source root resolved against the project root
    pub fn source_path(&self) -> PathBuf {
        self.project_root.join(&self.source_root)
    }

    /// State directory resolved against the project root
    pub fn state_path(&self) -> PathBuf {
        self.project_root.join(&self.state.dir)
    }
}

/// Simple glob matching (single `*` wildcard)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len() && text.starts_with(prefix) && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
