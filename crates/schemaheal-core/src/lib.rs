//! SchemaHeal Core
//!
//! Core domain model shared by the scanner, catalog adapters and the healing engine.
//! Issue type codes and risk classes are persisted - never rename them.

pub mod types;
pub mod identifier;
pub mod location;
pub mod schema;
pub mod issue;
pub mod ddl;
pub mod fix;
pub mod config;
pub mod report;

pub use types::LogicalType;
pub use identifier::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN};
pub use location::Location;
pub use schema::{ColumnSchema, ConstraintKind, ConstraintSchema, IndexSchema, SchemaSnapshot, TableSchema};
pub use issue::{Evidence, ExpectedColumn, Issue, IssueStatus, IssueType, RiskClass, MAX_EVIDENCE_SITES};
pub use ddl::{index_name, ColumnDefinition, CompensatingDdl, DdlStatement};
pub use fix::{Fix, FixExecution};
pub use config::{
    Config, ConfigError, DatabaseConfig, DialectConfig, InferenceConfig, MonitorConfig,
    ScannerConfig, ServerConfig, StateConfig,
};
pub use report::{CycleOutcome, CycleReport, ReportSummary, ReportVersion, TypeConflict};
