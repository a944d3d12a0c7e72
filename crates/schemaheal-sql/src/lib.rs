//! SQL discovery and type inference
//!
//! This crate handles:
//! - Extracting string literals and bind arguments from host source files
//! - Parsing SQL candidates using sqlparser-rs
//! - Resolving CTEs, aliases and subquery scopes into column usages
//! - Scanning a source tree in parallel
//! - Inferring expected column types from observed values

pub mod literals;
pub mod parser;
pub mod statement;
pub mod extractor;
pub mod scanner;
pub mod inference;

pub use literals::{extract_literals, CallArguments, HostLanguage, HostLiteral};
pub use parser::{SqlParser, ParsedSql, ParseError};
pub use statement::{AccessMode, ColumnUsage, Comparison, SqlStatement, StatementKind, ValueContext};
pub use extractor::{extract, ExtractedStatement};
pub use scanner::{FileScan, ScanError, ScanOutput, SourceScanner};
pub use inference::{InferredColumn, InferredSchema, InferredTable, TypeInferencer};
