//! SQL parsing using sqlparser-rs
//!
//! Parses extracted statement text into an AST. Parse failures carry the
//! source location so the scanner can log and skip them.

use schemaheal_core::{DialectConfig, Location};
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};

/// SQL parser with configurable dialect
///
/// Dialects are not `Send`, so scanner workers build their own parser.
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the generic dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Generic => Self::new(),
        }
    }

    /// Parse SQL text into statements
    pub fn parse(&self, sql: &str, location: Option<&Location>) -> Result<ParsedSql, ParseError> {
        match Parser::parse_sql(&*self.dialect, sql) {
            Ok(statements) => Ok(ParsedSql {
                sql: sql.to_string(),
                statements,
                location: location.cloned(),
            }),
            Err(error) => Err(ParseError {
                sql: sql.to_string(),
                error,
                location: location.cloned(),
            }),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL with AST
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Text that was parsed (after placeholder normalization)
    pub sql: String,

    /// Parsed statements
    pub statements: Vec<Statement>,

    /// Where the text came from
    pub location: Option<Location>,
}

impl ParsedSql {
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// SQL parsing error
#[derive(Debug)]
pub struct ParseError {
    /// Text that failed to parse
    pub sql: String,

    /// Parser error from sqlparser
    pub error: ParserError,

    pub location: Option<Location>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "SQL parse error at {}: {}", location, self.error),
            None => write!(f, "SQL parse error: {}", self.error),
        }
    }
}

impl std::error::Error for ParseError {}
