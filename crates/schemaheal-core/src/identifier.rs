//! Allow-list validated SQL identifiers
//!
//! Every table, column and index name embedded into synthesized DDL goes
//! through [`Identifier`]. Construction fails for anything outside
//! `[A-Za-z_][A-Za-z0-9_]*` or longer than PostgreSQL's identifier limit, so
//! DDL composition never sees untrusted text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// PostgreSQL truncates identifiers beyond this many bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Words that must be quoted when used as identifiers
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "both", "case", "cast",
    "check", "collate", "column", "constraint", "create", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "deferrable", "desc", "distinct", "do",
    "else", "end", "except", "false", "fetch", "for", "foreign", "from", "grant", "group",
    "having", "in", "initially", "intersect", "into", "lateral", "leading", "limit",
    "localtime", "localtimestamp", "not", "null", "offset", "on", "only", "or", "order",
    "placing", "primary", "references", "returning", "select", "session_user", "some",
    "symmetric", "table", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "when", "where", "window", "with",
];

/// Why a name was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier '{name}' is {len} characters long (limit {MAX_IDENTIFIER_LEN})")]
    TooLong { name: String, len: usize },

    #[error("identifier '{name}' contains characters outside [A-Za-z0-9_]")]
    InvalidCharacters { name: String },
}

/// A validated SQL identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate a raw name against the allow-list
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    /// The name exactly as validated
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name collides with a reserved word
    pub fn is_reserved(&self) -> bool {
        RESERVED_WORDS.contains(&self.0.to_lowercase().as_str())
    }

    /// Render for embedding in SQL.
    ///
    /// Reserved words and mixed-case names are double quoted; the allow-list
    /// guarantees the name itself contains no quote characters.
    pub fn to_sql(&self) -> String {
        if self.is_reserved() || self.0.chars().any(|c| c.is_ascii_uppercase()) {
            format!("\"{}\"", self.0)
        } else {
            self.0.clone()
        }
    }
}

/// Check a name without constructing an identifier
pub fn validate(raw: &str) -> Result<(), IdentifierError> {
    if raw.is_empty() {
        return Err(IdentifierError::Empty);
    }

    if raw.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            name: raw.to_string(),
            len: raw.len(),
        });
    }

    let matches = IDENTIFIER_PATTERN
        .as_ref()
        .map(|pattern| pattern.is_match(raw))
        .unwrap_or(false);

    if !matches {
        return Err(IdentifierError::InvalidCharacters {
            name: raw.to_string(),
        });
    }

    Ok(())
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
