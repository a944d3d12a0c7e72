//! Statements and column usages discovered in source code

use schemaheal_core::{Location, LogicalType};
use serde::Serialize;

/// Statement shapes the scanner understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Create,
    Alter,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
        };
        write!(f, "{}", name)
    }
}

/// How a column is touched at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Filter,
}

/// Comparison a filter applies to the column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// `=`
    Equality,
    /// `IN (...)`, `= ANY(...)`
    Membership,
    /// `<`, `>`, `BETWEEN`
    Range,
    /// `LIKE`, `ILIKE`
    Pattern,
}

impl Comparison {
    /// Whether a b-tree index on the column serves this lookup directly
    pub fn is_point_lookup(&self) -> bool {
        matches!(self, Self::Equality | Self::Membership)
    }
}

/// A value observed against a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueContext {
    /// Unquoted numeric literal, as written
    Number { text: String },

    /// Quoted string literal
    QuotedString { text: String },

    Boolean,

    Null,

    /// Bound parameter; `binding` is the host expression when resolvable
    Parameter {
        placeholder: String,
        binding: Option<String>,
    },

    /// SQL function call such as `NOW()`
    Function { name: String },

    /// Type stated by a cast or a column definition
    Declared { logical_type: LogicalType },
}

/// One use of a column at one call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnUsage {
    /// Physical table, resolved through aliases
    pub table: String,

    pub column: String,

    pub mode: AccessMode,

    pub comparison: Option<Comparison>,

    pub values: Vec<ValueContext>,
}

impl ColumnUsage {
    pub fn new(table: impl Into<String>, column: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            mode,
            comparison: None,
            values: Vec::new(),
        }
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = Some(comparison);
        self
    }

    pub fn with_values(mut self, values: Vec<ValueContext>) -> Self {
        self.values = values;
        self
    }

    /// Equality or membership filter
    pub fn is_point_filter(&self) -> bool {
        self.mode == AccessMode::Filter && self.comparison.map(|c| c.is_point_lookup()).unwrap_or(false)
    }
}

/// A SQL statement found in source code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    /// Normalized SQL text
    pub text: String,

    pub location: Location,

    pub kind: StatementKind,

    /// Table written or defined by the statement
    pub target_table: Option<String>,

    /// Every physical table referenced
    pub tables: Vec<String>,

    pub usages: Vec<ColumnUsage>,
}

impl SqlStatement {
    /// Usages of one table's columns
    pub fn usages_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ColumnUsage> + 'a {
        self.usages.iter().filter(move |u| u.table == table)
    }
}
