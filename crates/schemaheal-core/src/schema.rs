//! Live catalog model
//!
//! A [`SchemaSnapshot`] is captured once per cycle and never mutated after
//! capture; the next cycle replaces it wholesale.

use crate::types::LogicalType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A column as declared in the live database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,

    /// Logical type mapped from the declared type
    pub logical_type: LogicalType,

    /// Declared type text as reported by the catalog
    pub declared_type: String,

    /// Whether NULL is allowed
    pub nullable: bool,

    /// Default expression, if any
    pub default: Option<String>,
}

impl ColumnSchema {
    /// Create a nullable column from its declared PostgreSQL type
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            logical_type: LogicalType::from_postgres(&declared_type),
            declared_type,
            nullable: true,
            default: None,
        }
    }

    /// Mark the column NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default expression
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// An index on a live table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,

    /// Indexed columns in key order
    pub columns: Vec<String>,

    pub unique: bool,

    pub primary: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            primary: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self
    }
}

/// Constraint kinds reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    /// Parse `information_schema.table_constraints.constraint_type`
    pub fn from_catalog(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "PRIMARY KEY" => Some(Self::PrimaryKey),
            "UNIQUE" => Some(Self::Unique),
            "FOREIGN KEY" => Some(Self::ForeignKey),
            "CHECK" => Some(Self::Check),
            _ => None,
        }
    }
}

/// A constraint on a live table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSchema {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
}

/// One live table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,

    /// Columns in ordinal order
    pub columns: Vec<ColumnSchema>,

    pub indexes: Vec<IndexSchema>,

    pub constraints: Vec<ConstraintSchema>,
}

impl TableSchema {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Add a column
    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an index
    pub fn with_index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a constraint
    pub fn with_constraint(mut self, constraint: ConstraintSchema) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether any index can serve an equality lookup on `column`
    /// (the column leads the index key).
    pub fn has_leading_index(&self, column: &str) -> bool {
        self.indexes
            .iter()
            .any(|index| index.columns.first().map(|c| c == column).unwrap_or(false))
    }
}

/// Point-in-time live catalog state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// When introspection finished
    pub captured_at: DateTime<Utc>,

    /// Database schema the tables were read from
    pub schema_name: String,

    /// Tables by name
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaSnapshot {
    /// Build a snapshot from a complete set of tables
    pub fn new(schema_name: impl Into<String>, tables: impl IntoIterator<Item = TableSchema>) -> Self {
        Self {
            captured_at: Utc::now(),
            schema_name: schema_name.into(),
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// A snapshot of an empty schema
    pub fn empty(schema_name: impl Into<String>) -> Self {
        Self::new(schema_name, Vec::new())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }
}
