//! Structured DDL
//!
//! Corrective DDL is composed from [`DdlStatement`] values and rendered to
//! text only at the end, so every embedded name has already passed through
//! [`Identifier`] validation. Additive forms carry `IF NOT EXISTS` and are
//! safe to replay.

use crate::identifier::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN};
use crate::types::LogicalType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A column in a CREATE TABLE statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: Identifier,
    pub data_type: LogicalType,
    pub nullable: bool,
    pub primary_key: bool,

    /// Rendered as BIGSERIAL instead of the logical type
    pub auto_increment: bool,
}

impl ColumnDefinition {
    /// A nullable column
    pub fn new(name: Identifier, data_type: LogicalType) -> Self {
        Self {
            name,
            data_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// `BIGSERIAL PRIMARY KEY` surrogate key
    pub fn surrogate_key(name: Identifier) -> Self {
        Self {
            name,
            data_type: LogicalType::Int,
            nullable: false,
            primary_key: true,
            auto_increment: true,
        }
    }

    /// Primary key of an explicit type
    pub fn primary_key(name: Identifier, data_type: LogicalType) -> Self {
        Self {
            name,
            data_type,
            nullable: false,
            primary_key: true,
            auto_increment: false,
        }
    }

    fn render(&self) -> String {
        let data_type = if self.auto_increment {
            "BIGSERIAL".to_string()
        } else {
            self.data_type.to_postgres_ddl()
        };

        let mut out = format!("{} {}", self.name.to_sql(), data_type);
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            out.push_str(" NOT NULL");
        }
        out
    }
}

/// One corrective DDL statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DdlStatement {
    CreateTable {
        table: Identifier,
        columns: Vec<ColumnDefinition>,
    },

    AddColumn {
        table: Identifier,
        column: ColumnDefinition,
    },

    CreateIndex {
        name: Identifier,
        table: Identifier,
        columns: Vec<Identifier>,
    },

    AlterColumnType {
        table: Identifier,
        column: Identifier,
        data_type: LogicalType,

        /// Type before the change, used for the compensating statement
        previous: LogicalType,
    },
}

impl DdlStatement {
    /// Table the statement touches
    pub fn table(&self) -> &Identifier {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::AlterColumnType { table, .. } => table,
        }
    }

    /// Every identifier embedded in the rendered statement
    pub fn identifiers(&self) -> Vec<&Identifier> {
        match self {
            Self::CreateTable { table, columns } => std::iter::once(table)
                .chain(columns.iter().map(|c| &c.name))
                .collect(),
            Self::AddColumn { table, column } => vec![table, &column.name],
            Self::CreateIndex { name, table, columns } => {
                std::iter::once(name).chain(std::iter::once(table)).chain(columns.iter()).collect()
            }
            Self::AlterColumnType { table, column, .. } => vec![table, column],
        }
    }

    /// Whether the statement alters existing data
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::AlterColumnType { .. })
    }

    /// Render as a single executable statement without a trailing semicolon
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable { table, columns } => {
                let columns: Vec<String> = columns.iter().map(ColumnDefinition::render).collect();
                format!("CREATE TABLE IF NOT EXISTS {} ({})", table.to_sql(), columns.join(", "))
            }
            Self::AddColumn { table, column } => {
                format!(
                    "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                    table.to_sql(),
                    column.render()
                )
            }
            Self::CreateIndex { name, table, columns } => {
                let columns: Vec<String> = columns.iter().map(Identifier::to_sql).collect();
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    name.to_sql(),
                    table.to_sql(),
                    columns.join(", ")
                )
            }
            Self::AlterColumnType { table, column, data_type, .. } => {
                let ty = data_type.to_postgres_ddl();
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                    table.to_sql(),
                    column.to_sql(),
                    ty,
                    column.to_sql(),
                    ty
                )
            }
        }
    }

    /// Statement that undoes this one
    pub fn compensating(&self) -> Option<CompensatingDdl> {
        let sql = match self {
            Self::CreateTable { table, .. } => format!("DROP TABLE IF EXISTS {}", table.to_sql()),
            Self::AddColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
                table.to_sql(),
                column.name.to_sql()
            ),
            Self::CreateIndex { name, .. } => format!("DROP INDEX IF EXISTS {}", name.to_sql()),
            Self::AlterColumnType { table, column, previous, .. } => {
                if matches!(previous, LogicalType::Unknown) {
                    return None;
                }
                let ty = previous.to_postgres_ddl();
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                    table.to_sql(),
                    column.to_sql(),
                    ty,
                    column.to_sql(),
                    ty
                )
            }
        };
        Some(CompensatingDdl(sql))
    }
}

impl std::fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Rollback text for an applied fix
///
/// Recorded for operators only. It is never executed automatically, which is
/// why it is not a [`DdlStatement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompensatingDdl(String);

impl CompensatingDdl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CompensatingDdl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conventional index name `idx_{table}_{column}`.
///
/// Names past the identifier limit are cut and suffixed with a short hash so
/// distinct columns never collide.
pub fn index_name(table: &Identifier, column: &Identifier) -> Result<Identifier, IdentifierError> {
    let name = format!("idx_{}_{}", table.as_str(), column.as_str());
    if name.len() <= MAX_IDENTIFIER_LEN {
        return Identifier::new(name);
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let suffix = &digest[..8];
    let keep = MAX_IDENTIFIER_LEN - suffix.len() - 1;
    Identifier::new(format!("{}_{}", &name[..keep], suffix))
}
