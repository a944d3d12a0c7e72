//! Fix synthesis: issue to corrective DDL
//!
//! Names are validated into [`Identifier`]s before any statement is built.
//! Every statement the synthesizer produces is additive and replayable
//! except `ALTER COLUMN ... TYPE`, which is only ever applied by hand.

use chrono::{DateTime, Utc};
use schemaheal_core::{
    index_name, ColumnDefinition, DdlStatement, Fix, Identifier, IdentifierError, Issue, IssueType, LogicalType,
};

/// Surrogate key name for new tables
const ID_COLUMN: &str = "id";

/// Why an issue could not be turned into DDL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid identifier: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("{issue_type} issue for '{table}' has no column")]
    MissingColumn { issue_type: IssueType, table: String },

    #[error("type mismatch on '{target}' has no proposed type")]
    MissingType { target: String },
}

/// Builds fixes for issues
#[derive(Debug, Clone, Copy, Default)]
pub struct FixSynthesizer;

impl FixSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize the fix for `issue`
    pub fn synthesize(&self, issue: &Issue, now: DateTime<Utc>) -> Result<Fix, SynthesisError> {
        let statement = self.statement(issue)?;
        Ok(Fix::new(issue, statement, now))
    }

    /// Structured statement for `issue`
    pub fn statement(&self, issue: &Issue) -> Result<DdlStatement, SynthesisError> {
        let table = Identifier::new(issue.table.as_str())?;

        match issue.issue_type {
            IssueType::MissingTable => Ok(DdlStatement::CreateTable {
                table,
                columns: table_columns(issue)?,
            }),
            IssueType::MissingColumn => {
                let column = Identifier::new(required_column(issue)?)?;
                let data_type = column_type(issue.expected_type.as_ref());
                Ok(DdlStatement::AddColumn {
                    table,
                    column: ColumnDefinition::new(column, data_type),
                })
            }
            IssueType::TypeMismatch => {
                let column = Identifier::new(required_column(issue)?)?;
                let data_type = issue
                    .expected_type
                    .clone()
                    .filter(|ty| *ty != LogicalType::Unknown)
                    .ok_or_else(|| SynthesisError::MissingType { target: issue.target() })?;
                Ok(DdlStatement::AlterColumnType {
                    table,
                    column,
                    data_type,
                    previous: issue.actual_type.clone().unwrap_or(LogicalType::Unknown),
                })
            }
            IssueType::MissingIndex => {
                let column = Identifier::new(required_column(issue)?)?;
                Ok(DdlStatement::CreateIndex {
                    name: index_name(&table, &column)?,
                    table,
                    columns: vec![column],
                })
            }
        }
    }
}

fn required_column(issue: &Issue) -> Result<&str, SynthesisError> {
    issue.column.as_deref().ok_or_else(|| SynthesisError::MissingColumn {
        issue_type: issue.issue_type,
        table: issue.table.clone(),
    })
}

/// Unproposed and unknown types become TEXT
fn column_type(proposed: Option<&LogicalType>) -> LogicalType {
    match proposed {
        Some(LogicalType::Unknown) | None => LogicalType::String,
        Some(ty) => ty.clone(),
    }
}

/// Columns for a new table: the key first, then every column code uses
fn table_columns(issue: &Issue) -> Result<Vec<ColumnDefinition>, SynthesisError> {
    let id = Identifier::new(ID_COLUMN)?;
    let code_id = issue.expected_columns.iter().find(|c| c.name == ID_COLUMN);

    let key = match code_id.and_then(|c| c.logical_type.as_ref()) {
        Some(ty) if *ty != LogicalType::Int && *ty != LogicalType::Unknown => {
            ColumnDefinition::primary_key(id, ty.clone())
        }
        _ => ColumnDefinition::surrogate_key(id),
    };

    let mut columns = vec![key];
    for expected in issue.expected_columns.iter().filter(|c| c.name != ID_COLUMN) {
        let name = Identifier::new(expected.name.as_str())?;
        columns.push(ColumnDefinition::new(name, column_type(expected.logical_type.as_ref())));
    }
    Ok(columns)
}
