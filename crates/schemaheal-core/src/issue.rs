//! Detected drift between code and database
//!
//! IMPORTANT: issue type codes and issue ids are persisted in `issues.json`.
//! Renaming a code or changing the id derivation orphans every stored issue.

use crate::location::Location;
use crate::types::LogicalType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum number of sample sites kept on an issue
pub const MAX_EVIDENCE_SITES: usize = 5;

/// Kind of drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Code references a table the database does not have
    MissingTable,

    /// Code references a column an existing table does not have
    MissingColumn,

    /// Code uses a column as a more specific type than it is declared with
    TypeMismatch,

    /// Code filters on a column by equality with no supporting index
    MissingIndex,
}

impl IssueType {
    /// Stable string code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTable => "MISSING_TABLE",
            Self::MissingColumn => "MISSING_COLUMN",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::MissingIndex => "MISSING_INDEX",
        }
    }

    /// Risk of the corrective change for this kind of drift
    pub fn risk_class(&self) -> RiskClass {
        match self {
            Self::TypeMismatch => RiskClass::Destructive,
            Self::MissingTable | Self::MissingColumn | Self::MissingIndex => RiskClass::Additive,
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk of applying the corrective DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskClass {
    /// Only creates tables, columns or indexes
    Additive,

    /// Alters existing structures and may lose data
    Destructive,
}

impl std::fmt::Display for RiskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Additive => write!(f, "ADDITIVE"),
            Self::Destructive => write!(f, "DESTRUCTIVE"),
        }
    }
}

/// Lifecycle status of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Pending,
    Approved,
    Applied,
    Rejected,
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Applied => write!(f, "applied"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Usage evidence backing an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Number of independent call sites
    pub count: usize,

    /// Sample of the call sites (at most [`MAX_EVIDENCE_SITES`])
    pub sites: Vec<Location>,

    /// One-line human-readable summary
    pub summary: String,
}

impl Evidence {
    pub fn new(count: usize, sites: impl IntoIterator<Item = Location>, summary: impl Into<String>) -> Self {
        Self {
            count,
            sites: sites.into_iter().take(MAX_EVIDENCE_SITES).collect(),
            summary: summary.into(),
        }
    }
}

/// A column the code expects on a missing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedColumn {
    pub name: String,

    /// Proposed type, or `None` when evidence is too weak to propose one
    pub logical_type: Option<LogicalType>,
}

/// One detected instance of drift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Deterministic id derived from (type, table, column)
    pub id: String,

    #[serde(rename = "type")]
    pub issue_type: IssueType,

    pub table: String,

    pub column: Option<String>,

    /// First detection
    pub detected_at: DateTime<Utc>,

    /// Most recent cycle that re-detected the issue
    pub last_seen_at: DateTime<Utc>,

    /// Set when a cycle no longer detects the issue
    pub resolved_at: Option<DateTime<Utc>>,

    pub evidence: Evidence,

    /// Expected value for display (e.g. "INTEGER")
    pub expected: Option<String>,

    /// Actual value for display (e.g. "TEXT")
    pub actual: Option<String>,

    /// Proposed type for column-level issues
    #[serde(default)]
    pub expected_type: Option<LogicalType>,

    /// Live type for TYPE_MISMATCH
    #[serde(default)]
    pub actual_type: Option<LogicalType>,

    /// Columns to create for MISSING_TABLE
    #[serde(default)]
    pub expected_columns: Vec<ExpectedColumn>,

    pub risk_class: RiskClass,

    pub status: IssueStatus,

    pub rejection_reason: Option<String>,

    /// Error from the most recent failed apply
    pub last_error: Option<String>,
}

impl Issue {
    /// Create a pending issue
    pub fn new(
        issue_type: IssueType,
        table: impl Into<String>,
        column: Option<String>,
        evidence: Evidence,
        now: DateTime<Utc>,
    ) -> Self {
        let table = table.into();
        Self {
            id: Self::issue_id(issue_type, &table, column.as_deref()),
            issue_type,
            table,
            column,
            detected_at: now,
            last_seen_at: now,
            resolved_at: None,
            evidence,
            expected: None,
            actual: None,
            expected_type: None,
            actual_type: None,
            expected_columns: Vec::new(),
            risk_class: issue_type.risk_class(),
            status: IssueStatus::Pending,
            rejection_reason: None,
            last_error: None,
        }
    }

    /// Deterministic id so re-detection reconciles to the same issue
    pub fn issue_id(issue_type: IssueType, table: &str, column: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(issue_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(table.as_bytes());
        hasher.update([0u8]);
        hasher.update(column.unwrap_or("").as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("iss_{}", &digest[..16])
    }

    /// Set expected/actual display values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Set the proposed type for a column-level issue
    pub fn with_expected_type(mut self, logical_type: Option<LogicalType>) -> Self {
        self.expected_type = logical_type;
        self
    }

    /// Set the live type for a type mismatch
    pub fn with_actual_type(mut self, logical_type: LogicalType) -> Self {
        self.actual_type = Some(logical_type);
        self
    }

    /// Set the columns a missing table should be created with
    pub fn with_expected_columns(mut self, columns: Vec<ExpectedColumn>) -> Self {
        self.expected_columns = columns;
        self
    }

    /// Open issues are unresolved and not yet applied
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none() && self.status != IssueStatus::Applied
    }

    /// `table` or `table.column`
    pub fn target(&self) -> String {
        match &self.column {
            Some(column) => format!("{}.{}", self.table, column),
            None => self.table.clone(),
        }
    }

    /// Human-readable justification
    pub fn justification(&self) -> String {
        let comparison = match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => format!(" (expected {}, found {})", expected, actual),
            (Some(expected), None) => format!(" (expected {})", expected),
            _ => String::new(),
        };

        let headline = match self.issue_type {
            IssueType::MissingTable => format!("Table '{}' is referenced in code but does not exist", self.table),
            IssueType::MissingColumn => format!("Column '{}' is used in code but does not exist", self.target()),
            IssueType::TypeMismatch => format!("Column '{}' is used as a more specific type than declared", self.target()),
            IssueType::MissingIndex => format!("Column '{}' is filtered by equality without an index", self.target()),
        };

        let sites = if self.evidence.sites.is_empty() {
            String::new()
        } else {
            let sample: Vec<String> = self.evidence.sites.iter().map(|s| s.to_string()).collect();
            format!("; e.g. {}", sample.join(", "))
        };

        format!(
            "{}{}. Evidence: {} call site(s){}",
            headline, comparison, self.evidence.count, sites
        )
    }

    pub fn mark_rejected(&mut self, reason: impl Into<String>) {
        self.status = IssueStatus::Rejected;
        self.rejection_reason = Some(reason.into());
    }

    pub fn mark_applied(&mut self) {
        self.status = IssueStatus::Applied;
        self.last_error = None;
    }

    /// Return to pending after a failed apply
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = IssueStatus::Pending;
        self.last_error = Some(error.into());
    }

    /// Reopen a resolved or applied issue that was detected again
    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = IssueStatus::Pending;
        self.resolved_at = None;
        self.rejection_reason = None;
        self.last_seen_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence() -> Evidence {
        Evidence::new(
            2,
            vec![Location::with_line("app/sessions.py", 10), Location::with_line("app/sessions.py", 20)],
            "bound as integer",
        )
    }

    #[test]
    fn issue_code_stability() {
        assert_eq!(IssueType::MissingTable.as_str(), "MISSING_TABLE");
        assert_eq!(IssueType::TypeMismatch.as_str(), "TYPE_MISMATCH");
        let json = serde_json::to_string(&IssueType::MissingIndex).unwrap();
        assert_eq!(json, "\"MISSING_INDEX\"");
    }

    #[test]
    fn ids_are_deterministic() {
        let a = Issue::issue_id(IssueType::MissingColumn, "users", Some("email"));
        let b = Issue::issue_id(IssueType::MissingColumn, "users", Some("email"));
        let c = Issue::issue_id(IssueType::MissingIndex, "users", Some("email"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("iss_"));
    }

    #[test]
    fn risk_follows_type() {
        let issue = Issue::new(IssueType::TypeMismatch, "sessions", Some("user_id".into()), evidence(), Utc::now());
        assert_eq!(issue.risk_class, RiskClass::Destructive);
        assert_eq!(issue.status, IssueStatus::Pending);
        assert!(issue.is_open());
    }

    #[test]
    fn justification_mentions_comparison_and_sites() {
        let issue = Issue::new(IssueType::TypeMismatch, "sessions", Some("user_id".into()), evidence(), Utc::now())
            .with_comparison("INTEGER", "TEXT");

        let text = issue.justification();
        assert!(text.contains("sessions.user_id"));
        assert!(text.contains("expected INTEGER, found TEXT"));
        assert!(text.contains("app/sessions.py:10"));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut issue = Issue::new(IssueType::MissingTable, "audit_log", None, evidence(), Utc::now());
        issue.mark_applied();
        assert!(!issue.is_open());

        issue.reopen(Utc::now());
        assert_eq!(issue.status, IssueStatus::Pending);
        assert!(issue.is_open());

        issue.mark_failed("relation exists");
        assert_eq!(issue.last_error.as_deref(), Some("relation exists"));
    }

    #[test]
    fn serializes_type_field() {
        let issue = Issue::new(IssueType::MissingTable, "audit_log", None, evidence(), Utc::now());
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "MISSING_TABLE");
        assert_eq!(json["risk_class"], "ADDITIVE");
        assert_eq!(json["status"], "pending");
    }
}
