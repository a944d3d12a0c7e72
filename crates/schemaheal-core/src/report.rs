//! Cycle report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::fix::FixExecution;
use crate::issue::{Issue, IssueStatus, IssueType, RiskClass};
use crate::location::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A column used with incompatible types across call sites
///
/// Conflicts are reported, never turned into fixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConflict {
    pub table: String,
    pub column: String,

    /// Distinct candidate types, rendered
    pub candidates: Vec<String>,

    /// Sample call sites
    pub sites: Vec<Location>,
}

/// Outcome of a completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Healthy,
    IssuesFound,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Open issues
    pub total: usize,

    pub missing_tables: usize,
    pub missing_columns: usize,
    pub type_mismatches: usize,
    pub missing_indexes: usize,

    pub additive: usize,
    pub destructive: usize,

    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,

    pub files_scanned: usize,
    pub statements: usize,
    pub scan_errors: usize,
}

impl ReportSummary {
    /// Count open issues
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut summary = Self::default();
        for issue in issues.into_iter().filter(|i| i.is_open()) {
            summary.total += 1;
            match issue.issue_type {
                IssueType::MissingTable => summary.missing_tables += 1,
                IssueType::MissingColumn => summary.missing_columns += 1,
                IssueType::TypeMismatch => summary.type_mismatches += 1,
                IssueType::MissingIndex => summary.missing_indexes += 1,
            }
            match issue.risk_class {
                RiskClass::Additive => summary.additive += 1,
                RiskClass::Destructive => summary.destructive += 1,
            }
            match issue.status {
                IssueStatus::Pending => summary.pending += 1,
                IssueStatus::Approved => summary.approved += 1,
                IssueStatus::Rejected => summary.rejected += 1,
                IssueStatus::Applied => {}
            }
        }
        summary
    }
}

/// Cycle report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Schema version
    pub version: ReportVersion,

    pub cycle_id: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub outcome: CycleOutcome,

    pub summary: ReportSummary,

    /// Open issues after reconciliation
    pub issues: Vec<Issue>,

    pub conflicts: Vec<TypeConflict>,

    /// Files that could not be scanned
    pub scan_errors: Vec<String>,

    /// Fixes applied automatically during the cycle
    pub executions: Vec<FixExecution>,
}

impl CycleReport {
    /// Build a report from the reconciled issue set
    pub fn new(cycle_id: impl Into<String>, started_at: DateTime<Utc>, issues: Vec<Issue>) -> Self {
        let issues: Vec<Issue> = issues.into_iter().filter(Issue::is_open).collect();
        let summary = ReportSummary::from_issues(&issues);
        let outcome = if issues.is_empty() {
            CycleOutcome::Healthy
        } else {
            CycleOutcome::IssuesFound
        };

        Self {
            version: ReportVersion::CURRENT,
            cycle_id: cycle_id.into(),
            started_at,
            finished_at: Utc::now(),
            outcome,
            summary,
            issues,
            conflicts: Vec::new(),
            scan_errors: Vec::new(),
            executions: Vec::new(),
        }
    }

    pub fn with_conflicts(mut self, conflicts: Vec<TypeConflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Record scan statistics
    pub fn with_scan_stats(mut self, files_scanned: usize, statements: usize, scan_errors: Vec<String>) -> Self {
        self.summary.files_scanned = files_scanned;
        self.summary.statements = statements;
        self.summary.scan_errors = scan_errors.len();
        self.scan_errors = scan_errors;
        self
    }

    pub fn with_executions(mut self, executions: Vec<FixExecution>) -> Self {
        self.executions = executions;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.outcome == CycleOutcome::Healthy
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
