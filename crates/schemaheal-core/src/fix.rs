//! Synthesized fixes and their execution records

use crate::ddl::DdlStatement;
use crate::issue::{Issue, RiskClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Corrective DDL proposed for one issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Deterministic id derived from the issue id and the DDL text
    pub id: String,

    pub issue_id: String,

    pub table: String,

    /// Structured statement the DDL was rendered from
    pub statement: DdlStatement,

    /// Executable DDL text
    pub ddl: String,

    /// Dry-run preview, identical to `ddl`
    pub preview: String,

    /// Why the fix is proposed, with its evidence
    pub justification: String,

    /// Compensating statement, recorded but never executed
    pub rollback_sql: Option<String>,

    pub risk_class: RiskClass,

    pub requires_manual_review: bool,

    pub evidence_count: usize,

    pub created_at: DateTime<Utc>,
}

impl Fix {
    /// Build a fix for `issue` from a rendered statement
    pub fn new(issue: &Issue, statement: DdlStatement, now: DateTime<Utc>) -> Self {
        let ddl = statement.to_sql();
        let risk_class = if statement.is_destructive() {
            RiskClass::Destructive
        } else {
            issue.risk_class
        };

        Self {
            id: Self::fix_id(&issue.id, &ddl),
            issue_id: issue.id.clone(),
            table: issue.table.clone(),
            rollback_sql: statement.compensating().map(|c| c.into_string()),
            statement,
            preview: ddl.clone(),
            ddl,
            justification: issue.justification(),
            risk_class,
            requires_manual_review: risk_class == RiskClass::Destructive,
            evidence_count: issue.evidence.count,
            created_at: now,
        }
    }

    pub fn fix_id(issue_id: &str, ddl: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(issue_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(ddl.as_bytes());
        format!("fix_{}", &hex::encode(hasher.finalize())[..16])
    }
}

/// Audit record of one attempt to apply a fix
///
/// Exactly one record is appended per attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixExecution {
    pub id: String,
    pub fix_id: String,
    pub issue_id: String,
    pub table: String,
    pub ddl: String,
    pub applied_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub rollback_sql: Option<String>,
    pub error_message: Option<String>,
}

impl FixExecution {
    pub fn succeeded(fix: &Fix, applied_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self::record(fix, applied_at, duration_ms, None)
    }

    pub fn failed(fix: &Fix, applied_at: DateTime<Utc>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self::record(fix, applied_at, duration_ms, Some(error.into()))
    }

    fn record(fix: &Fix, applied_at: DateTime<Utc>, duration_ms: u64, error_message: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fix_id: fix.id.clone(),
            issue_id: fix.issue_id.clone(),
            table: fix.table.clone(),
            ddl: fix.ddl.clone(),
            applied_at,
            duration_ms,
            success: error_message.is_none(),
            rollback_sql: fix.rollback_sql.clone(),
            error_message,
        }
    }
}
