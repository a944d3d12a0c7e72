//! Safety gate between synthesis and application
//!
//! Only a [`ValidatedFix`] can reach the applier, and the only way to get one
//! is through [`FixValidator::validate`].

use regex::Regex;
use schemaheal_core::{Fix, Identifier, IdentifierError, InferenceConfig, Issue, IssueType, RiskClass};
use std::sync::LazyLock;

static DENYLIST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(drop|truncate|grant|revoke)\b").ok());

/// Who is asking for the fix to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// The monitor, without a human in the loop
    Automatic,

    /// An operator explicitly approved this fix
    Manual,
}

/// Why a fix was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{issue_type} needs {required} supporting site(s), found {found}")]
    InsufficientEvidence {
        issue_type: IssueType,
        required: usize,
        found: usize,
    },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("DDL contains denied keyword '{keyword}'")]
    DeniedKeyword { keyword: String },

    #[error("destructive fix requires explicit approval")]
    ApprovalRequired,

    #[error("fix {fix_id} does not belong to issue {issue_id}")]
    IssueMismatch { fix_id: String, issue_id: String },
}

impl ValidationError {
    /// Whether the issue should be marked rejected.
    ///
    /// A missing approval only refuses the current request.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::ApprovalRequired)
    }

    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientEvidence { .. } => "insufficient_evidence",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::DeniedKeyword { .. } => "denied_keyword",
            Self::ApprovalRequired => "approval_required",
            Self::IssueMismatch { .. } => "issue_mismatch",
        }
    }
}

/// A fix that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFix {
    fix: Fix,
    safe_to_auto_apply: bool,
}

impl ValidatedFix {
    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    pub fn into_fix(self) -> Fix {
        self.fix
    }

    /// Additive and fully checked
    pub fn is_safe_to_auto_apply(&self) -> bool {
        self.safe_to_auto_apply
    }
}

/// Checks issues and fixes
#[derive(Debug, Clone)]
pub struct FixValidator {
    min_evidence: usize,
}

impl FixValidator {
    pub fn new(min_evidence: usize) -> Self {
        Self {
            min_evidence: min_evidence.max(1),
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(config.min_evidence)
    }

    /// Sites required before an issue of this type may be fixed
    pub fn required_evidence(&self, issue_type: IssueType) -> usize {
        match issue_type {
            IssueType::MissingTable | IssueType::MissingColumn => 1,
            IssueType::TypeMismatch | IssueType::MissingIndex => self.min_evidence,
        }
    }

    /// Evidence and identifier checks, run before synthesis
    pub fn screen(&self, issue: &Issue) -> Result<(), ValidationError> {
        let required = self.required_evidence(issue.issue_type);
        if issue.evidence.count < required {
            return Err(ValidationError::InsufficientEvidence {
                issue_type: issue.issue_type,
                required,
                found: issue.evidence.count,
            });
        }

        Identifier::new(issue.table.as_str())?;
        if let Some(column) = &issue.column {
            Identifier::new(column.as_str())?;
        }
        for column in &issue.expected_columns {
            Identifier::new(column.name.as_str())?;
        }

        Ok(())
    }

    /// Full validation of a synthesized fix
    pub fn validate(&self, issue: &Issue, fix: Fix, approval: Approval) -> Result<ValidatedFix, ValidationError> {
        if fix.issue_id != issue.id {
            return Err(ValidationError::IssueMismatch {
                fix_id: fix.id,
                issue_id: issue.id.clone(),
            });
        }

        self.screen(issue)?;

        for identifier in fix.statement.identifiers() {
            Identifier::new(identifier.as_str())?;
        }

        if let Some(keyword) = denied_keyword(&fix.ddl) {
            return Err(ValidationError::DeniedKeyword { keyword });
        }

        let additive = fix.risk_class == RiskClass::Additive && !fix.requires_manual_review;
        if !additive && approval != Approval::Manual {
            return Err(ValidationError::ApprovalRequired);
        }

        Ok(ValidatedFix {
            fix,
            safe_to_auto_apply: additive,
        })
    }
}

impl Default for FixValidator {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

fn denied_keyword(ddl: &str) -> Option<String> {
    let pattern = DENYLIST.as_ref()?;
    pattern.find(ddl).map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesizer::FixSynthesizer;
    use chrono::Utc;
    use schemaheal_core::{Evidence, LogicalType, Location};

    fn issue(issue_type: IssueType, table: &str, column: Option<&str>, sites: usize) -> Issue {
        let locations: Vec<Location> = (1..=sites).map(|line| Location::with_line("app.py", line)).collect();
        Issue::new(
            issue_type,
            table,
            column.map(String::from),
            Evidence::new(sites, locations, "used"),
            Utc::now(),
        )
    }

    fn fix_for(issue: &Issue) -> Fix {
        FixSynthesizer::new().synthesize(issue, Utc::now()).unwrap()
    }

    #[test]
    fn test_additive_fix_is_safe() {
        let issue = issue(IssueType::MissingTable, "deployment_test", None, 1);
        let validated = FixValidator::new(2)
            .validate(&issue, fix_for(&issue), Approval::Automatic)
            .unwrap();

        assert!(validated.is_safe_to_auto_apply());
        assert_eq!(validated.fix().table, "deployment_test");
    }

    #[test]
    fn test_evidence_thresholds() {
        let validator = FixValidator::new(2);

        assert!(validator.screen(&issue(IssueType::MissingColumn, "users", Some("email"), 1)).is_ok());
        assert_eq!(
            validator.screen(&issue(IssueType::MissingIndex, "orders", Some("user_id"), 1)),
            Err(ValidationError::InsufficientEvidence {
                issue_type: IssueType::MissingIndex,
                required: 2,
                found: 1,
            })
        );
        assert!(validator.screen(&issue(IssueType::MissingIndex, "orders", Some("user_id"), 2)).is_ok());
    }

    #[test]
    fn test_invalid_identifier_is_rejected() {
        let validator = FixValidator::new(2);
        let err = validator
            .screen(&issue(IssueType::MissingColumn, "users", Some("e-mail"), 1))
            .unwrap_err();

        assert!(matches!(err, ValidationError::InvalidIdentifier(_)));
        assert!(err.is_rejection());

        let long = "x".repeat(64);
        assert!(validator.screen(&issue(IssueType::MissingTable, &long, None, 1)).is_err());
    }

    #[test]
    fn test_denylist_matches_whole_words() {
        assert_eq!(denied_keyword("DROP TABLE users"), Some("drop".to_string()));
        assert_eq!(denied_keyword("grant select on users to app"), Some("grant".to_string()));
        assert_eq!(denied_keyword("ALTER TABLE t ADD COLUMN IF NOT EXISTS drop_date DATE"), None);
        assert_eq!(denied_keyword("CREATE INDEX IF NOT EXISTS idx_t_revoked ON t (revoked)"), None);
    }

    #[test]
    fn test_denied_keyword_in_identifier() {
        let issue = issue(IssueType::MissingColumn, "audit", Some("truncate"), 1);
        let err = FixValidator::new(2)
            .validate(&issue, fix_for(&issue), Approval::Manual)
            .unwrap_err();

        assert_eq!(err, ValidationError::DeniedKeyword { keyword: "truncate".into() });
        assert_eq!(err.code(), "denied_keyword");
    }

    #[test]
    fn test_destructive_needs_manual_approval() {
        let issue = issue(IssueType::TypeMismatch, "sessions", Some("user_id"), 2)
            .with_expected_type(Some(LogicalType::Int))
            .with_actual_type(LogicalType::String);
        let validator = FixValidator::new(2);

        let err = validator
            .validate(&issue, fix_for(&issue), Approval::Automatic)
            .unwrap_err();
        assert_eq!(err, ValidationError::ApprovalRequired);
        assert!(!err.is_rejection());

        let validated = validator.validate(&issue, fix_for(&issue), Approval::Manual).unwrap();
        assert!(!validated.is_safe_to_auto_apply());
    }

    #[test]
    fn test_fix_must_match_issue() {
        let users = issue(IssueType::MissingTable, "users", None, 1);
        let orders = issue(IssueType::MissingTable, "orders", None, 1);

        let err = FixValidator::new(2)
            .validate(&users, fix_for(&orders), Approval::Manual)
            .unwrap_err();
        assert!(matches!(err, ValidationError::IssueMismatch { .. }));
    }
}
