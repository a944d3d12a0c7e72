//! Merging freshly detected issues into the persisted record set

use chrono::{DateTime, Utc};
use schemaheal_core::{Issue, IssueStatus};
use std::collections::{BTreeMap, BTreeSet};

/// Reconcile `detected` against `previous`, keyed by issue id.
///
/// - new issues are added as detected
/// - re-detected open issues keep their status and refresh evidence
/// - re-detected rejected issues stay rejected
/// - re-detected applied or resolved issues reopen as pending
/// - issues no longer detected are resolved
pub fn reconcile(
    previous: &BTreeMap<String, Issue>,
    detected: Vec<Issue>,
    now: DateTime<Utc>,
) -> BTreeMap<String, Issue> {
    let mut merged = previous.clone();
    let mut seen = BTreeSet::new();

    for fresh in detected {
        seen.insert(fresh.id.clone());

        let Some(existing) = merged.get_mut(&fresh.id) else {
            merged.insert(fresh.id.clone(), fresh);
            continue;
        };

        if existing.resolved_at.is_some() || existing.status == IssueStatus::Applied {
            existing.reopen(now);
            tracing::info!(issue_id = %existing.id, target = %existing.target(), "issue reopened");
        }

        existing.last_seen_at = now;
        existing.evidence = fresh.evidence;
        existing.expected = fresh.expected;
        existing.actual = fresh.actual;
        existing.expected_type = fresh.expected_type;
        existing.actual_type = fresh.actual_type;
        existing.expected_columns = fresh.expected_columns;
    }

    for issue in merged.values_mut() {
        if issue.resolved_at.is_none() && !seen.contains(&issue.id) {
            issue.resolved_at = Some(now);
            tracing::info!(issue_id = %issue.id, target = %issue.target(), "issue resolved");
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use schemaheal_core::{Evidence, IssueType, Location};

    fn issue(table: &str, count: usize, at: DateTime<Utc>) -> Issue {
        let sites: Vec<Location> = (1..=count).map(|l| Location::with_line("app.py", l)).collect();
        Issue::new(IssueType::MissingTable, table, None, Evidence::new(count, sites, "used"), at)
    }

    fn keyed(issues: Vec<Issue>) -> BTreeMap<String, Issue> {
        issues.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    #[test]
    fn test_redetection_refreshes_evidence() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let previous = keyed(vec![issue("audit_log", 1, t0)]);

        let merged = reconcile(&previous, vec![issue("audit_log", 3, t1)], t1);
        let issue = merged.values().next().unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(issue.detected_at, t0);
        assert_eq!(issue.last_seen_at, t1);
        assert_eq!(issue.evidence.count, 3);
        assert_eq!(issue.status, IssueStatus::Pending);
    }

    #[test]
    fn test_rejected_stays_rejected() {
        let t0 = Utc::now();
        let mut rejected = issue("audit_log", 1, t0);
        rejected.mark_rejected("denied keyword");

        let merged = reconcile(&keyed(vec![rejected]), vec![issue("audit_log", 1, t0)], t0);
        let issue = merged.values().next().unwrap();
        assert_eq!(issue.status, IssueStatus::Rejected);
        assert_eq!(issue.rejection_reason.as_deref(), Some("denied keyword"));
    }

    #[test]
    fn test_applied_issue_reopens() {
        let t0 = Utc::now();
        let mut applied = issue("audit_log", 1, t0);
        applied.mark_applied();

        let merged = reconcile(&keyed(vec![applied]), vec![issue("audit_log", 1, t0)], t0);
        let issue = merged.values().next().unwrap();
        assert_eq!(issue.status, IssueStatus::Pending);
        assert!(issue.is_open());
    }

    #[test]
    fn test_undetected_issue_resolves() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let previous = keyed(vec![issue("audit_log", 1, t0), issue("sessions", 1, t0)]);

        let merged = reconcile(&previous, vec![issue("sessions", 1, t1)], t1);

        let resolved: Vec<&Issue> = merged.values().filter(|i| i.resolved_at.is_some()).collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].table, "audit_log");
        assert_eq!(resolved[0].resolved_at, Some(t1));

        let again = reconcile(&merged, vec![issue("audit_log", 1, t1)], t1);
        assert!(again.values().all(|i| i.table != "audit_log" || i.is_open()));
    }
}
