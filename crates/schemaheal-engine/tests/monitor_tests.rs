//! Integration tests for the healing pipeline
//!
//! Every test runs full cycles against the in-memory catalog, which executes
//! the synthesized DDL, so detection, fixes and re-detection are checked end
//! to end.

mod fixtures;

use fixtures::{sessions_table, users_table, Project, DEPLOYMENT_CHECK, SESSION_LOOKUPS};
use pretty_assertions::assert_eq;
use schemaheal_catalog::{CatalogAdapter, MockAdapter};
use schemaheal_core::{CycleOutcome, IssueStatus, IssueType, LogicalType, RiskClass};
use schemaheal_engine::{CycleError, IssueStore, MonitorError, MonitorState, ValidationError};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Detection and Application
// =============================================================================

#[tokio::test]
async fn test_missing_table_detected_and_applied() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);

    let report = monitor.run_cycle().await.unwrap();
    assert_eq!(report.summary.missing_tables, 1);
    let status = monitor.status();
    assert_eq!(status.state, MonitorState::Idle);
    assert_eq!(status.last_outcome, Some(CycleOutcome::IssuesFound));

    let issues = monitor.issues(false);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue.issue_type, IssueType::MissingTable);
    assert_eq!(issues[0].issue.table, "deployment_test");
    assert_eq!(issues[0].issue.risk_class, RiskClass::Additive);
    let preview = issues[0].suggested_fix_preview.clone().unwrap();
    assert!(preview.starts_with("CREATE TABLE IF NOT EXISTS deployment_test ("));

    let execution = monitor.apply_fix(&issues[0].issue.id, false).await.unwrap();
    assert!(execution.success);
    assert!(adapter.table("deployment_test").await.is_some());

    let report = monitor.run_cycle().await.unwrap();
    assert!(report.is_healthy());
    assert!(monitor.issues(false).is_empty());
    let status = monitor.status();
    assert_eq!(status.state, MonitorState::Idle);
    assert_eq!(status.last_outcome, Some(CycleOutcome::Healthy));

    let all = monitor.issues(true);
    assert_eq!(all.len(), 1);
    assert!(all[0].issue.resolved_at.is_some());
    assert_eq!(all[0].suggested_fix_preview, None);
}

#[tokio::test]
async fn test_auto_apply_heals_additive_drift() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK).auto_apply();
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);

    let report = monitor.run_cycle().await.unwrap();
    assert_eq!(report.executions.len(), 1);
    assert!(report.executions[0].success);
    assert!(report.is_healthy());

    let report = monitor.run_cycle().await.unwrap();
    assert!(report.executions.is_empty());
    assert_eq!(monitor.status().issue_count, 0);
    assert_eq!(monitor.executions().unwrap().len(), 1);
}

#[tokio::test]
async fn test_type_mismatch_waits_for_approval() {
    let project = Project::new().with_source("sessions.py", SESSION_LOOKUPS).auto_apply();
    let adapter = MockAdapter::new();
    adapter.add_table(sessions_table()).await;
    let monitor = project.monitor(&adapter);

    let report = monitor.run_cycle().await.unwrap();
    assert!(report.executions.is_empty());

    let issues = monitor.issues(false);
    assert_eq!(issues.len(), 1);
    let issue = &issues[0].issue;
    assert_eq!(issue.issue_type, IssueType::TypeMismatch);
    assert_eq!(issue.column.as_deref(), Some("user_id"));
    assert_eq!(issue.expected.as_deref(), Some("INTEGER"));
    assert_eq!(issue.actual.as_deref(), Some("TEXT"));
    assert_eq!(issue.risk_class, RiskClass::Destructive);
    assert_eq!(issue.status, IssueStatus::Pending);
    assert_eq!(issues[0].evidence_count, 2);

    let err = monitor.apply_fix(&issue.id, false).await.unwrap_err();
    assert!(matches!(err, MonitorError::Validation(ValidationError::ApprovalRequired)));
    assert_eq!(monitor.issues(false)[0].issue.status, IssueStatus::Pending);

    let execution = monitor.apply_fix(&issue.id, true).await.unwrap();
    assert!(execution.success);
    let sessions = adapter.table("sessions").await.unwrap();
    assert_eq!(sessions.find_column("user_id").unwrap().logical_type, LogicalType::Int);

    monitor.run_cycle().await.unwrap();
    assert!(monitor.issues(false).is_empty());
}

#[tokio::test]
async fn test_preview_executes_nothing() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);
    monitor.run_cycle().await.unwrap();

    let id = monitor.issues(false)[0].issue.id.clone();
    let fix = monitor.preview_fix(&id).unwrap();

    assert!(fix.ddl.starts_with("CREATE TABLE IF NOT EXISTS deployment_test"));
    assert_eq!(fix.preview, fix.ddl);
    assert_eq!(monitor.issues(false)[0].suggested_fix_preview.as_deref(), Some(fix.ddl.as_str()));
    assert!(adapter.executions().await.is_empty());
    assert!(matches!(
        monitor.preview_fix("iss_unknown"),
        Err(MonitorError::IssueNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_identifier_is_rejected_before_synthesis() {
    let project = Project::new().with_source(
        "legacy.py",
        r#"
def items(cur):
    cur.execute('SELECT * FROM "order-items"')
"#,
    );
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);
    monitor.run_cycle().await.unwrap();

    let issues = monitor.issues(false);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue.status, IssueStatus::Rejected);
    assert!(issues[0].issue.rejection_reason.as_deref().unwrap().contains("identifier"));
    assert_eq!(issues[0].suggested_fix_preview, None);

    assert!(monitor.apply_fix(&issues[0].issue.id, true).await.is_err());
    assert!(adapter.executions().await.is_empty());
}

// =============================================================================
// Safety Properties
// =============================================================================

#[tokio::test]
async fn test_fix_ddl_is_idempotent() {
    let project = Project::new().with_source(
        "accounts.py",
        r#"
def touch(cur, user_id):
    cur.execute("UPDATE users SET last_login = NOW() WHERE id = %s", (int(user_id),))
"#,
    );
    let adapter = MockAdapter::new();
    adapter.add_table(users_table()).await;
    let monitor = project.monitor(&adapter);
    monitor.run_cycle().await.unwrap();

    let id = monitor.issues(false)[0].issue.id.clone();
    let fix = monitor.preview_fix(&id).unwrap();
    assert_eq!(fix.ddl, "ALTER TABLE users ADD COLUMN IF NOT EXISTS last_login TEXT");

    adapter.execute_ddl(&[fix.ddl.clone()], Duration::from_secs(5)).await.unwrap();
    let once = adapter.table("users").await.unwrap();
    adapter.execute_ddl(&[fix.ddl.clone()], Duration::from_secs(5)).await.unwrap();
    let twice = adapter.table("users").await.unwrap();

    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_failed_apply_leaves_table_unchanged() {
    let project = Project::new().with_source(
        "accounts.py",
        r#"
def touch(cur, user_id):
    cur.execute("UPDATE users SET last_login = NOW() WHERE id = %s", (int(user_id),))
"#,
    );
    let adapter = MockAdapter::new();
    adapter.add_table(users_table()).await;
    let monitor = project.monitor(&adapter);
    monitor.run_cycle().await.unwrap();
    let before = monitor.snapshot().unwrap();

    adapter.fail_statements_matching("last_login").await;
    let id = monitor.issues(false)[0].issue.id.clone();
    let execution = monitor.apply_fix(&id, false).await.unwrap();

    assert!(!execution.success);
    assert!(execution.error_message.is_some());

    let issue = monitor.issues(false).into_iter().find(|v| v.issue.id == id).unwrap().issue;
    assert_eq!(issue.status, IssueStatus::Pending);
    assert!(issue.last_error.is_some());

    adapter.clear_errors().await;
    monitor.run_cycle().await.unwrap();
    let after = monitor.snapshot().unwrap();
    assert_eq!(before.table("users"), after.table("users"));
    assert_eq!(monitor.executions().unwrap().len(), 1);
}

// =============================================================================
// Scheduling and Failure Handling
// =============================================================================

#[tokio::test]
async fn test_failures_pause_and_keep_snapshot() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);

    monitor.run_cycle().await.unwrap();
    let good = monitor.snapshot().unwrap();
    let issues_before = monitor.issues(true);

    adapter.set_available(false);
    for attempt in 1..=3 {
        let err = monitor.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Introspection(_)));
        assert_eq!(monitor.consecutive_failures(), attempt);
    }

    let status = monitor.status();
    assert!(status.paused);
    assert!(status.last_error.is_some());
    assert_eq!(status.state, MonitorState::Idle);
    assert_eq!(status.last_outcome, Some(CycleOutcome::IssuesFound));
    assert!(Arc::ptr_eq(&good, &monitor.snapshot().unwrap()));
    assert_eq!(monitor.issues(true), issues_before);
    assert!(matches!(monitor.trigger_scan(), Err(MonitorError::Paused(3))));

    adapter.set_available(true);
    monitor.resume();
    assert!(!monitor.is_paused());
    assert_eq!(monitor.consecutive_failures(), 0);
    monitor.run_cycle().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_backs_off_then_pauses() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    adapter.set_available(false);
    let monitor = project.monitor(&adapter);

    let runner = monitor.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    for _ in 0..120 {
        if monitor.is_paused() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert!(monitor.is_paused());
    assert_eq!(monitor.consecutive_failures(), 3);

    monitor.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scan_request_joins_running_cycle() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new().with_latency(50);
    let monitor = project.monitor(&adapter);

    let first = monitor.trigger_scan().unwrap();
    let second = monitor.trigger_scan().unwrap();

    assert!(!first.already_running);
    assert!(second.already_running);
    assert_eq!(first.cycle_id, second.cycle_id);
    assert!(matches!(
        monitor.run_cycle().await,
        Err(CycleError::AlreadyRunning(id)) if id == first.cycle_id
    ));

    for _ in 0..100 {
        if monitor.status().last_cycle_id.as_deref() == Some(first.cycle_id.as_str()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(monitor.status().last_cycle_id, Some(first.cycle_id));
}

#[tokio::test]
async fn test_failed_scan_request_is_recorded() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    adapter.set_available(false);
    let monitor = project.monitor(&adapter);

    let ticket = monitor.trigger_scan().unwrap();
    assert!(!ticket.already_running);

    for _ in 0..100 {
        if monitor.consecutive_failures() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let status = monitor.status();
    assert_eq!(monitor.consecutive_failures(), 1);
    assert!(status.last_error.is_some());
    assert_eq!(status.state, MonitorState::Idle);
    assert_eq!(status.last_outcome, None);
    assert!(monitor.issues(true).is_empty());
}

#[tokio::test]
async fn test_auto_apply_toggle() {
    let project = Project::new().with_source("health.py", DEPLOYMENT_CHECK);
    let adapter = MockAdapter::new();
    let monitor = project.monitor(&adapter);

    assert!(!monitor.status().auto_apply_enabled);
    assert!(monitor.set_auto_apply(true));

    let report = monitor.run_cycle().await.unwrap();
    assert_eq!(report.executions.len(), 1);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_issues_survive_restart() {
    let project = Project::new().with_source("sessions.py", SESSION_LOOKUPS);
    let adapter = MockAdapter::new();
    adapter.add_table(sessions_table()).await;

    let monitor = project.persistent_monitor(&adapter);
    monitor.run_cycle().await.unwrap();
    let id = monitor.issues(false)[0].issue.id.clone();
    monitor.apply_fix(&id, true).await.unwrap();
    drop(monitor);

    let store = project.file_store();
    let persisted = store.load_issues().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].status, IssueStatus::Applied);
    assert_eq!(store.load_executions().unwrap().len(), 1);

    let restarted = project.persistent_monitor(&adapter);
    assert_eq!(restarted.status().state, MonitorState::Idle);
    assert!(restarted.issues(false).is_empty());
    assert_eq!(restarted.issues(true).len(), 1);
    assert_eq!(restarted.executions().unwrap().len(), 1);
}
