//! Integration tests for source scanning and inference

use schemaheal_core::{DialectConfig, Location, LogicalType, ScannerConfig};
use schemaheal_sql::{ScanError, SourceScanner, StatementKind, TypeInferencer};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const SAMPLE_APP: &str = "../../fixtures/sample-app";

fn scanner() -> SourceScanner {
    SourceScanner::new(ScannerConfig::default(), DialectConfig::Postgres)
}

#[test]
fn scan_sample_app() {
    let root = Path::new(SAMPLE_APP);
    if !root.exists() {
        return;
    }

    let output = scanner().scan(root, &CancellationToken::new()).unwrap();

    assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
    assert_eq!(output.files_scanned, 3, "node_modules must be excluded");
    assert!(output
        .statements
        .iter()
        .all(|s| !s.tables.contains(&"vendor_internal".to_string())));

    let files: Vec<&str> = output.statements.iter().map(|s| s.location.file.as_str()).collect();
    assert!(files.contains(&"app/accounts.py"));
    assert!(files.contains(&"web/orders.js"));
    assert!(files.contains(&"db/schema.sql"));

    let mut sorted = output.statements.clone();
    sorted.sort_by(|a, b| a.location.cmp(&b.location));
    assert_eq!(sorted, output.statements);

    let creates = output.statements.iter().filter(|s| s.kind == StatementKind::Create).count();
    assert_eq!(creates, 2);
}

#[test]
fn infer_sample_app() {
    let root = Path::new(SAMPLE_APP);
    if !root.exists() {
        return;
    }

    let output = scanner().scan(root, &CancellationToken::new()).unwrap();
    let schema = TypeInferencer::new(2).infer(&output.statements);

    let audit_log = schema.table("audit_log").expect("audit_log is referenced");
    assert_eq!(audit_log.sites.len(), 2);

    let user_id = audit_log.column("user_id").unwrap();
    assert_eq!(user_id.best_type, LogicalType::Int);
    assert_eq!(user_id.evidence_count, 2);

    let payload = audit_log.column("payload").unwrap();
    assert_eq!(payload.best_type, LogicalType::Json);

    let created_at = audit_log.column("created_at").unwrap();
    assert_eq!(created_at.best_type, LogicalType::Timestamp);

    let orders = schema.table("orders").unwrap();
    let order_user = orders.column("user_id").unwrap();
    assert!(order_user.filter_count() >= 2);

    let shipped_at = orders.column("shipped_at").unwrap();
    assert_eq!(shipped_at.best_type, LogicalType::Timestamp);

    let users = schema.table("users").unwrap();
    assert!(users.column("last_login").is_some());
    assert!(schema.conflicts().is_empty());
}

#[test]
fn scan_temp_tree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/repo.rs"),
        r#####"
fn load(conn: &Client, id: i64) {
    conn.query(r#"SELECT name FROM "Widgets" WHERE id = $1"#, &[&id]);
}
"#####,
    )
    .unwrap();
    std::fs::write(dir.path().join("README.md"), "SELECT * FROM ignored").unwrap();

    let output = scanner().scan(dir.path(), &CancellationToken::new()).unwrap();

    assert_eq!(output.files_scanned, 1);
    assert_eq!(output.statements.len(), 1);
    assert_eq!(output.statements[0].tables, vec!["Widgets".to_string()]);
    assert_eq!(output.statements[0].location, Location::with_line("src/repo.rs", 3));
}

#[test]
fn oversized_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("big.sql"), "SELECT 1 FROM t;\n".repeat(100)).unwrap();
    std::fs::write(dir.path().join("small.sql"), "SELECT id FROM t;").unwrap();

    let config = ScannerConfig {
        max_file_size: 64,
        ..Default::default()
    };
    let output = SourceScanner::new(config, DialectConfig::Postgres)
        .scan(dir.path(), &CancellationToken::new())
        .unwrap();

    assert_eq!(output.files_scanned, 1);
    assert!(matches!(&output.errors[..], [ScanError::TooLarge { path, .. }] if path == "big.sql"));
}

#[test]
fn cancelled_scan_stops() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("q.sql"), "SELECT id FROM t;").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(scanner().scan(dir.path(), &cancel).unwrap_err(), ScanError::Cancelled);
}

#[test]
fn missing_root_is_an_error() {
    let result = scanner().scan(Path::new("/definitely/not/here"), &CancellationToken::new());
    assert!(matches!(result, Err(ScanError::MissingRoot(_))));
}
