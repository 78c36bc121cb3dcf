// crates/northstar-cli/tests/ledger_commands.rs
// ============================================================================
// Module: CLI Ledger Command Tests
// Description: End-to-end tests for ledger verify, query, export, and config check.
// Purpose: Ensure the binary reports tampering and keeps output tenant-scoped.
// Dependencies: northstar binary, northstar-core, northstar-store-sqlite
// ============================================================================
//! ## Overview
//! Seeds a `SQLite` store through the core ledger, then drives the `northstar`
//! binary against it.
//!
//! Security posture: a broken chain must exit non-zero; tenant filters are
//! mandatory on every ledger command.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::sync::Arc;

use northstar_core::Actor;
use northstar_core::AuditEvent;
use northstar_core::AuditEventType;
use northstar_core::AuditLedger;
use northstar_core::LedgerSettings;
use northstar_core::PrincipalId;
use northstar_core::TenantContext;
use northstar_core::TenantId;
use northstar_core::Timestamp;
use northstar_core::runtime::ManualClock;
use northstar_core::runtime::NoopAlertSink;
use northstar_store_sqlite::SqliteNorthstarStore;
use northstar_store_sqlite::SqliteStoreConfig;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed seeding instant.
const NOW: Timestamp = Timestamp::from_unix_millis(1_699_956_000_000);

/// Path to the compiled `northstar` binary.
fn northstar_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_northstar"))
}

/// Runs the binary with `args`.
fn run(args: &[&str]) -> Output {
    Command::new(northstar_bin()).args(args).output().expect("run northstar")
}

/// Parses stdout as JSON.
fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

/// Appends `count` mutations for `actor` to the tenant chain.
fn seed(path: &Path, tenant: &str, actor: &str, count: usize) {
    let store = Arc::new(SqliteNorthstarStore::open(&SqliteStoreConfig::at(path)).unwrap());
    let ledger = AuditLedger::new(
        store,
        Arc::new(ManualClock::new(NOW)),
        Arc::new(NoopAlertSink),
        LedgerSettings::default(),
    );
    let ctx = TenantContext::for_tenant(TenantId::new(tenant)).unwrap();
    let actor = Actor::new(PrincipalId::new(actor), "registrar");
    for index in 0..count {
        let event = AuditEvent::by(&actor, AuditEventType::DataMutation, "student")
            .with_entity_id(format!("student-{index}"))
            .with_fingerprint(format!("sha256:{index:064x}"));
        ledger.append(&ctx, event).unwrap();
    }
}

/// Rewrites one audit row out of band.
fn tamper(path: &Path, tenant: &str, sequence: i64) {
    let connection = Connection::open(path).unwrap();
    connection.execute_batch("DROP TRIGGER audit_records_no_update;").unwrap();
    connection
        .execute(
            "UPDATE audit_records SET entity_id = 'forged' WHERE tenant_id = ?1 AND \
             sequence_number = ?2",
            rusqlite::params![tenant, sequence],
        )
        .unwrap();
}

/// Store path inside the temp dir.
fn store_arg(dir: &TempDir) -> String {
    dir.path().join("northstar.db").display().to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests an intact chain verifies successfully.
#[test]
fn verify_reports_valid_chain() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 5);

    let output = run(&["ledger", "verify", "--store-path", &db, "--tenant", "oakland"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["valid"], Value::Bool(true));
    assert_eq!(report["records_checked"], Value::from(5));
}

/// Tests a rewritten row fails verification with its sequence.
#[test]
fn verify_exits_non_zero_on_tampering() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 5);
    tamper(Path::new(&db), "oakland", 3);

    let output = run(&["ledger", "verify", "--store-path", &db, "--tenant", "oakland"]);
    assert!(!output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["valid"], Value::Bool(false));
    assert_eq!(report["violations"], serde_json::json!([3]));
}

/// Tests text output names the broken sequences.
#[test]
fn verify_text_format_names_broken_sequences() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 4);
    tamper(Path::new(&db), "oakland", 2);

    let output = run(&[
        "ledger", "verify", "--store-path", &db, "--tenant", "oakland", "--format", "text",
    ]);
    assert!(!output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("chain BROKEN"));
    assert!(text.contains("violations at sequence: 2"));
}

/// Tests queries never return another tenant's records.
#[test]
fn query_is_confined_to_the_tenant() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 3);
    seed(Path::new(&db), "berkeley", "registrar-2", 2);

    let output = run(&[
        "ledger", "query", "--store-path", &db, "--tenant", "berkeley", "--limit", "10",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let page = stdout_json(&output);
    let records = page["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record["tenant_id"] == "berkeley"));
}

/// Tests the cursor resumes after the given sequence.
#[test]
fn query_paginates_with_cursor() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 5);

    let output = run(&[
        "ledger", "query", "--store-path", &db, "--tenant", "oakland", "--limit", "2", "--after",
        "2",
    ]);
    assert!(output.status.success());
    let page = stdout_json(&output);
    let sequences: Vec<u64> = page["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["sequence_number"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![3, 4]);
    assert_eq!(page["next_after_sequence"], Value::from(4));
}

/// Tests export writes JSON lines and never overwrites.
#[test]
fn export_writes_json_lines_and_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    seed(Path::new(&db), "oakland", "registrar-1", 4);
    let out = dir.path().join("export.jsonl").display().to_string();

    let output = run(&[
        "ledger", "export", "--store-path", &db, "--tenant", "oakland", "--from-seq", "2",
        "--output", &out,
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary = stdout_json(&output);
    assert_eq!(summary["records"], Value::from(3));
    assert_eq!(summary["first_sequence"], Value::from(2));
    let contents = fs::read_to_string(&out).unwrap();
    let lines: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["sequence_number"], Value::from(4));

    let again = run(&[
        "ledger", "export", "--store-path", &db, "--tenant", "oakland", "--output", &out,
    ]);
    assert!(!again.status.success());
}

/// Tests a missing store is reported and not created.
#[test]
fn missing_store_fails_without_creating_it() {
    let dir = TempDir::new().unwrap();
    let db = store_arg(&dir);
    let output = run(&["ledger", "verify", "--store-path", &db, "--tenant", "oakland"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("store not found"));
    assert!(!Path::new(&db).exists());
}

/// Tests config check summarizes valid files and rejects invalid ones.
#[test]
fn config_check_reports_summary_and_rejects_invalid() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.toml");
    fs::write(
        &good,
        "[authz]\nsensitive_permissions = [\"grades.write\"]\n\n[alerts]\nsink = \"none\"\n",
    )
    .unwrap();
    let output = run(&["config", "check", "--config", &good.display().to_string()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary = stdout_json(&output);
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["alerts"], "none");
    assert_eq!(summary["sensitive_permissions"], Value::from(1));

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[monitor.thresholds]\ntier1 = 0.9\ntier2 = 0.5\n").unwrap();
    let output = run(&["config", "check", "--config", &bad.display().to_string()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config load failed"));
}
