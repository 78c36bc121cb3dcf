// crates/northstar-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and filter validation.
// Purpose: Ensure malformed CLI inputs fail before any store access.
// Dependencies: northstar-cli main helpers
// ============================================================================

//! ## Overview
//! Validates range parsing, query construction, and store resolution.
//!
//! Security posture: CLI inputs are untrusted; malformed filters must fail
//! closed.

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

use clap::Parser;
use northstar_core::AuditEventType;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::LedgerCommand;
use super::LedgerQueryCommand;
use super::RangeArgs;
use super::StoreLocationArgs;
use super::build_query;
use super::parse_range;
use super::render_verification_text;
use super::resolve_ledger_config;
use super::tenant_context;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a query command with extra `args`.
fn parse_query(args: &[&str]) -> LedgerQueryCommand {
    let mut argv = vec!["northstar", "ledger", "query", "--store-path", "n.db", "--tenant", "t1"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("parse query args");
    match cli.command {
        Commands::Ledger {
            command: LedgerCommand::Query(command),
        } => command,
        other => panic!("unexpected command {other:?}"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests an empty range covers the whole chain.
#[test]
fn range_defaults_to_whole_chain() {
    let range = parse_range(RangeArgs {
        from_seq: None,
        to_seq: None,
    })
    .unwrap();
    assert_eq!(range.start, 1);
    assert_eq!(range.end, None);
}

/// Tests zero and inverted bounds are rejected.
#[test]
fn range_rejects_zero_and_inverted_bounds() {
    let zero = parse_range(RangeArgs {
        from_seq: Some(0),
        to_seq: None,
    });
    assert!(zero.unwrap_err().to_string().contains("invalid range"));
    let inverted = parse_range(RangeArgs {
        from_seq: Some(9),
        to_seq: Some(3),
    });
    assert!(inverted.is_err());
}

/// Tests a blank tenant fails closed.
#[test]
fn blank_tenant_is_rejected() {
    let err = tenant_context("   ").unwrap_err();
    assert!(err.to_string().contains("invalid tenant"));
}

/// Tests every query flag reaches the query.
#[test]
fn query_filters_are_applied() {
    let command = parse_query(&[
        "--actor",
        "registrar-1",
        "--entity-type",
        "student",
        "--entity-id",
        "s-9",
        "--event-type",
        "data_mutation",
        "--from-ms",
        "10",
        "--to-ms",
        "20",
    ]);
    let ctx = tenant_context("t1").unwrap();
    let query = build_query(&ctx, &command).unwrap();
    assert_eq!(query.actor_id.as_ref().map(|actor| actor.as_str()), Some("registrar-1"));
    assert_eq!(query.entity_type.as_deref(), Some("student"));
    assert_eq!(query.entity_id.as_deref(), Some("s-9"));
    assert_eq!(query.event_type, Some(AuditEventType::DataMutation));
    assert_eq!(query.from_time.map(|time| time.as_unix_millis()), Some(10));
    assert_eq!(query.to_time.map(|time| time.as_unix_millis()), Some(20));
    assert_eq!(command.limit, 100);
}

/// Tests unknown event types are rejected.
#[test]
fn unknown_event_type_is_rejected() {
    let command = parse_query(&["--event-type", "coffee_break"]);
    let ctx = tenant_context("t1").unwrap();
    let err = build_query(&ctx, &command).unwrap_err();
    assert!(err.to_string().contains("invalid event type"));
}

/// Tests an entity id without a type fails parsing.
#[test]
fn entity_id_requires_entity_type() {
    let parsed = Cli::try_parse_from([
        "northstar",
        "ledger",
        "query",
        "--tenant",
        "t1",
        "--entity-id",
        "s-9",
    ]);
    assert!(parsed.is_err());
}

/// Tests a missing store file is reported.
#[test]
fn missing_store_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let location = StoreLocationArgs {
        config: None,
        store_path: Some(dir.path().join("absent.db")),
    };
    let err = resolve_ledger_config(&location).unwrap_err();
    assert!(err.to_string().contains("store not found"));
}

/// Tests ledger commands refuse a memory store.
#[test]
fn memory_config_is_rejected_for_ledger_commands() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("northstar.toml");
    std::fs::write(&config, "[store]\ntype = \"memory\"\n").unwrap();
    let location = StoreLocationArgs {
        config: Some(config),
        store_path: None,
    };
    let err = resolve_ledger_config(&location).unwrap_err();
    assert!(err.to_string().contains("require a sqlite store"));
}

/// Tests text rendering lists violations.
#[test]
fn verification_text_lists_violations() {
    let report = northstar_core::ChainVerification {
        tenant_id: northstar_core::TenantId::new("t1"),
        valid: false,
        violations: vec![4, 7],
        records_checked: 9,
        first_sequence: Some(1),
        last_sequence: Some(9),
    };
    let text = render_verification_text(&report);
    assert!(text.contains("chain BROKEN (9 records checked)"));
    assert!(text.contains("violations at sequence: 4, 7"));
}
