// crates/northstar-core/tests/monitor_task.rs
// ============================================================================
// Module: Monitor Task Integration Tests
// Description: Periodic monitor loop, shutdown drain, and automated suspension.
// ============================================================================

//! ## Overview
//! Runs the monitor loop on a tokio runtime and checks that shutdown drains
//! queued signals and that a Tier 2 escalation revokes the principal's
//! bindings so later authorization checks deny.

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

mod common;

use std::sync::Arc;

use common::Harness;
use common::ctx;
use common::perm;
use common::principal;
use northstar_core::AlertKind;
use northstar_core::AuditEventType;
use northstar_core::AuditQuery;
use northstar_core::AuthzSettings;
use northstar_core::BindingStatus;
use northstar_core::DecisionReason;
use northstar_core::PageRequest;
use northstar_core::RiskTier;
use northstar_core::Scope;
use northstar_core::ScopeKind;
use northstar_core::SecurityEvent;
use northstar_core::SecurityEventKind;
use northstar_core::TenantId;
use northstar_core::runtime::MonitorSettings;
use northstar_core::runtime::RiskWeights;
use northstar_core::runtime::spawn_monitor_task;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn fast_login_settings() -> MonitorSettings {
    MonitorSettings {
        interval_ms: 10,
        weights: RiskWeights {
            failed_logins: 1.0,
            authorization_failures: 0.0,
            isolation_violations: 0.0,
            off_hours_access: 0.0,
            source_addresses: 0.0,
            recency: 0.0,
        },
        ..MonitorSettings::default()
    }
}

fn failed_login(who: &str) -> SecurityEvent {
    SecurityEvent::new(
        TenantId::new("oakland"),
        principal(who),
        SecurityEventKind::FailedLogin,
        common::NOW,
    )
    .from_address("10.0.0.7")
}

// ============================================================================
// SECTION: Loop Lifecycle
// ============================================================================

/// Tests that an idle loop stops cleanly.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_loop_shuts_down_cleanly() {
    let harness = Harness::with_settings(AuthzSettings::default(), fast_login_settings());
    let task = spawn_monitor_task(Arc::clone(&harness.monitor));
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(task.shutdown().await.unwrap(), 0);
}

/// Tests that shutdown drains signals still queued.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_queued_signals() {
    let harness = Harness::with_settings(AuthzSettings::default(), fast_login_settings());
    let task = spawn_monitor_task(Arc::clone(&harness.monitor));
    for _ in 0..3 {
        harness.monitor.record_event(failed_login("student-4")).unwrap();
    }
    task.shutdown().await.unwrap();
    assert_eq!(harness.monitor.queue_depth(), 0);
    let metrics =
        harness.monitor.get_metrics(&ctx("oakland"), &principal("student-4")).unwrap().unwrap();
    assert_eq!(metrics.failed_login_count, 3);
}

// ============================================================================
// SECTION: Automated Suspension
// ============================================================================

/// Tests that a Tier 2 escalation revokes bindings and later checks deny.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tier_two_escalation_suspends_principal() {
    let harness = Harness::with_settings(AuthzSettings::default(), fast_login_settings());
    let tenant = ctx("oakland");
    harness.define_role(&tenant, "teacher", &["students.view"], &[ScopeKind::Class]);
    harness.grant(&tenant, "teacher-1", "teacher", Scope::class("c1"));
    harness.grant(&tenant, "teacher-1", "teacher", Scope::class("c2"));
    let target = Scope::class("c1");
    assert!(
        harness.engine.evaluate(&tenant, &principal("teacher-1"), &perm("students.view"), Some(&target)).allowed
    );

    let task = spawn_monitor_task(Arc::clone(&harness.monitor));
    for _ in 0..7 {
        harness.monitor.record_event(failed_login("teacher-1")).unwrap();
    }
    task.shutdown().await.unwrap();

    let metrics = harness.monitor.get_metrics(&tenant, &principal("teacher-1")).unwrap().unwrap();
    assert_eq!(metrics.tier, RiskTier::Tier2);
    let bindings = harness.bindings.list_for_principal(&tenant, &principal("teacher-1")).unwrap();
    assert_eq!(bindings.len(), 2);
    assert!(bindings.iter().all(|binding| binding.status == BindingStatus::Revoked));

    let decision =
        harness.engine.evaluate(&tenant, &principal("teacher-1"), &perm("students.view"), Some(&target));
    assert!(!decision.allowed);
    assert_eq!(decision.reason, DecisionReason::Revoked);

    assert!(harness.alerts.alerts().iter().any(|alert| alert.kind == AlertKind::PrincipalSuspended));
    let transitions = harness
        .ledger
        .query(
            &AuditQuery::for_tenant(&tenant).event_type(AuditEventType::SecurityTierChanged),
            PageRequest::first(10),
        )
        .unwrap();
    assert!(!transitions.records.is_empty());
}

// ============================================================================
// SECTION: Default Tier Policy
// ============================================================================

/// Tests that repeated denials under default settings suspend the principal.
#[test]
fn repeated_authorization_denials_suspend_with_default_settings() {
    let harness = Harness::new();
    let tenant = ctx("oakland");
    harness.define_role(&tenant, "teacher", &["students.view"], &[ScopeKind::Class]);
    harness.grant(&tenant, "teacher-9", "teacher", Scope::class("c1"));
    let foreign_class = Scope::class("c2");
    for _ in 0..10 {
        let decision = harness.engine.authorize(
            &tenant,
            &principal("teacher-9"),
            &perm("students.view"),
            Some(&foreign_class),
        );
        assert!(!decision.allowed);
    }
    harness.monitor.process_pending().unwrap();

    let metrics = harness.monitor.get_metrics(&tenant, &principal("teacher-9")).unwrap().unwrap();
    assert_eq!(metrics.authorization_failure_count, 10);
    assert_eq!(metrics.tier, RiskTier::Tier2);
    assert!(metrics.suspended);
    let own_class = Scope::class("c1");
    let decision =
        harness.engine.evaluate(&tenant, &principal("teacher-9"), &perm("students.view"), Some(&own_class));
    assert_eq!(decision.reason, DecisionReason::Revoked);
}

/// Tests that repeated denials of a sensitive permission escalate to Tier 3.
#[test]
fn sensitive_denials_escalate_to_tier_three() {
    let authz = AuthzSettings {
        sensitive_permissions: [perm("grades.write")].into_iter().collect(),
    };
    let harness = Harness::with_settings(authz, MonitorSettings::default());
    let tenant = ctx("oakland");
    harness.define_role(&tenant, "teacher", &["students.view"], &[ScopeKind::Class]);
    harness.grant(&tenant, "teacher-9", "teacher", Scope::class("c1"));
    for _ in 0..3 {
        let _ = harness.engine.authorize(&tenant, &principal("teacher-9"), &perm("grades.write"), None);
    }
    harness.monitor.process_pending().unwrap();

    let metrics = harness.monitor.get_metrics(&tenant, &principal("teacher-9")).unwrap().unwrap();
    assert_eq!(metrics.sensitive_denial_count, 3);
    assert_eq!(metrics.tier, RiskTier::Tier3);
    let bindings = harness.bindings.list_for_principal(&tenant, &principal("teacher-9")).unwrap();
    assert!(bindings.iter().all(|binding| binding.status == BindingStatus::Revoked));
    assert!(harness.alerts.alerts().iter().any(|alert| alert.kind == AlertKind::CriticalEscalation));
}

/// Tests that Tier 3 revokes grants issued after an earlier suspension.
#[test]
fn tier_three_revokes_grants_issued_after_suspension() {
    let harness = Harness::with_settings(AuthzSettings::default(), fast_login_settings());
    let tenant = ctx("oakland");
    harness.define_role(&tenant, "teacher", &["students.view"], &[ScopeKind::Class]);
    harness.grant(&tenant, "teacher-1", "teacher", Scope::class("c1"));
    for _ in 0..6 {
        harness.monitor.record_event(failed_login("teacher-1")).unwrap();
    }
    harness.monitor.process_pending().unwrap();
    let metrics = harness.monitor.get_metrics(&tenant, &principal("teacher-1")).unwrap().unwrap();
    assert_eq!(metrics.tier, RiskTier::Tier2);

    harness.grant(&tenant, "teacher-1", "teacher", Scope::class("c2"));
    for _ in 0..4 {
        harness.monitor.record_event(failed_login("teacher-1")).unwrap();
    }
    harness.monitor.process_pending().unwrap();
    let metrics = harness.monitor.get_metrics(&tenant, &principal("teacher-1")).unwrap().unwrap();
    assert_eq!(metrics.tier, RiskTier::Tier3);

    let regranted = Scope::class("c2");
    let decision =
        harness.engine.evaluate(&tenant, &principal("teacher-1"), &perm("students.view"), Some(&regranted));
    assert!(!decision.allowed);
    assert_eq!(decision.reason, DecisionReason::Revoked);
}
