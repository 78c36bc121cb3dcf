// crates/northstar-core/tests/isolation.rs
// ============================================================================
// Module: Tenant Isolation Integration Tests
// Description: Guard rejections, audit placement, and cross-tenant properties.
// ============================================================================

//! ## Overview
//! Verifies that the isolation guard rejects foreign-tenant resources, records
//! the rejection in the caller's own chain, and never lets a foreign tenant's
//! identity leak through errors or audit payloads.

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

use common::Harness;
use common::ctx;
use common::principal;
use northstar_core::Actor;
use northstar_core::AlertKind;
use northstar_core::AuditEvent;
use northstar_core::AuditEventType;
use northstar_core::AuditQuery;
use northstar_core::ErrorClass;
use northstar_core::HasTenantOwner;
use northstar_core::PageRequest;
use northstar_core::RiskTier;
use northstar_core::SequenceRange;
use northstar_core::TenantId;
use northstar_core::runtime::IsolationViolation;
use proptest::prelude::*;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Student record owned by a tenant.
struct StudentRecord {
    tenant_id: TenantId,
    name: &'static str,
}

impl HasTenantOwner for StudentRecord {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

fn student(tenant: &str, name: &'static str) -> StudentRecord {
    StudentRecord {
        tenant_id: TenantId::new(tenant),
        name,
    }
}

fn clerk() -> Actor {
    Actor::new(principal("clerk-3"), "registrar")
}

// ============================================================================
// SECTION: Single Resources
// ============================================================================

/// Tests that a foreign resource is rejected and audited as the next oakland record.
#[test]
fn foreign_resource_violation_is_next_record_in_context_chain() {
    let harness = Harness::new();
    let oakland = ctx("oakland");
    for i in 0..4 {
        harness
            .ledger
            .append(
                &oakland,
                AuditEvent::by(&clerk(), AuditEventType::DataMutation, "student")
                    .with_entity_id(format!("s-{i}")),
            )
            .unwrap();
    }
    let before = harness.ledger.head(&oakland).unwrap().unwrap().sequence_number;

    let resource = student("berkeley", "Ada");
    let err = harness.guard.check_resource(Some(&oakland), &clerk(), &resource).unwrap_err();
    assert_eq!(err.class(), ErrorClass::TenantIsolationViolation);

    let head = harness.ledger.head(&oakland).unwrap().unwrap();
    assert_eq!(head.sequence_number, before + 1);
    let page = harness
        .ledger
        .query(
            &AuditQuery::for_tenant(&oakland).event_type(AuditEventType::TenantIsolationViolation),
            PageRequest::first(10),
        )
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].sequence_number, before + 1);
    assert!(harness.ledger.head(&ctx("berkeley")).unwrap().is_none());
    assert!(harness.ledger.verify_chain(&oakland, SequenceRange::all()).unwrap().valid);
}

/// Tests that guarded work runs only on same-tenant resources.
#[test]
fn guarded_work_runs_for_own_tenant() {
    let harness = Harness::new();
    let oakland = ctx("oakland");
    let own = student("oakland", "Grace");
    let name = harness
        .guard
        .run_guarded(Some(&oakland), &clerk(), &own, |_| own.name.to_string())
        .unwrap();
    assert_eq!(name, "Grace");
    assert!(harness.ledger.head(&oakland).unwrap().is_none());
}

/// Tests that repeated violations escalate the actor to Tier 3.
#[test]
fn repeated_violations_reach_the_monitor() {
    let harness = Harness::new();
    let oakland = ctx("oakland");
    let foreign = student("berkeley", "Alan");
    for _ in 0..3 {
        let _ = harness.guard.check_resource(Some(&oakland), &clerk(), &foreign);
    }
    harness.monitor.process_pending().unwrap();
    let metrics = harness.monitor.get_metrics(&oakland, &principal("clerk-3")).unwrap().unwrap();
    assert_eq!(metrics.isolation_violation_count, 3);
    assert_eq!(metrics.tier, RiskTier::Tier3);
    assert!(harness.alerts.alerts().iter().any(|alert| alert.kind == AlertKind::CriticalEscalation));
}

// ============================================================================
// SECTION: Bulk Batches
// ============================================================================

/// Tests that a single foreign record fails the whole batch.
#[test]
fn mixed_batch_is_rejected_whole() {
    let harness = Harness::new();
    let oakland = ctx("oakland");
    let batch = vec![
        student("oakland", "A"),
        student("oakland", "B"),
        student("berkeley", "C"),
    ];
    let err = harness.guard.check_bulk(Some(&oakland), &clerk(), &batch).unwrap_err();
    assert_eq!(
        err,
        IsolationViolation::BulkMismatch {
            mismatched: 1,
            total: 3,
        }
    );
    let page = harness.ledger.query(&AuditQuery::for_tenant(&oakland), PageRequest::first(10)).unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].payload_fingerprint, "bulk_mismatch:1/3");
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cross_tenant_access_is_always_rejected(
        home_number in 0_u32 .. 10_000,
        other_number in 0_u32 .. 10_000,
    ) {
        prop_assume!(home_number != other_number);
        let home = format!("district-{home_number}");
        let other = format!("district-{other_number}");
        let harness = Harness::new();
        let context = ctx(&home);
        let resource = TenantId::new(other.clone());
        let err = harness.guard.check_access(Some(&context), &clerk(), &resource).unwrap_err();
        prop_assert!(!err.to_string().contains(&other));
        let page = harness
            .ledger
            .query(&AuditQuery::for_tenant(&context), PageRequest::first(10))
            .unwrap();
        prop_assert_eq!(page.records.len(), 1);
        prop_assert!(!page.records[0].payload_fingerprint.contains(&other));
        prop_assert!(harness.ledger.head(&ctx(&other)).unwrap().is_none());
    }

    #[test]
    fn same_tenant_access_is_always_cleared(home in "[a-z][a-z0-9-]{2,15}") {
        let harness = Harness::new();
        let context = ctx(&home);
        let clearance = harness
            .guard
            .check_access(Some(&context), &clerk(), &TenantId::new(home.clone()))
            .unwrap();
        prop_assert_eq!(clearance.tenant_id().as_str(), home.as_str());
    }
}
