// crates/northstar-core/tests/proptest_authorization.rs
// ============================================================================
// Module: Authorization Property-Based Tests
// Description: Property tests comparing decisions against a scope oracle.
// Purpose: Detect coverage and lifecycle mistakes across random grant sets.
// ============================================================================

//! Property-based tests for authorization decisions.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::Harness;
use common::NOW;
use common::ctx;
use common::perm;
use common::principal;
use common::request;
use northstar_core::DecisionReason;
use northstar_core::Scope;
use northstar_core::ScopeKind;
use proptest::prelude::*;

const DAY: i64 = 86_400_000;

/// Grant window relative to the evaluation instant.
#[derive(Debug, Clone, Copy)]
enum Window {
    Open,
    Lapsed,
    Future,
}

fn scope_strategy() -> impl Strategy<Value = Scope> {
    let school = prop_oneof![Just("lincoln"), Just("roosevelt")];
    let class = prop_oneof![Just("c1"), Just("c2")];
    prop_oneof![
        Just(Scope::district()),
        school.clone().prop_map(Scope::school),
        (school, class).prop_map(|(school, class)| Scope::class_in_school(school, class)),
    ]
}

fn window_strategy() -> impl Strategy<Value = Window> {
    prop_oneof![Just(Window::Open), Just(Window::Lapsed), Just(Window::Future)]
}

/// Reference coverage over the district, school, and qualified-class levels.
fn oracle_covers(grant: &Scope, target: &Scope) -> bool {
    match grant.kind() {
        ScopeKind::District => true,
        ScopeKind::School => grant.school_id == target.school_id,
        _ => grant == target,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn decisions_match_scope_oracle(
        grants in prop::collection::vec((scope_strategy(), window_strategy()), 0 .. 4),
        target in scope_strategy(),
    ) {
        let harness = Harness::new();
        let tenant = ctx("oakland");
        harness.define_role(
            &tenant,
            "staff",
            &["students.view"],
            &[ScopeKind::District, ScopeKind::School, ScopeKind::Class],
        );
        let mut placed: Vec<(Scope, Window)> = Vec::new();
        for (scope, window) in grants {
            if placed.iter().any(|(existing, _)| existing == &scope) {
                continue;
            }
            let mut req = request("staff-1", "staff", scope.clone());
            match window {
                Window::Open => {}
                Window::Lapsed => req = req.expiring_at(NOW.plus_millis(DAY)),
                Window::Future => req = req.effective_from(NOW.plus_millis(5 * DAY)),
            }
            harness.assign(&tenant, req);
            placed.push((scope, window));
        }
        harness.clock.advance(2 * DAY);

        let decision = harness.engine.evaluate(
            &tenant,
            &principal("staff-1"),
            &perm("students.view"),
            Some(&target),
        );
        let covering: Vec<Window> = placed
            .iter()
            .filter(|(scope, _)| oracle_covers(scope, &target))
            .map(|(_, window)| *window)
            .collect();
        let expected_allow = covering.iter().any(|window| matches!(window, Window::Open));
        prop_assert_eq!(decision.allowed, expected_allow);
        if !expected_allow {
            let expected_reason = if covering.iter().any(|w| matches!(w, Window::Lapsed)) {
                DecisionReason::Expired
            } else if covering.iter().any(|w| matches!(w, Window::Future)) {
                DecisionReason::NotYetEffective
            } else {
                DecisionReason::NoMatchingGrant
            };
            prop_assert_eq!(decision.reason, expected_reason);
        }
    }

    #[test]
    fn other_tenants_never_gain_access(target in scope_strategy(), grant in scope_strategy()) {
        let harness = Harness::new();
        let home = ctx("oakland");
        harness.define_role(
            &home,
            "staff",
            &["students.view"],
            &[ScopeKind::District, ScopeKind::School, ScopeKind::Class],
        );
        harness.grant(&home, "staff-1", "staff", grant);
        let decision = harness.engine.evaluate(
            &ctx("berkeley"),
            &principal("staff-1"),
            &perm("students.view"),
            Some(&target),
        );
        prop_assert!(!decision.allowed);
    }
}
