// crates/northstar-core/src/runtime/observer.rs
// ============================================================================
// Module: Northstar Decision Observers
// Description: Sinks for audited authorization decisions.
// Purpose: Record denials and sensitive allows in the ledger and the monitor.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The authorization engine forwards every denial and every allow of a
//! sensitive permission to a [`DecisionObserver`]. [`AuditingObserver`]
//! appends the decision to the tenant's chain and feeds the security monitor;
//! a denied sensitive permission is reported as its own signal kind.
//! Failures are reported as alerts and never change the decision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Actor;
use crate::core::Alert;
use crate::core::AlertKind;
use crate::core::AlertSeverity;
use crate::core::AuditEvent;
use crate::core::AuditEventType;
use crate::core::Permission;
use crate::core::PrincipalId;
use crate::core::SecurityEvent;
use crate::core::SecurityEventKind;
use crate::core::TenantContext;
use crate::interfaces::AlertSink;
use crate::interfaces::Clock;
use crate::runtime::authz::Decision;
use crate::runtime::ledger::AuditLedger;
use crate::runtime::monitor::SecurityMonitor;

/// Entity type label recorded for permission checks.
const PERMISSION_ENTITY: &str = "permission";
/// Actor role label recorded for the requesting principal.
const REQUESTER_ROLE: &str = "requester";

// ============================================================================
// SECTION: Observer Trait
// ============================================================================

/// Receives authorization decisions that must be recorded.
pub trait DecisionObserver: Send + Sync {
    /// Handles one decision. `sensitive` is true when a granted permission of
    /// an allow, or a denied permission of a denial, is sensitive. Must not
    /// fail or block the caller for long.
    fn on_decision(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        decision: &Decision,
        sensitive: bool,
    );
}

/// Observer that discards decisions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDecisionObserver;

impl DecisionObserver for NoopDecisionObserver {
    fn on_decision(
        &self,
        _ctx: &TenantContext,
        _principal_id: &PrincipalId,
        _decision: &Decision,
        _sensitive: bool,
    ) {
    }
}

// ============================================================================
// SECTION: Auditing Observer
// ============================================================================

/// Observer that appends decisions to the ledger and notifies the monitor.
pub struct AuditingObserver {
    /// Audit ledger.
    ledger: Arc<AuditLedger>,
    /// Optional security monitor.
    monitor: Option<Arc<SecurityMonitor>>,
    /// Alert destination for recording failures.
    alerts: Arc<dyn AlertSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

impl AuditingObserver {
    /// Creates an auditing observer.
    #[must_use]
    pub fn new(
        ledger: Arc<AuditLedger>,
        monitor: Option<Arc<SecurityMonitor>>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            monitor,
            alerts,
            clock,
        }
    }
}

impl DecisionObserver for AuditingObserver {
    fn on_decision(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        decision: &Decision,
        sensitive: bool,
    ) {
        let event_type = if decision.allowed {
            AuditEventType::AuthorizationAllowed
        } else {
            AuditEventType::AuthorizationDenied
        };
        let permissions: Vec<&str> = decision.permissions.iter().map(Permission::as_str).collect();
        let actor = Actor::new(principal_id.clone(), REQUESTER_ROLE);
        let event = AuditEvent::by(&actor, event_type, PERMISSION_ENTITY)
            .with_entity_id(permissions.join(","))
            .with_fingerprint(format!("{} @ {}", decision.reason_text(), decision.target));
        if let Err(err) = self.ledger.append(ctx, event) {
            self.raise(
                ctx,
                principal_id,
                AlertSeverity::Critical,
                AlertKind::AuditAppendFailed,
                format!("authorization decision could not be audited: {err}"),
            );
        }
        if let Some(monitor) = &self.monitor {
            let kind = match (decision.allowed, sensitive) {
                (true, _) => SecurityEventKind::Access,
                (false, true) => SecurityEventKind::SensitivePermissionDenied,
                (false, false) => SecurityEventKind::AuthorizationFailure,
            };
            let tenant_id = ctx.tenant_id().clone();
            let signal =
                SecurityEvent::new(tenant_id, principal_id.clone(), kind, self.clock.now());
            if let Err(err) = monitor.record_event(signal) {
                self.raise(
                    ctx,
                    principal_id,
                    AlertSeverity::Warning,
                    AlertKind::MonitorSignalDropped,
                    format!("authorization signal not recorded: {err}"),
                );
            }
        }
    }
}

impl AuditingObserver {
    /// Raises an alert attributed to the requesting principal.
    fn raise(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        severity: AlertSeverity,
        kind: AlertKind,
        message: String,
    ) {
        let alert = Alert::new(severity, kind, message, self.clock.now())
            .for_tenant(ctx.tenant_id().clone())
            .for_principal(principal_id.clone());
        self.alerts.raise(&alert);
    }
}
