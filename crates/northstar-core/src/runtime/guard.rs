// crates/northstar-core/src/runtime/guard.rs
// ============================================================================
// Module: Northstar Tenant Isolation Guard
// Description: Fail-closed resource tenancy checks with audited violations.
// Purpose: Reject every cross-tenant access before the guarded operation runs.
// Dependencies: thiserror, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Every data access is checked against the active [`TenantContext`]. An
//! absent context is a violation. A mismatch is appended to the context
//! tenant's chain as `tenant_isolation_violation` and reported to the
//! security monitor; the foreign tenant identifier is recorded only as a
//! digest. Violations are final: callers abort and never retry.
//!
//! A successful check returns a [`Clearance`] that only this module can
//! construct, so guarded code paths can require proof of a passed check.
//! Bulk checks validate the whole batch before any item runs and record a
//! success marker; failure to record that marker denies the batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::Actor;
use crate::core::Alert;
use crate::core::AlertKind;
use crate::core::AlertSeverity;
use crate::core::AuditEvent;
use crate::core::AuditEventType;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ErrorClass;
use crate::core::HasTenantOwner;
use crate::core::SecurityEvent;
use crate::core::SecurityEventKind;
use crate::core::TenantContext;
use crate::core::TenantId;
use crate::core::hashing::hash_bytes;
use crate::interfaces::AlertSink;
use crate::interfaces::Clock;
use crate::runtime::ledger::AuditLedger;
use crate::runtime::monitor::SecurityMonitor;

/// Entity type label recorded for guarded resources.
const RESOURCE_ENTITY: &str = "tenant_resource";
/// Entity type label recorded for guarded batches.
const BATCH_ENTITY: &str = "tenant_batch";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tenant isolation violations. Messages never name the foreign tenant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsolationViolation {
    /// No tenant context accompanied the access.
    #[error("tenant context missing")]
    MissingContext,
    /// Resource belongs to another tenant.
    #[error("resource is outside the current tenant")]
    TenantMismatch {
        /// Tenant of the active context.
        context_tenant: TenantId,
        /// Tenant owning the resource.
        resource_tenant: TenantId,
    },
    /// Some items of a batch belong to another tenant.
    #[error("{mismatched} of {total} items are outside the current tenant")]
    BulkMismatch {
        /// Items owned by another tenant.
        mismatched: usize,
        /// Batch size.
        total: usize,
    },
    /// The bulk success marker could not be recorded.
    #[error("isolation check could not be recorded")]
    AuditUnavailable,
}

impl IsolationViolation {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingContext | Self::TenantMismatch { .. } | Self::BulkMismatch { .. } => {
                ErrorClass::TenantIsolationViolation
            }
            Self::AuditUnavailable => ErrorClass::Infrastructure,
        }
    }
}

// ============================================================================
// SECTION: Clearances
// ============================================================================

/// Proof that a single access passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clearance {
    /// Tenant the access was cleared for.
    tenant_id: TenantId,
}

impl Clearance {
    /// Returns the cleared tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Proof that a whole batch passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkClearance {
    /// Tenant the batch was cleared for.
    tenant_id: TenantId,
    /// Batch size.
    items: usize,
    /// Sequence number of the recorded success marker.
    marker_sequence: u64,
}

impl BulkClearance {
    /// Returns the cleared tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the batch size.
    #[must_use]
    pub const fn items(&self) -> usize {
        self.items
    }

    /// Returns the ledger sequence of the success marker.
    #[must_use]
    pub const fn marker_sequence(&self) -> u64 {
        self.marker_sequence
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Tenant isolation guard.
pub struct TenantIsolationGuard {
    /// Audit ledger.
    ledger: Arc<AuditLedger>,
    /// Optional security monitor.
    monitor: Option<Arc<SecurityMonitor>>,
    /// Alert destination.
    alerts: Arc<dyn AlertSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

impl TenantIsolationGuard {
    /// Creates a guard.
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

    /// Checks that a resource tenant equals the context tenant.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationViolation::MissingContext`] without a context and
    /// [`IsolationViolation::TenantMismatch`] for foreign resources.
    pub fn check_access(
        &self,
        ctx: Option<&TenantContext>,
        actor: &Actor,
        resource_tenant: &TenantId,
    ) -> Result<Clearance, IsolationViolation> {
        let Some(ctx) = ctx else {
            self.missing_context(actor);
            return Err(IsolationViolation::MissingContext);
        };
        if ctx.tenant_id() == resource_tenant {
            return Ok(Clearance {
                tenant_id: ctx.tenant_id().clone(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, resource_tenant.as_str().as_bytes());
        let event = AuditEvent::by(actor, AuditEventType::TenantIsolationViolation, RESOURCE_ENTITY)
            .with_fingerprint(format!("resource_tenant:sha256:{}", digest.value));
        self.record_violation(ctx, actor, event);
        Err(IsolationViolation::TenantMismatch {
            context_tenant: ctx.tenant_id().clone(),
            resource_tenant: resource_tenant.clone(),
        })
    }

    /// Checks a tenant-owned resource.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationViolation`] as for [`Self::check_access`].
    pub fn check_resource<T: HasTenantOwner + ?Sized>(
        &self,
        ctx: Option<&TenantContext>,
        actor: &Actor,
        resource: &T,
    ) -> Result<Clearance, IsolationViolation> {
        self.check_access(ctx, actor, resource.owner_tenant())
    }

    /// Checks a whole batch before any item is processed.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationViolation::BulkMismatch`] when any item is foreign
    /// and [`IsolationViolation::AuditUnavailable`] when the success marker
    /// cannot be recorded.
    pub fn check_bulk<T: HasTenantOwner>(
        &self,
        ctx: Option<&TenantContext>,
        actor: &Actor,
        items: &[T],
    ) -> Result<BulkClearance, IsolationViolation> {
        let Some(ctx) = ctx else {
            self.missing_context(actor);
            return Err(IsolationViolation::MissingContext);
        };
        let predicate = ctx.predicate();
        let mismatched = items.iter().filter(|item| !predicate.admits(*item)).count();
        if mismatched > 0 {
            let event_type = AuditEventType::TenantIsolationViolation;
            let event = AuditEvent::by(actor, event_type, BATCH_ENTITY)
                .with_fingerprint(format!("bulk_mismatch:{mismatched}/{}", items.len()));
            self.record_violation(ctx, actor, event);
            return Err(IsolationViolation::BulkMismatch {
                mismatched,
                total: items.len(),
            });
        }
        let marker = AuditEvent::by(actor, AuditEventType::TenantIsolationCheckPassed, BATCH_ENTITY)
            .with_fingerprint(format!("batch_size:{}", items.len()));
        match self.ledger.append(ctx, marker) {
            Ok(receipt) => Ok(BulkClearance {
                tenant_id: ctx.tenant_id().clone(),
                items: items.len(),
                marker_sequence: receipt.sequence_number,
            }),
            Err(err) => {
                self.raise(
                    Some(ctx),
                    actor,
                    AlertKind::AuditAppendFailed,
                    format!("bulk isolation marker could not be recorded: {err}"),
                );
                Err(IsolationViolation::AuditUnavailable)
            }
        }
    }

    /// Runs `operation` only when the resource passes the guard.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationViolation`] without invoking `operation` when the
    /// check fails.
    pub fn run_guarded<T, R, F>(
        &self,
        ctx: Option<&TenantContext>,
        actor: &Actor,
        resource: &T,
        operation: F,
    ) -> Result<R, IsolationViolation>
    where
        T: HasTenantOwner + ?Sized,
        F: FnOnce(&Clearance) -> R,
    {
        let clearance = self.check_resource(ctx, actor, resource)?;
        Ok(operation(&clearance))
    }

    /// Appends a violation and reports it to the monitor.
    fn record_violation(&self, ctx: &TenantContext, actor: &Actor, event: AuditEvent) {
        if let Err(err) = self.ledger.append(ctx, event) {
            self.raise(
                Some(ctx),
                actor,
                AlertKind::AuditAppendFailed,
                format!("isolation violation could not be audited: {err}"),
            );
        }
        if let Some(monitor) = &self.monitor {
            let signal = SecurityEvent::new(
                ctx.tenant_id().clone(),
                actor.principal_id.clone(),
                SecurityEventKind::IsolationViolation,
                self.clock.now(),
            );
            if let Err(err) = monitor.record_event(signal) {
                self.raise(
                    Some(ctx),
                    actor,
                    AlertKind::MonitorSignalDropped,
                    format!("isolation violation signal not recorded: {err}"),
                );
            }
        }
    }

    /// Raises an alert for an access without tenant context.
    fn missing_context(&self, actor: &Actor) {
        self.raise(
            None,
            actor,
            AlertKind::IsolationViolation,
            "data access attempted without tenant context".to_string(),
        );
    }

    /// Raises a critical guard alert.
    fn raise(&self, ctx: Option<&TenantContext>, actor: &Actor, kind: AlertKind, message: String) {
        let mut alert = Alert::new(AlertSeverity::Critical, kind, message, self.clock.now())
            .for_principal(actor.principal_id.clone());
        if let Some(ctx) = ctx {
            alert = alert.for_tenant(ctx.tenant_id().clone());
        }
        self.alerts.raise(&alert);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
