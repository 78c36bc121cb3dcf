// crates/northstar-core/src/core/security.rs
// ============================================================================
// Module: Northstar Security Signals
// Description: Security events, per-principal metrics, risk tiers, and alerts.
// Purpose: Define the transient aggregation model used by the security monitor.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Security events are ingested at least once and deduplicated by
//! [`EventId`]. Aggregated [`PrincipalSecurityMetrics`] are in-memory only and
//! are not a system of record; durable evidence of tier transitions lives in the
//! audit ledger.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EventId;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TenantId;
use crate::core::tenant::HasTenantOwner;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Security Events
// ============================================================================

/// Kind of security signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// Failed authentication attempt.
    FailedLogin,
    /// Authorization request denied.
    AuthorizationFailure,
    /// Tenant isolation guard rejected an access.
    IsolationViolation,
    /// Authorization denied a sensitive permission.
    SensitivePermissionDenied,
    /// Successful access used for activity and time-of-day tracking.
    Access,
}

impl SecurityEventKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailedLogin => "failed_login",
            Self::AuthorizationFailure => "authorization_failure",
            Self::IsolationViolation => "isolation_violation",
            Self::SensitivePermissionDenied => "sensitive_permission_denied",
            Self::Access => "access",
        }
    }
}

/// Security signal for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event identifier used for deduplication.
    pub event_id: EventId,
    /// Tenant the principal acted in.
    pub tenant_id: TenantId,
    /// Principal the signal concerns.
    pub principal_id: PrincipalId,
    /// Signal kind.
    pub kind: SecurityEventKind,
    /// Source network address when known.
    pub source_address: Option<String>,
    /// Time the signal occurred.
    pub occurred_at: Timestamp,
}

impl SecurityEvent {
    /// Creates an event with a fresh random identifier.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        principal_id: PrincipalId,
        kind: SecurityEventKind,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            event_id: EventId::random(),
            tenant_id,
            principal_id,
            kind,
            source_address: None,
            occurred_at,
        }
    }

    /// Sets the source address.
    #[must_use]
    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    /// Sets an explicit event identifier (for redelivered signals).
    #[must_use]
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }
}

impl HasTenantOwner for SecurityEvent {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

// ============================================================================
// SECTION: Risk Tiers
// ============================================================================

/// Response tier derived from a principal's risk score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Below every threshold.
    #[default]
    Nominal,
    /// Log and notify.
    Tier1,
    /// Auto-suspend and alert.
    Tier2,
    /// Auto-suspend and escalate immediately.
    Tier3,
}

impl RiskTier {
    /// Returns a stable label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Tier1 => "tier_1",
            Self::Tier2 => "tier_2",
            Self::Tier3 => "tier_3",
        }
    }

    /// Returns true when the tier requires suspending the principal.
    #[must_use]
    pub const fn suspends(self) -> bool {
        matches!(self, Self::Tier2 | Self::Tier3)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Principal Metrics
// ============================================================================

/// Aggregated security metrics for one principal within one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalSecurityMetrics {
    /// Tenant the metrics belong to.
    pub tenant_id: TenantId,
    /// Principal the metrics describe.
    pub principal_id: PrincipalId,
    /// Failed login count.
    pub failed_login_count: u64,
    /// Authorization failure count, including sensitive denials.
    pub authorization_failure_count: u64,
    /// Denied requests for sensitive permissions.
    pub sensitive_denial_count: u64,
    /// Isolation violation count.
    pub isolation_violation_count: u64,
    /// Accesses outside business hours.
    pub off_hours_access_count: u64,
    /// Time of the most recent signal.
    pub last_activity: Timestamp,
    /// Distinct source addresses observed.
    pub unique_source_addresses: BTreeSet<String>,
    /// Recent signal timestamps, oldest first, bounded by the monitor.
    pub recent_access_timestamps: Vec<Timestamp>,
    /// Most recent risk score in `[0, 1]`.
    pub risk_score: f64,
    /// Current tier.
    pub tier: RiskTier,
    /// Whether the monitor has suspended the principal.
    pub suspended: bool,
}

impl PrincipalSecurityMetrics {
    /// Creates empty metrics for a principal.
    #[must_use]
    pub const fn new(tenant_id: TenantId, principal_id: PrincipalId, now: Timestamp) -> Self {
        Self {
            tenant_id,
            principal_id,
            failed_login_count: 0,
            authorization_failure_count: 0,
            sensitive_denial_count: 0,
            isolation_violation_count: 0,
            off_hours_access_count: 0,
            last_activity: now,
            unique_source_addresses: BTreeSet::new(),
            recent_access_timestamps: Vec::new(),
            risk_score: 0.0,
            tier: RiskTier::Nominal,
            suspended: false,
        }
    }
}

impl HasTenantOwner for PrincipalSecurityMetrics {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

// ============================================================================
// SECTION: Posture Report
// ============================================================================

/// One principal entry in a posture report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Principal.
    pub principal_id: PrincipalId,
    /// Risk score.
    pub risk_score: f64,
    /// Tier.
    pub tier: RiskTier,
}

/// Snapshot of the monitor's aggregated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureReport {
    /// Report time.
    pub generated_at: Timestamp,
    /// Principals currently tracked.
    pub principals_tracked: usize,
    /// Principals at nominal risk.
    pub nominal_count: usize,
    /// Principals at Tier 1.
    pub tier1_count: usize,
    /// Principals at Tier 2.
    pub tier2_count: usize,
    /// Principals at Tier 3.
    pub tier3_count: usize,
    /// Highest-risk principals, descending by score.
    pub top_risks: Vec<RiskSummary>,
    /// Principals suspended by the monitor.
    pub suspended_principals: Vec<RiskSummary>,
    /// Events waiting in the ingestion queue.
    pub queue_depth: usize,
    /// Events processed since startup.
    pub events_processed: u64,
    /// Redelivered events ignored by deduplication.
    pub duplicate_events: u64,
    /// Events rejected because the queue was full.
    pub dropped_events: u64,
}

// ============================================================================
// SECTION: Alerts
// ============================================================================

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational notification.
    Info,
    /// Needs attention.
    Warning,
    /// Needs immediate escalation.
    Critical,
}

impl AlertSeverity {
    /// Returns a stable label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Alert category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Principal reached Tier 1.
    ElevatedRisk,
    /// Principal suspended at Tier 2.
    PrincipalSuspended,
    /// Tier 3 escalation.
    CriticalEscalation,
    /// Audit chain verification found mismatches.
    AuditChainCorruption,
    /// Automated suspension failed.
    SuspensionFailed,
    /// Audit append for a security action failed.
    AuditAppendFailed,
    /// Tenant isolation check failed without a tenant chain to record it.
    IsolationViolation,
    /// A security signal could not be handed to the monitor.
    MonitorSignalDropped,
}

impl AlertKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ElevatedRisk => "elevated_risk",
            Self::PrincipalSuspended => "principal_suspended",
            Self::CriticalEscalation => "critical_escalation",
            Self::AuditChainCorruption => "audit_chain_corruption",
            Self::SuspensionFailed => "suspension_failed",
            Self::AuditAppendFailed => "audit_append_failed",
            Self::IsolationViolation => "isolation_violation",
            Self::MonitorSignalDropped => "monitor_signal_dropped",
        }
    }
}

/// Compliance or security alert routed to an alert sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity.
    pub severity: AlertSeverity,
    /// Category.
    pub kind: AlertKind,
    /// Tenant concerned.
    pub tenant_id: Option<TenantId>,
    /// Principal concerned.
    pub principal_id: Option<PrincipalId>,
    /// Operator-facing message.
    pub message: String,
    /// Time the alert was raised.
    pub raised_at: Timestamp,
}

impl Alert {
    /// Creates an alert without tenant or principal attribution.
    #[must_use]
    pub fn new(
        severity: AlertSeverity,
        kind: AlertKind,
        message: impl Into<String>,
        raised_at: Timestamp,
    ) -> Self {
        Self {
            severity,
            kind,
            tenant_id: None,
            principal_id: None,
            message: message.into(),
            raised_at,
        }
    }

    /// Attributes the alert to a tenant.
    #[must_use]
    pub fn for_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Attributes the alert to a principal.
    #[must_use]
    pub fn for_principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }
}
