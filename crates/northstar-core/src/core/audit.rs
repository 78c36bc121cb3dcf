// crates/northstar-core/src/core/audit.rs
// ============================================================================
// Module: Northstar Audit Records
// Description: Audit events, hash-chained records, queries, and verification reports.
// Purpose: Define the tamper-evident ledger data model and its canonical payload.
// Dependencies: serde, crate::core::{hashing, identifiers, tenant, time}
// ============================================================================

//! ## Overview
//! An [`AuditEvent`] is what callers submit; the ledger stamps it with a tenant,
//! sequence number, and timestamp to form an [`AuditRecord`]. The record's
//! [`canonical_payload`](AuditRecord::canonical_payload) is the RFC 8785
//! serialization of every field except the two hashes, so
//! `current_hash = H(previous_hash ‖ canonical_payload)` can be recomputed by any
//! independent verifier.
//!
//! [`AuditQuery`] can only be constructed from a
//! [`TenantContext`](crate::core::tenant::TenantContext), so a query without a
//! tenant predicate cannot be expressed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::ValidationError;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::chain_link_hash;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TenantId;
use crate::core::tenant::HasTenantOwner;
use crate::core::tenant::TenantContext;
use crate::core::tenant::TenantPredicate;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Auditable event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Authorization allowed a sensitive permission.
    AuthorizationAllowed,
    /// Authorization denied a request.
    AuthorizationDenied,
    /// Tenant isolation guard rejected an access.
    TenantIsolationViolation,
    /// Tenant isolation guard passed a bulk batch.
    TenantIsolationCheckPassed,
    /// Role definition created.
    RoleDefined,
    /// Role definition updated.
    RoleUpdated,
    /// Role definition deactivated.
    RoleDeactivated,
    /// Unreferenced role definition removed.
    RoleRemoved,
    /// Role binding created.
    RoleBindingCreated,
    /// Role binding revoked.
    RoleBindingRevoked,
    /// Role binding expired.
    RoleBindingExpired,
    /// Security monitor changed a principal's risk tier.
    SecurityTierChanged,
    /// Security monitor suspended a principal.
    PrincipalSuspended,
    /// Domain mutation fingerprint from a business service.
    DataMutation,
    /// Bulk job progress or outcome from the bulk-operations collaborator.
    BulkOperation,
}

impl AuditEventType {
    /// Returns a stable label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationAllowed => "authorization_allowed",
            Self::AuthorizationDenied => "authorization_denied",
            Self::TenantIsolationViolation => "tenant_isolation_violation",
            Self::TenantIsolationCheckPassed => "tenant_isolation_check_passed",
            Self::RoleDefined => "role_defined",
            Self::RoleUpdated => "role_updated",
            Self::RoleDeactivated => "role_deactivated",
            Self::RoleRemoved => "role_removed",
            Self::RoleBindingCreated => "role_binding_created",
            Self::RoleBindingRevoked => "role_binding_revoked",
            Self::RoleBindingExpired => "role_binding_expired",
            Self::SecurityTierChanged => "security_tier_changed",
            Self::PrincipalSuspended => "principal_suspended",
            Self::DataMutation => "data_mutation",
            Self::BulkOperation => "bulk_operation",
        }
    }

    /// Parses an event type label.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuery`] for unknown labels.
    pub fn parse(label: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == label)
            .ok_or_else(|| ValidationError::InvalidQuery(format!("unknown event type: {label}")))
    }

    /// All event types.
    pub const ALL: [Self; 15] = [
        Self::AuthorizationAllowed,
        Self::AuthorizationDenied,
        Self::TenantIsolationViolation,
        Self::TenantIsolationCheckPassed,
        Self::RoleDefined,
        Self::RoleUpdated,
        Self::RoleDeactivated,
        Self::RoleRemoved,
        Self::RoleBindingCreated,
        Self::RoleBindingRevoked,
        Self::RoleBindingExpired,
        Self::SecurityTierChanged,
        Self::PrincipalSuspended,
        Self::DataMutation,
        Self::BulkOperation,
    ];
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Principal performing an audited action, with the role label it acted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting principal.
    pub principal_id: PrincipalId,
    /// Role label recorded in the ledger.
    pub role: String,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub fn new(principal_id: PrincipalId, role: impl Into<String>) -> Self {
        Self {
            principal_id,
            role: role.into(),
        }
    }

    /// Creates a service actor (for example `security_monitor`).
    #[must_use]
    pub fn system(service: &str) -> Self {
        Self {
            principal_id: PrincipalId::new(format!("system:{service}")),
            role: "system".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// Event submitted to the ledger by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Acting principal.
    pub actor_id: PrincipalId,
    /// Role label of the actor at the time of the event.
    pub actor_role: String,
    /// Event category.
    pub event_type: AuditEventType,
    /// Entity type label (for example `role_binding` or `student`).
    pub entity_type: String,
    /// Entity identifier when the event concerns one entity.
    pub entity_id: Option<String>,
    /// Fingerprint of the event payload (for example a before/after hash).
    pub payload_fingerprint: String,
    /// Correlation identifier for the surrounding operation.
    pub correlation_id: Option<CorrelationId>,
}

impl AuditEvent {
    /// Creates an event with an empty fingerprint and no entity id.
    #[must_use]
    pub fn new(
        actor_id: PrincipalId,
        actor_role: impl Into<String>,
        event_type: AuditEventType,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            actor_role: actor_role.into(),
            event_type,
            entity_type: entity_type.into(),
            entity_id: None,
            payload_fingerprint: String::new(),
            correlation_id: None,
        }
    }

    /// Creates an event attributed to an actor.
    #[must_use]
    pub fn by(actor: &Actor, event_type: AuditEventType, entity_type: impl Into<String>) -> Self {
        Self::new(actor.principal_id.clone(), actor.role.clone(), event_type, entity_type)
    }

    /// Sets the entity identifier.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Sets the payload fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.payload_fingerprint = fingerprint.into();
        self
    }

    /// Sets the payload fingerprint from a digest.
    #[must_use]
    pub fn with_digest(mut self, digest: &HashDigest) -> Self {
        self.payload_fingerprint = format!("{}:{}", digest.algorithm.as_str(), digest.value);
        self
    }

    /// Sets the correlation identifier.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<CorrelationId>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the actor or entity type is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.actor_id.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                field: "actor_id",
                reason: "must be non-empty",
            });
        }
        if self.entity_type.trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                field: "entity_type",
                reason: "must be non-empty",
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Immutable, hash-chained audit record.
///
/// # Invariants
/// - `(tenant_id, sequence_number)` is unique and gapless from 1.
/// - `current_hash == H(previous_hash ‖ canonical_payload)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Position in the tenant chain (1-based).
    pub sequence_number: u64,
    /// Append time in unix milliseconds.
    pub timestamp: Timestamp,
    /// Acting principal.
    pub actor_id: PrincipalId,
    /// Actor role label.
    pub actor_role: String,
    /// Event category.
    pub event_type: AuditEventType,
    /// Entity type label.
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: Option<String>,
    /// Payload fingerprint.
    pub payload_fingerprint: String,
    /// Correlation identifier.
    pub correlation_id: Option<CorrelationId>,
    /// Hash of the previous record (genesis for sequence 1).
    pub previous_hash: String,
    /// Hash of this record.
    pub current_hash: String,
}

/// Canonical payload view hashed into the chain (every field except hashes).
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    /// Owning tenant.
    tenant_id: &'a TenantId,
    /// Sequence number.
    sequence_number: u64,
    /// Timestamp in unix milliseconds.
    timestamp: i64,
    /// Actor.
    actor_id: &'a PrincipalId,
    /// Actor role.
    actor_role: &'a str,
    /// Event type label.
    event_type: AuditEventType,
    /// Entity type label.
    entity_type: &'a str,
    /// Entity identifier.
    entity_id: Option<&'a str>,
    /// Payload fingerprint.
    payload_fingerprint: &'a str,
    /// Correlation identifier.
    correlation_id: Option<&'a CorrelationId>,
}

impl AuditRecord {
    /// Builds an unsealed record (hashes empty) from an event.
    #[must_use]
    pub fn from_event(
        tenant_id: TenantId,
        sequence_number: u64,
        timestamp: Timestamp,
        event: AuditEvent,
    ) -> Self {
        Self {
            tenant_id,
            sequence_number,
            timestamp,
            actor_id: event.actor_id,
            actor_role: event.actor_role,
            event_type: event.event_type,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            payload_fingerprint: event.payload_fingerprint,
            correlation_id: event.correlation_id,
            previous_hash: String::new(),
            current_hash: String::new(),
        }
    }

    /// Returns the RFC 8785 canonical payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn canonical_payload(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(&CanonicalPayload {
            tenant_id: &self.tenant_id,
            sequence_number: self.sequence_number,
            timestamp: self.timestamp.as_unix_millis(),
            actor_id: &self.actor_id,
            actor_role: &self.actor_role,
            event_type: self.event_type,
            entity_type: &self.entity_type,
            entity_id: self.entity_id.as_deref(),
            payload_fingerprint: &self.payload_fingerprint,
            correlation_id: self.correlation_id.as_ref(),
        })
    }

    /// Recomputes the chain hash from `previous_hash` and the stored payload.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn compute_hash(&self, algorithm: HashAlgorithm) -> Result<String, HashError> {
        let payload = self.canonical_payload()?;
        Ok(chain_link_hash(algorithm, &self.previous_hash, &payload).value)
    }

    /// Links the record to `previous_hash` and computes its own hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn seal(
        mut self,
        previous_hash: String,
        algorithm: HashAlgorithm,
    ) -> Result<Self, HashError> {
        self.previous_hash = previous_hash;
        self.current_hash = self.compute_hash(algorithm)?;
        Ok(self)
    }
}

impl HasTenantOwner for AuditRecord {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    /// Assigned sequence number.
    pub sequence_number: u64,
    /// Hash of the new record.
    pub current_hash: String,
}

/// Current head of a tenant chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// Sequence number of the last record.
    pub sequence_number: u64,
    /// Hash of the last record.
    pub current_hash: String,
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Inclusive sequence range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    /// First sequence number (inclusive, >= 1).
    pub start: u64,
    /// Last sequence number (inclusive); `None` means the current head.
    pub end: Option<u64>,
}

impl SequenceRange {
    /// Range covering the whole chain.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }

    /// Bounded inclusive range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuery`] when `start` is zero or after `end`.
    pub fn bounded(start: u64, end: u64) -> Result<Self, ValidationError> {
        if start == 0 || start > end {
            return Err(ValidationError::InvalidQuery(
                "sequence range must satisfy 1 <= start <= end".to_string(),
            ));
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Open-ended range starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuery`] when `start` is zero.
    pub fn from(start: u64) -> Result<Self, ValidationError> {
        if start == 0 {
            return Err(ValidationError::InvalidQuery("sequence numbers start at 1".to_string()));
        }
        Ok(Self {
            start,
            end: None,
        })
    }
}

/// Tenant-bound audit query with optional filters.
///
/// # Invariants
/// - The tenant predicate is fixed at construction and cannot be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Required tenant predicate.
    predicate: TenantPredicate,
    /// Actor filter.
    pub actor_id: Option<PrincipalId>,
    /// Entity type filter.
    pub entity_type: Option<String>,
    /// Entity id filter.
    pub entity_id: Option<String>,
    /// Event type filter.
    pub event_type: Option<AuditEventType>,
    /// Correlation id filter.
    pub correlation_id: Option<CorrelationId>,
    /// Inclusive lower time bound.
    pub from_time: Option<Timestamp>,
    /// Exclusive upper time bound.
    pub to_time: Option<Timestamp>,
}

impl AuditQuery {
    /// Starts a query restricted to the context tenant.
    #[must_use]
    pub fn for_tenant(ctx: &TenantContext) -> Self {
        Self {
            predicate: ctx.predicate(),
            actor_id: None,
            entity_type: None,
            entity_id: None,
            event_type: None,
            correlation_id: None,
            from_time: None,
            to_time: None,
        }
    }

    /// Returns the tenant predicate.
    #[must_use]
    pub const fn predicate(&self) -> &TenantPredicate {
        &self.predicate
    }

    /// Filters by actor.
    #[must_use]
    pub fn actor(mut self, actor_id: PrincipalId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Filters by entity type and optional id.
    #[must_use]
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: Option<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = entity_id;
        self
    }

    /// Filters by event type.
    #[must_use]
    pub const fn event_type(mut self, event_type: AuditEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Filters by correlation id.
    #[must_use]
    pub fn correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Filters by time range `[from, to)`.
    #[must_use]
    pub const fn between(mut self, from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        self.from_time = from;
        self.to_time = to;
        self
    }

    /// Returns true when the record satisfies every filter, including tenancy.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.predicate.admits(record)
            && self.actor_id.as_ref().is_none_or(|actor| &record.actor_id == actor)
            && self.entity_type.as_ref().is_none_or(|kind| &record.entity_type == kind)
            && self.entity_id.as_ref().is_none_or(|id| record.entity_id.as_ref() == Some(id))
            && self.event_type.is_none_or(|kind| record.event_type == kind)
            && self
                .correlation_id
                .as_ref()
                .is_none_or(|id| record.correlation_id.as_ref() == Some(id))
            && self.from_time.is_none_or(|from| record.timestamp >= from)
            && self.to_time.is_none_or(|to| record.timestamp < to)
    }
}

/// Cursor-based page request ordered by sequence ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Return records with sequence strictly greater than this value.
    pub after_sequence: Option<u64>,
    /// Maximum records to return.
    pub limit: usize,
}

impl PageRequest {
    /// First page with the given limit.
    #[must_use]
    pub const fn first(limit: usize) -> Self {
        Self {
            after_sequence: None,
            limit,
        }
    }
}

/// Page of audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    /// Records in sequence order.
    pub records: Vec<AuditRecord>,
    /// Cursor for the next page, when more records may exist.
    pub next_after_sequence: Option<u64>,
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Result of verifying a tenant chain range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Tenant verified.
    pub tenant_id: TenantId,
    /// True when no violations were found.
    pub valid: bool,
    /// Sequence numbers whose hash or linkage disagrees, ascending.
    pub violations: Vec<u64>,
    /// Number of records checked.
    pub records_checked: u64,
    /// First sequence number checked.
    pub first_sequence: Option<u64>,
    /// Last sequence number checked.
    pub last_sequence: Option<u64>,
}
