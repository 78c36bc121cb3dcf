// crates/northstar-core/src/interfaces/mod.rs
// ============================================================================
// Module: Northstar Interfaces
// Description: Backend-agnostic store, clock, and alert sink contracts.
// Purpose: Define the seams between the governance services and their backends.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces decouple the governance services from persistence and delivery
//! technology. Every store read and write takes a [`TenantPredicate`], which can
//! only be obtained from a [`TenantContext`](crate::core::TenantContext), so an
//! unfiltered query is not expressible. Implementations must be deterministic
//! and fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::Alert;
use crate::core::AuditQuery;
use crate::core::AuditRecord;
use crate::core::BindingStatus;
use crate::core::ChainHead;
use crate::core::ErrorClass;
use crate::core::HasTenantOwner;
use crate::core::PageRequest;
use crate::core::PrincipalId;
use crate::core::RoleBinding;
use crate::core::RoleBindingId;
use crate::core::RoleDefinition;
use crate::core::RoleDefinitionId;
use crate::core::TenantPredicate;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store errors shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Uniqueness or sequence reservation conflict.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Entity does not exist.
    #[error("store entity not found: {0}")]
    NotFound(String),
    /// Store data is invalid or violates tenancy.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

impl StoreError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Conflict(_) => ErrorClass::ConcurrencyConflict,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Corrupt(_) => ErrorClass::AuditChainCorruption,
            Self::Invalid(_) => ErrorClass::Validation,
            Self::Io(_) | Self::Store(_) => ErrorClass::Infrastructure,
        }
    }

    /// Rejects an entity outside the predicate tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the entity belongs to another tenant.
    pub fn ensure_admitted<T: HasTenantOwner + ?Sized>(
        predicate: &TenantPredicate,
        entity: &T,
    ) -> Result<(), Self> {
        if predicate.admits(entity) {
            Ok(())
        } else {
            Err(Self::Invalid("entity tenant does not match the tenant predicate".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Role Catalog Store
// ============================================================================

/// Persistence for role definitions.
pub trait RoleCatalogStore: Send + Sync {
    /// Loads one role definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<Option<RoleDefinition>, StoreError>;

    /// Lists every role definition of the tenant ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list_roles(&self, tenant: &TenantPredicate) -> Result<Vec<RoleDefinition>, StoreError>;

    /// Inserts a new role definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the identifier already exists.
    fn insert_role(&self, tenant: &TenantPredicate, role: &RoleDefinition)
    -> Result<(), StoreError>;

    /// Replaces an existing role definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the role does not exist.
    fn update_role(&self, tenant: &TenantPredicate, role: &RoleDefinition)
    -> Result<(), StoreError>;

    /// Physically removes a role definition unless a binding references it.
    ///
    /// The reference check and the removal are one atomic step with respect
    /// to [`RoleBindingStore::insert_binding`] on the same backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the role does not exist.
    fn delete_role_if_unreferenced(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<RoleDeletion, StoreError>;
}

/// Outcome of [`RoleCatalogStore::delete_role_if_unreferenced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDeletion {
    /// The role definition was removed.
    Deleted,
    /// Bindings of any status still reference the role; nothing was removed.
    Referenced(u64),
}

// ============================================================================
// SECTION: Role Binding Store
// ============================================================================

/// Persistence for role bindings.
///
/// # Invariants
/// - At most one `Active` binding exists per `(principal, role, scope)` key.
/// - Status updates only leave `Active` (compare-and-set).
pub trait RoleBindingStore: Send + Sync {
    /// Loads one binding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_binding(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
    ) -> Result<Option<RoleBinding>, StoreError>;

    /// Lists bindings of a principal, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn bindings_for_principal(
        &self,
        tenant: &TenantPredicate,
        principal_id: &PrincipalId,
        status: Option<BindingStatus>,
    ) -> Result<Vec<RoleBinding>, StoreError>;

    /// Counts bindings of any status that reference a role definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn count_bindings_for_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<u64, StoreError>;

    /// Lists `Active` bindings whose expiration or delegation expiry is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn active_bindings_lapsed_by(
        &self,
        tenant: &TenantPredicate,
        now: Timestamp,
    ) -> Result<Vec<RoleBinding>, StoreError>;

    /// Inserts a new `Active` binding.
    ///
    /// Backends that also hold the role catalog reject bindings to a role
    /// definition that no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when an active binding with the same
    /// uniqueness key or identifier exists and [`StoreError::NotFound`] when
    /// the referenced role definition is gone.
    fn insert_binding(
        &self,
        tenant: &TenantPredicate,
        binding: &RoleBinding,
    ) -> Result<(), StoreError>;

    /// Transitions an `Active` binding to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown bindings and
    /// [`StoreError::Conflict`] when the binding is no longer `Active`.
    fn update_binding_status(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
        status: BindingStatus,
        at: Timestamp,
        reason: &str,
    ) -> Result<RoleBinding, StoreError>;
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// Append-only persistence for hash-chained audit records.
///
/// # Invariants
/// - Records are never updated or deleted.
/// - `insert_record` is atomic: sequence, hashes, and payload persist together.
pub trait AuditStore: Send + Sync {
    /// Returns the chain head of the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn head(&self, tenant: &TenantPredicate) -> Result<Option<ChainHead>, StoreError>;

    /// Inserts a sealed record whose sequence must be `head + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the sequence number is taken or
    /// does not follow the current head.
    fn insert_record(&self, tenant: &TenantPredicate, record: &AuditRecord)
    -> Result<(), StoreError>;

    /// Loads records with `after < sequence <= until`, ascending, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_range(
        &self,
        tenant: &TenantPredicate,
        after_sequence: u64,
        until_sequence: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError>;

    /// Loads records matching the query, ascending by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn query(&self, query: &AuditQuery, page: PageRequest)
    -> Result<Vec<AuditRecord>, StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Alert Sink
// ============================================================================

/// Destination for security and integrity alerts.
pub trait AlertSink: Send + Sync {
    /// Delivers an alert. Delivery failures are swallowed by the sink.
    fn raise(&self, alert: &Alert);
}
