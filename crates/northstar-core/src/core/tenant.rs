// crates/northstar-core/src/core/tenant.rs
// ============================================================================
// Module: Northstar Tenant Context
// Description: Immutable per-operation tenant context and ownership capability.
// Purpose: Carry tenancy explicitly through every call instead of ambient state.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`TenantContext`] is resolved once per inbound operation by the request
//! layer and passed by reference down the call chain. Nothing in the core reads
//! tenancy from thread-locals or globals. Tenant-scoped entities expose their
//! owner through [`HasTenantOwner`], and tenant-filtered queries are built from
//! a [`TenantPredicate`] that can only be obtained from a context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::ValidationError;
use crate::core::identifiers::TenantId;

// ============================================================================
// SECTION: Isolation Boundary
// ============================================================================

/// Data isolation boundary label for a tenant (partition or district code).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsolationBoundary(String);

impl IsolationBoundary {
    /// Creates an isolation boundary label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the default boundary for a tenant (`tenant/<id>`).
    #[must_use]
    pub fn for_tenant(tenant_id: &TenantId) -> Self {
        Self(format!("tenant/{tenant_id}"))
    }

    /// Returns the boundary as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IsolationBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tenant Context
// ============================================================================

/// Immutable tenant context for one operation.
///
/// # Invariants
/// - Fields are private and never mutated after construction.
/// - The tenant identifier and boundary are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant identifier.
    tenant_id: TenantId,
    /// Isolation boundary label.
    isolation_boundary: IsolationBoundary,
}

impl TenantContext {
    /// Builds a tenant context from a resolved tenant and boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTenantContext`] when either value is blank.
    pub fn new(
        tenant_id: TenantId,
        isolation_boundary: IsolationBoundary,
    ) -> Result<Self, ValidationError> {
        if tenant_id.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidTenantContext("tenant_id must be non-empty"));
        }
        if isolation_boundary.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidTenantContext(
                "isolation_boundary must be non-empty",
            ));
        }
        Ok(Self {
            tenant_id,
            isolation_boundary,
        })
    }

    /// Builds a tenant context with the default boundary for the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTenantContext`] when the tenant is blank.
    pub fn for_tenant(tenant_id: TenantId) -> Result<Self, ValidationError> {
        let boundary = IsolationBoundary::for_tenant(&tenant_id);
        Self::new(tenant_id, boundary)
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the isolation boundary.
    #[must_use]
    pub const fn isolation_boundary(&self) -> &IsolationBoundary {
        &self.isolation_boundary
    }

    /// Returns the tenant predicate used to build tenant-filtered queries.
    #[must_use]
    pub fn predicate(&self) -> TenantPredicate {
        TenantPredicate {
            tenant_id: self.tenant_id.clone(),
        }
    }
}

// ============================================================================
// SECTION: Ownership Capability
// ============================================================================

/// Capability implemented by every tenant-scoped entity type.
pub trait HasTenantOwner {
    /// Returns the tenant that owns this entity.
    fn owner_tenant(&self) -> &TenantId;
}

impl HasTenantOwner for TenantId {
    fn owner_tenant(&self) -> &TenantId {
        self
    }
}

// ============================================================================
// SECTION: Tenant Predicate
// ============================================================================

/// Required tenant filter for store queries.
///
/// # Invariants
/// - Only constructible from a [`TenantContext`]; queries cannot omit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPredicate {
    /// Tenant the query is restricted to.
    tenant_id: TenantId,
}

impl TenantPredicate {
    /// Returns the tenant identifier bound by the predicate.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns true when the entity belongs to the predicate tenant.
    #[must_use]
    pub fn admits<T: HasTenantOwner + ?Sized>(&self, entity: &T) -> bool {
        entity.owner_tenant() == &self.tenant_id
    }
}
