// crates/northstar-core/src/core/role.rs
// ============================================================================
// Module: Northstar Roles and Bindings
// Description: Role definitions, role bindings, and the binding state machine.
// Purpose: Model versioned roles and time-bound, optionally delegated grants.
// Dependencies: serde, crate::core::{identifiers, permission, scope, time}
// ============================================================================

//! ## Overview
//! A [`RoleDefinition`] names a permission set and the scope kinds it may be
//! granted at. A [`RoleBinding`] grants one role to one principal at one scope
//! instance for a bounded time window, optionally as a delegation from another
//! principal.
//!
//! Binding status follows a one-way state machine:
//! `Active -> Expired` (expiration or delegation expiry passed) and
//! `Active -> Revoked` (explicit action). Both outcomes are terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::error::ValidationError;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::RoleBindingId;
use crate::core::identifiers::RoleDefinitionId;
use crate::core::identifiers::TenantId;
use crate::core::permission::PermissionSet;
use crate::core::scope::Scope;
use crate::core::scope::ScopeKind;
use crate::core::tenant::HasTenantOwner;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Role Definition
// ============================================================================

/// Versioned role definition.
///
/// # Invariants
/// - `allowed_scope_kinds` is non-empty.
/// - `version` starts at 1 and increments whenever `permissions` changes.
/// - Deactivated definitions are retained while bindings reference them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Role identifier.
    pub id: RoleDefinitionId,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Scope kinds this role may be bound at.
    pub allowed_scope_kinds: BTreeSet<ScopeKind>,
    /// Canonical permission set.
    pub permissions: PermissionSet,
    /// Whether this is a built-in system role.
    pub is_system_role: bool,
    /// Whether holders may delegate this role.
    pub allows_delegation: bool,
    /// Precedence used when the same permission is granted by several roles.
    pub precedence: u32,
    /// Definition version.
    pub version: u32,
    /// Whether the definition is active.
    pub active: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl RoleDefinition {
    /// Returns true when the role may be bound at the given scope kind.
    #[must_use]
    pub fn allows_scope(&self, kind: ScopeKind) -> bool {
        self.allowed_scope_kinds.contains(&kind)
    }

    /// Validates that a scope conforms to the allowed scope kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the scope is malformed or its kind is
    /// not permitted.
    pub fn validate_scope(&self, scope: &Scope) -> Result<(), ValidationError> {
        scope.validate()?;
        let kind = scope.kind();
        if self.allows_scope(kind) {
            Ok(())
        } else {
            Err(ValidationError::ScopeNotAllowed {
                kind: kind.as_str(),
                role: self.id.to_string(),
            })
        }
    }
}

impl HasTenantOwner for RoleDefinition {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Inputs for creating a role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    /// Role identifier.
    pub id: RoleDefinitionId,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Scope kinds this role may be bound at.
    pub allowed_scope_kinds: BTreeSet<ScopeKind>,
    /// Raw permission codes (validated on creation).
    pub permissions: Vec<String>,
    /// Whether this is a built-in system role.
    #[serde(default)]
    pub is_system_role: bool,
    /// Whether holders may delegate this role.
    #[serde(default)]
    pub allows_delegation: bool,
    /// Precedence for effective-permission deduplication.
    #[serde(default)]
    pub precedence: u32,
}

impl RoleDraft {
    /// Validates structural fields that do not depend on the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRole`] for blank names or empty scope kinds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidRole("id must be non-empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidRole("name must be non-empty".to_string()));
        }
        if self.allowed_scope_kinds.is_empty() {
            return Err(ValidationError::InvalidRole(
                "allowed_scope_kinds must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Binding Status
// ============================================================================

/// Persisted binding status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    /// Grant is live (subject to its time window).
    Active,
    /// Grant lapsed by time; terminal.
    Expired,
    /// Grant was explicitly revoked; terminal.
    Revoked,
}

impl BindingStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Parses a status label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }
}

impl fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-evaluated standing of a binding at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStanding {
    /// Binding grants its permissions now.
    InForce,
    /// Effective date has not been reached.
    NotYetEffective,
    /// Expired by status, expiration date, or delegation expiry.
    Expired,
    /// Revoked.
    Revoked,
}

/// Illegal binding status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal binding transition from {from} to {to}")]
pub struct BindingTransitionError {
    /// Current status.
    pub from: BindingStatus,
    /// Requested status.
    pub to: BindingStatus,
}

// ============================================================================
// SECTION: Role Binding
// ============================================================================

/// Grant of a role to a principal at a scope instance.
///
/// # Invariants
/// - `scope` conforms to the bound role's `allowed_scope_kinds`.
/// - `expiration_date`, when present, is after `effective_date`.
/// - `delegated_by` and `delegation_expiry` are both present or both absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Binding identifier.
    pub id: RoleBindingId,
    /// Grantee.
    pub principal_id: PrincipalId,
    /// Bound role.
    pub role_definition_id: RoleDefinitionId,
    /// Scope instance.
    pub scope: Scope,
    /// Start of the grant window.
    pub effective_date: Timestamp,
    /// End of the grant window.
    pub expiration_date: Option<Timestamp>,
    /// Delegating principal when this is a delegated grant.
    pub delegated_by: Option<PrincipalId>,
    /// Delegation expiry when this is a delegated grant.
    pub delegation_expiry: Option<Timestamp>,
    /// Persisted status.
    pub status: BindingStatus,
    /// Time of the last status transition.
    pub status_changed_at: Option<Timestamp>,
    /// Reason recorded with the last status transition.
    pub status_reason: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl RoleBinding {
    /// Returns the instant at which the grant lapses, if any.
    #[must_use]
    pub fn lapses_at(&self) -> Option<Timestamp> {
        match (self.expiration_date, self.delegation_expiry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Evaluates the binding's standing at `now`.
    #[must_use]
    pub fn standing_at(&self, now: Timestamp) -> BindingStanding {
        match self.status {
            BindingStatus::Revoked => BindingStanding::Revoked,
            BindingStatus::Expired => BindingStanding::Expired,
            BindingStatus::Active => {
                if self.lapses_at().is_some_and(|lapse| lapse <= now) {
                    BindingStanding::Expired
                } else if self.effective_date > now {
                    BindingStanding::NotYetEffective
                } else {
                    BindingStanding::InForce
                }
            }
        }
    }

    /// Returns true when the binding grants its permissions at `now`.
    #[must_use]
    pub fn is_in_force(&self, now: Timestamp) -> bool {
        self.standing_at(now) == BindingStanding::InForce
    }

    /// Returns the uniqueness key `(principal, role, scope)`.
    #[must_use]
    pub fn uniqueness_key(&self) -> (&PrincipalId, &RoleDefinitionId, &Scope) {
        (&self.principal_id, &self.role_definition_id, &self.scope)
    }

    /// Applies a status transition.
    ///
    /// # Errors
    ///
    /// Returns [`BindingTransitionError`] unless the transition leaves `Active`
    /// for a terminal state.
    pub fn transition(
        &mut self,
        to: BindingStatus,
        at: Timestamp,
        reason: impl Into<String>,
    ) -> Result<(), BindingTransitionError> {
        if self.status != BindingStatus::Active || to == BindingStatus::Active {
            return Err(BindingTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.status_changed_at = Some(at);
        self.status_reason = Some(reason.into());
        Ok(())
    }
}

impl HasTenantOwner for RoleBinding {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Inputs for assigning a role to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRequest {
    /// Grantee.
    pub principal_id: PrincipalId,
    /// Role to bind.
    pub role_definition_id: RoleDefinitionId,
    /// Scope instance.
    pub scope: Scope,
    /// Start of the grant window (defaults to now).
    pub effective_date: Option<Timestamp>,
    /// End of the grant window.
    pub expiration_date: Option<Timestamp>,
    /// Delegating principal for a delegated grant.
    pub delegated_by: Option<PrincipalId>,
    /// Delegation expiry for a delegated grant.
    pub delegation_expiry: Option<Timestamp>,
}

impl BindingRequest {
    /// Creates a direct (non-delegated) binding request effective immediately.
    #[must_use]
    pub const fn direct(
        principal_id: PrincipalId,
        role_definition_id: RoleDefinitionId,
        scope: Scope,
    ) -> Self {
        Self {
            principal_id,
            role_definition_id,
            scope,
            effective_date: None,
            expiration_date: None,
            delegated_by: None,
            delegation_expiry: None,
        }
    }

    /// Sets the expiration date.
    #[must_use]
    pub fn expiring_at(mut self, expiration: Timestamp) -> Self {
        self.expiration_date = Some(expiration);
        self
    }

    /// Sets the effective date.
    #[must_use]
    pub fn effective_from(mut self, effective: Timestamp) -> Self {
        self.effective_date = Some(effective);
        self
    }

    /// Marks the request as a delegation from another principal.
    #[must_use]
    pub fn delegated(mut self, delegated_by: PrincipalId, expiry: Timestamp) -> Self {
        self.delegated_by = Some(delegated_by);
        self.delegation_expiry = Some(expiry);
        self
    }
}
