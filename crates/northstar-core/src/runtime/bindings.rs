// crates/northstar-core/src/runtime/bindings.rs
// ============================================================================
// Module: Northstar Role Bindings
// Description: Role assignment, delegation, revocation, and expiry.
// Purpose: Enforce binding invariants before persistence and audit every change.
// Dependencies: crate::{core, interfaces, runtime::ledger}
// ============================================================================

//! ## Overview
//! [`RoleBindingService`] validates a [`BindingRequest`] fully before it is
//! persisted: the role must exist and be active, the scope kind must be allowed,
//! dates must be ordered, and delegations must come from a principal who holds
//! the same role at a covering scope for at least as long as the delegation.
//! Pluggable [`ConflictRule`]s reject combinations such as mutually exclusive
//! roles.
//!
//! Uniqueness of active `(principal, role, scope)` grants is enforced by the
//! store. A colliding insert expires lapsed rows for the principal and retries
//! once against a fresh read; a second collision is surfaced as a conflict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::core::Actor;
use crate::core::AuditEvent;
use crate::core::AuditEventType;
use crate::core::BindingRequest;
use crate::core::BindingStatus;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ErrorClass;
use crate::core::HashError;
use crate::core::PrincipalId;
use crate::core::RoleBinding;
use crate::core::RoleBindingId;
use crate::core::RoleDefinition;
use crate::core::RoleDefinitionId;
use crate::core::TenantContext;
use crate::core::Timestamp;
use crate::core::ValidationError;
use crate::core::hashing::hash_canonical_json;
use crate::interfaces::Clock;
use crate::interfaces::RoleBindingStore;
use crate::interfaces::RoleCatalogStore;
use crate::interfaces::StoreError;
use crate::runtime::ledger::AuditLedger;
use crate::runtime::ledger::LedgerError;
use crate::runtime::monitor::MONITOR_SERVICE;
use crate::runtime::monitor::PrincipalSuspender;
use crate::runtime::monitor::SuspensionError;

/// Entity type label recorded for role bindings.
const BINDING_ENTITY: &str = "role_binding";
/// Entity type label recorded for principals.
const PRINCIPAL_ENTITY: &str = "principal";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Role binding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Fingerprinting failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Audit append failed after the mutation was persisted.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Role does not exist.
    #[error("role not found: {0}")]
    RoleNotFound(RoleDefinitionId),
    /// Role is deactivated.
    #[error("role is inactive: {0}")]
    RoleInactive(RoleDefinitionId),
    /// Binding does not exist.
    #[error("binding not found: {0}")]
    NotFound(RoleBindingId),
    /// Binding is no longer active.
    #[error("binding is not active: {0}")]
    NotActive(RoleBindingId),
    /// Active binding with the same principal, role, and scope exists.
    #[error("binding conflict: {0}")]
    Conflict(String),
    /// A conflict rule rejected the assignment.
    #[error("conflict rule {rule} rejected assignment: {detail}")]
    RuleViolation {
        /// Rule name.
        rule: String,
        /// Rule detail.
        detail: String,
    },
}

impl BindingError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_)
            | Self::RoleInactive(_)
            | Self::NotActive(_)
            | Self::RuleViolation { .. } => ErrorClass::Validation,
            Self::Hash(_) => ErrorClass::Infrastructure,
            Self::Store(err) => err.class(),
            Self::Ledger(err) => err.class(),
            Self::RoleNotFound(_) | Self::NotFound(_) => ErrorClass::NotFound,
            Self::Conflict(_) => ErrorClass::ConcurrencyConflict,
        }
    }
}

// ============================================================================
// SECTION: Conflict Rules
// ============================================================================

/// Pluggable assignment constraint evaluated before a binding is created.
pub trait ConflictRule: Send + Sync {
    /// Returns the rule name recorded in errors.
    fn name(&self) -> &str;

    /// Checks the candidate role against the principal's in-force bindings.
    ///
    /// # Errors
    ///
    /// Returns a human-readable detail when the assignment is not allowed.
    fn check(
        &self,
        candidate: &RoleDefinition,
        request: &BindingRequest,
        held: &[RoleBinding],
    ) -> Result<(), String>;
}

/// A principal may hold at most one role of the set at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutuallyExclusiveRoles {
    /// Rule name.
    name: String,
    /// Roles that exclude each other.
    roles: BTreeSet<RoleDefinitionId>,
}

impl MutuallyExclusiveRoles {
    /// Creates a rule over a set of roles.
    #[must_use]
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = RoleDefinitionId>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().collect(),
        }
    }
}

impl ConflictRule for MutuallyExclusiveRoles {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(
        &self,
        candidate: &RoleDefinition,
        _request: &BindingRequest,
        held: &[RoleBinding],
    ) -> Result<(), String> {
        if !self.roles.contains(&candidate.id) {
            return Ok(());
        }
        held.iter()
            .find(|binding| {
                binding.role_definition_id != candidate.id
                    && self.roles.contains(&binding.role_definition_id)
            })
            .map_or(Ok(()), |binding| {
                Err(format!(
                    "role {} excludes held role {}",
                    candidate.id, binding.role_definition_id
                ))
            })
    }
}

// ============================================================================
// SECTION: Binding Service
// ============================================================================

/// Role binding administration service.
pub struct RoleBindingService {
    /// Role definition persistence.
    roles: Arc<dyn RoleCatalogStore>,
    /// Binding persistence.
    bindings: Arc<dyn RoleBindingStore>,
    /// Audit ledger.
    ledger: Arc<AuditLedger>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Assignment constraints.
    rules: Vec<Arc<dyn ConflictRule>>,
}

impl RoleBindingService {
    /// Creates a binding service.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleCatalogStore>,
        bindings: Arc<dyn RoleBindingStore>,
        ledger: Arc<AuditLedger>,
        clock: Arc<dyn Clock>,
        rules: Vec<Arc<dyn ConflictRule>>,
    ) -> Self {
        Self {
            roles,
            bindings,
            ledger,
            clock,
            rules,
        }
    }

    /// Assigns a role to a principal at a scope instance.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when validation fails, a conflict rule rejects
    /// the assignment, an active duplicate exists after one retry, or the
    /// store or ledger fails.
    pub fn assign(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        request: BindingRequest,
    ) -> Result<RoleBinding, BindingError> {
        let predicate = ctx.predicate();
        let now = self.clock.now();
        request.scope.validate()?;
        let role = self
            .roles
            .get_role(&predicate, &request.role_definition_id)?
            .ok_or_else(|| BindingError::RoleNotFound(request.role_definition_id.clone()))?;
        if !role.active {
            return Err(BindingError::RoleInactive(role.id));
        }
        role.validate_scope(&request.scope)?;
        let effective_date = request.effective_date.unwrap_or(now);
        if request.expiration_date.is_some_and(|expiration| expiration <= effective_date) {
            return Err(ValidationError::InvalidDateRange(
                "expiration_date must be after effective_date",
            )
            .into());
        }
        self.validate_delegation(ctx, &role, &request, effective_date, now)?;
        let held: Vec<RoleBinding> = self
            .bindings
            .bindings_for_principal(&predicate, &request.principal_id, Some(BindingStatus::Active))?
            .into_iter()
            .filter(|binding| binding.lapses_at().is_none_or(|lapse| lapse > now))
            .collect();
        for rule in &self.rules {
            rule.check(&role, &request, &held).map_err(|detail| BindingError::RuleViolation {
                rule: rule.name().to_string(),
                detail,
            })?;
        }

        let binding = RoleBinding {
            tenant_id: ctx.tenant_id().clone(),
            id: RoleBindingId::random(),
            principal_id: request.principal_id,
            role_definition_id: request.role_definition_id,
            scope: request.scope,
            effective_date,
            expiration_date: request.expiration_date,
            delegated_by: request.delegated_by,
            delegation_expiry: request.delegation_expiry,
            status: BindingStatus::Active,
            status_changed_at: None,
            status_reason: None,
            created_at: now,
        };
        let role_gone = || BindingError::RoleNotFound(binding.role_definition_id.clone());
        match self.bindings.insert_binding(&predicate, &binding) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                self.expire_lapsed_for(ctx, actor, &binding.principal_id)?;
                self.bindings.insert_binding(&predicate, &binding).map_err(|err| match err {
                    StoreError::Conflict(message) => BindingError::Conflict(message),
                    StoreError::NotFound(_) => role_gone(),
                    other => BindingError::Store(other),
                })?;
            }
            Err(StoreError::NotFound(_)) => return Err(role_gone()),
            Err(err) => return Err(err.into()),
        }
        self.audit_binding(ctx, actor, AuditEventType::RoleBindingCreated, &binding)?;
        Ok(binding)
    }

    /// Revokes an active binding.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NotFound`] for unknown bindings and
    /// [`BindingError::NotActive`] when the binding already reached a
    /// terminal status.
    pub fn revoke(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        binding_id: &RoleBindingId,
        reason: &str,
    ) -> Result<RoleBinding, BindingError> {
        let revoked = self.transition(ctx, binding_id, BindingStatus::Revoked, reason)?;
        self.audit_binding(ctx, actor, AuditEventType::RoleBindingRevoked, &revoked)?;
        Ok(revoked)
    }

    /// Marks every lapsed active binding of the tenant as expired.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when the store or ledger fails.
    pub fn expire_due(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
    ) -> Result<Vec<RoleBinding>, BindingError> {
        let due = self.bindings.active_bindings_lapsed_by(&ctx.predicate(), self.clock.now())?;
        self.expire_all(ctx, actor, due)
    }

    /// Revokes every active binding of a principal and records the suspension.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when the store or ledger fails.
    pub fn suspend_principal(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        principal_id: &PrincipalId,
        reason: &str,
    ) -> Result<Vec<RoleBinding>, BindingError> {
        let active = self.bindings.bindings_for_principal(
            &ctx.predicate(),
            principal_id,
            Some(BindingStatus::Active),
        )?;
        let mut revoked = Vec::with_capacity(active.len());
        for binding in active {
            match self.transition(ctx, &binding.id, BindingStatus::Revoked, reason) {
                Ok(updated) => {
                    self.audit_binding(ctx, actor, AuditEventType::RoleBindingRevoked, &updated)?;
                    revoked.push(updated);
                }
                Err(BindingError::NotActive(_) | BindingError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        let event = AuditEvent::by(actor, AuditEventType::PrincipalSuspended, PRINCIPAL_ENTITY)
            .with_entity_id(principal_id.as_str())
            .with_fingerprint(format!("revoked_bindings:{}", revoked.len()));
        self.ledger.append(ctx, event)?;
        Ok(revoked)
    }

    /// Lists every binding of a principal.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Store`] when the store fails.
    pub fn list_for_principal(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
    ) -> Result<Vec<RoleBinding>, BindingError> {
        Ok(self.bindings.bindings_for_principal(&ctx.predicate(), principal_id, None)?)
    }

    /// Validates delegation metadata against the delegator's own grants.
    fn validate_delegation(
        &self,
        ctx: &TenantContext,
        role: &RoleDefinition,
        request: &BindingRequest,
        effective_date: Timestamp,
        now: Timestamp,
    ) -> Result<(), BindingError> {
        let delegation = (&request.delegated_by, request.delegation_expiry);
        let (delegator, delegation_expiry) = match delegation {
            (None, None) => return Ok(()),
            (Some(delegator), Some(expiry)) => (delegator, expiry),
            _ => {
                return Err(ValidationError::InvalidDelegation(
                    "delegated_by and delegation_expiry must be set together".to_string(),
                )
                .into());
            }
        };
        if !role.allows_delegation {
            return Err(ValidationError::InvalidDelegation(format!(
                "role {} does not allow delegation",
                role.id
            ))
            .into());
        }
        if delegator == &request.principal_id {
            return Err(
                ValidationError::InvalidDelegation("cannot delegate to self".to_string()).into()
            );
        }
        if delegation_expiry <= effective_date {
            return Err(ValidationError::InvalidDelegation(
                "delegation_expiry must be after effective_date".to_string(),
            )
            .into());
        }
        let covering = self
            .bindings
            .bindings_for_principal(&ctx.predicate(), delegator, Some(BindingStatus::Active))?
            .into_iter()
            .filter(|binding| {
                binding.role_definition_id == role.id
                    && binding.is_in_force(now)
                    && binding.scope.covers(&request.scope)
            })
            .map(|binding| binding.lapses_at())
            .max_by(|a, b| match (a, b) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            });
        match covering {
            None => Err(ValidationError::InvalidDelegation(format!(
                "delegator {delegator} does not hold role {} at a covering scope",
                role.id
            ))
            .into()),
            Some(Some(lapse)) if delegation_expiry > lapse => Err(
                ValidationError::InvalidDelegation(
                    "delegation cannot outlive the delegator's grant".to_string(),
                )
                .into(),
            ),
            Some(_) => Ok(()),
        }
    }

    /// Expires lapsed active bindings of one principal.
    fn expire_lapsed_for(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        principal_id: &PrincipalId,
    ) -> Result<Vec<RoleBinding>, BindingError> {
        let due = self
            .bindings
            .active_bindings_lapsed_by(&ctx.predicate(), self.clock.now())?
            .into_iter()
            .filter(|binding| &binding.principal_id == principal_id)
            .collect();
        self.expire_all(ctx, actor, due)
    }

    /// Transitions bindings to `Expired`, skipping ones changed concurrently.
    fn expire_all(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        due: Vec<RoleBinding>,
    ) -> Result<Vec<RoleBinding>, BindingError> {
        let mut expired = Vec::with_capacity(due.len());
        for binding in due {
            let reason = if binding.delegation_expiry.is_some()
                && binding.delegation_expiry == binding.lapses_at()
            {
                "delegation expired"
            } else {
                "expired"
            };
            match self.transition(ctx, &binding.id, BindingStatus::Expired, reason) {
                Ok(updated) => {
                    self.audit_binding(ctx, actor, AuditEventType::RoleBindingExpired, &updated)?;
                    expired.push(updated);
                }
                Err(BindingError::NotActive(_) | BindingError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(expired)
    }

    /// Applies a compare-and-set status transition in the store.
    fn transition(
        &self,
        ctx: &TenantContext,
        binding_id: &RoleBindingId,
        status: BindingStatus,
        reason: &str,
    ) -> Result<RoleBinding, BindingError> {
        self.bindings
            .update_binding_status(&ctx.predicate(), binding_id, status, self.clock.now(), reason)
            .map_err(|err| match err {
                StoreError::NotFound(_) => BindingError::NotFound(binding_id.clone()),
                StoreError::Conflict(_) => BindingError::NotActive(binding_id.clone()),
                other => BindingError::Store(other),
            })
    }

    /// Appends a binding mutation to the ledger.
    fn audit_binding(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        event_type: AuditEventType,
        binding: &RoleBinding,
    ) -> Result<(), BindingError> {
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, binding)?;
        let event = AuditEvent::by(actor, event_type, BINDING_ENTITY)
            .with_entity_id(binding.id.as_str())
            .with_digest(&digest);
        self.ledger.append(ctx, event)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Suspension
// ============================================================================

impl PrincipalSuspender for RoleBindingService {
    fn suspend(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        reason: &str,
    ) -> Result<usize, SuspensionError> {
        self.suspend_principal(ctx, &Actor::system(MONITOR_SERVICE), principal_id, reason)
            .map(|revoked| revoked.len())
            .map_err(|err| SuspensionError(err.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
