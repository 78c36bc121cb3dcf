// crates/northstar-core/src/runtime/authz.rs
// ============================================================================
// Module: Northstar Authorization Engine
// Description: Deny-by-default permission resolution over scoped role bindings.
// Purpose: Decide whether a principal holds permissions at a target scope.
// Dependencies: crate::{core, interfaces, runtime::observer}
// ============================================================================

//! ## Overview
//! A permission is granted only by a binding that is `Active`, inside its
//! effective window, not past its expiration or delegation expiry, bound to an
//! active role containing the permission, and scoped to cover the target.
//! Bindings are read on every call with no caching layer, so revocation and
//! expiry take effect immediately.
//!
//! Evaluation never mutates authorization state. [`AuthorizationEngine::evaluate`]
//! is fully speculative; [`AuthorizationEngine::authorize`] additionally
//! forwards denials and sensitive allows to the configured
//! [`DecisionObserver`]. Any store failure yields a denial with reason
//! `authorization unavailable`.
//!
//! Denial reasons only consider bindings that would otherwise have matched the
//! permission and target scope, so a reason never reveals grants unrelated to
//! the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::BindingStanding;
use crate::core::Permission;
use crate::core::PrincipalId;
use crate::core::RoleBinding;
use crate::core::RoleBindingId;
use crate::core::RoleDefinition;
use crate::core::RoleDefinitionId;
use crate::core::Scope;
use crate::core::TenantContext;
use crate::core::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::RoleBindingStore;
use crate::interfaces::RoleCatalogStore;
use crate::interfaces::StoreError;
use crate::runtime::observer::DecisionObserver;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Authorization engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzSettings {
    /// Permissions whose allows are audited in addition to every denial.
    pub sensitive_permissions: BTreeSet<Permission>,
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Stable, non-leaky decision reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// A binding grants the permission.
    Granted,
    /// The only matching grants have expired.
    Expired,
    /// The only matching grants were revoked.
    Revoked,
    /// The only matching grants are not yet effective.
    NotYetEffective,
    /// The only matching grants reference inactive roles.
    RoleInactive,
    /// No binding matches the permission and scope.
    NoMatchingGrant,
    /// Authorization state could not be read.
    AuthorizationUnavailable,
}

impl DecisionReason {
    /// Returns the reason text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::NotYetEffective => "not yet effective",
            Self::RoleInactive => "role inactive",
            Self::NoMatchingGrant => "no matching grant",
            Self::AuthorizationUnavailable => "authorization unavailable",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// True when access is allowed.
    pub allowed: bool,
    /// Reason for the outcome.
    pub reason: DecisionReason,
    /// Permissions evaluated.
    pub permissions: Vec<Permission>,
    /// Permissions that were not granted.
    pub denied: Vec<Permission>,
    /// Target scope evaluated.
    pub target: Scope,
    /// Binding that granted access, for single-permission allows.
    pub binding_id: Option<RoleBindingId>,
}

impl Decision {
    /// Returns true when the decision allows access.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the reason text, listing denied permissions for multi-permission checks.
    #[must_use]
    pub fn reason_text(&self) -> String {
        if self.allowed || self.permissions.len() <= 1 || self.denied.is_empty() {
            return self.reason.as_str().to_string();
        }
        let denied: Vec<&str> = self.denied.iter().map(Permission::as_str).collect();
        format!("{}: {}", self.reason.as_str(), denied.join(", "))
    }
}

// ============================================================================
// SECTION: Effective Permissions
// ============================================================================

/// Permission held by a principal with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    /// Permission.
    pub permission: Permission,
    /// Role that grants it.
    pub role_id: RoleDefinitionId,
    /// Precedence of the granting role.
    pub precedence: u32,
    /// Scope of the granting binding.
    pub scope: Scope,
    /// Start of the granting binding.
    pub granted_at: Timestamp,
    /// Granting binding.
    pub binding_id: RoleBindingId,
}

/// Authorization errors surfaced by the provenance API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Authorization state could not be read.
    #[error("authorization unavailable")]
    Unavailable(#[source] StoreError),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Deny-by-default authorization engine.
pub struct AuthorizationEngine {
    /// Role definition persistence.
    roles: Arc<dyn RoleCatalogStore>,
    /// Binding persistence.
    bindings: Arc<dyn RoleBindingStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Receives audited decisions.
    observer: Arc<dyn DecisionObserver>,
    /// Engine settings.
    settings: AuthzSettings,
}

/// Bindings and referenced roles loaded for one evaluation.
struct Grants {
    /// Bindings of the principal, ordered by creation then id.
    bindings: Vec<RoleBinding>,
    /// Roles referenced by the bindings.
    roles: BTreeMap<RoleDefinitionId, RoleDefinition>,
}

impl AuthorizationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleCatalogStore>,
        bindings: Arc<dyn RoleBindingStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn DecisionObserver>,
        settings: AuthzSettings,
    ) -> Self {
        Self {
            roles,
            bindings,
            clock,
            observer,
            settings,
        }
    }

    /// Evaluates one permission without notifying the observer.
    ///
    /// An absent target is treated as the district scope.
    #[must_use]
    pub fn evaluate(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        permission: &Permission,
        target: Option<&Scope>,
    ) -> Decision {
        let target = target.cloned().unwrap_or_default();
        let now = self.clock.now();
        match self.load_grants(ctx, principal_id) {
            Ok(grants) => resolve(&grants, permission, &target, now),
            Err(_) => unavailable(vec![permission.clone()], target),
        }
    }

    /// Evaluates one permission and forwards audited outcomes to the observer.
    #[must_use]
    pub fn authorize(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        permission: &Permission,
        target: Option<&Scope>,
    ) -> Decision {
        let decision = self.evaluate(ctx, principal_id, permission, target);
        self.notify(ctx, principal_id, &decision);
        decision
    }

    /// Allows when any permission is granted, stopping at the first allow.
    #[must_use]
    pub fn has_any(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        permissions: &[Permission],
        target: Option<&Scope>,
    ) -> Decision {
        let target = target.cloned().unwrap_or_default();
        let now = self.clock.now();
        let decision = match self.load_grants(ctx, principal_id) {
            Ok(grants) => {
                let mut first_denial = None;
                let mut allow = None;
                for permission in permissions {
                    let single = resolve(&grants, permission, &target, now);
                    if single.allowed {
                        allow = Some(single);
                        break;
                    }
                    first_denial.get_or_insert(single.reason);
                }
                allow.map_or_else(
                    || Decision {
                        allowed: false,
                        reason: first_denial.unwrap_or(DecisionReason::NoMatchingGrant),
                        permissions: permissions.to_vec(),
                        denied: permissions.to_vec(),
                        target: target.clone(),
                        binding_id: None,
                    },
                    |single| Decision {
                        permissions: permissions.to_vec(),
                        ..single
                    },
                )
            }
            Err(_) => unavailable(permissions.to_vec(), target),
        };
        self.notify(ctx, principal_id, &decision);
        decision
    }

    /// Allows only when every permission is granted; denials list the missing subset.
    #[must_use]
    pub fn has_all(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        permissions: &[Permission],
        target: Option<&Scope>,
    ) -> Decision {
        let target = target.cloned().unwrap_or_default();
        let now = self.clock.now();
        let decision = match self.load_grants(ctx, principal_id) {
            Ok(grants) => {
                let mut denied = Vec::new();
                let mut reason = None;
                for permission in permissions {
                    let single = resolve(&grants, permission, &target, now);
                    if !single.allowed {
                        reason.get_or_insert(single.reason);
                        denied.push(permission.clone());
                    }
                }
                let allowed = denied.is_empty() && !permissions.is_empty();
                Decision {
                    allowed,
                    reason: if allowed {
                        DecisionReason::Granted
                    } else {
                        reason.unwrap_or(DecisionReason::NoMatchingGrant)
                    },
                    permissions: permissions.to_vec(),
                    denied,
                    target,
                    binding_id: None,
                }
            }
            Err(_) => unavailable(permissions.to_vec(), target),
        };
        self.notify(ctx, principal_id, &decision);
        decision
    }

    /// Returns the deduplicated permissions currently in force with provenance.
    ///
    /// Duplicates keep the grant from the highest-precedence role, then the
    /// most specific scope, then the earliest grant.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Unavailable`] when authorization state cannot be read.
    pub fn effective_permissions(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
    ) -> Result<Vec<EffectivePermission>, AuthzError> {
        let grants = self.load_grants(ctx, principal_id).map_err(AuthzError::Unavailable)?;
        let now = self.clock.now();
        let mut best: BTreeMap<Permission, EffectivePermission> = BTreeMap::new();
        for binding in &grants.bindings {
            let Some(role) = grants.roles.get(&binding.role_definition_id) else {
                continue;
            };
            if !role.active || !binding.is_in_force(now) {
                continue;
            }
            for permission in role.permissions.iter() {
                let candidate = EffectivePermission {
                    permission: permission.clone(),
                    role_id: role.id.clone(),
                    precedence: role.precedence,
                    scope: binding.scope.clone(),
                    granted_at: binding.effective_date,
                    binding_id: binding.id.clone(),
                };
                match best.get(permission) {
                    Some(current) if !outranks(&candidate, current) => {}
                    _ => {
                        best.insert(permission.clone(), candidate);
                    }
                }
            }
        }
        Ok(best.into_values().collect())
    }

    /// Forwards denials and sensitive decisions to the observer.
    fn notify(&self, ctx: &TenantContext, principal_id: &PrincipalId, decision: &Decision) {
        let relevant = if decision.allowed { &decision.permissions } else { &decision.denied };
        let watched = &self.settings.sensitive_permissions;
        let sensitive = relevant.iter().any(|permission| watched.contains(permission));
        if sensitive || !decision.allowed {
            self.observer.on_decision(ctx, principal_id, decision, sensitive);
        }
    }

    /// Loads the principal's bindings and their roles.
    fn load_grants(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
    ) -> Result<Grants, StoreError> {
        let predicate = ctx.predicate();
        let mut bindings = self.bindings.bindings_for_principal(&predicate, principal_id, None)?;
        bindings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let mut roles = BTreeMap::new();
        for binding in &bindings {
            if roles.contains_key(&binding.role_definition_id) {
                continue;
            }
            if let Some(role) = self.roles.get_role(&predicate, &binding.role_definition_id)? {
                roles.insert(role.id.clone(), role);
            }
        }
        Ok(Grants {
            bindings,
            roles,
        })
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves one permission against loaded grants.
fn resolve(grants: &Grants, permission: &Permission, target: &Scope, now: Timestamp) -> Decision {
    let mut diagnosis: Option<DecisionReason> = None;
    for binding in &grants.bindings {
        let Some(role) = grants.roles.get(&binding.role_definition_id) else {
            continue;
        };
        if !role.permissions.contains(permission) || !binding.scope.covers(target) {
            continue;
        }
        let reason = match binding.standing_at(now) {
            BindingStanding::InForce if role.active => {
                return Decision {
                    allowed: true,
                    reason: DecisionReason::Granted,
                    permissions: vec![permission.clone()],
                    denied: Vec::new(),
                    target: target.clone(),
                    binding_id: Some(binding.id.clone()),
                };
            }
            BindingStanding::InForce => DecisionReason::RoleInactive,
            BindingStanding::Expired => DecisionReason::Expired,
            BindingStanding::Revoked => DecisionReason::Revoked,
            BindingStanding::NotYetEffective => DecisionReason::NotYetEffective,
        };
        diagnosis = Some(diagnosis.map_or(reason, |current| current.min(reason)));
    }
    Decision {
        allowed: false,
        reason: diagnosis.unwrap_or(DecisionReason::NoMatchingGrant),
        permissions: vec![permission.clone()],
        denied: vec![permission.clone()],
        target: target.clone(),
        binding_id: None,
    }
}

/// Builds the fail-closed decision used when state cannot be read.
fn unavailable(permissions: Vec<Permission>, target: Scope) -> Decision {
    Decision {
        allowed: false,
        reason: DecisionReason::AuthorizationUnavailable,
        denied: permissions.clone(),
        permissions,
        target,
        binding_id: None,
    }
}

/// Returns true when `candidate` should replace `current` for the same permission.
fn outranks(candidate: &EffectivePermission, current: &EffectivePermission) -> bool {
    candidate
        .precedence
        .cmp(&current.precedence)
        .then_with(|| candidate.scope.kind().depth().cmp(&current.scope.kind().depth()))
        .then_with(|| current.granted_at.cmp(&candidate.granted_at))
        .then_with(|| current.binding_id.cmp(&candidate.binding_id))
        .is_gt()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
