// crates/northstar-core/src/runtime/catalog.rs
// ============================================================================
// Module: Northstar Role Catalog
// Description: Versioned role definition administration.
// Purpose: Create, version, deactivate, and remove role definitions with audit.
// Dependencies: crate::{core, interfaces, runtime::ledger}
// ============================================================================

//! ## Overview
//! Permission codes are validated once here, when a role is created or its
//! permissions change. The version increments only when the canonical
//! permission set actually changes. Definitions referenced by any binding are
//! deactivated rather than removed. Every mutation is appended to the ledger
//! after it is persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::core::Actor;
use crate::core::AuditEvent;
use crate::core::AuditEventType;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ErrorClass;
use crate::core::HashError;
use crate::core::PermissionRegistry;
use crate::core::PermissionSet;
use crate::core::RoleDefinition;
use crate::core::RoleDefinitionId;
use crate::core::RoleDraft;
use crate::core::ScopeKind;
use crate::core::TenantContext;
use crate::core::ValidationError;
use crate::core::hashing::hash_canonical_json;
use crate::interfaces::Clock;
use crate::interfaces::RoleBindingStore;
use crate::interfaces::RoleCatalogStore;
use crate::interfaces::RoleDeletion;
use crate::interfaces::StoreError;
use crate::runtime::ledger::AuditLedger;
use crate::runtime::ledger::LedgerError;

/// Entity type label recorded for role definitions.
const ROLE_ENTITY: &str = "role_definition";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Role catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Input failed validation.
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
    NotFound(RoleDefinitionId),
    /// Role is referenced by bindings and cannot be removed.
    #[error("role {role} is referenced by {bindings} binding(s)")]
    RoleInUse {
        /// Role identifier.
        role: RoleDefinitionId,
        /// Number of referencing bindings.
        bindings: u64,
    },
    /// Built-in system roles cannot be removed.
    #[error("system role {0} cannot be removed")]
    SystemRole(RoleDefinitionId),
}

impl CatalogError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::RoleInUse { .. } | Self::SystemRole(_) => {
                ErrorClass::Validation
            }
            Self::Hash(_) => ErrorClass::Infrastructure,
            Self::Store(err) => err.class(),
            Self::Ledger(err) => err.class(),
            Self::NotFound(_) => ErrorClass::NotFound,
        }
    }
}

// ============================================================================
// SECTION: Metadata Updates
// ============================================================================

/// Non-permission fields of a role that may change without a version bump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMetadataUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New allowed scope kinds.
    pub allowed_scope_kinds: Option<BTreeSet<ScopeKind>>,
    /// New delegation flag.
    pub allows_delegation: Option<bool>,
    /// New precedence.
    pub precedence: Option<u32>,
}

// ============================================================================
// SECTION: Role Catalog
// ============================================================================

/// Role definition administration service.
pub struct RoleCatalog {
    /// Role definition persistence.
    roles: Arc<dyn RoleCatalogStore>,
    /// Binding persistence used for reference checks.
    bindings: Arc<dyn RoleBindingStore>,
    /// Audit ledger.
    ledger: Arc<AuditLedger>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Optional known-permission registry.
    registry: Option<PermissionRegistry>,
}

impl RoleCatalog {
    /// Creates a role catalog service.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleCatalogStore>,
        bindings: Arc<dyn RoleBindingStore>,
        ledger: Arc<AuditLedger>,
        clock: Arc<dyn Clock>,
        registry: Option<PermissionRegistry>,
    ) -> Self {
        Self {
            roles,
            bindings,
            ledger,
            clock,
            registry,
        }
    }

    /// Creates a role definition at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for invalid drafts, malformed or unknown
    /// permission codes, duplicate identifiers, or store and ledger failures.
    pub fn create(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        draft: RoleDraft,
    ) -> Result<RoleDefinition, CatalogError> {
        draft.validate()?;
        let permissions = self.parse_permissions(&draft.permissions)?;
        let now = self.clock.now();
        let role = RoleDefinition {
            tenant_id: ctx.tenant_id().clone(),
            id: draft.id,
            name: draft.name,
            description: draft.description,
            allowed_scope_kinds: draft.allowed_scope_kinds,
            permissions,
            is_system_role: draft.is_system_role,
            allows_delegation: draft.allows_delegation,
            precedence: draft.precedence,
            version: 1,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.roles.insert_role(&ctx.predicate(), &role)?;
        self.audit(ctx, actor, AuditEventType::RoleDefined, &role)?;
        Ok(role)
    }

    /// Replaces the permission set, incrementing the version when it changes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for unknown roles, invalid codes, or store and
    /// ledger failures.
    pub fn update_permissions(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        role_id: &RoleDefinitionId,
        codes: &[String],
    ) -> Result<RoleDefinition, CatalogError> {
        let permissions = self.parse_permissions(codes)?;
        let mut role = self.require(ctx, role_id)?;
        if role.permissions == permissions {
            return Ok(role);
        }
        role.permissions = permissions;
        role.version = role.version.saturating_add(1);
        role.updated_at = self.clock.now();
        self.roles.update_role(&ctx.predicate(), &role)?;
        self.audit(ctx, actor, AuditEventType::RoleUpdated, &role)?;
        Ok(role)
    }

    /// Updates descriptive and policy fields without changing the version.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for unknown roles, blank names, empty scope
    /// kinds, or store and ledger failures.
    pub fn update_metadata(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        role_id: &RoleDefinitionId,
        update: RoleMetadataUpdate,
    ) -> Result<RoleDefinition, CatalogError> {
        let mut role = self.require(ctx, role_id)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                let error = ValidationError::InvalidRole("name must be non-empty".to_string());
                return Err(error.into());
            }
            role.name = name;
        }
        if let Some(description) = update.description {
            role.description = description;
        }
        if let Some(kinds) = update.allowed_scope_kinds {
            if kinds.is_empty() {
                return Err(ValidationError::InvalidRole(
                    "allowed_scope_kinds must be non-empty".to_string(),
                )
                .into());
            }
            role.allowed_scope_kinds = kinds;
        }
        if let Some(allows_delegation) = update.allows_delegation {
            role.allows_delegation = allows_delegation;
        }
        if let Some(precedence) = update.precedence {
            role.precedence = precedence;
        }
        role.updated_at = self.clock.now();
        self.roles.update_role(&ctx.predicate(), &role)?;
        self.audit(ctx, actor, AuditEventType::RoleUpdated, &role)?;
        Ok(role)
    }

    /// Deactivates a role; bindings to it stop granting permissions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for unknown roles or store and ledger failures.
    pub fn deactivate(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        role_id: &RoleDefinitionId,
    ) -> Result<RoleDefinition, CatalogError> {
        let mut role = self.require(ctx, role_id)?;
        if !role.active {
            return Ok(role);
        }
        role.active = false;
        role.updated_at = self.clock.now();
        self.roles.update_role(&ctx.predicate(), &role)?;
        self.audit(ctx, actor, AuditEventType::RoleDeactivated, &role)?;
        Ok(role)
    }

    /// Physically removes a role that no binding references.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::RoleInUse`] when any binding references the
    /// role and [`CatalogError::SystemRole`] for built-in roles.
    pub fn remove(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        role_id: &RoleDefinitionId,
    ) -> Result<(), CatalogError> {
        let role = self.require(ctx, role_id)?;
        if role.is_system_role {
            return Err(CatalogError::SystemRole(role.id));
        }
        let predicate = ctx.predicate();
        let references = match self.bindings.count_bindings_for_role(&predicate, role_id)? {
            0 => match self.roles.delete_role_if_unreferenced(&predicate, role_id)? {
                RoleDeletion::Deleted => 0,
                RoleDeletion::Referenced(count) => count,
            },
            count => count,
        };
        if references > 0 {
            return Err(CatalogError::RoleInUse {
                role: role.id,
                bindings: references,
            });
        }
        self.audit(ctx, actor, AuditEventType::RoleRemoved, &role)?;
        Ok(())
    }

    /// Loads one role definition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the store fails.
    pub fn get(
        &self,
        ctx: &TenantContext,
        role_id: &RoleDefinitionId,
    ) -> Result<Option<RoleDefinition>, CatalogError> {
        Ok(self.roles.get_role(&ctx.predicate(), role_id)?)
    }

    /// Lists the tenant's role definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the store fails.
    pub fn list(&self, ctx: &TenantContext) -> Result<Vec<RoleDefinition>, CatalogError> {
        Ok(self.roles.list_roles(&ctx.predicate())?)
    }

    /// Loads a role or fails with [`CatalogError::NotFound`].
    fn require(
        &self,
        ctx: &TenantContext,
        role_id: &RoleDefinitionId,
    ) -> Result<RoleDefinition, CatalogError> {
        self.get(ctx, role_id)?.ok_or_else(|| CatalogError::NotFound(role_id.clone()))
    }

    /// Parses raw permission codes against the optional registry.
    fn parse_permissions(&self, codes: &[String]) -> Result<PermissionSet, ValidationError> {
        PermissionSet::parse(codes.iter().map(String::as_str), self.registry.as_ref())
    }

    /// Appends a role mutation to the ledger.
    fn audit(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        event_type: AuditEventType,
        role: &RoleDefinition,
    ) -> Result<(), CatalogError> {
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, role)?;
        let event = AuditEvent::by(actor, event_type, ROLE_ENTITY)
            .with_entity_id(role.id.as_str())
            .with_digest(&digest);
        self.ledger.append(ctx, event)?;
        Ok(())
    }
}
