// crates/northstar-core/src/runtime/store.rs
// ============================================================================
// Module: Northstar In-Memory Stores
// Description: In-memory role catalog, role binding, and audit stores.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of the store interfaces for tests, local demos,
//! and the `memory` store backend. Each store guards its state with a single
//! mutex, so uniqueness checks and inserts are atomic. A linked role catalog
//! and binding store share one mutex, so removing an unreferenced role cannot
//! interleave with a grant of it. Data is partitioned by tenant and every
//! access goes through a [`TenantPredicate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::AuditQuery;
use crate::core::AuditRecord;
use crate::core::BindingStatus;
use crate::core::ChainHead;
use crate::core::PageRequest;
use crate::core::PrincipalId;
use crate::core::RoleBinding;
use crate::core::RoleBindingId;
use crate::core::RoleDefinition;
use crate::core::RoleDefinitionId;
use crate::core::TenantId;
use crate::core::TenantPredicate;
use crate::core::Timestamp;
use crate::interfaces::AuditStore;
use crate::interfaces::RoleBindingStore;
use crate::interfaces::RoleCatalogStore;
use crate::interfaces::RoleDeletion;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a store mutex, mapping poisoning to a store error.
fn lock<'a, T>(mutex: &'a Mutex<T>, label: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Store(format!("{label} mutex poisoned")))
}

// ============================================================================
// SECTION: Role State
// ============================================================================

/// Role definitions and bindings guarded together.
#[derive(Debug, Default)]
struct RoleState {
    /// Role definitions keyed by tenant then role id.
    roles: BTreeMap<TenantId, BTreeMap<RoleDefinitionId, RoleDefinition>>,
    /// Bindings keyed by tenant then binding id.
    bindings: BTreeMap<TenantId, BTreeMap<RoleBindingId, RoleBinding>>,
    /// Set when `roles` is the live catalog of an [`InMemoryRoleCatalogStore`].
    holds_catalog: bool,
}

impl RoleState {
    /// Counts bindings of any status that reference a role.
    fn references(&self, tenant: &TenantId, role_id: &RoleDefinitionId) -> u64 {
        let count = self.bindings.get(tenant).map_or(0, |bindings| {
            bindings.values().filter(|binding| &binding.role_definition_id == role_id).count()
        });
        u64::try_from(count).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// SECTION: Role Catalog Store
// ============================================================================

/// In-memory role catalog store.
///
/// Pair it with [`InMemoryRoleCatalogStore::binding_store`] so role removal
/// and binding inserts serialize on one lock.
#[derive(Debug, Clone)]
pub struct InMemoryRoleCatalogStore {
    /// Shared role state.
    state: Arc<Mutex<RoleState>>,
}

impl InMemoryRoleCatalogStore {
    /// Creates an empty role catalog store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RoleState {
                holds_catalog: true,
                ..RoleState::default()
            })),
        }
    }

    /// Returns a binding store that shares this catalog's lock.
    #[must_use]
    pub fn binding_store(&self) -> InMemoryRoleBindingStore {
        InMemoryRoleBindingStore {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for InMemoryRoleCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleCatalogStore for InMemoryRoleCatalogStore {
    fn get_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<Option<RoleDefinition>, StoreError> {
        let guard = lock(&self.state, "role catalog")?;
        Ok(guard.roles.get(tenant.tenant_id()).and_then(|roles| roles.get(role_id)).cloned())
    }

    fn list_roles(&self, tenant: &TenantPredicate) -> Result<Vec<RoleDefinition>, StoreError> {
        let guard = lock(&self.state, "role catalog")?;
        Ok(guard
            .roles
            .get(tenant.tenant_id())
            .map(|roles| roles.values().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_role(
        &self,
        tenant: &TenantPredicate,
        role: &RoleDefinition,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, role)?;
        let mut guard = lock(&self.state, "role catalog")?;
        let roles = guard.roles.entry(tenant.tenant_id().clone()).or_default();
        if roles.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role {} already exists", role.id)));
        }
        roles.insert(role.id.clone(), role.clone());
        drop(guard);
        Ok(())
    }

    fn update_role(
        &self,
        tenant: &TenantPredicate,
        role: &RoleDefinition,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, role)?;
        let mut guard = lock(&self.state, "role catalog")?;
        let slot = guard
            .roles
            .get_mut(tenant.tenant_id())
            .and_then(|roles| roles.get_mut(&role.id))
            .ok_or_else(|| StoreError::NotFound(format!("role {}", role.id)))?;
        *slot = role.clone();
        drop(guard);
        Ok(())
    }

    fn delete_role_if_unreferenced(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<RoleDeletion, StoreError> {
        let mut guard = lock(&self.state, "role catalog")?;
        let exists =
            guard.roles.get(tenant.tenant_id()).is_some_and(|roles| roles.contains_key(role_id));
        if !exists {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        let references = guard.references(tenant.tenant_id(), role_id);
        if references > 0 {
            return Ok(RoleDeletion::Referenced(references));
        }
        if let Some(roles) = guard.roles.get_mut(tenant.tenant_id()) {
            roles.remove(role_id);
        }
        drop(guard);
        Ok(RoleDeletion::Deleted)
    }
}

// ============================================================================
// SECTION: Role Binding Store
// ============================================================================

/// In-memory role binding store.
///
/// A store from [`InMemoryRoleBindingStore::new`] stands alone and does not
/// check role existence. One from [`InMemoryRoleCatalogStore::binding_store`]
/// rejects bindings to roles missing from the shared catalog.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRoleBindingStore {
    /// Role state, shared with a catalog store when linked.
    state: Arc<Mutex<RoleState>>,
}

impl InMemoryRoleBindingStore {
    /// Creates an empty, unlinked role binding store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects tenant bindings matching a filter.
    fn collect(
        &self,
        tenant: &TenantPredicate,
        filter: impl Fn(&RoleBinding) -> bool,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        let guard = lock(&self.state, "role binding")?;
        Ok(guard
            .bindings
            .get(tenant.tenant_id())
            .map(|bindings| bindings.values().filter(|binding| filter(binding)).cloned().collect())
            .unwrap_or_default())
    }
}

impl RoleBindingStore for InMemoryRoleBindingStore {
    fn get_binding(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
    ) -> Result<Option<RoleBinding>, StoreError> {
        let guard = lock(&self.state, "role binding")?;
        Ok(guard
            .bindings
            .get(tenant.tenant_id())
            .and_then(|bindings| bindings.get(binding_id))
            .cloned())
    }

    fn bindings_for_principal(
        &self,
        tenant: &TenantPredicate,
        principal_id: &PrincipalId,
        status: Option<BindingStatus>,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        self.collect(tenant, |binding| {
            &binding.principal_id == principal_id && status.is_none_or(|s| binding.status == s)
        })
    }

    fn count_bindings_for_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<u64, StoreError> {
        let guard = lock(&self.state, "role binding")?;
        Ok(guard.references(tenant.tenant_id(), role_id))
    }

    fn active_bindings_lapsed_by(
        &self,
        tenant: &TenantPredicate,
        now: Timestamp,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        self.collect(tenant, |binding| {
            binding.status == BindingStatus::Active
                && binding.lapses_at().is_some_and(|lapse| lapse <= now)
        })
    }

    fn insert_binding(
        &self,
        tenant: &TenantPredicate,
        binding: &RoleBinding,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, binding)?;
        let mut guard = lock(&self.state, "role binding")?;
        let role_missing = guard.holds_catalog
            && !guard
                .roles
                .get(tenant.tenant_id())
                .is_some_and(|roles| roles.contains_key(&binding.role_definition_id));
        if role_missing {
            return Err(StoreError::NotFound(format!("role {}", binding.role_definition_id)));
        }
        let bindings = guard.bindings.entry(tenant.tenant_id().clone()).or_default();
        if bindings.contains_key(&binding.id) {
            return Err(StoreError::Conflict(format!("binding {} already exists", binding.id)));
        }
        let key = binding.uniqueness_key();
        if bindings
            .values()
            .any(|existing| {
                existing.status == BindingStatus::Active && existing.uniqueness_key() == key
            })
        {
            return Err(StoreError::Conflict("active binding already exists".to_string()));
        }
        bindings.insert(binding.id.clone(), binding.clone());
        drop(guard);
        Ok(())
    }

    fn update_binding_status(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
        status: BindingStatus,
        at: Timestamp,
        reason: &str,
    ) -> Result<RoleBinding, StoreError> {
        let mut guard = lock(&self.state, "role binding")?;
        let binding = guard
            .bindings
            .get_mut(tenant.tenant_id())
            .and_then(|bindings| bindings.get_mut(binding_id))
            .ok_or_else(|| StoreError::NotFound(format!("binding {binding_id}")))?;
        binding
            .transition(status, at, reason)
            .map_err(|err| StoreError::Conflict(err.to_string()))?;
        let updated = binding.clone();
        drop(guard);
        Ok(updated)
    }
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// In-memory append-only audit store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    /// Records keyed by tenant; index `n` holds sequence `n + 1`.
    records: Arc<Mutex<BTreeMap<TenantId, Vec<AuditRecord>>>>,
}

impl InMemoryAuditStore {
    /// Creates an empty audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn head(&self, tenant: &TenantPredicate) -> Result<Option<ChainHead>, StoreError> {
        let guard = lock(&self.records, "audit")?;
        Ok(guard.get(tenant.tenant_id()).and_then(|records| records.last()).map(|record| {
            ChainHead {
                sequence_number: record.sequence_number,
                current_hash: record.current_hash.clone(),
            }
        }))
    }

    fn insert_record(
        &self,
        tenant: &TenantPredicate,
        record: &AuditRecord,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, record)?;
        let mut guard = lock(&self.records, "audit")?;
        let records = guard.entry(tenant.tenant_id().clone()).or_default();
        let expected = u64::try_from(records.len()).unwrap_or(u64::MAX).saturating_add(1);
        if record.sequence_number != expected {
            return Err(StoreError::Conflict(format!(
                "sequence {} does not follow head (expected {expected})",
                record.sequence_number
            )));
        }
        records.push(record.clone());
        drop(guard);
        Ok(())
    }

    fn load_range(
        &self,
        tenant: &TenantPredicate,
        after_sequence: u64,
        until_sequence: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let guard = lock(&self.records, "audit")?;
        let Some(records) = guard.get(tenant.tenant_id()) else {
            return Ok(Vec::new());
        };
        let start = usize::try_from(after_sequence).unwrap_or(usize::MAX);
        Ok(records
            .iter()
            .skip(start)
            .take_while(|record| until_sequence.is_none_or(|until| record.sequence_number <= until))
            .take(limit)
            .cloned()
            .collect())
    }

    fn query(
        &self,
        query: &AuditQuery,
        page: PageRequest,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let guard = lock(&self.records, "audit")?;
        let Some(records) = guard.get(query.predicate().tenant_id()) else {
            return Ok(Vec::new());
        };
        let after = page.after_sequence.unwrap_or(0);
        Ok(records
            .iter()
            .filter(|record| record.sequence_number > after && query.matches(record))
            .take(page.limit)
            .cloned()
            .collect())
    }
}
