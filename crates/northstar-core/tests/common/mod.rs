// crates/northstar-core/tests/common/mod.rs
// ============================================================================
// Module: Northstar Test Harness
// Description: Shared wiring of stores, ledger, services, and monitor.
// ============================================================================

//! Shared harness for northstar-core integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Helpers are shared across test binaries that each use a subset."
)]

use std::collections::BTreeSet;
use std::sync::Arc;

use northstar_core::Actor;
use northstar_core::AuditLedger;
use northstar_core::AuditingObserver;
use northstar_core::AuthorizationEngine;
use northstar_core::AuthzSettings;
use northstar_core::BindingRequest;
use northstar_core::InMemoryAuditStore;
use northstar_core::InMemoryRoleCatalogStore;
use northstar_core::LedgerSettings;
use northstar_core::Permission;
use northstar_core::PrincipalId;
use northstar_core::RoleBinding;
use northstar_core::RoleBindingService;
use northstar_core::RoleCatalog;
use northstar_core::RoleDefinition;
use northstar_core::RoleDefinitionId;
use northstar_core::RoleDraft;
use northstar_core::Scope;
use northstar_core::ScopeKind;
use northstar_core::SecurityMonitor;
use northstar_core::TenantContext;
use northstar_core::TenantId;
use northstar_core::TenantIsolationGuard;
use northstar_core::Timestamp;
use northstar_core::interfaces::AuditStore;
use northstar_core::runtime::ManualClock;
use northstar_core::runtime::MonitorSettings;
use northstar_core::runtime::RecordingAlertSink;

/// 2023-11-14T10:00:00Z, inside default business hours.
pub const NOW: Timestamp = Timestamp::from_unix_millis(1_699_956_000_000);

/// Fully wired in-memory Northstar stack.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub alerts: Arc<RecordingAlertSink>,
    pub ledger: Arc<AuditLedger>,
    pub catalog: RoleCatalog,
    pub bindings: Arc<RoleBindingService>,
    pub monitor: Arc<SecurityMonitor>,
    pub engine: AuthorizationEngine,
    pub guard: TenantIsolationGuard,
    pub admin: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(
            Arc::new(InMemoryAuditStore::new()),
            AuthzSettings::default(),
            MonitorSettings::default(),
        )
    }

    pub fn with_audit_store(store: Arc<dyn AuditStore>) -> Self {
        Self::build(store, AuthzSettings::default(), MonitorSettings::default())
    }

    pub fn with_settings(authz: AuthzSettings, monitor: MonitorSettings) -> Self {
        Self::build(Arc::new(InMemoryAuditStore::new()), authz, monitor)
    }

    fn build(
        audit_store: Arc<dyn AuditStore>,
        authz: AuthzSettings,
        monitor_settings: MonitorSettings,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        let alerts = Arc::new(RecordingAlertSink::new());
        let role_store = InMemoryRoleCatalogStore::new();
        let binding_store = Arc::new(role_store.binding_store());
        let roles = Arc::new(role_store);
        let ledger = Arc::new(AuditLedger::new(
            audit_store,
            clock.clone(),
            alerts.clone(),
            LedgerSettings::default(),
        ));
        let catalog = RoleCatalog::new(
            roles.clone(),
            binding_store.clone(),
            Arc::clone(&ledger),
            clock.clone(),
            None,
        );
        let bindings = Arc::new(RoleBindingService::new(
            roles.clone(),
            binding_store.clone(),
            Arc::clone(&ledger),
            clock.clone(),
            Vec::new(),
        ));
        let monitor = Arc::new(SecurityMonitor::new(
            Arc::clone(&ledger),
            bindings.clone(),
            alerts.clone(),
            clock.clone(),
            monitor_settings,
        ));
        let observer = Arc::new(AuditingObserver::new(
            Arc::clone(&ledger),
            Some(Arc::clone(&monitor)),
            alerts.clone(),
            clock.clone(),
        ));
        let engine = AuthorizationEngine::new(roles, binding_store, clock.clone(), observer, authz);
        let guard = TenantIsolationGuard::new(
            Arc::clone(&ledger),
            Some(Arc::clone(&monitor)),
            alerts.clone(),
            clock.clone(),
        );
        Self {
            clock,
            alerts,
            ledger,
            catalog,
            bindings,
            monitor,
            engine,
            guard,
            admin: Actor::new(PrincipalId::new("admin-1"), "district_admin"),
        }
    }

    /// Defines a role with the given permissions and allowed scope kinds.
    pub fn define_role(
        &self,
        ctx: &TenantContext,
        id: &str,
        permissions: &[&str],
        kinds: &[ScopeKind],
    ) -> RoleDefinition {
        self.define_role_with(ctx, id, permissions, kinds, 0, false)
    }

    /// Defines a role with explicit precedence and delegation flag.
    pub fn define_role_with(
        &self,
        ctx: &TenantContext,
        id: &str,
        permissions: &[&str],
        kinds: &[ScopeKind],
        precedence: u32,
        allows_delegation: bool,
    ) -> RoleDefinition {
        let draft = RoleDraft {
            id: RoleDefinitionId::new(id),
            name: id.to_string(),
            description: format!("{id} role"),
            allowed_scope_kinds: kinds.iter().copied().collect::<BTreeSet<_>>(),
            permissions: permissions.iter().map(ToString::to_string).collect(),
            is_system_role: false,
            allows_delegation,
            precedence,
        };
        self.catalog.create(ctx, &self.admin, draft).unwrap()
    }

    /// Grants a role directly, effective now.
    pub fn grant(&self, ctx: &TenantContext, principal: &str, role: &str, scope: Scope) -> RoleBinding {
        self.assign(ctx, request(principal, role, scope))
    }

    /// Assigns a prepared request.
    pub fn assign(&self, ctx: &TenantContext, request: BindingRequest) -> RoleBinding {
        self.bindings.assign(ctx, &self.admin, request).unwrap()
    }
}

/// Builds a tenant context.
pub fn ctx(tenant: &str) -> TenantContext {
    TenantContext::for_tenant(TenantId::new(tenant)).unwrap()
}

/// Parses a permission code.
pub fn perm(code: &str) -> Permission {
    Permission::parse(code).unwrap()
}

/// Builds a direct binding request.
pub fn request(principal: &str, role: &str, scope: Scope) -> BindingRequest {
    BindingRequest::direct(PrincipalId::new(principal), RoleDefinitionId::new(role), scope)
}

/// Builds a principal id.
pub fn principal(id: &str) -> PrincipalId {
    PrincipalId::new(id)
}
