// crates/northstar-core/tests/catalog.rs
// ============================================================================
// Module: Role Catalog Integration Tests
// Description: Role versioning, validation, removal rules, and alert sinks.
// ============================================================================

//! ## Overview
//! Covers role-definition administration: version bumps on permission
//! changes, boundary validation of permission codes, removal rules for
//! referenced and system roles, removal racing a concurrent grant, and the
//! file alert sink.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::Harness;
use common::NOW;
use common::ctx;
use northstar_core::Alert;
use northstar_core::AlertKind;
use northstar_core::AlertSeverity;
use northstar_core::AlertSink;
use northstar_core::AuditEventType;
use northstar_core::AuditLedger;
use northstar_core::AuditQuery;
use northstar_core::BindingStatus;
use northstar_core::InMemoryAuditStore;
use northstar_core::InMemoryRoleBindingStore;
use northstar_core::InMemoryRoleCatalogStore;
use northstar_core::LedgerSettings;
use northstar_core::PageRequest;
use northstar_core::PermissionRegistry;
use northstar_core::PrincipalId;
use northstar_core::RoleBinding;
use northstar_core::RoleBindingId;
use northstar_core::RoleBindingStore;
use northstar_core::RoleCatalog;
use northstar_core::RoleDefinitionId;
use northstar_core::RoleDraft;
use northstar_core::Scope;
use northstar_core::ScopeKind;
use northstar_core::StoreError;
use northstar_core::TenantId;
use northstar_core::TenantPredicate;
use northstar_core::Timestamp;
use northstar_core::ValidationError;
use northstar_core::runtime::CatalogError;
use northstar_core::runtime::FileAlertSink;
use northstar_core::runtime::ManualClock;
use northstar_core::runtime::RecordingAlertSink;
use northstar_core::runtime::RoleMetadataUpdate;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn draft(id: &str, permissions: &[&str]) -> RoleDraft {
    RoleDraft {
        id: RoleDefinitionId::new(id),
        name: id.to_string(),
        description: String::new(),
        allowed_scope_kinds: BTreeSet::from([ScopeKind::School]),
        permissions: permissions.iter().map(ToString::to_string).collect(),
        is_system_role: false,
        allows_delegation: false,
        precedence: 0,
    }
}

// ============================================================================
// SECTION: Versioning
// ============================================================================

/// Tests that permission changes bump the version and identical sets do not.
#[test]
fn permission_changes_bump_version() {
    let harness = Harness::new();
    let tenant = ctx("oakland");
    let role = harness.define_role(&tenant, "counselor", &["records.read"], &[ScopeKind::School]);
    assert_eq!(role.version, 1);
    let id = RoleDefinitionId::new("counselor");

    let same = harness
        .catalog
        .update_permissions(&tenant, &harness.admin, &id, &[" records.read ".to_string()])
        .unwrap();
    assert_eq!(same.version, 1);

    let changed = harness
        .catalog
        .update_permissions(
            &tenant,
            &harness.admin,
            &id,
            &["records.read".to_string(), "records.write".to_string()],
        )
        .unwrap();
    assert_eq!(changed.version, 2);
    assert_eq!(changed.permissions.len(), 2);

    let renamed = harness
        .catalog
        .update_metadata(
            &tenant,
            &harness.admin,
            &id,
            RoleMetadataUpdate {
                name: Some("School Counselor".to_string()),
                ..RoleMetadataUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.version, 2);
    assert_eq!(renamed.name, "School Counselor");

    let updates = harness
        .ledger
        .query(
            &AuditQuery::for_tenant(&tenant).event_type(AuditEventType::RoleUpdated),
            PageRequest::first(10),
        )
        .unwrap();
    assert_eq!(updates.records.len(), 2);
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Tests that malformed codes are rejected when the role is defined.
#[test]
fn malformed_permission_codes_are_rejected_at_definition() {
    let harness = Harness::new();
    let tenant = ctx("oakland");
    let err = harness.catalog.create(&tenant, &harness.admin, draft("bad", &["grades write"])).unwrap_err();
    assert!(matches!(err, CatalogError::Validation(ValidationError::MalformedPermission(_))));
    let err = harness.catalog.create(&tenant, &harness.admin, draft("empty", &["  "])).unwrap_err();
    assert!(matches!(err, CatalogError::Validation(ValidationError::EmptyPermission)));
    assert!(harness.catalog.list(&tenant).unwrap().is_empty());
    assert!(harness.ledger.head(&tenant).unwrap().is_none());
}

/// Tests that a registry rejects unknown codes.
#[test]
fn registry_rejects_unknown_codes() {
    let clock = Arc::new(ManualClock::new(NOW));
    let ledger = Arc::new(AuditLedger::new(
        Arc::new(InMemoryAuditStore::new()),
        clock.clone(),
        Arc::new(RecordingAlertSink::new()),
        LedgerSettings::default(),
    ));
    let registry = PermissionRegistry::from_codes(["grades.read", "grades.write"]).unwrap();
    let catalog = RoleCatalog::new(
        Arc::new(InMemoryRoleCatalogStore::new()),
        Arc::new(InMemoryRoleBindingStore::new()),
        ledger,
        clock,
        Some(registry),
    );
    let tenant = ctx("oakland");
    let admin = Harness::new().admin;
    assert!(catalog.create(&tenant, &admin, draft("grader", &["grades.read"])).is_ok());
    let err = catalog.create(&tenant, &admin, draft("rogue", &["grades.delete"])).unwrap_err();
    assert_eq!(
        err,
        CatalogError::Validation(ValidationError::UnknownPermission("grades.delete".to_string()))
    );
}

/// Tests that role identifiers are unique per tenant only.
#[test]
fn role_ids_are_scoped_to_tenant() {
    let harness = Harness::new();
    harness.define_role(&ctx("oakland"), "teacher", &["grades.read"], &[ScopeKind::Class]);
    assert!(harness.catalog.create(&ctx("oakland"), &harness.admin, draft("teacher", &["grades.read"])).is_err());
    assert!(harness.catalog.create(&ctx("berkeley"), &harness.admin, draft("teacher", &["grades.read"])).is_ok());
}

// ============================================================================
// SECTION: Removal
// ============================================================================

/// Tests removal rules for referenced, system, and unreferenced roles.
#[test]
fn removal_rules() {
    let harness = Harness::new();
    let tenant = ctx("oakland");
    harness.define_role(&tenant, "principal", &["students.view"], &[ScopeKind::School]);
    harness.grant(&tenant, "p-1", "principal", Scope::school("lincoln"));
    let err = harness
        .catalog
        .remove(&tenant, &harness.admin, &RoleDefinitionId::new("principal"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::RoleInUse { bindings: 1, .. }));

    let mut system = draft("district_admin", &["roles.manage"]);
    system.is_system_role = true;
    harness.catalog.create(&tenant, &harness.admin, system).unwrap();
    let err = harness
        .catalog
        .remove(&tenant, &harness.admin, &RoleDefinitionId::new("district_admin"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::SystemRole(_)));

    harness.catalog.create(&tenant, &harness.admin, draft("unused", &["students.view"])).unwrap();
    harness.catalog.remove(&tenant, &harness.admin, &RoleDefinitionId::new("unused")).unwrap();
    assert!(harness.catalog.get(&tenant, &RoleDefinitionId::new("unused")).unwrap().is_none());
    let removed = harness
        .ledger
        .query(
            &AuditQuery::for_tenant(&tenant).event_type(AuditEventType::RoleRemoved),
            PageRequest::first(10),
        )
        .unwrap();
    assert_eq!(removed.records.len(), 1);
}

/// Binding store that lands a concurrent grant right after counting zero references.
struct LateGrantStore {
    inner: InMemoryRoleBindingStore,
    late: RoleBinding,
}

impl RoleBindingStore for LateGrantStore {
    fn get_binding(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
    ) -> Result<Option<RoleBinding>, StoreError> {
        self.inner.get_binding(tenant, binding_id)
    }

    fn bindings_for_principal(
        &self,
        tenant: &TenantPredicate,
        principal_id: &PrincipalId,
        status: Option<BindingStatus>,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        self.inner.bindings_for_principal(tenant, principal_id, status)
    }

    fn count_bindings_for_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<u64, StoreError> {
        let before = self.inner.count_bindings_for_role(tenant, role_id)?;
        self.inner.insert_binding(tenant, &self.late)?;
        Ok(before)
    }

    fn active_bindings_lapsed_by(
        &self,
        tenant: &TenantPredicate,
        now: Timestamp,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        self.inner.active_bindings_lapsed_by(tenant, now)
    }

    fn insert_binding(
        &self,
        tenant: &TenantPredicate,
        binding: &RoleBinding,
    ) -> Result<(), StoreError> {
        self.inner.insert_binding(tenant, binding)
    }

    fn update_binding_status(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
        status: BindingStatus,
        at: Timestamp,
        reason: &str,
    ) -> Result<RoleBinding, StoreError> {
        self.inner.update_binding_status(tenant, binding_id, status, at, reason)
    }
}

/// Tests that a grant landing between the reference count and the delete keeps the role.
#[test]
fn removal_loses_race_to_concurrent_grant() {
    let tenant = ctx("oakland");
    let clock = Arc::new(ManualClock::new(NOW));
    let ledger = Arc::new(AuditLedger::new(
        Arc::new(InMemoryAuditStore::new()),
        clock.clone(),
        Arc::new(RecordingAlertSink::new()),
        LedgerSettings::default(),
    ));
    let roles = InMemoryRoleCatalogStore::new();
    let late = RoleBinding {
        tenant_id: TenantId::new("oakland"),
        id: RoleBindingId::new("late-1"),
        principal_id: PrincipalId::new("aide-1"),
        role_definition_id: RoleDefinitionId::new("aide"),
        scope: Scope::school("lincoln"),
        effective_date: NOW,
        expiration_date: None,
        delegated_by: None,
        delegation_expiry: None,
        status: BindingStatus::Active,
        status_changed_at: None,
        status_reason: None,
        created_at: NOW,
    };
    let bindings = Arc::new(LateGrantStore {
        inner: roles.binding_store(),
        late,
    });
    let catalog = RoleCatalog::new(
        Arc::new(roles),
        bindings.clone(),
        Arc::clone(&ledger),
        clock,
        None,
    );
    let admin = Harness::new().admin;
    catalog.create(&tenant, &admin, draft("aide", &["students.view"])).unwrap();

    let err = catalog.remove(&tenant, &admin, &RoleDefinitionId::new("aide")).unwrap_err();
    assert!(matches!(err, CatalogError::RoleInUse { bindings: 1, .. }));
    assert!(catalog.get(&tenant, &RoleDefinitionId::new("aide")).unwrap().is_some());
    let removed = ledger
        .query(
            &AuditQuery::for_tenant(&tenant).event_type(AuditEventType::RoleRemoved),
            PageRequest::first(10),
        )
        .unwrap();
    assert!(removed.records.is_empty());
    let granted = bindings.get_binding(&tenant.predicate(), &RoleBindingId::new("late-1")).unwrap();
    assert!(granted.is_some());
}

// ============================================================================
// SECTION: Alert Sinks
// ============================================================================

/// Tests that the file sink appends one JSON line per alert.
#[test]
fn file_alert_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let sink = FileAlertSink::new(&path).unwrap();
    for kind in [AlertKind::ElevatedRisk, AlertKind::AuditChainCorruption] {
        sink.raise(
            &Alert::new(AlertSeverity::Warning, kind, "check", NOW).for_tenant(TenantId::new("oakland")),
        );
    }
    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: Alert = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first.kind, AlertKind::ElevatedRisk);
    assert_eq!(first.tenant_id, Some(TenantId::new("oakland")));
}
