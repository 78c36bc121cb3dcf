// crates/northstar-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Integration Tests
// Description: Durability, append-only enforcement, and tenancy of the SQLite backend.
// Purpose: Validate the SQLite store against the Northstar store contracts.
// ============================================================================

//! ## Overview
//! Integration tests for the `SQLite` store:
//! - Audit chains survive reopen and keep linking
//! - Triggers reject audit row updates and deletes
//! - Out-of-band row edits are reported by chain verification
//! - Active binding uniqueness is enforced by the partial index
//! - Referenced roles are never deleted and bindings need a live role
//! - Every read is confined to the predicate tenant

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use northstar_core::Actor;
use northstar_core::AuditEvent;
use northstar_core::AuditEventType;
use northstar_core::AuditLedger;
use northstar_core::AuditQuery;
use northstar_core::AuditRecord;
use northstar_core::AuditStore;
use northstar_core::AuthorizationEngine;
use northstar_core::AuthzSettings;
use northstar_core::BindingRequest;
use northstar_core::BindingStatus;
use northstar_core::DecisionReason;
use northstar_core::LedgerSettings;
use northstar_core::PageRequest;
use northstar_core::Permission;
use northstar_core::PermissionSet;
use northstar_core::PrincipalId;
use northstar_core::RoleBinding;
use northstar_core::RoleBindingId;
use northstar_core::RoleBindingService;
use northstar_core::RoleBindingStore;
use northstar_core::RoleCatalog;
use northstar_core::RoleCatalogStore;
use northstar_core::RoleDefinition;
use northstar_core::RoleDeletion;
use northstar_core::RoleDefinitionId;
use northstar_core::RoleDraft;
use northstar_core::Scope;
use northstar_core::ScopeKind;
use northstar_core::SequenceRange;
use northstar_core::StoreError;
use northstar_core::TenantContext;
use northstar_core::TenantId;
use northstar_core::TenantPredicate;
use northstar_core::Timestamp;
use northstar_core::runtime::ManualClock;
use northstar_core::runtime::NoopDecisionObserver;
use northstar_core::runtime::RecordingAlertSink;
use northstar_store_sqlite::SqliteNorthstarStore;
use northstar_store_sqlite::SqliteStoreConfig;
use northstar_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix_millis(1_699_956_000_000);

fn open(path: &Path) -> Arc<SqliteNorthstarStore> {
    Arc::new(SqliteNorthstarStore::open(&SqliteStoreConfig::at(path)).unwrap())
}

fn ctx(tenant: &str) -> TenantContext {
    TenantContext::for_tenant(TenantId::new(tenant)).unwrap()
}

fn ledger(store: Arc<SqliteNorthstarStore>) -> AuditLedger {
    AuditLedger::new(
        store,
        Arc::new(ManualClock::new(NOW)),
        Arc::new(RecordingAlertSink::new()),
        LedgerSettings::default(),
    )
}

fn registrar() -> Actor {
    Actor::new(PrincipalId::new("registrar-1"), "registrar")
}

fn mutation(index: usize) -> AuditEvent {
    AuditEvent::by(&registrar(), AuditEventType::DataMutation, "student")
        .with_entity_id(format!("student-{index}"))
        .with_fingerprint(format!("sha256:{index:064x}"))
}

fn role(tenant: &str, id: &str, codes: &[&str]) -> RoleDefinition {
    RoleDefinition {
        tenant_id: TenantId::new(tenant),
        id: RoleDefinitionId::new(id),
        name: id.to_string(),
        description: format!("{id} role"),
        allowed_scope_kinds: BTreeSet::from([ScopeKind::School, ScopeKind::Class]),
        permissions: PermissionSet::parse(codes.iter().copied(), None).unwrap(),
        is_system_role: false,
        allows_delegation: false,
        precedence: 3,
        version: 1,
        active: true,
        created_at: NOW,
        updated_at: NOW,
    }
}

fn binding(tenant: &str, id: &str, principal: &str, role: &str, scope: Scope) -> RoleBinding {
    RoleBinding {
        tenant_id: TenantId::new(tenant),
        id: RoleBindingId::new(id),
        principal_id: PrincipalId::new(principal),
        role_definition_id: RoleDefinitionId::new(role),
        scope,
        effective_date: NOW,
        expiration_date: None,
        delegated_by: None,
        delegation_expiry: None,
        status: BindingStatus::Active,
        status_changed_at: None,
        status_reason: None,
        created_at: NOW,
    }
}

fn seed_teacher(store: &SqliteNorthstarStore, tenant: &str) {
    store
        .insert_role(&ctx(tenant).predicate(), &role(tenant, "teacher", &["students.view"]))
        .unwrap();
}

fn set_status(
    store: &SqliteNorthstarStore,
    tenant: &TenantPredicate,
    id: &str,
    status: BindingStatus,
    reason: &str,
) -> Result<RoleBinding, StoreError> {
    store.update_binding_status(tenant, &RoleBindingId::new(id), status, NOW, reason)
}

// ============================================================================
// SECTION: Audit Chain
// ============================================================================

/// Tests that a chain survives reopen and continues linking.
#[test]
fn audit_chain_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("northstar.db");
    let oakland = ctx("oakland");
    let first_hash = {
        let ledger = ledger(open(&path));
        for index in 1 ..= 3 {
            ledger.append(&oakland, mutation(index)).unwrap();
        }
        ledger.head(&oakland).unwrap().unwrap().current_hash
    };

    let ledger = ledger(open(&path));
    let head = ledger.head(&oakland).unwrap().unwrap();
    assert_eq!(head.sequence_number, 3);
    assert_eq!(head.current_hash, first_hash);
    let receipt = ledger.append(&oakland, mutation(4)).unwrap();
    assert_eq!(receipt.sequence_number, 4);
    let verification = ledger.verify_chain(&oakland, SequenceRange::all()).unwrap();
    assert!(verification.valid);
    assert_eq!(verification.records_checked, 4);
}

/// Tests that the store rejects a sequence that does not follow the head.
#[test]
fn audit_insert_rejects_sequence_gap() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland");
    ledger(Arc::clone(&store)).append(&oakland, mutation(1)).unwrap();
    let mut record = AuditRecord::from_event(TenantId::new("oakland"), 3, NOW, mutation(3));
    record.previous_hash = "0".repeat(64);
    record.current_hash = "f".repeat(64);
    let err = store.insert_record(&oakland.predicate(), &record).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

/// Tests that records addressed to another tenant are refused.
#[test]
fn audit_insert_rejects_foreign_record() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let record = AuditRecord::from_event(TenantId::new("berkeley"), 1, NOW, mutation(1));
    let err = store.insert_record(&ctx("oakland").predicate(), &record).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
    assert!(store.head(&ctx("berkeley").predicate()).unwrap().is_none());
}

/// Tests that audit rows cannot be updated or deleted through SQL.
#[test]
fn audit_rows_are_append_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("northstar.db");
    let oakland = ctx("oakland");
    ledger(open(&path)).append(&oakland, mutation(1)).unwrap();

    let raw = Connection::open(&path).unwrap();
    let update = raw.execute(
        "UPDATE audit_records SET payload_fingerprint = 'forged' WHERE tenant_id = ?1",
        params!["oakland"],
    );
    assert!(update.unwrap_err().to_string().contains("append-only"));
    let delete = raw.execute("DELETE FROM audit_records WHERE tenant_id = ?1", params!["oakland"]);
    assert!(delete.unwrap_err().to_string().contains("append-only"));
}

/// Tests that an out-of-band edit is reported at the edited sequence only.
#[test]
fn tampered_row_is_reported_by_verification() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("northstar.db");
    let oakland = ctx("oakland");
    let store = open(&path);
    let ledger = ledger(Arc::clone(&store));
    for index in 1 ..= 6 {
        ledger.append(&oakland, mutation(index)).unwrap();
    }

    let raw = Connection::open(&path).unwrap();
    raw.execute_batch("DROP TRIGGER audit_records_no_update;").unwrap();
    raw.execute(
        "UPDATE audit_records SET payload_fingerprint = 'forged' WHERE tenant_id = ?1 AND \
         sequence_number = 4",
        params!["oakland"],
    )
    .unwrap();

    let verification = ledger.verify_chain(&oakland, SequenceRange::all()).unwrap();
    assert!(!verification.valid);
    assert_eq!(verification.violations, vec![4]);
    assert_eq!(verification.records_checked, 6);
}

/// Tests that SQL filters match the query semantics and paginate by cursor.
#[test]
fn audit_query_filters_and_paginates() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland");
    let ledger = ledger(Arc::clone(&store));
    for index in 1 ..= 5 {
        ledger.append(&oakland, mutation(index)).unwrap();
    }
    let other = Actor::new(PrincipalId::new("counselor-2"), "counselor");
    ledger
        .append(
            &oakland,
            AuditEvent::by(&other, AuditEventType::RoleDefined, "role_definition")
                .with_entity_id("counselor"),
        )
        .unwrap();
    ledger.append(&ctx("berkeley"), mutation(99)).unwrap();

    let by_actor = AuditQuery::for_tenant(&oakland).actor(PrincipalId::new("counselor-2"));
    let page = ledger.query(&by_actor, PageRequest::first(10)).unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].sequence_number, 6);

    let by_entity = AuditQuery::for_tenant(&oakland).entity("student", Some("student-2".into()));
    let page = ledger.query(&by_entity, PageRequest::first(10)).unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].entity_id.as_deref(), Some("student-2"));

    let mutations = AuditQuery::for_tenant(&oakland).event_type(AuditEventType::DataMutation);
    let first = ledger.query(&mutations, PageRequest::first(2)).unwrap();
    assert_eq!(first.records.len(), 2);
    assert_eq!(first.next_after_sequence, Some(2));
    let rest = ledger
        .query(
            &mutations,
            PageRequest {
                after_sequence: first.next_after_sequence,
                limit: 10,
            },
        )
        .unwrap();
    let sequences: Vec<u64> = rest.records.iter().map(|record| record.sequence_number).collect();
    assert_eq!(sequences, vec![3, 4, 5]);
    assert!(rest.records.iter().all(|record| record.tenant_id.as_str() == "oakland"));

    let empty_window = AuditQuery::for_tenant(&oakland).between(Some(NOW.plus_millis(1)), None);
    assert!(ledger.query(&empty_window, PageRequest::first(10)).unwrap().records.is_empty());
}

// ============================================================================
// SECTION: Role Catalog
// ============================================================================

/// Tests role round trips and per-tenant identifier uniqueness.
#[test]
fn roles_round_trip_and_stay_in_tenant() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    let berkeley = ctx("berkeley").predicate();
    let teacher = role("oakland", "teacher", &["grades.write", "students.view"]);
    store.insert_role(&oakland, &teacher).unwrap();
    store.insert_role(&berkeley, &role("berkeley", "teacher", &["students.view"])).unwrap();

    let loaded = store.get_role(&oakland, &RoleDefinitionId::new("teacher")).unwrap().unwrap();
    assert_eq!(loaded, teacher);
    assert!(matches!(store.insert_role(&oakland, &teacher), Err(StoreError::Conflict(_))));
    assert_eq!(store.list_roles(&berkeley).unwrap().len(), 1);
    assert!(
        store
            .get_role(&berkeley, &RoleDefinitionId::new("teacher"))
            .unwrap()
            .unwrap()
            .permissions
            .contains(&Permission::parse("students.view").unwrap())
    );

    let mut updated = teacher.clone();
    updated.version = 2;
    updated.active = false;
    store.update_role(&oakland, &updated).unwrap();
    let loaded = store.get_role(&oakland, &RoleDefinitionId::new("teacher")).unwrap().unwrap();
    assert_eq!(loaded.version, 2);
    assert!(!loaded.active);

    let teacher_id = RoleDefinitionId::new("teacher");
    assert_eq!(
        store.delete_role_if_unreferenced(&oakland, &teacher_id).unwrap(),
        RoleDeletion::Deleted
    );
    assert!(matches!(
        store.delete_role_if_unreferenced(&oakland, &teacher_id),
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(store.list_roles(&berkeley).unwrap().len(), 1);
}

/// Tests that a row with a malformed permission code loads as corruption.
#[test]
fn malformed_permission_row_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("northstar.db");
    let store = open(&path);
    let oakland = ctx("oakland").predicate();
    store.insert_role(&oakland, &role("oakland", "teacher", &["grades.write"])).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE role_definitions SET permissions_json = '[\"Grades Write\"]' WHERE id = ?1",
        params!["teacher"],
    )
    .unwrap();
    let err = store.get_role(&oakland, &RoleDefinitionId::new("teacher")).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

// ============================================================================
// SECTION: Role Bindings
// ============================================================================

/// Tests that only one active binding may exist per principal, role, and scope.
#[test]
fn active_binding_key_is_unique() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    seed_teacher(&store, "oakland");
    let scope = Scope::class_in_school("lincoln", "c101");
    let first = binding("oakland", "b1", "t-1", "teacher", scope.clone());
    store.insert_binding(&oakland, &first).unwrap();

    let duplicate = binding("oakland", "b2", "t-1", "teacher", scope.clone());
    assert!(matches!(store.insert_binding(&oakland, &duplicate), Err(StoreError::Conflict(_))));

    let revoked = set_status(&store, &oakland, "b1", BindingStatus::Revoked, "left").unwrap();
    assert_eq!(revoked.status, BindingStatus::Revoked);
    assert_eq!(revoked.status_reason.as_deref(), Some("left"));
    store.insert_binding(&oakland, &duplicate).unwrap();

    let other_tenant = ctx("berkeley").predicate();
    seed_teacher(&store, "berkeley");
    let foreign = binding("berkeley", "b1", "t-1", "teacher", scope);
    store.insert_binding(&other_tenant, &foreign).unwrap();
    let teacher = RoleDefinitionId::new("teacher");
    assert_eq!(store.count_bindings_for_role(&oakland, &teacher).unwrap(), 2);
    assert_eq!(store.count_bindings_for_role(&other_tenant, &teacher).unwrap(), 1);
}

/// Tests that scopes differing only around separator characters do not collide.
#[test]
fn binding_key_distinguishes_separator_characters() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    seed_teacher(&store, "oakland");
    let first = binding("oakland", "b1", "t-1", "teacher", Scope::class_in_school("a|", "x"));
    let second = binding("oakland", "b2", "t-1", "teacher", Scope::class_in_school("a", "|x"));
    store.insert_binding(&oakland, &first).unwrap();
    store.insert_binding(&oakland, &second).unwrap();
    let held = store.bindings_for_principal(&oakland, &PrincipalId::new("t-1"), None).unwrap();
    assert_eq!(held.len(), 2);
}

/// Tests that a referenced role survives deletion and an unknown role cannot be bound.
#[test]
fn role_deletion_and_binding_inserts_respect_references() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    seed_teacher(&store, "oakland");
    let teacher = RoleDefinitionId::new("teacher");
    let granted = binding("oakland", "b1", "t-1", "teacher", Scope::school("lincoln"));
    store.insert_binding(&oakland, &granted).unwrap();
    set_status(&store, &oakland, "b1", BindingStatus::Revoked, "left").unwrap();

    assert_eq!(
        store.delete_role_if_unreferenced(&oakland, &teacher).unwrap(),
        RoleDeletion::Referenced(1)
    );
    assert!(store.get_role(&oakland, &teacher).unwrap().is_some());

    let orphan = binding("oakland", "b2", "t-2", "counselor", Scope::school("lincoln"));
    assert!(matches!(store.insert_binding(&oakland, &orphan), Err(StoreError::NotFound(_))));
    let foreign = ctx("berkeley").predicate();
    let cross = binding("berkeley", "b3", "t-3", "teacher", Scope::school("lincoln"));
    assert!(matches!(store.insert_binding(&foreign, &cross), Err(StoreError::NotFound(_))));
    assert_eq!(store.count_bindings_for_role(&oakland, &teacher).unwrap(), 1);
}

/// Tests status transitions are compare-and-set on active.
#[test]
fn terminal_binding_cannot_transition_again() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    seed_teacher(&store, "oakland");
    let granted = binding("oakland", "b1", "t-1", "teacher", Scope::school("lincoln"));
    store.insert_binding(&oakland, &granted).unwrap();
    set_status(&store, &oakland, "b1", BindingStatus::Expired, "lapsed").unwrap();
    let err = set_status(&store, &oakland, "b1", BindingStatus::Revoked, "again").unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let err = set_status(&store, &oakland, "b9", BindingStatus::Revoked, "nope").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    let berkeley = ctx("berkeley").predicate();
    let err = set_status(&store, &berkeley, "b1", BindingStatus::Revoked, "cross").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    let stored = store.get_binding(&oakland, &RoleBindingId::new("b1")).unwrap().unwrap();
    assert_eq!(stored.status, BindingStatus::Expired);
}

/// Tests lapse detection uses the earlier of expiration and delegation expiry.
#[test]
fn lapsed_bindings_use_earliest_deadline() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let oakland = ctx("oakland").predicate();
    seed_teacher(&store, "oakland");
    let mut expiring = binding("oakland", "b1", "t-1", "teacher", Scope::school("lincoln"));
    expiring.expiration_date = Some(NOW.plus_millis(10));
    let mut delegated = binding("oakland", "b2", "t-2", "teacher", Scope::school("lincoln"));
    delegated.expiration_date = Some(NOW.plus_millis(1_000));
    delegated.delegated_by = Some(PrincipalId::new("principal-1"));
    delegated.delegation_expiry = Some(NOW.plus_millis(20));
    let open_ended = binding("oakland", "b3", "t-3", "teacher", Scope::school("lincoln"));
    for item in [&expiring, &delegated, &open_ended] {
        store.insert_binding(&oakland, item).unwrap();
    }

    let ids = |at: Timestamp| -> Vec<String> {
        store
            .active_bindings_lapsed_by(&oakland, at)
            .unwrap()
            .into_iter()
            .map(|binding| binding.id.as_str().to_string())
            .collect()
    };
    assert!(ids(NOW).is_empty());
    assert_eq!(ids(NOW.plus_millis(10)), vec!["b1".to_string()]);
    assert_eq!(ids(NOW.plus_millis(20)), vec!["b1".to_string(), "b2".to_string()]);

    let loaded = store.get_binding(&oakland, &RoleBindingId::new("b2")).unwrap().unwrap();
    assert_eq!(loaded, delegated);
    let held = store
        .bindings_for_principal(&oakland, &PrincipalId::new("t-3"), Some(BindingStatus::Active))
        .unwrap();
    assert_eq!(held, vec![open_ended]);
}

// ============================================================================
// SECTION: Service Wiring
// ============================================================================

/// Tests the governance services end to end over one `SQLite` database.
#[test]
fn services_authorize_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir.path().join("northstar.db"));
    let clock = Arc::new(ManualClock::new(NOW));
    let ledger = Arc::new(AuditLedger::new(
        store.clone(),
        clock.clone(),
        Arc::new(RecordingAlertSink::new()),
        LedgerSettings::default(),
    ));
    let catalog = RoleCatalog::new(
        store.clone(),
        store.clone(),
        Arc::clone(&ledger),
        clock.clone(),
        None,
    );
    let bindings = RoleBindingService::new(
        store.clone(),
        store.clone(),
        Arc::clone(&ledger),
        clock.clone(),
        Vec::new(),
    );
    let engine = AuthorizationEngine::new(
        store.clone(),
        store.clone(),
        clock.clone(),
        Arc::new(NoopDecisionObserver),
        AuthzSettings::default(),
    );
    let oakland = ctx("oakland");
    let admin = Actor::new(PrincipalId::new("admin-1"), "district_admin");
    catalog
        .create(
            &oakland,
            &admin,
            RoleDraft {
                id: RoleDefinitionId::new("teacher"),
                name: "Teacher".to_string(),
                description: "Classroom teacher".to_string(),
                allowed_scope_kinds: BTreeSet::from([ScopeKind::Class]),
                permissions: vec!["grades.write".to_string()],
                is_system_role: false,
                allows_delegation: false,
                precedence: 1,
            },
        )
        .unwrap();
    let grant = bindings
        .assign(
            &oakland,
            &admin,
            BindingRequest::direct(
                PrincipalId::new("t-1"),
                RoleDefinitionId::new("teacher"),
                Scope::class_in_school("lincoln", "c101"),
            ),
        )
        .unwrap();

    let grades = Permission::parse("grades.write").unwrap();
    let class = Scope::class_in_school("lincoln", "c101");
    let decision = engine.authorize(&oakland, &PrincipalId::new("t-1"), &grades, Some(&class));
    assert!(decision.allowed);

    bindings.revoke(&oakland, &admin, &grant.id, "reassigned").unwrap();
    let decision = engine.authorize(&oakland, &PrincipalId::new("t-1"), &grades, Some(&class));
    assert!(!decision.allowed);
    assert_eq!(decision.reason, DecisionReason::Revoked);

    let berkeley = ctx("berkeley");
    let foreign = engine.authorize(&berkeley, &PrincipalId::new("t-1"), &grades, Some(&class));
    assert_eq!(foreign.reason, DecisionReason::NoMatchingGrant);

    let verification = ledger.verify_chain(&oakland, SequenceRange::all()).unwrap();
    assert!(verification.valid);
    assert_eq!(verification.records_checked, 3);
}

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Tests that a directory path is rejected.
#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = SqliteNorthstarStore::open(&SqliteStoreConfig::at(dir.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

/// Tests that an unknown schema version refuses to open.
#[test]
fn unsupported_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("northstar.db");
    drop(open(&path));
    let raw = Connection::open(&path).unwrap();
    raw.execute("UPDATE store_meta SET version = 99", params![]).unwrap();
    drop(raw);
    let result = SqliteNorthstarStore::open(&SqliteStoreConfig::at(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}
