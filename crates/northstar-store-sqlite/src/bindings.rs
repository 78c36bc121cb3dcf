// crates/northstar-store-sqlite/src/bindings.rs
// ============================================================================
// Module: SQLite Role Binding Store
// Description: Role binding persistence with active-key uniqueness.
// Purpose: Persist grants and their status transitions.
// Dependencies: northstar-core, rusqlite
// ============================================================================

//! ## Overview
//! Scope fields are stored as nullable columns next to the canonical scope key.
//! A partial unique index on `(tenant, principal, role, scope_key)` limited to
//! `status = 'active'` rejects duplicate live grants even under concurrent
//! writers. Inserts only land while the referenced role definition exists.
//! Status updates are compare-and-set on `status = 'active'`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use northstar_core::BindingStatus;
use northstar_core::ClassId;
use northstar_core::PrincipalId;
use northstar_core::RoleBinding;
use northstar_core::RoleBindingId;
use northstar_core::RoleBindingStore;
use northstar_core::RoleDefinitionId;
use northstar_core::SchoolId;
use northstar_core::SchoolYearId;
use northstar_core::Scope;
use northstar_core::StoreError;
use northstar_core::TenantId;
use northstar_core::TenantPredicate;
use northstar_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;

use crate::store::SqliteNorthstarStore;
use crate::store::SqliteStoreError;
use crate::store::from_sql_u64;
use crate::store::optional_timestamp;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every binding select.
const BINDING_COLUMNS: &str = "tenant_id, id, principal_id, role_definition_id, school_id, \
                               class_id, school_year_id, effective_date, expiration_date, \
                               delegated_by, delegation_expiry, status, status_changed_at, \
                               status_reason, created_at";

/// Raw binding row prior to validation.
struct BindingRow {
    /// Tenant column.
    tenant_id: String,
    /// Identifier column.
    id: String,
    /// Grantee column.
    principal_id: String,
    /// Role column.
    role_definition_id: String,
    /// School column.
    school_id: Option<String>,
    /// Class column.
    class_id: Option<String>,
    /// School year column.
    school_year_id: Option<String>,
    /// Window start.
    effective_date: i64,
    /// Window end.
    expiration_date: Option<i64>,
    /// Delegating principal.
    delegated_by: Option<String>,
    /// Delegation expiry.
    delegation_expiry: Option<i64>,
    /// Status label.
    status: String,
    /// Last transition time.
    status_changed_at: Option<i64>,
    /// Last transition reason.
    status_reason: Option<String>,
    /// Creation time.
    created_at: i64,
}

impl BindingRow {
    /// Reads a raw row.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            id: row.get(1)?,
            principal_id: row.get(2)?,
            role_definition_id: row.get(3)?,
            school_id: row.get(4)?,
            class_id: row.get(5)?,
            school_year_id: row.get(6)?,
            effective_date: row.get(7)?,
            expiration_date: row.get(8)?,
            delegated_by: row.get(9)?,
            delegation_expiry: row.get(10)?,
            status: row.get(11)?,
            status_changed_at: row.get(12)?,
            status_reason: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    /// Validates the row into a binding.
    fn into_binding(self) -> Result<RoleBinding, SqliteStoreError> {
        let status = BindingStatus::from_label(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("binding {} has status {}", self.id, self.status))
        })?;
        let scope = Scope {
            school_id: self.school_id.map(SchoolId::new),
            class_id: self.class_id.map(ClassId::new),
            school_year_id: self.school_year_id.map(SchoolYearId::new),
        };
        scope
            .validate()
            .map_err(|err| SqliteStoreError::Corrupt(format!("binding {}: {err}", self.id)))?;
        if self.delegated_by.is_some() != self.delegation_expiry.is_some() {
            return Err(SqliteStoreError::Corrupt(format!(
                "binding {} has partial delegation",
                self.id
            )));
        }
        Ok(RoleBinding {
            tenant_id: TenantId::new(self.tenant_id),
            id: RoleBindingId::new(self.id),
            principal_id: PrincipalId::new(self.principal_id),
            role_definition_id: RoleDefinitionId::new(self.role_definition_id),
            scope,
            effective_date: Timestamp::from_unix_millis(self.effective_date),
            expiration_date: optional_timestamp(self.expiration_date),
            delegated_by: self.delegated_by.map(PrincipalId::new),
            delegation_expiry: optional_timestamp(self.delegation_expiry),
            status,
            status_changed_at: optional_timestamp(self.status_changed_at),
            status_reason: self.status_reason,
            created_at: Timestamp::from_unix_millis(self.created_at),
        })
    }
}

/// Loads bindings for a statement with positional parameters.
fn load_bindings<P: rusqlite::Params>(
    connection: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<RoleBinding>, SqliteStoreError> {
    let mut statement =
        connection.prepare(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let rows = statement
        .query_map(params, BindingRow::read)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut bindings = Vec::new();
    for row in rows {
        let row = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        bindings.push(row.into_binding()?);
    }
    Ok(bindings)
}

/// Loads one binding by identifier.
fn load_binding(
    connection: &Connection,
    tenant: &TenantPredicate,
    binding_id: &RoleBindingId,
) -> Result<Option<RoleBinding>, SqliteStoreError> {
    let row = connection
        .query_row(
            &format!(
                "SELECT {BINDING_COLUMNS} FROM role_bindings WHERE tenant_id = ?1 AND id = ?2"
            ),
            params![tenant.tenant_id().as_str(), binding_id.as_str()],
            BindingRow::read,
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    row.map(BindingRow::into_binding).transpose()
}

// ============================================================================
// SECTION: Role Binding Store
// ============================================================================

impl RoleBindingStore for SqliteNorthstarStore {
    fn get_binding(
        &self,
        tenant: &TenantPredicate,
        binding_id: &RoleBindingId,
    ) -> Result<Option<RoleBinding>, StoreError> {
        let connection = self.lock()?;
        Ok(load_binding(&connection, tenant, binding_id)?)
    }

    fn bindings_for_principal(
        &self,
        tenant: &TenantPredicate,
        principal_id: &PrincipalId,
        status: Option<BindingStatus>,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        let connection = self.lock()?;
        let bindings = match status {
            Some(status) => load_bindings(
                &connection,
                &format!(
                    "SELECT {BINDING_COLUMNS} FROM role_bindings WHERE tenant_id = ?1 AND \
                     principal_id = ?2 AND status = ?3 ORDER BY id ASC"
                ),
                params![tenant.tenant_id().as_str(), principal_id.as_str(), status.as_str()],
            )?,
            None => load_bindings(
                &connection,
                &format!(
                    "SELECT {BINDING_COLUMNS} FROM role_bindings WHERE tenant_id = ?1 AND \
                     principal_id = ?2 ORDER BY id ASC"
                ),
                params![tenant.tenant_id().as_str(), principal_id.as_str()],
            )?,
        };
        Ok(bindings)
    }

    fn count_bindings_for_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<u64, StoreError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(1) FROM role_bindings WHERE tenant_id = ?1 AND \
                 role_definition_id = ?2",
                params![tenant.tenant_id().as_str(), role_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(from_sql_u64(count, "binding count")?)
    }

    fn active_bindings_lapsed_by(
        &self,
        tenant: &TenantPredicate,
        now: Timestamp,
    ) -> Result<Vec<RoleBinding>, StoreError> {
        let connection = self.lock()?;
        let bindings = load_bindings(
            &connection,
            &format!(
                "SELECT {BINDING_COLUMNS} FROM role_bindings WHERE tenant_id = ?1 AND status = \
                 'active' AND ((expiration_date IS NOT NULL AND expiration_date <= ?2) OR \
                 (delegation_expiry IS NOT NULL AND delegation_expiry <= ?2)) ORDER BY id ASC"
            ),
            params![tenant.tenant_id().as_str(), now.as_unix_millis()],
        )?;
        Ok(bindings)
    }

    fn insert_binding(
        &self,
        tenant: &TenantPredicate,
        binding: &RoleBinding,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, binding)?;
        if binding.status != BindingStatus::Active {
            return Err(StoreError::Invalid(format!(
                "binding {} must be inserted as active",
                binding.id
            )));
        }
        let connection = self.lock()?;
        let inserted = connection
            .execute(
                "INSERT INTO role_bindings (tenant_id, id, principal_id, role_definition_id, \
                 school_id, class_id, school_year_id, scope_key, effective_date, \
                 expiration_date, delegated_by, delegation_expiry, status, status_changed_at, \
                 status_reason, created_at) SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13, ?14, ?15, ?16 WHERE EXISTS (SELECT 1 FROM role_definitions \
                 WHERE tenant_id = ?1 AND id = ?4)",
                params![
                    binding.tenant_id.as_str(),
                    binding.id.as_str(),
                    binding.principal_id.as_str(),
                    binding.role_definition_id.as_str(),
                    binding.scope.school_id.as_ref().map(SchoolId::as_str),
                    binding.scope.class_id.as_ref().map(ClassId::as_str),
                    binding.scope.school_year_id.as_ref().map(SchoolYearId::as_str),
                    binding.scope.canonical_key(),
                    binding.effective_date.as_unix_millis(),
                    binding.expiration_date.map(Timestamp::as_unix_millis),
                    binding.delegated_by.as_ref().map(PrincipalId::as_str),
                    binding.delegation_expiry.map(Timestamp::as_unix_millis),
                    binding.status.as_str(),
                    binding.status_changed_at.map(Timestamp::as_unix_millis),
                    binding.status_reason,
                    binding.created_at.as_unix_millis(),
                ],
            )
            .map_err(|err| match SqliteStoreError::from_db(&err) {
                SqliteStoreError::Conflict(_) => SqliteStoreError::Conflict(format!(
                    "binding {} duplicates an existing grant",
                    binding.id
                )),
                other => other,
            })?;
        if inserted == 0 {
            return Err(StoreError::NotFound(format!("role {}", binding.role_definition_id)));
        }
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
        let mut connection = self.lock()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(mut binding) = load_binding(&tx, tenant, binding_id)? else {
            return Err(StoreError::NotFound(format!("binding {binding_id}")));
        };
        binding
            .transition(status, at, reason)
            .map_err(|err| StoreError::Conflict(err.to_string()))?;
        let changed = tx
            .execute(
                "UPDATE role_bindings SET status = ?3, status_changed_at = ?4, status_reason = \
                 ?5 WHERE tenant_id = ?1 AND id = ?2 AND status = 'active'",
                params![
                    tenant.tenant_id().as_str(),
                    binding_id.as_str(),
                    status.as_str(),
                    at.as_unix_millis(),
                    reason,
                ],
            )
            .map_err(|err| SqliteStoreError::from_db(&err))?;
        if changed == 0 {
            return Err(StoreError::Conflict(format!("binding {binding_id} is no longer active")));
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(binding)
    }
}
