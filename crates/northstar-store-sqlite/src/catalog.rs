// crates/northstar-store-sqlite/src/catalog.rs
// ============================================================================
// Module: SQLite Role Catalog Store
// Description: Role definition persistence.
// Purpose: Persist tenant role definitions with their permission sets.
// Dependencies: northstar-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Scope kinds and permissions are stored as canonical JSON arrays and are
//! re-validated on load, so an edited row with a malformed permission code
//! fails as corruption instead of widening access. Removal runs in an
//! immediate transaction that deletes the row only while no binding
//! references it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use northstar_core::PermissionSet;
use northstar_core::RoleCatalogStore;
use northstar_core::RoleDeletion;
use northstar_core::RoleDefinition;
use northstar_core::RoleDefinitionId;
use northstar_core::ScopeKind;
use northstar_core::StoreError;
use northstar_core::TenantId;
use northstar_core::TenantPredicate;
use northstar_core::Timestamp;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;

use crate::store::SqliteNorthstarStore;
use crate::store::SqliteStoreError;
use crate::store::from_sql_u32;
use crate::store::from_sql_u64;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every role select.
const ROLE_COLUMNS: &str = "tenant_id, id, name, description, allowed_scope_kinds_json, \
                            permissions_json, is_system_role, allows_delegation, precedence, \
                            version, active, created_at, updated_at";

/// Raw role row prior to validation.
struct RoleRow {
    /// Tenant column.
    tenant_id: String,
    /// Identifier column.
    id: String,
    /// Name column.
    name: String,
    /// Description column.
    description: String,
    /// Scope kinds JSON.
    allowed_scope_kinds_json: String,
    /// Permissions JSON.
    permissions_json: String,
    /// System role flag.
    is_system_role: bool,
    /// Delegation flag.
    allows_delegation: bool,
    /// Precedence column.
    precedence: i64,
    /// Version column.
    version: i64,
    /// Active flag.
    active: bool,
    /// Creation time.
    created_at: i64,
    /// Modification time.
    updated_at: i64,
}

impl RoleRow {
    /// Reads a raw row.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            allowed_scope_kinds_json: row.get(4)?,
            permissions_json: row.get(5)?,
            is_system_role: row.get(6)?,
            allows_delegation: row.get(7)?,
            precedence: row.get(8)?,
            version: row.get(9)?,
            active: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    /// Validates the row into a role definition.
    fn into_role(self) -> Result<RoleDefinition, SqliteStoreError> {
        let allowed_scope_kinds: BTreeSet<ScopeKind> =
            serde_json::from_str(&self.allowed_scope_kinds_json)
                .map_err(|err| SqliteStoreError::Corrupt(format!("scope kinds: {err}")))?;
        if allowed_scope_kinds.is_empty() {
            return Err(SqliteStoreError::Corrupt(format!(
                "role {} has no allowed scope kinds",
                self.id
            )));
        }
        let permissions: PermissionSet = serde_json::from_str(&self.permissions_json)
            .map_err(|err| SqliteStoreError::Corrupt(format!("permissions: {err}")))?;
        Ok(RoleDefinition {
            tenant_id: TenantId::new(self.tenant_id),
            id: RoleDefinitionId::new(self.id),
            name: self.name,
            description: self.description,
            allowed_scope_kinds,
            permissions,
            is_system_role: self.is_system_role,
            allows_delegation: self.allows_delegation,
            precedence: from_sql_u32(self.precedence, "precedence")?,
            version: from_sql_u32(self.version, "version")?,
            active: self.active,
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
        })
    }
}

/// Serialized set columns of a role.
struct RoleJson {
    /// Scope kinds JSON.
    scope_kinds: String,
    /// Permissions JSON.
    permissions: String,
}

impl RoleJson {
    /// Serializes the set columns of a role.
    fn encode(role: &RoleDefinition) -> Result<Self, SqliteStoreError> {
        let scope_kinds = serde_json::to_string(&role.allowed_scope_kinds)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let permissions = serde_json::to_string(&role.permissions)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        Ok(Self {
            scope_kinds,
            permissions,
        })
    }
}

// ============================================================================
// SECTION: Role Catalog Store
// ============================================================================

impl RoleCatalogStore for SqliteNorthstarStore {
    fn get_role(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<Option<RoleDefinition>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                &format!(
                    "SELECT {ROLE_COLUMNS} FROM role_definitions WHERE tenant_id = ?1 AND id = ?2"
                ),
                params![tenant.tenant_id().as_str(), role_id.as_str()],
                RoleRow::read,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        match row {
            Some(row) => Ok(Some(row.into_role()?)),
            None => Ok(None),
        }
    }

    fn list_roles(&self, tenant: &TenantPredicate) -> Result<Vec<RoleDefinition>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {ROLE_COLUMNS} FROM role_definitions WHERE tenant_id = ?1 ORDER BY id ASC"
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![tenant.tenant_id().as_str()], RoleRow::read)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut roles = Vec::new();
        for row in rows {
            let row = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            roles.push(row.into_role()?);
        }
        Ok(roles)
    }

    fn insert_role(
        &self,
        tenant: &TenantPredicate,
        role: &RoleDefinition,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, role)?;
        let json = RoleJson::encode(role)?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO role_definitions (tenant_id, id, name, description, \
                 allowed_scope_kinds_json, permissions_json, is_system_role, allows_delegation, \
                 precedence, version, active, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, \
                 ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    role.tenant_id.as_str(),
                    role.id.as_str(),
                    role.name,
                    role.description,
                    json.scope_kinds,
                    json.permissions,
                    role.is_system_role,
                    role.allows_delegation,
                    i64::from(role.precedence),
                    i64::from(role.version),
                    role.active,
                    role.created_at.as_unix_millis(),
                    role.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| match SqliteStoreError::from_db(&err) {
                SqliteStoreError::Conflict(_) => {
                    SqliteStoreError::Conflict(format!("role {} already exists", role.id))
                }
                other => other,
            })?;
        Ok(())
    }

    fn update_role(
        &self,
        tenant: &TenantPredicate,
        role: &RoleDefinition,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, role)?;
        let json = RoleJson::encode(role)?;
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE role_definitions SET name = ?3, description = ?4, \
                 allowed_scope_kinds_json = ?5, permissions_json = ?6, is_system_role = ?7, \
                 allows_delegation = ?8, precedence = ?9, version = ?10, active = ?11, \
                 updated_at = ?12 WHERE tenant_id = ?1 AND id = ?2",
                params![
                    role.tenant_id.as_str(),
                    role.id.as_str(),
                    role.name,
                    role.description,
                    json.scope_kinds,
                    json.permissions,
                    role.is_system_role,
                    role.allows_delegation,
                    i64::from(role.precedence),
                    i64::from(role.version),
                    role.active,
                    role.updated_at.as_unix_millis(),
                ],
            )
            .map_err(|err| SqliteStoreError::from_db(&err))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("role {}", role.id)));
        }
        Ok(())
    }

    fn delete_role_if_unreferenced(
        &self,
        tenant: &TenantPredicate,
        role_id: &RoleDefinitionId,
    ) -> Result<RoleDeletion, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let keys = (tenant.tenant_id().as_str(), role_id.as_str());
        let changed = tx
            .execute(
                "DELETE FROM role_definitions WHERE tenant_id = ?1 AND id = ?2 AND NOT EXISTS \
                 (SELECT 1 FROM role_bindings WHERE tenant_id = ?1 AND role_definition_id = ?2)",
                params![keys.0, keys.1],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if changed == 0 {
            let references: i64 = tx
                .query_row(
                    "SELECT COUNT(1) FROM role_bindings WHERE tenant_id = ?1 AND \
                     role_definition_id = ?2",
                    params![keys.0, keys.1],
                    |row| row.get(0),
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if references == 0 {
                return Err(StoreError::NotFound(format!("role {role_id}")));
            }
            return Ok(RoleDeletion::Referenced(from_sql_u64(references, "binding count")?));
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(RoleDeletion::Deleted)
    }
}
