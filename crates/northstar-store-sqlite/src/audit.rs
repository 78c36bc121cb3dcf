// crates/northstar-store-sqlite/src/audit.rs
// ============================================================================
// Module: SQLite Audit Store
// Description: Append-only audit chain persistence.
// Purpose: Persist sealed audit records with gapless per-tenant sequences.
// Dependencies: northstar-core, rusqlite
// ============================================================================

//! ## Overview
//! Appends run in an `IMMEDIATE` transaction that re-reads the tenant head, so
//! two writers cannot both claim the same sequence. Queries translate every
//! [`AuditQuery`] filter into SQL and order by sequence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use northstar_core::AuditEventType;
use northstar_core::AuditQuery;
use northstar_core::AuditRecord;
use northstar_core::AuditStore;
use northstar_core::ChainHead;
use northstar_core::CorrelationId;
use northstar_core::PageRequest;
use northstar_core::PrincipalId;
use northstar_core::StoreError;
use northstar_core::TenantId;
use northstar_core::TenantPredicate;
use northstar_core::Timestamp;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::store::SqliteNorthstarStore;
use crate::store::SqliteStoreError;
use crate::store::from_sql_u64;
use crate::store::to_sql_u64;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every audit select.
const AUDIT_COLUMNS: &str = "tenant_id, sequence_number, timestamp, actor_id, actor_role, \
                             event_type, entity_type, entity_id, payload_fingerprint, \
                             correlation_id, previous_hash, current_hash";

/// Raw audit row prior to validation.
struct AuditRow {
    /// Tenant column.
    tenant_id: String,
    /// Sequence column.
    sequence_number: i64,
    /// Timestamp column.
    timestamp: i64,
    /// Actor column.
    actor_id: String,
    /// Actor role column.
    actor_role: String,
    /// Event type label.
    event_type: String,
    /// Entity type column.
    entity_type: String,
    /// Entity id column.
    entity_id: Option<String>,
    /// Fingerprint column.
    payload_fingerprint: String,
    /// Correlation column.
    correlation_id: Option<String>,
    /// Previous hash column.
    previous_hash: String,
    /// Current hash column.
    current_hash: String,
}

impl AuditRow {
    /// Reads a raw row.
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            sequence_number: row.get(1)?,
            timestamp: row.get(2)?,
            actor_id: row.get(3)?,
            actor_role: row.get(4)?,
            event_type: row.get(5)?,
            entity_type: row.get(6)?,
            entity_id: row.get(7)?,
            payload_fingerprint: row.get(8)?,
            correlation_id: row.get(9)?,
            previous_hash: row.get(10)?,
            current_hash: row.get(11)?,
        })
    }

    /// Validates the row into a record.
    fn into_record(self) -> Result<AuditRecord, SqliteStoreError> {
        let event_type = AuditEventType::parse(&self.event_type)
            .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        Ok(AuditRecord {
            tenant_id: TenantId::new(self.tenant_id),
            sequence_number: from_sql_u64(self.sequence_number, "sequence_number")?,
            timestamp: Timestamp::from_unix_millis(self.timestamp),
            actor_id: PrincipalId::new(self.actor_id),
            actor_role: self.actor_role,
            event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            payload_fingerprint: self.payload_fingerprint,
            correlation_id: self.correlation_id.map(CorrelationId::new),
            previous_hash: self.previous_hash,
            current_hash: self.current_hash,
        })
    }
}

/// Converts a page limit to a `SQLite` integer.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

impl AuditStore for SqliteNorthstarStore {
    fn head(&self, tenant: &TenantPredicate) -> Result<Option<ChainHead>, StoreError> {
        let connection = self.lock()?;
        let row: Option<(i64, String)> = connection
            .query_row(
                "SELECT sequence_number, current_hash FROM audit_records WHERE tenant_id = ?1 \
                 ORDER BY sequence_number DESC LIMIT 1",
                params![tenant.tenant_id().as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((sequence, current_hash)) = row else {
            return Ok(None);
        };
        Ok(Some(ChainHead {
            sequence_number: from_sql_u64(sequence, "sequence_number")?,
            current_hash,
        }))
    }

    fn insert_record(
        &self,
        tenant: &TenantPredicate,
        record: &AuditRecord,
    ) -> Result<(), StoreError> {
        StoreError::ensure_admitted(tenant, record)?;
        let sequence = to_sql_u64(record.sequence_number, "sequence_number")?;
        let mut connection = self.lock()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let last: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(sequence_number), 0) FROM audit_records WHERE tenant_id = ?1",
                params![tenant.tenant_id().as_str()],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if last.checked_add(1) != Some(sequence) {
            return Err(StoreError::Conflict(format!(
                "sequence {} does not follow head {last}",
                record.sequence_number
            )));
        }
        tx.execute(
            "INSERT INTO audit_records (tenant_id, sequence_number, timestamp, actor_id, \
             actor_role, event_type, entity_type, entity_id, payload_fingerprint, \
             correlation_id, previous_hash, current_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, \
             ?8, ?9, ?10, ?11, ?12)",
            params![
                record.tenant_id.as_str(),
                sequence,
                record.timestamp.as_unix_millis(),
                record.actor_id.as_str(),
                record.actor_role,
                record.event_type.as_str(),
                record.entity_type,
                record.entity_id,
                record.payload_fingerprint,
                record.correlation_id.as_ref().map(CorrelationId::as_str),
                record.previous_hash,
                record.current_hash,
            ],
        )
        .map_err(|err| SqliteStoreError::from_db(&err))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn load_range(
        &self,
        tenant: &TenantPredicate,
        after_sequence: u64,
        until_sequence: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let after = to_sql_u64(after_sequence, "after_sequence")?;
        let until = match until_sequence {
            Some(until) => to_sql_u64(until, "until_sequence")?,
            None => i64::MAX,
        };
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_records WHERE tenant_id = ?1 AND \
                 sequence_number > ?2 AND sequence_number <= ?3 ORDER BY sequence_number ASC \
                 LIMIT ?4"
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(
                params![tenant.tenant_id().as_str(), after, until, sql_limit(limit)],
                AuditRow::read,
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            records.push(row.into_record()?);
        }
        Ok(records)
    }

    fn query(
        &self,
        query: &AuditQuery,
        page: PageRequest,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let mut clauses = vec!["tenant_id = ?".to_string()];
        let mut values = vec![Value::Text(query.predicate().tenant_id().to_string())];
        if let Some(after) = page.after_sequence {
            clauses.push("sequence_number > ?".to_string());
            values.push(Value::Integer(to_sql_u64(after, "after_sequence")?));
        }
        if let Some(actor_id) = &query.actor_id {
            clauses.push("actor_id = ?".to_string());
            values.push(Value::Text(actor_id.to_string()));
        }
        if let Some(entity_type) = &query.entity_type {
            clauses.push("entity_type = ?".to_string());
            values.push(Value::Text(entity_type.clone()));
        }
        if let Some(entity_id) = &query.entity_id {
            clauses.push("entity_id = ?".to_string());
            values.push(Value::Text(entity_id.clone()));
        }
        if let Some(event_type) = query.event_type {
            clauses.push("event_type = ?".to_string());
            values.push(Value::Text(event_type.as_str().to_string()));
        }
        if let Some(correlation_id) = &query.correlation_id {
            clauses.push("correlation_id = ?".to_string());
            values.push(Value::Text(correlation_id.to_string()));
        }
        if let Some(from) = query.from_time {
            clauses.push("timestamp >= ?".to_string());
            values.push(Value::Integer(from.as_unix_millis()));
        }
        if let Some(to) = query.to_time {
            clauses.push("timestamp < ?".to_string());
            values.push(Value::Integer(to.as_unix_millis()));
        }
        values.push(Value::Integer(sql_limit(page.limit)));
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_records WHERE {} ORDER BY sequence_number ASC \
             LIMIT ?",
            clauses.join(" AND ")
        );
        let connection = self.lock()?;
        let mut statement =
            connection.prepare(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params_from_iter(values.iter()), AuditRow::read)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let record = row.into_record()?;
            if !query.matches(&record) {
                return Err(StoreError::Corrupt(format!(
                    "row {} escaped the query filter",
                    record.sequence_number
                )));
            }
            records.push(record);
        }
        Ok(records)
    }
}
