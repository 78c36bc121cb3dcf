// crates/northstar-store-sqlite/src/store.rs
// ============================================================================
// Module: Northstar SQLite Store
// Description: Connection setup, schema management, and shared row helpers.
// Purpose: Provide a durable backend for audit chains and role state.
// Dependencies: northstar-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteNorthstarStore`] owns one `SQLite` connection guarded by a mutex.
//! The schema holds three tenant-keyed tables: `audit_records`,
//! `role_definitions`, and `role_bindings`. Audit rows are protected by
//! triggers that abort any `UPDATE` or `DELETE`, and a partial unique index
//! enforces one active binding per `(principal, role, scope)` key.
//!
//! Security posture: database contents are untrusted on read; every row is
//! re-validated and malformed rows surface as corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use northstar_core::StoreError;
use northstar_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current schema version.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a configuration with default pragmas for the given path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or undecodable rows.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Uniqueness or sequence conflict.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

impl SqliteStoreError {
    /// Maps an engine error, surfacing constraint violations as conflicts.
    pub(crate) fn from_db(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(err.to_string())
            }
            _ => Self::Db(err.to_string()),
        }
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed audit, role catalog, and role binding store.
///
/// # Invariants
/// - Every statement binds the tenant of the caller's predicate.
/// - Audit rows are never updated or deleted once committed.
pub struct SqliteNorthstarStore {
    /// Shared connection.
    connection: Mutex<Connection>,
}

impl SqliteNorthstarStore {
    /// Opens (or creates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema version is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Locks the shared connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Row Conversions
// ============================================================================

/// Converts an unsigned counter into a `SQLite` integer.
pub(crate) fn to_sql_u64(value: u64, label: &str) -> Result<i64, SqliteStoreError> {
    i64::try_from(value)
        .map_err(|_| SqliteStoreError::Invalid(format!("{label} exceeds sqlite integer range")))
}

/// Converts a stored integer back into an unsigned counter.
pub(crate) fn from_sql_u64(value: i64, label: &str) -> Result<u64, SqliteStoreError> {
    u64::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative {label}: {value}")))
}

/// Converts a stored integer into a `u32` field.
pub(crate) fn from_sql_u32(value: i64, label: &str) -> Result<u32, SqliteStoreError> {
    u32::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("{label} out of range: {value}")))
}

/// Converts an optional stored timestamp.
pub(crate) fn optional_timestamp(value: Option<i64>) -> Option<Timestamp> {
    value.map(Timestamp::from_unix_millis)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS audit_records (
                    tenant_id TEXT NOT NULL,
                    sequence_number INTEGER NOT NULL,
                    timestamp INTEGER NOT NULL,
                    actor_id TEXT NOT NULL,
                    actor_role TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    entity_type TEXT NOT NULL,
                    entity_id TEXT,
                    payload_fingerprint TEXT NOT NULL,
                    correlation_id TEXT,
                    previous_hash TEXT NOT NULL,
                    current_hash TEXT NOT NULL,
                    PRIMARY KEY (tenant_id, sequence_number)
                );
                CREATE INDEX IF NOT EXISTS idx_audit_records_actor
                    ON audit_records (tenant_id, actor_id, sequence_number);
                CREATE INDEX IF NOT EXISTS idx_audit_records_entity
                    ON audit_records (tenant_id, entity_type, entity_id, sequence_number);
                CREATE INDEX IF NOT EXISTS idx_audit_records_time
                    ON audit_records (tenant_id, timestamp);
                CREATE TRIGGER IF NOT EXISTS audit_records_no_update
                    BEFORE UPDATE ON audit_records
                    BEGIN SELECT RAISE(ABORT, 'audit records are append-only'); END;
                CREATE TRIGGER IF NOT EXISTS audit_records_no_delete
                    BEFORE DELETE ON audit_records
                    BEGIN SELECT RAISE(ABORT, 'audit records are append-only'); END;
                CREATE TABLE IF NOT EXISTS role_definitions (
                    tenant_id TEXT NOT NULL,
                    id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    allowed_scope_kinds_json TEXT NOT NULL,
                    permissions_json TEXT NOT NULL,
                    is_system_role INTEGER NOT NULL,
                    allows_delegation INTEGER NOT NULL,
                    precedence INTEGER NOT NULL,
                    version INTEGER NOT NULL,
                    active INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, id)
                );
                CREATE TABLE IF NOT EXISTS role_bindings (
                    tenant_id TEXT NOT NULL,
                    id TEXT NOT NULL,
                    principal_id TEXT NOT NULL,
                    role_definition_id TEXT NOT NULL,
                    school_id TEXT,
                    class_id TEXT,
                    school_year_id TEXT,
                    scope_key TEXT NOT NULL,
                    effective_date INTEGER NOT NULL,
                    expiration_date INTEGER,
                    delegated_by TEXT,
                    delegation_expiry INTEGER,
                    status TEXT NOT NULL,
                    status_changed_at INTEGER,
                    status_reason TEXT,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (tenant_id, id)
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_role_bindings_active_key
                    ON role_bindings (tenant_id, principal_id, role_definition_id, scope_key)
                    WHERE status = 'active';
                CREATE INDEX IF NOT EXISTS idx_role_bindings_principal
                    ON role_bindings (tenant_id, principal_id);
                CREATE INDEX IF NOT EXISTS idx_role_bindings_role
                    ON role_bindings (tenant_id, role_definition_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
