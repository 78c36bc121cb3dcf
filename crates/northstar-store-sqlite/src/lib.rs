// crates/northstar-store-sqlite/src/lib.rs
// ============================================================================
// Module: Northstar SQLite Store Library
// Description: Durable store implementations backed by SQLite.
// Purpose: Provide append-only audit persistence and role state storage.
// Dependencies: northstar-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `northstar-store-sqlite` implements the Northstar [`AuditStore`],
//! [`RoleCatalogStore`], and [`RoleBindingStore`] interfaces on one `SQLite`
//! database. Audit rows are append-only at the database level and every
//! statement is keyed by the tenant predicate.
//!
//! [`AuditStore`]: northstar_core::AuditStore
//! [`RoleCatalogStore`]: northstar_core::RoleCatalogStore
//! [`RoleBindingStore`]: northstar_core::RoleBindingStore

// ============================================================================
// SECTION: Modules
// ============================================================================

mod audit;
mod bindings;
mod catalog;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteNorthstarStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
