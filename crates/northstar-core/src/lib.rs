// crates/northstar-core/src/lib.rs
// ============================================================================
// Module: Northstar Core Library
// Description: Public API surface for the Northstar governance core.
// Purpose: Expose core types, interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Northstar core provides tenant-scoped, deny-by-default authorization over
//! hierarchical school-district scopes, a fail-closed tenant isolation guard,
//! a per-tenant hash-chained audit ledger, and a security monitor that scores
//! principals and suspends abusive ones. It is storage-agnostic and integrates
//! through the store, clock, and alert sink interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AlertSink;
pub use interfaces::AuditStore;
pub use interfaces::Clock;
pub use interfaces::RoleBindingStore;
pub use interfaces::RoleCatalogStore;
pub use interfaces::RoleDeletion;
pub use interfaces::StoreError;
pub use runtime::AuditLedger;
pub use runtime::AuditingObserver;
pub use runtime::AuthorizationEngine;
pub use runtime::AuthzSettings;
pub use runtime::Decision;
pub use runtime::DecisionReason;
pub use runtime::InMemoryAuditStore;
pub use runtime::InMemoryRoleBindingStore;
pub use runtime::InMemoryRoleCatalogStore;
pub use runtime::LedgerError;
pub use runtime::LedgerSettings;
pub use runtime::RoleBindingService;
pub use runtime::RoleCatalog;
pub use runtime::SecurityMonitor;
pub use runtime::TenantIsolationGuard;
