// crates/northstar-core/src/runtime/mod.rs
// ============================================================================
// Module: Northstar Runtime
// Description: Authorization, isolation, audit, and monitoring services.
// Purpose: Execute governance operations against pluggable stores and sinks.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! Runtime services are synchronous and run inline with the caller, except the
//! security monitor, which aggregates signals in background batches. Every
//! service takes an explicit [`crate::core::TenantContext`]; none keeps ambient
//! tenant state.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod alerts;
pub mod authz;
pub mod bindings;
pub mod catalog;
pub mod clock;
pub mod guard;
pub mod ledger;
pub mod monitor;
pub mod monitor_task;
pub mod observer;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use alerts::FileAlertSink;
pub use alerts::NoopAlertSink;
pub use alerts::RecordingAlertSink;
pub use alerts::StderrAlertSink;
pub use authz::AuthorizationEngine;
pub use authz::AuthzError;
pub use authz::AuthzSettings;
pub use authz::Decision;
pub use authz::DecisionReason;
pub use authz::EffectivePermission;
pub use bindings::BindingError;
pub use bindings::ConflictRule;
pub use bindings::MutuallyExclusiveRoles;
pub use bindings::RoleBindingService;
pub use catalog::CatalogError;
pub use catalog::RoleCatalog;
pub use catalog::RoleMetadataUpdate;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use guard::BulkClearance;
pub use guard::Clearance;
pub use guard::IsolationViolation;
pub use guard::TenantIsolationGuard;
pub use ledger::AuditLedger;
pub use ledger::LedgerError;
pub use ledger::LedgerSettings;
pub use ledger::LedgerStream;
pub use monitor::BatchReport;
pub use monitor::BusinessHours;
pub use monitor::MonitorError;
pub use monitor::MonitorSettings;
pub use monitor::PrincipalSuspender;
pub use monitor::RiskLimits;
pub use monitor::RiskWeights;
pub use monitor::SecurityMonitor;
pub use monitor::SuspensionError;
pub use monitor::SuspensionPolicy;
pub use monitor::TierRules;
pub use monitor::TierThresholds;
pub use monitor::TierTransition;
pub use monitor_task::MonitorTask;
pub use monitor_task::spawn_monitor_task;
pub use observer::AuditingObserver;
pub use observer::DecisionObserver;
pub use observer::NoopDecisionObserver;
pub use store::InMemoryAuditStore;
pub use store::InMemoryRoleBindingStore;
pub use store::InMemoryRoleCatalogStore;
