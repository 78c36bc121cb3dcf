// crates/northstar-core/src/core/mod.rs
// ============================================================================
// Module: Northstar Core Types
// Description: Canonical governance data model.
// Purpose: Provide stable, serializable types for tenancy, roles, audit, and security.
// Dependencies: serde, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types define tenant contexts, the scope hierarchy, validated
//! permissions, role definitions and bindings, hash-chained audit records, and
//! security signals. These types are the canonical source of truth for stores,
//! services, and operator tooling.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod permission;
pub mod role;
pub mod scope;
pub mod security;
pub mod tenant;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::Actor;
pub use audit::AppendReceipt;
pub use audit::AuditEvent;
pub use audit::AuditEventType;
pub use audit::AuditPage;
pub use audit::AuditQuery;
pub use audit::AuditRecord;
pub use audit::ChainHead;
pub use audit::ChainVerification;
pub use audit::PageRequest;
pub use audit::SequenceRange;
pub use error::ErrorClass;
pub use error::ValidationError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::GENESIS_HASH;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::ClassId;
pub use identifiers::CorrelationId;
pub use identifiers::EventId;
pub use identifiers::PrincipalId;
pub use identifiers::RoleBindingId;
pub use identifiers::RoleDefinitionId;
pub use identifiers::SchoolId;
pub use identifiers::SchoolYearId;
pub use identifiers::TenantId;
pub use permission::Permission;
pub use permission::PermissionRegistry;
pub use permission::PermissionSet;
pub use role::BindingRequest;
pub use role::BindingStanding;
pub use role::BindingStatus;
pub use role::BindingTransitionError;
pub use role::RoleBinding;
pub use role::RoleDefinition;
pub use role::RoleDraft;
pub use scope::Scope;
pub use scope::ScopeKind;
pub use security::Alert;
pub use security::AlertKind;
pub use security::AlertSeverity;
pub use security::PostureReport;
pub use security::PrincipalSecurityMetrics;
pub use security::RiskSummary;
pub use security::RiskTier;
pub use security::SecurityEvent;
pub use security::SecurityEventKind;
pub use tenant::HasTenantOwner;
pub use tenant::IsolationBoundary;
pub use tenant::TenantContext;
pub use tenant::TenantPredicate;
pub use time::Timestamp;
