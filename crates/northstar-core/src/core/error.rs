// crates/northstar-core/src/core/error.rs
// ============================================================================
// Module: Northstar Error Taxonomy
// Description: Validation errors and the shared error classification.
// Purpose: Reject malformed inputs at construction time and classify failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible component maps its errors onto an [`ErrorClass`] so hosts can
//! route failures consistently: validation failures are rejected before
//! persistence, conflicts are retried once by the owning service, isolation
//! violations are terminal, and corruption is raised to compliance reviewers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Classes
// ============================================================================

/// Coarse classification shared by all Northstar errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing, expired, or mis-scoped grant.
    AuthorizationDenied,
    /// Resource tenant does not match the active tenant context.
    TenantIsolationViolation,
    /// Hash mismatch detected in the audit chain.
    AuditChainCorruption,
    /// Malformed input rejected before persistence.
    Validation,
    /// Duplicate binding or sequence reservation race.
    ConcurrencyConflict,
    /// Requested entity does not exist.
    NotFound,
    /// Storage or runtime infrastructure failure.
    Infrastructure,
}

impl ErrorClass {
    /// Returns a stable label for the class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationDenied => "authorization_denied",
            Self::TenantIsolationViolation => "tenant_isolation_violation",
            Self::AuditChainCorruption => "audit_chain_corruption",
            Self::Validation => "validation_error",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::NotFound => "not_found",
            Self::Infrastructure => "infrastructure",
        }
    }
}

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Errors raised when inputs fail structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Identifier failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidIdentifier {
        /// Field label.
        field: &'static str,
        /// Failure reason.
        reason: &'static str,
    },
    /// Permission code is empty.
    #[error("permission code must be non-empty")]
    EmptyPermission,
    /// Permission code contains disallowed characters or is too long.
    #[error("malformed permission code: {0}")]
    MalformedPermission(String),
    /// Permission code is not present in the known-permission registry.
    #[error("unknown permission code: {0}")]
    UnknownPermission(String),
    /// Scope kind label is not recognized.
    #[error("unknown scope kind: {0}")]
    UnknownScopeKind(String),
    /// Scope field combination is malformed.
    #[error("malformed scope: {0}")]
    MalformedScope(&'static str),
    /// Scope kind is not permitted by the role definition.
    #[error("scope kind {kind} is not allowed by role {role}")]
    ScopeNotAllowed {
        /// Scope kind label.
        kind: &'static str,
        /// Role identifier.
        role: String,
    },
    /// Role definition is invalid.
    #[error("invalid role definition: {0}")]
    InvalidRole(String),
    /// Date ordering is invalid.
    #[error("invalid date range: {0}")]
    InvalidDateRange(&'static str),
    /// Delegation metadata is invalid.
    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),
    /// Tenant context is invalid.
    #[error("invalid tenant context: {0}")]
    InvalidTenantContext(&'static str),
    /// Query or page parameters are invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ValidationError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}
