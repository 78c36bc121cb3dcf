// crates/northstar-core/src/core/identifiers.rs
// ============================================================================
// Module: Northstar Identifiers
// Description: Canonical opaque identifiers for tenants, principals, roles, and records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, rand
// ============================================================================

//! ## Overview
//! Identifiers are opaque UTF-8 strings that serialize transparently. Each type
//! is distinct so a principal id can never be passed where a tenant id is
//! expected. Construction through [`parse`](TenantId::parse) rejects empty or
//! oversized values; [`new`](TenantId::new) is reserved for trusted inputs such
//! as rows already validated by a store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

use crate::core::error::ValidationError;
use crate::core::hashing::hex_encode;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum identifier length in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares a transparent string identifier with validation helpers.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parses an identifier, rejecting empty or oversized values.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::InvalidIdentifier`] when the value is
            /// blank or exceeds [`MAX_IDENTIFIER_LENGTH`].
            pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                validate_identifier($label, &id)?;
                Ok(Self(id))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(
    /// Tenant (school district) identifier.
    ///
    /// # Invariants
    /// - No data or permission crosses two distinct tenant identifiers.
    TenantId,
    "tenant_id"
);

string_identifier!(
    /// Principal identifier (user or service account) from the identity provider.
    PrincipalId,
    "principal_id"
);

string_identifier!(
    /// Role definition identifier, unique within a tenant.
    RoleDefinitionId,
    "role_definition_id"
);

string_identifier!(
    /// Role binding identifier, unique within a tenant.
    RoleBindingId,
    "role_binding_id"
);

string_identifier!(
    /// School identifier.
    SchoolId,
    "school_id"
);

string_identifier!(
    /// Class (section) identifier.
    ClassId,
    "class_id"
);

string_identifier!(
    /// School year identifier.
    SchoolYearId,
    "school_year_id"
);

string_identifier!(
    /// Correlation identifier linking audit records of one logical operation.
    CorrelationId,
    "correlation_id"
);

string_identifier!(
    /// Security event identifier used for at-least-once deduplication.
    EventId,
    "event_id"
);

impl EventId {
    /// Generates a random 128-bit event identifier rendered as lowercase hex.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex_encode(&bytes))
    }
}

impl RoleBindingId {
    /// Generates a random binding identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("rb-{}", EventId::random()))
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a raw identifier value.
fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidIdentifier {
            field,
            reason: "must be non-empty",
        });
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::InvalidIdentifier {
            field,
            reason: "exceeds max length",
        });
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidIdentifier {
            field,
            reason: "must not contain control characters",
        });
    }
    Ok(())
}
