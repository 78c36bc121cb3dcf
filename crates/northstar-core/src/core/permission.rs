// crates/northstar-core/src/core/permission.rs
// ============================================================================
// Module: Northstar Permissions
// Description: Validated permission codes and canonical permission sets.
// Purpose: Parse permission lists once at role creation instead of per check.
// Dependencies: serde, crate::core::error
// ============================================================================

//! ## Overview
//! Permission codes are parsed into [`Permission`] values at the boundary where
//! a role definition is created or updated. Authorization checks compare
//! already-validated values and never re-parse strings. An optional
//! [`PermissionRegistry`] rejects codes that are well formed but unknown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::core::error::ValidationError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum permission code length in bytes.
pub const MAX_PERMISSION_LENGTH: usize = 128;

// ============================================================================
// SECTION: Permission
// ============================================================================

/// Validated permission code (for example `ViewStudents` or `grades.write`).
///
/// # Invariants
/// - Starts with an ASCII letter.
/// - Contains only ASCII alphanumerics, `.`, `_`, `:` or `-`.
/// - At most [`MAX_PERMISSION_LENGTH`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Parses and validates a permission code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPermission`] or
    /// [`ValidationError::MalformedPermission`] for invalid codes.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::EmptyPermission);
        }
        if code.len() > MAX_PERMISSION_LENGTH {
            return Err(ValidationError::MalformedPermission(truncate_for_error(code)));
        }
        let mut chars = code.chars();
        let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let rest_valid =
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
        if !starts_with_letter || !rest_valid {
            return Err(ValidationError::MalformedPermission(truncate_for_error(code)));
        }
        Ok(Self(code.to_string()))
    }

    /// Returns the permission code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Bounds a rejected code before echoing it in an error.
fn truncate_for_error(code: &str) -> String {
    code.chars().take(64).collect()
}

// ============================================================================
// SECTION: Permission Set
// ============================================================================

/// Canonical, deduplicated, ordered permission set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Parses a list of permission codes, validating each one.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, including unknown
    /// codes when a registry is supplied.
    pub fn parse<'a, I>(
        codes: I,
        registry: Option<&PermissionRegistry>,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = BTreeSet::new();
        for code in codes {
            let permission = Permission::parse(code)?;
            if let Some(registry) = registry {
                registry.check(&permission)?;
            }
            set.insert(permission);
        }
        Ok(Self(set))
    }

    /// Builds a set from already-validated permissions.
    #[must_use]
    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self(permissions.into_iter().collect())
    }

    /// Returns true when the set contains the permission.
    #[must_use]
    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    /// Returns the number of permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates permissions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

// ============================================================================
// SECTION: Permission Registry
// ============================================================================

/// Registry of known permission codes for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionRegistry {
    /// Known permission codes.
    known: BTreeSet<Permission>,
}

impl PermissionRegistry {
    /// Builds a registry from raw codes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when any code is malformed.
    pub fn from_codes<'a, I>(codes: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known = codes.into_iter().map(Permission::parse).collect::<Result<_, _>>()?;
        Ok(Self {
            known,
        })
    }

    /// Checks that a permission is known.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPermission`] when the code is not registered.
    pub fn check(&self, permission: &Permission) -> Result<(), ValidationError> {
        if self.known.contains(permission) {
            Ok(())
        } else {
            Err(ValidationError::UnknownPermission(permission.as_str().to_string()))
        }
    }
}
