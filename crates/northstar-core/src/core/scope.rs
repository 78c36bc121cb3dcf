// crates/northstar-core/src/core/scope.rs
// ============================================================================
// Module: Northstar Scope Model
// Description: Hierarchical grant scopes (District > School > Class/SchoolYear).
// Purpose: Decide whether a grant's scope covers a target resource scope.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`Scope`] is a tuple of optional school, class, and school-year
//! identifiers; its [`ScopeKind`] is derived from the most specific populated
//! field. Coverage is exact-match at the same kind, or strict ancestry in the
//! fixed hierarchy `District > School > {Class, SchoolYear}`. Class and
//! SchoolYear are siblings and never cover each other.
//!
//! Coverage fails closed: when the target omits a field needed to prove
//! ancestry (for example a class resource without its school), a school-level
//! grant does not cover it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::ValidationError;
use crate::core::identifiers::ClassId;
use crate::core::identifiers::SchoolId;
use crate::core::identifiers::SchoolYearId;

// ============================================================================
// SECTION: Scope Kind
// ============================================================================

/// Level of the scope hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Whole tenant (district).
    District,
    /// One school.
    School,
    /// One class.
    Class,
    /// One school year.
    SchoolYear,
}

impl ScopeKind {
    /// All scope kinds in hierarchy order.
    pub const ALL: [Self; 4] = [Self::District, Self::School, Self::Class, Self::SchoolYear];

    /// Returns a stable label for the scope kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::District => "district",
            Self::School => "school",
            Self::Class => "class",
            Self::SchoolYear => "school_year",
        }
    }

    /// Parses a scope kind label.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownScopeKind`] for unrecognized labels.
    pub fn parse(label: &str) -> Result<Self, ValidationError> {
        match label.trim() {
            "district" => Ok(Self::District),
            "school" => Ok(Self::School),
            "class" => Ok(Self::Class),
            "school_year" => Ok(Self::SchoolYear),
            other => Err(ValidationError::UnknownScopeKind(other.to_string())),
        }
    }

    /// Returns the depth in the hierarchy (0 for district).
    #[must_use]
    pub const fn depth(self) -> u8 {
        match self {
            Self::District => 0,
            Self::School => 1,
            Self::Class | Self::SchoolYear => 2,
        }
    }

    /// Returns true when `self` is a strict ancestor of `other`.
    #[must_use]
    pub const fn is_strict_ancestor_of(self, other: Self) -> bool {
        match self {
            Self::District => !matches!(other, Self::District),
            Self::School => matches!(other, Self::Class | Self::SchoolYear),
            Self::Class | Self::SchoolYear => false,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Concrete scope instance used by grants and resource targets.
///
/// # Invariants
/// - The derived kind is the most specific populated field; less specific
///   fields on a class or school-year scope act as qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Scope {
    /// School identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<SchoolId>,
    /// Class identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
    /// School year identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_year_id: Option<SchoolYearId>,
}

impl Scope {
    /// District-wide scope.
    #[must_use]
    pub const fn district() -> Self {
        Self {
            school_id: None,
            class_id: None,
            school_year_id: None,
        }
    }

    /// School scope.
    #[must_use]
    pub fn school(school_id: impl Into<SchoolId>) -> Self {
        Self {
            school_id: Some(school_id.into()),
            ..Self::district()
        }
    }

    /// Class scope without school qualification.
    #[must_use]
    pub fn class(class_id: impl Into<ClassId>) -> Self {
        Self {
            class_id: Some(class_id.into()),
            ..Self::district()
        }
    }

    /// Class scope qualified by its school.
    #[must_use]
    pub fn class_in_school(school_id: impl Into<SchoolId>, class_id: impl Into<ClassId>) -> Self {
        Self {
            school_id: Some(school_id.into()),
            class_id: Some(class_id.into()),
            school_year_id: None,
        }
    }

    /// School year scope.
    #[must_use]
    pub fn school_year(school_year_id: impl Into<SchoolYearId>) -> Self {
        Self {
            school_year_id: Some(school_year_id.into()),
            ..Self::district()
        }
    }

    /// School year scope qualified by a school.
    #[must_use]
    pub fn school_year_in_school(
        school_id: impl Into<SchoolId>,
        school_year_id: impl Into<SchoolYearId>,
    ) -> Self {
        Self {
            school_id: Some(school_id.into()),
            class_id: None,
            school_year_id: Some(school_year_id.into()),
        }
    }

    /// Returns the scope kind derived from the populated fields.
    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        if self.class_id.is_some() {
            ScopeKind::Class
        } else if self.school_year_id.is_some() {
            ScopeKind::SchoolYear
        } else if self.school_id.is_some() {
            ScopeKind::School
        } else {
            ScopeKind::District
        }
    }

    /// Validates identifier contents.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedScope`] when a populated identifier is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.school_id.as_ref().is_some_and(|id| id.as_str().trim().is_empty()) {
            return Err(ValidationError::MalformedScope("school_id must be non-empty"));
        }
        if self.class_id.as_ref().is_some_and(|id| id.as_str().trim().is_empty()) {
            return Err(ValidationError::MalformedScope("class_id must be non-empty"));
        }
        if self.school_year_id.as_ref().is_some_and(|id| id.as_str().trim().is_empty()) {
            return Err(ValidationError::MalformedScope("school_year_id must be non-empty"));
        }
        Ok(())
    }

    /// Returns an injective key for persisted uniqueness checks.
    ///
    /// Each field is written as `<byte length>:<value>`, or `~` when absent,
    /// so identifiers containing the separator cannot collide.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        [
            self.school_id.as_ref().map(SchoolId::as_str),
            self.class_id.as_ref().map(ClassId::as_str),
            self.school_year_id.as_ref().map(SchoolYearId::as_str),
        ]
        .into_iter()
        .map(key_field)
        .collect::<Vec<_>>()
        .join("/")
    }

    /// Returns the populated fields joined by `|` for display.
    fn label(&self) -> String {
        format!(
            "{}|{}|{}",
            self.school_id.as_ref().map_or("", SchoolId::as_str),
            self.class_id.as_ref().map_or("", ClassId::as_str),
            self.school_year_id.as_ref().map_or("", SchoolYearId::as_str),
        )
    }

    /// Returns true when this grant scope covers the target scope.
    #[must_use]
    pub fn covers(&self, target: &Self) -> bool {
        let grant_kind = self.kind();
        let target_kind = target.kind();
        if grant_kind == target_kind {
            return self.matches_exactly(target);
        }
        if !grant_kind.is_strict_ancestor_of(target_kind) {
            return false;
        }
        match grant_kind {
            ScopeKind::District => true,
            ScopeKind::School => {
                qualifier_matches(self.school_id.as_ref(), target.school_id.as_ref())
            }
            ScopeKind::Class | ScopeKind::SchoolYear => false,
        }
    }

    /// Exact match at the same kind, honoring qualifiers populated on the grant.
    fn matches_exactly(&self, target: &Self) -> bool {
        match self.kind() {
            ScopeKind::District => true,
            ScopeKind::School => self.school_id == target.school_id,
            ScopeKind::Class => {
                self.class_id == target.class_id
                    && qualifier_matches(self.school_id.as_ref(), target.school_id.as_ref())
                    && qualifier_matches(
                        self.school_year_id.as_ref(),
                        target.school_year_id.as_ref(),
                    )
            }
            ScopeKind::SchoolYear => {
                self.school_year_id == target.school_year_id
                    && qualifier_matches(self.school_id.as_ref(), target.school_id.as_ref())
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ScopeKind::District => f.write_str("district"),
            ScopeKind::School => write!(f, "school:{}", self.label()),
            ScopeKind::Class => write!(f, "class:{}", self.label()),
            ScopeKind::SchoolYear => write!(f, "school_year:{}", self.label()),
        }
    }
}

/// Encodes one optional key field with its byte length.
fn key_field(field: Option<&str>) -> String {
    field.map_or_else(|| "~".to_string(), |value| format!("{}:{value}", value.len()))
}

/// Returns true when a grant qualifier is absent or equal to the target's value.
fn qualifier_matches<T: PartialEq>(grant: Option<&T>, target: Option<&T>) -> bool {
    grant.is_none_or(|grant| target == Some(grant))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
