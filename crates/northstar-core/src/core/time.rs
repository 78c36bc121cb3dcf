// crates/northstar-core/src/core/time.rs
// ============================================================================
// Module: Northstar Time Model
// Description: Canonical millisecond timestamps for grants, records, and events.
// Purpose: Keep expiry checks and audit timestamps deterministic and replayable.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Timestamps are unix epoch milliseconds. The core never reads wall-clock time
//! directly; services obtain time from an injected
//! [`Clock`](crate::interfaces::Clock) so tests can pin or advance it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds per second.
pub const MILLIS_PER_SECOND: i64 = 1_000;
/// Milliseconds per hour.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;
/// Milliseconds per day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix epoch timestamp in milliseconds.
///
/// # Invariants
/// - Millisecond precision is the agreed precision for canonical payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the unix millisecond value.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns a timestamp shifted by the given number of milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns a timestamp shifted back by the given number of milliseconds.
    #[must_use]
    pub const fn minus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Returns the UTC hour of day (0..24).
    #[must_use]
    pub fn utc_hour(self) -> u8 {
        let hour = self.0.rem_euclid(MILLIS_PER_DAY) / MILLIS_PER_HOUR;
        u8::try_from(hour).unwrap_or(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
