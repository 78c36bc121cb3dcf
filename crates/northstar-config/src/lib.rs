// crates/northstar-config/src/lib.rs
// ============================================================================
// Module: Northstar Config Library
// Description: Canonical config model, validation, and runtime wiring.
// Purpose: Single source of truth for northstar.toml semantics.
// Dependencies: northstar-core, northstar-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `northstar-config` defines the canonical configuration model for Northstar.
//! It provides strict, fail-closed validation, conversion into the core runtime
//! settings, and a bootstrap that wires stores, sinks, and services.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bootstrap;
pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bootstrap::*;
pub use config::*;
