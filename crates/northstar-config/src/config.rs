// crates/northstar-config/src/config.rs
// ============================================================================
// Module: Northstar Configuration
// Description: Configuration loading and validation for Northstar.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: northstar-core, northstar-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys, malformed permission codes, and inconsistent sections fail
//! closed. Validated sections convert into the runtime settings consumed by
//! `northstar-core`, which never reads files or the environment itself.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use northstar_core::AuthzSettings;
use northstar_core::LedgerSettings;
use northstar_core::Permission;
use northstar_core::PermissionRegistry;
use northstar_core::RoleDefinitionId;
use northstar_core::runtime::BusinessHours;
use northstar_core::runtime::ConflictRule;
use northstar_core::runtime::MonitorSettings;
use northstar_core::runtime::MutuallyExclusiveRoles;
use northstar_core::runtime::RiskLimits;
use northstar_core::runtime::RiskWeights;
use northstar_core::runtime::SuspensionPolicy;
use northstar_core::runtime::TierRules;
use northstar_core::runtime::TierThresholds;
use northstar_core::runtime::ledger::DEFAULT_STREAM_PAGE_SIZE;
use northstar_core::runtime::ledger::MAX_PAGE_SIZE;
use northstar_store_sqlite::SqliteStoreConfig;
use northstar_store_sqlite::SqliteStoreMode;
use northstar_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "northstar.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "NORTHSTAR_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of sensitive or registered permission codes.
const MAX_PERMISSION_ENTRIES: usize = 4096;
/// Maximum number of conflict rules.
const MAX_CONFLICT_RULES: usize = 256;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Northstar configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NorthstarConfig {
    /// Audit ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Authorization configuration.
    #[serde(default)]
    pub authz: AuthzConfig,
    /// Security monitor configuration.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Alert sink configuration.
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl NorthstarConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `NORTHSTAR_CONFIG`, then
    /// `./northstar.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.authz.validate()?;
        self.monitor.validate()?;
        self.store.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Largest page a query may request.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Page size used for streaming exports and verification.
    #[serde(default = "default_stream_page_size")]
    pub stream_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            stream_page_size: default_stream_page_size(),
        }
    }
}

impl LedgerConfig {
    /// Validates ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.stream_page_size == 0 || self.stream_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "ledger.stream_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Converts into ledger runtime settings.
    #[must_use]
    pub const fn to_settings(&self) -> LedgerSettings {
        LedgerSettings {
            max_page_size: self.max_page_size,
            stream_page_size: self.stream_page_size,
        }
    }
}

/// Returns the default query page limit.
const fn default_max_page_size() -> usize {
    MAX_PAGE_SIZE
}

/// Returns the default streaming page size.
const fn default_stream_page_size() -> usize {
    DEFAULT_STREAM_PAGE_SIZE
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorization configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// Permissions whose allows are audited.
    #[serde(default)]
    pub sensitive_permissions: Vec<String>,
    /// Optional registry of known permission codes; unknown codes are rejected when set.
    #[serde(default)]
    pub known_permissions: Option<Vec<String>>,
    /// Mutually exclusive role sets.
    #[serde(default)]
    pub exclusive_roles: Vec<ExclusiveRolesConfig>,
}

/// Set of roles a principal may not hold together.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExclusiveRolesConfig {
    /// Rule name reported on rejection.
    pub name: String,
    /// Role identifiers in the set.
    pub roles: Vec<String>,
}

impl AuthzConfig {
    /// Validates authorization configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sensitive_permissions.len() > MAX_PERMISSION_ENTRIES {
            return Err(ConfigError::Invalid(
                "authz.sensitive_permissions exceeds entry limit".to_string(),
            ));
        }
        let registry = self.permission_registry()?;
        for permission in self.sensitive()? {
            if let Some(registry) = &registry {
                registry.check(&permission).map_err(|err| {
                    ConfigError::Invalid(format!("authz.sensitive_permissions: {err}"))
                })?;
            }
        }
        if self.exclusive_roles.len() > MAX_CONFLICT_RULES {
            return Err(ConfigError::Invalid(
                "authz.exclusive_roles exceeds entry limit".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for rule in &self.exclusive_roles {
            rule.validate()?;
            if !names.insert(rule.name.trim()) {
                return Err(ConfigError::Invalid(format!(
                    "authz.exclusive_roles name {} is duplicated",
                    rule.name.trim()
                )));
            }
        }
        Ok(())
    }

    /// Parses the sensitive permission codes.
    fn sensitive(&self) -> Result<BTreeSet<Permission>, ConfigError> {
        self.sensitive_permissions
            .iter()
            .map(|code| {
                Permission::parse(code).map_err(|err| {
                    ConfigError::Invalid(format!("authz.sensitive_permissions: {err}"))
                })
            })
            .collect()
    }

    /// Builds the known-permission registry, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a registry code is malformed.
    pub fn permission_registry(&self) -> Result<Option<PermissionRegistry>, ConfigError> {
        let Some(codes) = &self.known_permissions else {
            return Ok(None);
        };
        if codes.is_empty() {
            return Err(ConfigError::Invalid(
                "authz.known_permissions must not be empty when set".to_string(),
            ));
        }
        if codes.len() > MAX_PERMISSION_ENTRIES {
            return Err(ConfigError::Invalid(
                "authz.known_permissions exceeds entry limit".to_string(),
            ));
        }
        PermissionRegistry::from_codes(codes.iter().map(String::as_str))
            .map(Some)
            .map_err(|err| ConfigError::Invalid(format!("authz.known_permissions: {err}")))
    }

    /// Converts into authorization runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a sensitive permission is malformed.
    pub fn to_settings(&self) -> Result<AuthzSettings, ConfigError> {
        Ok(AuthzSettings {
            sensitive_permissions: self.sensitive()?,
        })
    }

    /// Builds the assignment conflict rules.
    #[must_use]
    pub fn conflict_rules(&self) -> Vec<Arc<dyn ConflictRule>> {
        self.exclusive_roles
            .iter()
            .map(|rule| {
                let roles = rule.roles.iter().map(|role| RoleDefinitionId::new(role.trim()));
                Arc::new(MutuallyExclusiveRoles::new(rule.name.trim(), roles))
                    as Arc<dyn ConflictRule>
            })
            .collect()
    }
}

impl ExclusiveRolesConfig {
    /// Validates one exclusive role set.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "authz.exclusive_roles name must be non-empty".to_string(),
            ));
        }
        let mut roles = BTreeSet::new();
        for role in &self.roles {
            let id = RoleDefinitionId::parse(role.trim()).map_err(|err| {
                ConfigError::Invalid(format!("authz.exclusive_roles {}: {err}", self.name))
            })?;
            roles.insert(id);
        }
        if roles.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "authz.exclusive_roles {} must list at least two distinct roles",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Monitor
// ============================================================================

/// Security monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Periodic processing interval in milliseconds.
    pub interval_ms: u64,
    /// Maximum signals applied per batch.
    pub batch_size: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// How long processed event ids are remembered, in milliseconds.
    pub dedup_window_ms: u64,
    /// Idle principals are dropped after this many milliseconds.
    pub retention_ms: u64,
    /// Recent timestamps kept per principal.
    pub max_recent_timestamps: usize,
    /// Principals listed in posture reports.
    pub top_risk_count: usize,
    /// Factor weights.
    pub weights: RiskWeightsConfig,
    /// Factor saturation limits.
    pub limits: RiskLimitsConfig,
    /// Tier thresholds.
    pub thresholds: TierThresholdsConfig,
    /// Count-based tier floors.
    pub rules: TierRulesConfig,
    /// Business hours in UTC.
    pub business_hours: BusinessHoursConfig,
    /// Response to Tier 2 and Tier 3.
    pub suspension: SuspensionMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let settings = MonitorSettings::default();
        Self {
            interval_ms: settings.interval_ms,
            batch_size: settings.batch_size,
            queue_capacity: settings.queue_capacity,
            dedup_window_ms: settings.dedup_window_ms.unsigned_abs(),
            retention_ms: settings.retention_ms.unsigned_abs(),
            max_recent_timestamps: settings.max_recent_timestamps,
            top_risk_count: settings.top_risk_count,
            weights: RiskWeightsConfig::from(settings.weights),
            limits: RiskLimitsConfig::from(settings.limits),
            thresholds: TierThresholdsConfig::from(settings.thresholds),
            rules: TierRulesConfig::from(settings.rules),
            business_hours: BusinessHoursConfig::from(settings.business_hours),
            suspension: SuspensionMode::Automatic,
        }
    }
}

impl MonitorConfig {
    /// Validates monitor configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("monitor.interval_ms", self.interval_ms)?;
        require_positive("monitor.batch_size", self.batch_size as u64)?;
        require_positive("monitor.queue_capacity", self.queue_capacity as u64)?;
        require_positive("monitor.dedup_window_ms", self.dedup_window_ms)?;
        require_positive("monitor.retention_ms", self.retention_ms)?;
        require_positive("monitor.max_recent_timestamps", self.max_recent_timestamps as u64)?;
        if self.batch_size > self.queue_capacity {
            return Err(ConfigError::Invalid(
                "monitor.batch_size must not exceed monitor.queue_capacity".to_string(),
            ));
        }
        millis_to_i64("monitor.dedup_window_ms", self.dedup_window_ms)?;
        millis_to_i64("monitor.retention_ms", self.retention_ms)?;
        self.weights.validate()?;
        self.limits.validate()?;
        self.thresholds.validate()?;
        self.business_hours.validate()?;
        Ok(())
    }

    /// Converts into monitor runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a duration exceeds the supported range.
    pub fn to_settings(&self) -> Result<MonitorSettings, ConfigError> {
        Ok(MonitorSettings {
            interval_ms: self.interval_ms,
            batch_size: self.batch_size,
            queue_capacity: self.queue_capacity,
            dedup_window_ms: millis_to_i64("monitor.dedup_window_ms", self.dedup_window_ms)?,
            retention_ms: millis_to_i64("monitor.retention_ms", self.retention_ms)?,
            max_recent_timestamps: self.max_recent_timestamps,
            top_risk_count: self.top_risk_count,
            weights: self.weights.to_weights(),
            limits: self.limits.to_limits()?,
            thresholds: self.thresholds.to_thresholds(),
            rules: self.rules.to_rules(),
            business_hours: self.business_hours.to_hours(),
            suspension: self.suspension.to_policy(),
        })
    }
}

/// Risk factor weights.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskWeightsConfig {
    /// Failed login weight.
    pub failed_logins: f64,
    /// Authorization failure weight.
    pub authorization_failures: f64,
    /// Isolation violation weight.
    pub isolation_violations: f64,
    /// Off-hours activity weight.
    pub off_hours_access: f64,
    /// Distinct source address weight.
    pub source_addresses: f64,
    /// Recent burst weight.
    pub recency: f64,
}

impl Default for RiskWeightsConfig {
    fn default() -> Self {
        Self::from(RiskWeights::default())
    }
}

impl From<RiskWeights> for RiskWeightsConfig {
    fn from(weights: RiskWeights) -> Self {
        Self {
            failed_logins: weights.failed_logins,
            authorization_failures: weights.authorization_failures,
            isolation_violations: weights.isolation_violations,
            off_hours_access: weights.off_hours_access,
            source_addresses: weights.source_addresses,
            recency: weights.recency,
        }
    }
}

impl RiskWeightsConfig {
    /// Returns the weights in a fixed order with their labels.
    const fn labeled(&self) -> [(&'static str, f64); 6] {
        [
            ("failed_logins", self.failed_logins),
            ("authorization_failures", self.authorization_failures),
            ("isolation_violations", self.isolation_violations),
            ("off_hours_access", self.off_hours_access),
            ("source_addresses", self.source_addresses),
            ("recency", self.recency),
        ]
    }

    /// Validates weights are finite, non-negative, and not all zero.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut total = 0.0;
        for (label, weight) in self.labeled() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "monitor.weights.{label} must be a finite non-negative number"
                )));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(ConfigError::Invalid(
                "monitor.weights must contain at least one positive weight".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts into runtime weights.
    const fn to_weights(self) -> RiskWeights {
        RiskWeights {
            failed_logins: self.failed_logins,
            authorization_failures: self.authorization_failures,
            isolation_violations: self.isolation_violations,
            off_hours_access: self.off_hours_access,
            source_addresses: self.source_addresses,
            recency: self.recency,
        }
    }
}

/// Counts at which each risk factor saturates.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskLimitsConfig {
    /// Failed logins.
    pub failed_logins: u64,
    /// Authorization failures.
    pub authorization_failures: u64,
    /// Isolation violations.
    pub isolation_violations: u64,
    /// Off-hours signals.
    pub off_hours_events: u64,
    /// Additional distinct source addresses beyond the first.
    pub source_addresses: u64,
    /// Signals within the burst window.
    pub burst_events: u64,
    /// Burst window length in milliseconds.
    pub burst_window_ms: u64,
}

impl Default for RiskLimitsConfig {
    fn default() -> Self {
        Self::from(RiskLimits::default())
    }
}

impl From<RiskLimits> for RiskLimitsConfig {
    fn from(limits: RiskLimits) -> Self {
        Self {
            failed_logins: limits.failed_logins,
            authorization_failures: limits.authorization_failures,
            isolation_violations: limits.isolation_violations,
            off_hours_events: limits.off_hours_events,
            source_addresses: limits.source_addresses,
            burst_events: limits.burst_events,
            burst_window_ms: limits.burst_window_ms.unsigned_abs(),
        }
    }
}

impl RiskLimitsConfig {
    /// Validates every limit is positive.
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("monitor.limits.failed_logins", self.failed_logins)?;
        require_positive("monitor.limits.authorization_failures", self.authorization_failures)?;
        require_positive("monitor.limits.isolation_violations", self.isolation_violations)?;
        require_positive("monitor.limits.off_hours_events", self.off_hours_events)?;
        require_positive("monitor.limits.source_addresses", self.source_addresses)?;
        require_positive("monitor.limits.burst_events", self.burst_events)?;
        require_positive("monitor.limits.burst_window_ms", self.burst_window_ms)?;
        millis_to_i64("monitor.limits.burst_window_ms", self.burst_window_ms)?;
        Ok(())
    }

    /// Converts into runtime limits.
    fn to_limits(self) -> Result<RiskLimits, ConfigError> {
        Ok(RiskLimits {
            failed_logins: self.failed_logins,
            authorization_failures: self.authorization_failures,
            isolation_violations: self.isolation_violations,
            off_hours_events: self.off_hours_events,
            source_addresses: self.source_addresses,
            burst_events: self.burst_events,
            burst_window_ms: millis_to_i64("monitor.limits.burst_window_ms", self.burst_window_ms)?,
        })
    }
}

/// Risk score thresholds per tier.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierThresholdsConfig {
    /// Tier 1 threshold.
    pub tier1: f64,
    /// Tier 2 threshold.
    pub tier2: f64,
    /// Tier 3 threshold.
    pub tier3: f64,
}

impl Default for TierThresholdsConfig {
    fn default() -> Self {
        Self::from(TierThresholds::default())
    }
}

impl From<TierThresholds> for TierThresholdsConfig {
    fn from(thresholds: TierThresholds) -> Self {
        Self {
            tier1: thresholds.tier1,
            tier2: thresholds.tier2,
            tier3: thresholds.tier3,
        }
    }
}

impl TierThresholdsConfig {
    /// Validates thresholds lie in `(0, 1]` and strictly ascend.
    fn validate(&self) -> Result<(), ConfigError> {
        for (label, value) in [("tier1", self.tier1), ("tier2", self.tier2), ("tier3", self.tier3)]
        {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "monitor.thresholds.{label} must be in (0, 1]"
                )));
            }
        }
        if self.tier1 >= self.tier2 || self.tier2 >= self.tier3 {
            return Err(ConfigError::Invalid(
                "monitor.thresholds must satisfy tier1 < tier2 < tier3".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts into runtime thresholds.
    const fn to_thresholds(self) -> TierThresholds {
        TierThresholds {
            tier1: self.tier1,
            tier2: self.tier2,
            tier3: self.tier3,
        }
    }
}

/// Count-based tier floors; zero disables a rule.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierRulesConfig {
    /// Failed logins that force at least Tier 1.
    pub failed_logins_tier1: u64,
    /// Authorization failures that force at least Tier 2.
    pub authorization_failures_tier2: u64,
    /// Sensitive-permission denials that force Tier 3.
    pub sensitive_denials_tier3: u64,
    /// Isolation violations that force Tier 3.
    pub isolation_violations_tier3: u64,
}

impl Default for TierRulesConfig {
    fn default() -> Self {
        Self::from(TierRules::default())
    }
}

impl From<TierRules> for TierRulesConfig {
    fn from(rules: TierRules) -> Self {
        Self {
            failed_logins_tier1: rules.failed_logins_tier1,
            authorization_failures_tier2: rules.authorization_failures_tier2,
            sensitive_denials_tier3: rules.sensitive_denials_tier3,
            isolation_violations_tier3: rules.isolation_violations_tier3,
        }
    }
}

impl TierRulesConfig {
    /// Converts into runtime tier rules.
    const fn to_rules(self) -> TierRules {
        TierRules {
            failed_logins_tier1: self.failed_logins_tier1,
            authorization_failures_tier2: self.authorization_failures_tier2,
            sensitive_denials_tier3: self.sensitive_denials_tier3,
            isolation_violations_tier3: self.isolation_violations_tier3,
        }
    }
}

/// Business hours as a half-open UTC hour range.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusinessHoursConfig {
    /// First business hour (0-23).
    pub start_hour: u8,
    /// First hour after business hours (0-23).
    pub end_hour: u8,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self::from(BusinessHours::default())
    }
}

impl From<BusinessHours> for BusinessHoursConfig {
    fn from(hours: BusinessHours) -> Self {
        Self {
            start_hour: hours.start_hour,
            end_hour: hours.end_hour,
        }
    }
}

impl BusinessHoursConfig {
    /// Validates hour bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(ConfigError::Invalid(
                "monitor.business_hours hours must be between 0 and 23".to_string(),
            ));
        }
        if self.start_hour == self.end_hour {
            return Err(ConfigError::Invalid(
                "monitor.business_hours start_hour and end_hour must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts into runtime business hours.
    const fn to_hours(self) -> BusinessHours {
        BusinessHours {
            start_hour: self.start_hour,
            end_hour: self.end_hour,
        }
    }
}

/// Response to Tier 2 and Tier 3 transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionMode {
    /// Revoke the principal's active bindings.
    #[default]
    Automatic,
    /// Alert only.
    AlertOnly,
}

impl SuspensionMode {
    /// Converts into the runtime policy.
    const fn to_policy(self) -> SuspensionPolicy {
        match self {
            Self::Automatic => SuspensionPolicy::Automatic,
            Self::AlertOnly => SuspensionPolicy::AlertOnly,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path(path)?;
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store configuration for the sqlite backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory stores.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Alerts
// ============================================================================

/// Alert sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Alert sink type.
    #[serde(default)]
    pub sink: AlertSinkType,
    /// JSON-lines file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AlertsConfig {
    /// Validates alert sink configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AlertSinkType::File, Some(path)) => validate_sink_path(path),
            (AlertSinkType::File, None) => {
                Err(ConfigError::Invalid("file alert sink requires path".to_string()))
            }
            (AlertSinkType::Stderr | AlertSinkType::None, Some(_)) => Err(ConfigError::Invalid(
                "alerts.path is only valid for the file sink".to_string(),
            )),
            (AlertSinkType::Stderr | AlertSinkType::None, None) => Ok(()),
        }
    }
}

/// Alert sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// Append-only JSON lines file.
    File,
    /// Discard alerts.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_limits("config path", path)
}

/// Validates store paths against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_limits("store path", path)
}

/// Validates alert sink paths against security limits.
fn validate_sink_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_limits("alerts path", path)
}

/// Rejects empty, overlong, or overlong-component paths.
fn validate_path_limits(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}

/// Rejects zero for a count or duration.
fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    Ok(())
}

/// Converts a configured millisecond duration into the runtime representation.
fn millis_to_i64(field: &str, value: u64) -> Result<i64, ConfigError> {
    i64::try_from(value).map_err(|_| ConfigError::Invalid(format!("{field} is out of range")))
}
