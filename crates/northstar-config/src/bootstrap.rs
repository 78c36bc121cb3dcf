// crates/northstar-config/src/bootstrap.rs
// ============================================================================
// Module: Northstar Bootstrap
// Description: Runtime assembly from validated configuration.
// Purpose: Wire stores, ledger, services, and monitor into one runtime.
// Dependencies: northstar-core, northstar-store-sqlite
// ============================================================================

//! ## Overview
//! [`bootstrap`] turns a validated [`NorthstarConfig`] into a
//! [`NorthstarRuntime`]. Every service shares one ledger, one clock, and one
//! alert sink; the security monitor is wired into the decision observer and
//! the isolation guard so their signals reach it. The `SQLite` backend opens a
//! single store handle that serves the audit, catalog, and binding traits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use northstar_core::AlertSink;
use northstar_core::AuditLedger;
use northstar_core::AuditStore;
use northstar_core::AuditingObserver;
use northstar_core::AuthorizationEngine;
use northstar_core::Clock;
use northstar_core::InMemoryAuditStore;
use northstar_core::InMemoryRoleCatalogStore;
use northstar_core::RoleBindingService;
use northstar_core::RoleBindingStore;
use northstar_core::RoleCatalog;
use northstar_core::RoleCatalogStore;
use northstar_core::SecurityMonitor;
use northstar_core::TenantIsolationGuard;
use northstar_core::runtime::FileAlertSink;
use northstar_core::runtime::NoopAlertSink;
use northstar_core::runtime::StderrAlertSink;
use northstar_core::runtime::SystemClock;
use northstar_store_sqlite::SqliteNorthstarStore;
use northstar_store_sqlite::SqliteStoreError;
use thiserror::Error;

use crate::config::AlertSinkType;
use crate::config::AlertsConfig;
use crate::config::ConfigError;
use crate::config::NorthstarConfig;
use crate::config::StoreConfig;
use crate::config::StoreType;

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Fully wired Northstar services.
pub struct NorthstarRuntime {
    /// Shared clock.
    pub clock: Arc<dyn Clock>,
    /// Shared alert sink.
    pub alerts: Arc<dyn AlertSink>,
    /// Audit ledger.
    pub ledger: Arc<AuditLedger>,
    /// Role catalog service.
    pub catalog: Arc<RoleCatalog>,
    /// Role binding service.
    pub bindings: Arc<RoleBindingService>,
    /// Security monitor.
    pub monitor: Arc<SecurityMonitor>,
    /// Authorization engine.
    pub engine: Arc<AuthorizationEngine>,
    /// Tenant isolation guard.
    pub guard: Arc<TenantIsolationGuard>,
}

/// Store handles backing a runtime.
struct StoreHandles {
    /// Audit record store.
    audit: Arc<dyn AuditStore>,
    /// Role definition store.
    roles: Arc<dyn RoleCatalogStore>,
    /// Role binding store.
    bindings: Arc<dyn RoleBindingStore>,
}

/// Errors raised while assembling a runtime.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be converted into settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The durable store could not be opened.
    #[error("store init failed: {0}")]
    Store(#[from] SqliteStoreError),
    /// The alert sink could not be opened.
    #[error("alert sink init failed: {0}")]
    Alerts(String),
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds a runtime using the system clock.
///
/// # Errors
///
/// Returns [`BootstrapError`] when a store or sink cannot be opened.
pub fn bootstrap(config: &NorthstarConfig) -> Result<NorthstarRuntime, BootstrapError> {
    bootstrap_with_clock(config, Arc::new(SystemClock))
}

/// Builds a runtime around the supplied clock.
///
/// # Errors
///
/// Returns [`BootstrapError`] when a store or sink cannot be opened.
pub fn bootstrap_with_clock(
    config: &NorthstarConfig,
    clock: Arc<dyn Clock>,
) -> Result<NorthstarRuntime, BootstrapError> {
    config.validate()?;
    let authz_settings = config.authz.to_settings()?;
    let monitor_settings = config.monitor.to_settings()?;
    let registry = config.authz.permission_registry()?;
    let stores = build_stores(&config.store)?;
    let alerts = build_alert_sink(&config.alerts)?;

    let ledger = Arc::new(AuditLedger::new(
        stores.audit,
        Arc::clone(&clock),
        Arc::clone(&alerts),
        config.ledger.to_settings(),
    ));
    let catalog = Arc::new(RoleCatalog::new(
        Arc::clone(&stores.roles),
        Arc::clone(&stores.bindings),
        Arc::clone(&ledger),
        Arc::clone(&clock),
        registry,
    ));
    let bindings = Arc::new(RoleBindingService::new(
        Arc::clone(&stores.roles),
        Arc::clone(&stores.bindings),
        Arc::clone(&ledger),
        Arc::clone(&clock),
        config.authz.conflict_rules(),
    ));
    let monitor = Arc::new(SecurityMonitor::new(
        Arc::clone(&ledger),
        Arc::clone(&bindings) as _,
        Arc::clone(&alerts),
        Arc::clone(&clock),
        monitor_settings,
    ));
    let observer = Arc::new(AuditingObserver::new(
        Arc::clone(&ledger),
        Some(Arc::clone(&monitor)),
        Arc::clone(&alerts),
        Arc::clone(&clock),
    ));
    let engine = Arc::new(AuthorizationEngine::new(
        stores.roles,
        stores.bindings,
        Arc::clone(&clock),
        observer,
        authz_settings,
    ));
    let guard = Arc::new(TenantIsolationGuard::new(
        Arc::clone(&ledger),
        Some(Arc::clone(&monitor)),
        Arc::clone(&alerts),
        Arc::clone(&clock),
    ));

    Ok(NorthstarRuntime {
        clock,
        alerts,
        ledger,
        catalog,
        bindings,
        monitor,
        engine,
        guard,
    })
}

/// Opens the configured store backend.
fn build_stores(config: &StoreConfig) -> Result<StoreHandles, BootstrapError> {
    match config.store_type {
        StoreType::Memory => {
            let roles = InMemoryRoleCatalogStore::new();
            Ok(StoreHandles {
                audit: Arc::new(InMemoryAuditStore::new()),
                bindings: Arc::new(roles.binding_store()),
                roles: Arc::new(roles),
            })
        }
        StoreType::Sqlite => {
            let sqlite_config = config.sqlite_config().ok_or_else(|| {
                ConfigError::Invalid("sqlite store requires path".to_string())
            })?;
            let store = Arc::new(SqliteNorthstarStore::open(&sqlite_config)?);
            Ok(StoreHandles {
                audit: Arc::clone(&store) as _,
                roles: Arc::clone(&store) as _,
                bindings: store,
            })
        }
    }
}

/// Opens the configured alert sink.
fn build_alert_sink(config: &AlertsConfig) -> Result<Arc<dyn AlertSink>, BootstrapError> {
    match (config.sink, &config.path) {
        (AlertSinkType::Stderr, _) => Ok(Arc::new(StderrAlertSink)),
        (AlertSinkType::None, _) => Ok(Arc::new(NoopAlertSink)),
        (AlertSinkType::File, Some(path)) => {
            let sink = FileAlertSink::new(path)
                .map_err(|err| BootstrapError::Alerts(format!("{}: {err}", path.display())))?;
            Ok(Arc::new(sink))
        }
        (AlertSinkType::File, None) => {
            Err(ConfigError::Invalid("file alert sink requires path".to_string()).into())
        }
    }
}
