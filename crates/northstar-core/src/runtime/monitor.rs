// crates/northstar-core/src/runtime/monitor.rs
// ============================================================================
// Module: Northstar Security Monitor
// Description: Batched aggregation of security signals into tiered risk responses.
// Purpose: Detect abusive principals and suspend or escalate them.
// Dependencies: tokio (mpsc), thiserror, crate::{core, interfaces, runtime::ledger}
// ============================================================================

//! ## Overview
//! Callers hand signals to [`SecurityMonitor::record_event`], which only
//! enqueues onto a bounded queue and never blocks. Signals are applied in
//! bounded batches by [`SecurityMonitor::process_pending`], either on demand or
//! from the periodic task in [`crate::runtime::monitor_task`]. Redelivered
//! signals are ignored by event id within the deduplication window.
//!
//! Each touched principal's risk score in `[0, 1]` is a weighted mean of
//! saturating factors: failed logins, authorization failures, isolation
//! violations, off-hours activity, distinct source addresses, and recent burst
//! volume. [`TierRules`] set count-based tier floors on top of the score:
//! repeated failed logins reach at least Tier 1, repeated authorization
//! failures at least Tier 2, and repeated sensitive-permission denials or
//! isolation violations (an escalation pattern) reach Tier 3.
//!
//! Tier 1 alerts; Tier 2 suspends the principal and alerts; Tier 3 suspends
//! and escalates. Every upward move into a suspending tier calls the
//! suspender again, so grants issued after an earlier suspension are revoked.
//! Every tier transition is appended to the tenant's audit chain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::error::TrySendError;

use crate::core::Actor;
use crate::core::Alert;
use crate::core::AlertKind;
use crate::core::AlertSeverity;
use crate::core::AuditEvent;
use crate::core::AuditEventType;
use crate::core::ErrorClass;
use crate::core::EventId;
use crate::core::PostureReport;
use crate::core::PrincipalId;
use crate::core::PrincipalSecurityMetrics;
use crate::core::RiskSummary;
use crate::core::RiskTier;
use crate::core::SecurityEvent;
use crate::core::SecurityEventKind;
use crate::core::TenantContext;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::ValidationError;
use crate::core::time::MILLIS_PER_DAY;
use crate::interfaces::AlertSink;
use crate::interfaces::Clock;
use crate::runtime::ledger::AuditLedger;

/// Service name recorded as the actor of monitor actions.
pub const MONITOR_SERVICE: &str = "security_monitor";
/// Entity type label recorded for principals.
const PRINCIPAL_ENTITY: &str = "principal";
/// Upper bound on tracked source addresses per principal.
const MAX_TRACKED_ADDRESSES: usize = 256;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Relative weight of each risk factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
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

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            failed_logins: 0.30,
            authorization_failures: 0.25,
            isolation_violations: 0.15,
            off_hours_access: 0.10,
            source_addresses: 0.10,
            recency: 0.10,
        }
    }
}

/// Counts at which each factor saturates to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskLimits {
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
    pub burst_window_ms: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            failed_logins: 10,
            authorization_failures: 20,
            isolation_violations: 3,
            off_hours_events: 10,
            source_addresses: 4,
            burst_events: 30,
            burst_window_ms: 600_000,
        }
    }
}

/// Score thresholds for each tier (inclusive lower bounds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Tier 1 threshold.
    pub tier1: f64,
    /// Tier 2 threshold.
    pub tier2: f64,
    /// Tier 3 threshold.
    pub tier3: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tier1: 0.30,
            tier2: 0.60,
            tier3: 0.85,
        }
    }
}

impl TierThresholds {
    /// Returns the tier for a score.
    #[must_use]
    pub fn tier_for(&self, score: f64) -> RiskTier {
        if score >= self.tier3 {
            RiskTier::Tier3
        } else if score >= self.tier2 {
            RiskTier::Tier2
        } else if score >= self.tier1 {
            RiskTier::Tier1
        } else {
            RiskTier::Nominal
        }
    }
}

/// Count-based tier floors applied on top of the weighted score.
///
/// Counts are cumulative for as long as the principal is tracked. A zero
/// count disables the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRules {
    /// Failed logins that raise a principal to at least Tier 1.
    pub failed_logins_tier1: u64,
    /// Authorization failures that raise a principal to at least Tier 2.
    pub authorization_failures_tier2: u64,
    /// Sensitive-permission denials that raise a principal to Tier 3.
    pub sensitive_denials_tier3: u64,
    /// Isolation violations that raise a principal to Tier 3.
    pub isolation_violations_tier3: u64,
}

impl Default for TierRules {
    fn default() -> Self {
        Self {
            failed_logins_tier1: 5,
            authorization_failures_tier2: 10,
            sensitive_denials_tier3: 3,
            isolation_violations_tier3: 3,
        }
    }
}

impl TierRules {
    /// Returns the lowest tier the principal's counters require.
    #[must_use]
    pub const fn floor_for(&self, metrics: &PrincipalSecurityMetrics) -> RiskTier {
        if reached(metrics.sensitive_denial_count, self.sensitive_denials_tier3)
            || reached(metrics.isolation_violation_count, self.isolation_violations_tier3)
        {
            RiskTier::Tier3
        } else if reached(metrics.authorization_failure_count, self.authorization_failures_tier2) {
            RiskTier::Tier2
        } else if reached(metrics.failed_login_count, self.failed_logins_tier1) {
            RiskTier::Tier1
        } else {
            RiskTier::Nominal
        }
    }
}

/// Returns true when an enabled rule's count has been reached.
const fn reached(count: u64, rule: u64) -> bool {
    rule > 0 && count >= rule
}

/// Business hours in UTC as a half-open hour range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    /// First business hour.
    pub start_hour: u8,
    /// First hour after business hours.
    pub end_hour: u8,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 20,
        }
    }
}

impl BusinessHours {
    /// Returns true when the hour falls inside business hours.
    #[must_use]
    pub const fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Response to Tier 2 and Tier 3 transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspensionPolicy {
    /// Revoke the principal's active bindings.
    #[default]
    Automatic,
    /// Alert only.
    AlertOnly,
}

/// Security monitor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Periodic processing interval in milliseconds.
    pub interval_ms: u64,
    /// Maximum signals applied per batch.
    pub batch_size: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// How long processed event ids are remembered.
    pub dedup_window_ms: i64,
    /// Idle principals are dropped after this long.
    pub retention_ms: i64,
    /// Recent timestamps kept per principal.
    pub max_recent_timestamps: usize,
    /// Principals listed in posture reports.
    pub top_risk_count: usize,
    /// Factor weights.
    pub weights: RiskWeights,
    /// Factor saturation limits.
    pub limits: RiskLimits,
    /// Tier thresholds.
    pub thresholds: TierThresholds,
    /// Count-based tier floors.
    pub rules: TierRules,
    /// Business hours.
    pub business_hours: BusinessHours,
    /// Suspension policy.
    pub suspension: SuspensionPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            batch_size: 500,
            queue_capacity: 10_000,
            dedup_window_ms: MILLIS_PER_DAY,
            retention_ms: 7 * MILLIS_PER_DAY,
            max_recent_timestamps: 100,
            top_risk_count: 10,
            weights: RiskWeights::default(),
            limits: RiskLimits::default(),
            thresholds: TierThresholds::default(),
            rules: TierRules::default(),
            business_hours: BusinessHours::default(),
            suspension: SuspensionPolicy::default(),
        }
    }
}

impl MonitorSettings {
    /// Returns the tier for a principal: the higher of the score tier and the
    /// count-based floor.
    #[must_use]
    pub fn tier_for(&self, metrics: &PrincipalSecurityMetrics, score: f64) -> RiskTier {
        self.thresholds.tier_for(score).max(self.rules.floor_for(metrics))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Security monitor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Signal failed validation.
    #[error(transparent)]
    InvalidEvent(#[from] ValidationError),
    /// Queue is full; the signal was dropped.
    #[error("security event queue is full")]
    QueueFull,
    /// Queue is closed.
    #[error("security event queue is closed")]
    Closed,
    /// Internal state lock was poisoned.
    #[error("security monitor state unavailable: {0}")]
    Poisoned(&'static str),
    /// Periodic task failed.
    #[error("security monitor task failed: {0}")]
    Task(String),
}

impl MonitorError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidEvent(_) => ErrorClass::Validation,
            Self::QueueFull | Self::Closed | Self::Poisoned(_) | Self::Task(_) => {
                ErrorClass::Infrastructure
            }
        }
    }
}

/// Failure reported by a suspender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("suspension failed: {0}")]
pub struct SuspensionError(pub String);

// ============================================================================
// SECTION: Suspender
// ============================================================================

/// Capability used by the monitor to suspend principals.
pub trait PrincipalSuspender: Send + Sync {
    /// Revokes the principal's active grants and returns how many were revoked.
    ///
    /// # Errors
    ///
    /// Returns [`SuspensionError`] when the suspension could not be completed.
    fn suspend(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
        reason: &str,
    ) -> Result<usize, SuspensionError>;
}

// ============================================================================
// SECTION: Batch Results
// ============================================================================

/// Tier change for one principal.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTransition {
    /// Tenant.
    pub tenant_id: TenantId,
    /// Principal.
    pub principal_id: PrincipalId,
    /// Previous tier.
    pub from: RiskTier,
    /// New tier.
    pub to: RiskTier,
    /// Score that caused the transition.
    pub risk_score: f64,
}

/// Outcome of one processing batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Signals applied.
    pub applied: usize,
    /// Redelivered signals ignored.
    pub duplicates: usize,
    /// Tier transitions triggered.
    pub transitions: Vec<TierTransition>,
}

// ============================================================================
// SECTION: Monitor
// ============================================================================

/// Key of a tracked principal.
type PrincipalKey = (TenantId, PrincipalId);

/// Aggregated monitor state.
#[derive(Debug, Default)]
struct MonitorState {
    /// Metrics per principal.
    metrics: HashMap<PrincipalKey, PrincipalSecurityMetrics>,
    /// Processed event ids with their processing time.
    seen: HashMap<EventId, Timestamp>,
    /// Signals applied since startup.
    processed: u64,
    /// Duplicates ignored since startup.
    duplicates: u64,
}

/// Asynchronous security signal aggregator.
pub struct SecurityMonitor {
    /// Producer side of the bounded queue.
    sender: mpsc::Sender<SecurityEvent>,
    /// Consumer side of the bounded queue.
    receiver: Mutex<mpsc::Receiver<SecurityEvent>>,
    /// Aggregated state.
    state: Mutex<MonitorState>,
    /// Signals rejected because the queue was full.
    dropped: AtomicU64,
    /// Ledger for tier transitions.
    ledger: Arc<AuditLedger>,
    /// Suspension capability.
    suspender: Arc<dyn PrincipalSuspender>,
    /// Alert destination.
    alerts: Arc<dyn AlertSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Settings.
    settings: MonitorSettings,
}

impl SecurityMonitor {
    /// Creates a monitor with a bounded queue.
    #[must_use]
    pub fn new(
        ledger: Arc<AuditLedger>,
        suspender: Arc<dyn PrincipalSuspender>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        settings: MonitorSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            state: Mutex::new(MonitorState::default()),
            dropped: AtomicU64::new(0),
            ledger,
            suspender,
            alerts,
            clock,
            settings,
        }
    }

    /// Returns the monitor settings.
    #[must_use]
    pub const fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Enqueues a signal without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::QueueFull`] when the queue is at capacity and
    /// [`MonitorError::InvalidEvent`] for blank identifiers.
    pub fn record_event(&self, event: SecurityEvent) -> Result<(), MonitorError> {
        if event.tenant_id.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                field: "tenant_id",
                reason: "must be non-empty",
            }
            .into());
        }
        if event.principal_id.as_str().trim().is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                field: "principal_id",
                reason: "must be non-empty",
            }
            .into());
        }
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                MonitorError::QueueFull
            }
            TrySendError::Closed(_) => MonitorError::Closed,
        })
    }

    /// Returns the number of queued signals.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.sender.max_capacity().saturating_sub(self.sender.capacity())
    }

    /// Applies up to one batch of queued signals and acts on tier transitions.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Poisoned`] when internal state is unavailable.
    pub fn process_pending(&self) -> Result<BatchReport, MonitorError> {
        let batch = self.drain_batch()?;
        let now = self.clock.now();
        let mut report = BatchReport::default();
        let mut state = self.state.lock().map_err(|_| MonitorError::Poisoned("state"))?;
        let mut touched = BTreeSet::new();
        for event in batch {
            if state.seen.contains_key(&event.event_id) {
                state.duplicates += 1;
                report.duplicates += 1;
                continue;
            }
            state.seen.insert(event.event_id.clone(), now);
            state.processed += 1;
            report.applied += 1;
            touched.insert((event.tenant_id.clone(), event.principal_id.clone()));
            self.apply(&mut state, event);
        }
        for key in touched {
            let Some(metrics) = state.metrics.get_mut(&key) else {
                continue;
            };
            let score = risk_score(metrics, &self.settings, now);
            let tier = self.settings.tier_for(metrics, score);
            metrics.risk_score = score;
            if tier != metrics.tier {
                report.transitions.push(TierTransition {
                    tenant_id: key.0.clone(),
                    principal_id: key.1.clone(),
                    from: metrics.tier,
                    to: tier,
                    risk_score: score,
                });
                metrics.tier = tier;
            }
        }
        self.prune(&mut state, now);
        drop(state);
        for transition in &report.transitions {
            self.act_on(transition, now)?;
        }
        Ok(report)
    }

    /// Returns the metrics of a principal in the context tenant.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Poisoned`] when internal state is unavailable.
    pub fn get_metrics(
        &self,
        ctx: &TenantContext,
        principal_id: &PrincipalId,
    ) -> Result<Option<PrincipalSecurityMetrics>, MonitorError> {
        let state = self.state.lock().map_err(|_| MonitorError::Poisoned("state"))?;
        Ok(state.metrics.get(&(ctx.tenant_id().clone(), principal_id.clone())).cloned())
    }

    /// Summarizes tracked principals, optionally restricted to one tenant.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Poisoned`] when internal state is unavailable.
    pub fn analyze_posture(
        &self,
        tenant: Option<&TenantContext>,
    ) -> Result<PostureReport, MonitorError> {
        let queue_depth = self.queue_depth();
        let state = self.state.lock().map_err(|_| MonitorError::Poisoned("state"))?;
        let mut tracked: Vec<&PrincipalSecurityMetrics> = state
            .metrics
            .values()
            .filter(|metrics| tenant.is_none_or(|ctx| ctx.predicate().admits(*metrics)))
            .collect();
        tracked.sort_by(|a, b| {
            b.risk_score
                .total_cmp(&a.risk_score)
                .then_with(|| a.tenant_id.cmp(&b.tenant_id))
                .then_with(|| a.principal_id.cmp(&b.principal_id))
        });
        let count_tier = |tier: RiskTier| tracked.iter().filter(|m| m.tier == tier).count();
        let report = PostureReport {
            generated_at: self.clock.now(),
            principals_tracked: tracked.len(),
            nominal_count: count_tier(RiskTier::Nominal),
            tier1_count: count_tier(RiskTier::Tier1),
            tier2_count: count_tier(RiskTier::Tier2),
            tier3_count: count_tier(RiskTier::Tier3),
            top_risks: tracked
                .iter()
                .filter(|metrics| metrics.risk_score > 0.0)
                .take(self.settings.top_risk_count)
                .map(|metrics| summarize(metrics))
                .collect(),
            suspended_principals: tracked
                .iter()
                .filter(|metrics| metrics.suspended)
                .map(|metrics| summarize(metrics))
                .collect(),
            queue_depth,
            events_processed: state.processed,
            duplicate_events: state.duplicates,
            dropped_events: self.dropped.load(Ordering::Relaxed),
        };
        drop(state);
        Ok(report)
    }

    /// Takes up to `batch_size` signals off the queue.
    fn drain_batch(&self) -> Result<Vec<SecurityEvent>, MonitorError> {
        let mut receiver = self.receiver.lock().map_err(|_| MonitorError::Poisoned("queue"))?;
        let mut batch = Vec::new();
        while batch.len() < self.settings.batch_size.max(1) {
            match receiver.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        drop(receiver);
        Ok(batch)
    }

    /// Folds one signal into the principal's metrics.
    fn apply(&self, state: &mut MonitorState, event: SecurityEvent) {
        let key = (event.tenant_id.clone(), event.principal_id.clone());
        let metrics = state.metrics.entry(key).or_insert_with(|| {
            PrincipalSecurityMetrics::new(
                event.tenant_id.clone(),
                event.principal_id.clone(),
                event.occurred_at,
            )
        });
        match event.kind {
            SecurityEventKind::FailedLogin => metrics.failed_login_count += 1,
            SecurityEventKind::AuthorizationFailure => metrics.authorization_failure_count += 1,
            SecurityEventKind::SensitivePermissionDenied => {
                metrics.authorization_failure_count += 1;
                metrics.sensitive_denial_count += 1;
            }
            SecurityEventKind::IsolationViolation => metrics.isolation_violation_count += 1,
            SecurityEventKind::Access => {}
        }
        if !self.settings.business_hours.contains(event.occurred_at.utc_hour()) {
            metrics.off_hours_access_count += 1;
        }
        if let Some(address) = event.source_address
            && metrics.unique_source_addresses.len() < MAX_TRACKED_ADDRESSES
        {
            metrics.unique_source_addresses.insert(address);
        }
        metrics.last_activity = metrics.last_activity.max(event.occurred_at);
        metrics.recent_access_timestamps.push(event.occurred_at);
        let cap = self.settings.max_recent_timestamps;
        let excess = metrics.recent_access_timestamps.len().saturating_sub(cap);
        if excess > 0 {
            metrics.recent_access_timestamps.drain(..excess);
        }
    }

    /// Drops expired dedup entries and idle, unsuspended principals.
    fn prune(&self, state: &mut MonitorState, now: Timestamp) {
        let dedup_cutoff = now.minus_millis(self.settings.dedup_window_ms);
        state.seen.retain(|_, seen_at| *seen_at > dedup_cutoff);
        let idle_cutoff = now.minus_millis(self.settings.retention_ms);
        state.metrics.retain(|_, metrics| metrics.suspended || metrics.last_activity > idle_cutoff);
    }

    /// Audits a transition and applies the tier response.
    fn act_on(&self, transition: &TierTransition, now: Timestamp) -> Result<(), MonitorError> {
        let Ok(ctx) = TenantContext::for_tenant(transition.tenant_id.clone()) else {
            return Ok(());
        };
        let actor = Actor::system(MONITOR_SERVICE);
        let event = AuditEvent::by(&actor, AuditEventType::SecurityTierChanged, PRINCIPAL_ENTITY)
            .with_entity_id(transition.principal_id.as_str())
            .with_fingerprint(format!(
                "{}->{} score={:.3}",
                transition.from, transition.to, transition.risk_score
            ));
        if let Err(err) = self.ledger.append(&ctx, event) {
            self.raise(
                transition,
                AlertSeverity::Critical,
                AlertKind::AuditAppendFailed,
                format!("tier transition could not be audited: {err}"),
                now,
            );
        }
        if transition.to <= transition.from {
            return Ok(());
        }
        match transition.to {
            RiskTier::Nominal => {}
            RiskTier::Tier1 => self.raise(
                transition,
                AlertSeverity::Warning,
                AlertKind::ElevatedRisk,
                format!("risk score {:.3} reached tier_1", transition.risk_score),
                now,
            ),
            RiskTier::Tier2 | RiskTier::Tier3 => self.suspend(&ctx, transition, now)?,
        }
        Ok(())
    }

    /// Suspends a principal and raises the tier alert.
    fn suspend(
        &self,
        ctx: &TenantContext,
        transition: &TierTransition,
        now: Timestamp,
    ) -> Result<(), MonitorError> {
        let (severity, kind) = if transition.to == RiskTier::Tier3 {
            (AlertSeverity::Critical, AlertKind::CriticalEscalation)
        } else {
            (AlertSeverity::Warning, AlertKind::PrincipalSuspended)
        };
        if self.settings.suspension == SuspensionPolicy::AlertOnly {
            self.raise(
                transition,
                severity,
                kind,
                format!("risk score {:.3} reached {}", transition.risk_score, transition.to),
                now,
            );
            return Ok(());
        }
        let reason = format!("security monitor {}", transition.to);
        match self.suspender.suspend(ctx, &transition.principal_id, &reason) {
            Ok(revoked) => {
                let mut state = self.state.lock().map_err(|_| MonitorError::Poisoned("state"))?;
                if let Some(metrics) = state
                    .metrics
                    .get_mut(&(transition.tenant_id.clone(), transition.principal_id.clone()))
                {
                    metrics.suspended = true;
                }
                drop(state);
                self.raise(
                    transition,
                    severity,
                    kind,
                    format!(
                        "risk score {:.3} reached {}; {revoked} binding(s) revoked",
                        transition.risk_score, transition.to
                    ),
                    now,
                );
            }
            Err(err) => self.raise(
                transition,
                AlertSeverity::Critical,
                AlertKind::SuspensionFailed,
                err.to_string(),
                now,
            ),
        }
        Ok(())
    }

    /// Raises an alert attributed to the transition's principal.
    fn raise(
        &self,
        transition: &TierTransition,
        severity: AlertSeverity,
        kind: AlertKind,
        message: String,
        now: Timestamp,
    ) {
        let alert = Alert::new(severity, kind, message, now)
            .for_tenant(transition.tenant_id.clone())
            .for_principal(transition.principal_id.clone());
        self.alerts.raise(&alert);
    }
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Computes the weighted risk score in `[0, 1]`.
#[must_use]
pub fn risk_score(
    metrics: &PrincipalSecurityMetrics,
    settings: &MonitorSettings,
    now: Timestamp,
) -> f64 {
    let weights = &settings.weights;
    let limits = &settings.limits;
    let burst_cutoff = now.minus_millis(limits.burst_window_ms);
    let recent = metrics.recent_access_timestamps.iter().filter(|at| **at > burst_cutoff).count();
    let extra_addresses = metrics.unique_source_addresses.len().saturating_sub(1);
    let factors = [
        (weights.failed_logins, saturate(metrics.failed_login_count, limits.failed_logins)),
        (
            weights.authorization_failures,
            saturate(metrics.authorization_failure_count, limits.authorization_failures),
        ),
        (
            weights.isolation_violations,
            saturate(metrics.isolation_violation_count, limits.isolation_violations),
        ),
        (
            weights.off_hours_access,
            saturate(metrics.off_hours_access_count, limits.off_hours_events),
        ),
        (
            weights.source_addresses,
            saturate(u64::try_from(extra_addresses).unwrap_or(u64::MAX), limits.source_addresses),
        ),
        (weights.recency, saturate(u64::try_from(recent).unwrap_or(u64::MAX), limits.burst_events)),
    ];
    let total_weight: f64 = factors.iter().map(|(weight, _)| weight.max(0.0)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = factors.iter().map(|(weight, factor)| weight.max(0.0) * factor).sum();
    (weighted / total_weight).clamp(0.0, 1.0)
}

/// Returns `min(count / limit, 1)`.
fn saturate(count: u64, limit: u64) -> f64 {
    if limit == 0 {
        return if count > 0 { 1.0 } else { 0.0 };
    }
    let capped = u32::try_from(count.min(limit)).unwrap_or(u32::MAX);
    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    f64::from(capped) / f64::from(limit)
}

/// Builds a posture entry.
fn summarize(metrics: &PrincipalSecurityMetrics) -> RiskSummary {
    RiskSummary {
        tenant_id: metrics.tenant_id.clone(),
        principal_id: metrics.principal_id.clone(),
        risk_score: metrics.risk_score,
        tier: metrics.tier,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
