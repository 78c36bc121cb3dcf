// crates/northstar-core/src/runtime/ledger.rs
// ============================================================================
// Module: Northstar Audit Ledger
// Description: Append-only, per-tenant, hash-chained audit ledger.
// Purpose: Assign gapless sequence numbers, chain hashes, and verify chains.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The ledger serializes appends per tenant through a dedicated lane mutex;
//! the shared lane map is locked only to look up or create a lane, so appends
//! for different tenants run in parallel. Each append reads the chain head,
//! seals a record with `H(previous_hash ‖ canonical_payload)`, and inserts it
//! atomically. If the store reports a sequence conflict (another writer won the
//! race), the append retries once against a fresh head before surfacing the
//! conflict.
//!
//! Verification streams records page by page, recomputes every hash, and
//! reports every sequence number whose hash or linkage disagrees. Corruption is
//! raised as a critical alert and never blocks further appends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::Alert;
use crate::core::AlertKind;
use crate::core::AlertSeverity;
use crate::core::AppendReceipt;
use crate::core::AuditEvent;
use crate::core::AuditPage;
use crate::core::AuditQuery;
use crate::core::AuditRecord;
use crate::core::ChainHead;
use crate::core::ChainVerification;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ErrorClass;
use crate::core::GENESIS_HASH;
use crate::core::HashError;
use crate::core::PageRequest;
use crate::core::SequenceRange;
use crate::core::TenantContext;
use crate::core::TenantId;
use crate::core::TenantPredicate;
use crate::core::ValidationError;
use crate::interfaces::AlertSink;
use crate::interfaces::AuditStore;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Default query page size.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Maximum query page size.
pub const MAX_PAGE_SIZE: usize = 1_000;
/// Default page size used by streaming export and verification.
pub const DEFAULT_STREAM_PAGE_SIZE: usize = 500;

/// Ledger runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Largest page a query may request.
    pub max_page_size: usize,
    /// Page size used when streaming records.
    pub stream_page_size: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            stream_page_size: DEFAULT_STREAM_PAGE_SIZE,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Audit ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Event or query failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Canonicalization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Sequence reservation lost twice to a concurrent writer.
    #[error("audit sequence conflict: {0}")]
    Conflict(String),
}

impl LedgerError {
    /// Returns the error classification.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Hash(_) => ErrorClass::Infrastructure,
            Self::Store(err) => err.class(),
            Self::Conflict(_) => ErrorClass::ConcurrencyConflict,
        }
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Append-only, hash-chained audit ledger.
pub struct AuditLedger {
    /// Backing store.
    store: Arc<dyn AuditStore>,
    /// Time source for record timestamps.
    clock: Arc<dyn Clock>,
    /// Destination for integrity alerts.
    alerts: Arc<dyn AlertSink>,
    /// Runtime settings.
    settings: LedgerSettings,
    /// Per-tenant append lanes.
    lanes: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl AuditLedger {
    /// Creates a ledger over a store.
    #[must_use]
    pub fn new(
        store: Arc<dyn AuditStore>,
        clock: Arc<dyn Clock>,
        alerts: Arc<dyn AlertSink>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            clock,
            alerts,
            settings,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the ledger settings.
    #[must_use]
    pub const fn settings(&self) -> LedgerSettings {
        self.settings
    }

    /// Appends an event to the tenant chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when validation, canonicalization, or the store
    /// fails, or when the sequence race is lost twice.
    pub fn append(
        &self,
        ctx: &TenantContext,
        event: AuditEvent,
    ) -> Result<AppendReceipt, LedgerError> {
        event.validate()?;
        let predicate = ctx.predicate();
        let lane = self.lane(ctx.tenant_id())?;
        let _serialized = lane
            .lock()
            .map_err(|_| StoreError::Store("audit lane mutex poisoned".to_string()))?;
        let timestamp = self.clock.now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let head = self.store.head(&predicate)?;
            let (sequence_number, previous_hash) = next_link(head);
            let record = AuditRecord::from_event(
                ctx.tenant_id().clone(),
                sequence_number,
                timestamp,
                event.clone(),
            )
            .seal(previous_hash, DEFAULT_HASH_ALGORITHM)?;
            match self.store.insert_record(&predicate, &record) {
                Ok(()) => {
                    return Ok(AppendReceipt {
                        sequence_number,
                        current_hash: record.current_hash,
                    });
                }
                Err(StoreError::Conflict(_)) if attempts < 2 => {}
                Err(StoreError::Conflict(message)) => return Err(LedgerError::Conflict(message)),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns the current chain head for the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store fails.
    pub fn head(&self, ctx: &TenantContext) -> Result<Option<ChainHead>, LedgerError> {
        Ok(self.store.head(&ctx.predicate())?)
    }

    /// Runs a filtered, paginated query ordered by sequence ascending.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] for a zero page limit and
    /// [`LedgerError::Store`] when the store fails.
    pub fn query(&self, query: &AuditQuery, page: PageRequest) -> Result<AuditPage, LedgerError> {
        if page.limit == 0 {
            return Err(
                ValidationError::InvalidQuery("page limit must be positive".to_string()).into()
            );
        }
        if let (Some(from), Some(to)) = (query.from_time, query.to_time)
            && from >= to
        {
            return Err(ValidationError::InvalidQuery("time range is empty".to_string()).into());
        }
        let limit = page.limit.min(self.settings.max_page_size);
        let mut records = self.store.query(
            query,
            PageRequest {
                after_sequence: page.after_sequence,
                limit: limit.saturating_add(1),
            },
        )?;
        let next_after_sequence = if records.len() > limit {
            records.truncate(limit);
            records.last().map(|record| record.sequence_number)
        } else {
            None
        };
        Ok(AuditPage {
            records,
            next_after_sequence,
        })
    }

    /// Streams a range of the tenant chain page by page.
    #[must_use]
    pub fn stream(&self, ctx: &TenantContext, range: SequenceRange) -> LedgerStream<'_> {
        LedgerStream {
            store: self.store.as_ref(),
            predicate: ctx.predicate(),
            next_after: range.start.saturating_sub(1),
            until: range.end,
            page_size: self.settings.stream_page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Recomputes every record in the range and reports mismatched sequences.
    ///
    /// Raises a critical integrity alert when violations are found.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when records cannot be loaded.
    pub fn verify_chain(
        &self,
        ctx: &TenantContext,
        range: SequenceRange,
    ) -> Result<ChainVerification, LedgerError> {
        let predicate = ctx.predicate();
        let mut expected_previous = if range.start <= 1 {
            Some(GENESIS_HASH.to_string())
        } else {
            self.store
                .load_range(&predicate, range.start - 2, Some(range.start - 1), 1)?
                .into_iter()
                .next()
                .map(|record| record.current_hash)
        };
        let mut expected_sequence = range.start.max(1);
        let mut violations = Vec::new();
        let mut records_checked = 0_u64;
        let mut first_sequence = None;
        let mut last_sequence = None;
        for record in self.stream(ctx, range) {
            let record = record?;
            records_checked += 1;
            first_sequence.get_or_insert(record.sequence_number);
            last_sequence = Some(record.sequence_number);
            let linked = expected_previous.as_deref() == Some(record.previous_hash.as_str());
            let recomputed = record
                .compute_hash(DEFAULT_HASH_ALGORITHM)
                .is_ok_and(|hash| hash == record.current_hash);
            if record.sequence_number != expected_sequence || !linked || !recomputed {
                violations.push(record.sequence_number);
            }
            expected_sequence = record.sequence_number.saturating_add(1);
            expected_previous = Some(record.current_hash);
        }
        let verification = ChainVerification {
            tenant_id: ctx.tenant_id().clone(),
            valid: violations.is_empty(),
            violations,
            records_checked,
            first_sequence,
            last_sequence,
        };
        if !verification.valid {
            self.raise_corruption(&verification);
        }
        Ok(verification)
    }

    /// Raises a critical integrity alert for a failed verification.
    fn raise_corruption(&self, verification: &ChainVerification) {
        let listed: Vec<String> =
            verification.violations.iter().map(ToString::to_string).collect();
        let alert = Alert::new(
            AlertSeverity::Critical,
            AlertKind::AuditChainCorruption,
            format!("audit chain mismatch at sequences [{}]", listed.join(", ")),
            self.clock.now(),
        )
        .for_tenant(verification.tenant_id.clone());
        self.alerts.raise(&alert);
    }

    /// Returns the append lane for a tenant, creating it on first use.
    fn lane(&self, tenant_id: &TenantId) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut lanes = self
            .lanes
            .lock()
            .map_err(|_| StoreError::Store("audit lane map mutex poisoned".to_string()))?;
        Ok(Arc::clone(lanes.entry(tenant_id.clone()).or_default()))
    }
}

/// Returns the next sequence number and previous hash for a head.
fn next_link(head: Option<ChainHead>) -> (u64, String) {
    head.map_or_else(
        || (1, GENESIS_HASH.to_string()),
        |head| (head.sequence_number.saturating_add(1), head.current_hash),
    )
}

// ============================================================================
// SECTION: Streaming
// ============================================================================

/// Page-by-page iterator over a tenant chain range.
pub struct LedgerStream<'a> {
    /// Backing store.
    store: &'a dyn AuditStore,
    /// Tenant predicate.
    predicate: TenantPredicate,
    /// Last sequence already yielded (or skipped).
    next_after: u64,
    /// Inclusive upper bound.
    until: Option<u64>,
    /// Records fetched per page.
    page_size: usize,
    /// Current page.
    buffer: VecDeque<AuditRecord>,
    /// True once the store returned a short page or an error.
    exhausted: bool,
}

impl Iterator for LedgerStream<'_> {
    type Item = Result<AuditRecord, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            let page =
                self.store.load_range(&self.predicate, self.next_after, self.until, self.page_size);
            match page {
                Ok(page) => {
                    self.exhausted = page.len() < self.page_size;
                    if let Some(last) = page.last() {
                        self.next_after = last.sequence_number;
                    }
                    self.buffer.extend(page);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err.into()));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
