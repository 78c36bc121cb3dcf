// crates/northstar-core/src/runtime/alerts.rs
// ============================================================================
// Module: Northstar Alert Sinks
// Description: JSON-line alert sinks (stderr, file, noop, recording).
// Purpose: Deliver security and integrity alerts as structured log lines.
// Dependencies: serde_json, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Alerts are serialized as one JSON object per line. Delivery is best effort:
//! sinks never fail the operation that raised the alert.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::core::Alert;
use crate::interfaces::AlertSink;

// ============================================================================
// SECTION: Stderr Sink
// ============================================================================

/// Alert sink that writes JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAlertSink;

impl AlertSink for StderrAlertSink {
    fn raise(&self, alert: &Alert) {
        if let Ok(payload) = serde_json::to_string(alert) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

// ============================================================================
// SECTION: File Sink
// ============================================================================

/// Alert sink that appends JSON lines to a file.
pub struct FileAlertSink {
    /// Open append-only file handle.
    file: Mutex<std::fs::File>,
}

impl FileAlertSink {
    /// Opens or creates the alert log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AlertSink for FileAlertSink {
    fn raise(&self, alert: &Alert) {
        if let Ok(payload) = serde_json::to_string(alert)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

// ============================================================================
// SECTION: Noop Sink
// ============================================================================

/// Alert sink that discards alerts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn raise(&self, _alert: &Alert) {}
}

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Alert sink that keeps alerts in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    /// Alerts in delivery order.
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded alerts.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|alerts| alerts.clone()).unwrap_or_default()
    }
}

impl AlertSink for RecordingAlertSink {
    fn raise(&self, alert: &Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert.clone());
        }
    }
}
