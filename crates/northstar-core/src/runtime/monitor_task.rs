// crates/northstar-core/src/runtime/monitor_task.rs
// ============================================================================
// Module: Northstar Monitor Task
// Description: Periodic, cancellable driver for the security monitor.
// Purpose: Apply queued security signals off the request path.
// Dependencies: tokio (time, sync, task), crate::runtime::monitor
// ============================================================================

//! ## Overview
//! [`spawn_monitor_task`] runs [`SecurityMonitor::process_pending`] on a tokio
//! interval. Batches run on the blocking pool because they append to the
//! ledger and may suspend principals. A tick drains the queue in successive
//! bounded batches until a short batch is seen. [`MonitorTask::shutdown`]
//! stops the loop after the in-flight batch and applies one final drain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::runtime::monitor::MonitorError;
use crate::runtime::monitor::SecurityMonitor;

// ============================================================================
// SECTION: Task Handle
// ============================================================================

/// Handle to a running monitor task.
pub struct MonitorTask {
    /// Shutdown signal.
    shutdown: watch::Sender<bool>,
    /// Loop task.
    handle: JoinHandle<Result<u64, MonitorError>>,
}

impl MonitorTask {
    /// Stops the loop and returns the number of batches applied.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] when the loop failed or panicked.
    pub async fn shutdown(self) -> Result<u64, MonitorError> {
        let _ = self.shutdown.send(true);
        self.handle.await.map_err(|err| MonitorError::Task(err.to_string()))?
    }
}

/// Spawns the periodic monitor loop on the current tokio runtime.
#[must_use]
pub fn spawn_monitor_task(monitor: Arc<SecurityMonitor>) -> MonitorTask {
    let (shutdown, mut stop) = watch::channel(false);
    let period = Duration::from_millis(monitor.settings().interval_ms.max(1));
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut batches = 0_u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    batches += drain(Arc::clone(&monitor)).await?;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        batches += drain(monitor).await?;
        Ok(batches)
    });
    MonitorTask {
        shutdown,
        handle,
    }
}

/// Applies batches until the queue yields a short batch.
async fn drain(monitor: Arc<SecurityMonitor>) -> Result<u64, MonitorError> {
    tokio::task::spawn_blocking(move || {
        let batch_size = monitor.settings().batch_size.max(1);
        let mut batches = 0_u64;
        loop {
            let report = monitor.process_pending()?;
            if report.applied + report.duplicates == 0 {
                return Ok(batches);
            }
            batches += 1;
            if report.applied + report.duplicates < batch_size {
                return Ok(batches);
            }
        }
    })
    .await
    .map_err(|err| MonitorError::Task(err.to_string()))?
}
