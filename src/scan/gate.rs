//! Scan gate: the worker's control state shared with the consumer.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Control flags for the background scan worker.
///
/// `enabled` is set by the consumer to permit exactly one more scan and cleared
/// by the worker when it picks that scan up. `complete` is set by the worker
/// once a scan body has returned and cleared by the consumer when it re-arms.
#[derive(Debug, Default, Clone)]
pub struct ScanGate {
    pub enabled: bool,
    pub complete: bool,
    /// When the previous scan finished; `None` before the first scan
    pub last_scan_time: Option<Instant>,
    /// Number of scan bodies that have finished
    pub scans_completed: u64,
}

impl ScanGate {
    /// How long the worker must still wait before the next scan may start.
    pub fn remaining_interval(&self, min_interval: Duration, now: Instant) -> Duration {
        match self.last_scan_time {
            Some(last) => min_interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

/// The gate plus the lock and wake-up signal that guard it.
#[derive(Debug, Default)]
pub struct SharedGate {
    state: Mutex<ScanGate>,
    wake: Condvar,
}

impl SharedGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the gate. The flags stay meaningful after a panic elsewhere, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, ScanGate> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the worker if it is waiting on the gate.
    pub fn notify(&self) {
        self.wake.notify_all();
    }

    /// Wait for a notification or the timeout, whichever comes first.
    pub fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, ScanGate>,
        timeout: Duration,
    ) -> MutexGuard<'a, ScanGate> {
        match self.wake.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}
