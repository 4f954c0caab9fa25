//! Gated background scan worker
//!
//! The worker thread idles until the consumer arms it with `enable_scan()`,
//! waits out the minimum interval since the previous scan, invokes the
//! injected discovery callback exactly once, marks the result complete, and
//! goes idle again. It never starts a scan on its own.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::gate::SharedGate;
use crate::error::ScanError;

/// Boxed discovery callback run on the worker thread.
pub type ScanCallback = Box<dyn FnMut() + Send + 'static>;

/// Timing configuration for the scan worker
#[derive(Clone, Debug, PartialEq)]
pub struct ScanWorkerConfig {
    /// Minimum time between the end of one scan and the start of the next
    pub min_scan_interval: Duration,
    /// Upper bound on how long the idle worker sleeps before re-checking the gate
    pub idle_poll: Duration,
}

impl Default for ScanWorkerConfig {
    fn default() -> Self {
        ScanWorkerConfig {
            min_scan_interval: Duration::from_secs(5),
            idle_poll: Duration::from_millis(20),
        }
    }
}

/// Background scan worker with an explicit re-arm gate.
pub struct ScanWorker {
    config: ScanWorkerConfig,
    gate: Arc<SharedGate>,
    stop_flag: Arc<AtomicBool>,
    callback: Option<ScanCallback>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl ScanWorker {
    /// Create a worker around a discovery callback. The thread is not started.
    pub fn new<F>(config: ScanWorkerConfig, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        ScanWorker {
            config,
            gate: Arc::new(SharedGate::new()),
            stop_flag: Arc::new(AtomicBool::new(false)),
            callback: Some(Box::new(callback)),
            join_handle: None,
        }
    }

    /// Launch the worker thread. Non-blocking; the worker stays idle until
    /// the first `enable_scan()`.
    pub fn start(&mut self) -> Result<(), ScanError> {
        let mut callback = self.callback.take().ok_or(ScanError::AlreadyRunning)?;
        let gate = Arc::clone(&self.gate);
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || {
                log::info!(
                    "[ScanWorker] Started (min interval {:?}, idle poll {:?})",
                    config.min_scan_interval,
                    config.idle_poll
                );
                scan_loop(&gate, &stop_flag, &config, &mut callback);
                log::info!("[ScanWorker] Stopped");
            })
            .map_err(|e| ScanError::SpawnFailed(e.to_string()))?;

        self.join_handle = Some(handle);
        Ok(())
    }

    /// Permit the next scan. Also acknowledges the previous result.
    ///
    /// Calling this while a scan is in flight is harmless: the request is
    /// picked up once the current scan has finished.
    pub fn enable_scan(&self) {
        {
            let mut state = self.gate.lock();
            state.complete = false;
            state.enabled = true;
        }
        self.gate.notify();
    }

    /// Non-blocking check whether a scan result is waiting to be consumed.
    pub fn scan_complete(&self) -> bool {
        self.gate.lock().complete
    }

    /// Number of scans the worker has finished since it was created.
    pub fn scans_completed(&self) -> u64 {
        self.gate.lock().scans_completed
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.is_some()
    }

    pub fn config(&self) -> &ScanWorkerConfig {
        &self.config
    }

    /// Signal the worker to exit and wait for it. Safe to call more than once.
    pub fn stop(&mut self) -> Result<(), ScanError> {
        {
            let _state = self.gate.lock();
            self.stop_flag.store(true, Ordering::Release);
        }
        self.gate.notify();

        match self.join_handle.take() {
            Some(handle) => handle.join().map_err(|_| ScanError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("[ScanWorker] Shutdown error: {}", e);
        }
    }
}

/// Worker thread body. Runs until the stop flag is raised.
fn scan_loop(
    gate: &SharedGate,
    stop_flag: &AtomicBool,
    config: &ScanWorkerConfig,
    callback: &mut ScanCallback,
) {
    while !stop_flag.load(Ordering::Acquire) {
        let active = {
            let mut state = gate.lock();
            if !state.enabled && !stop_flag.load(Ordering::Acquire) {
                state = gate.wait_timeout(state, config.idle_poll);
            }
            std::mem::take(&mut state.enabled)
        };
        if !active {
            continue;
        }

        let remaining = gate
            .lock()
            .remaining_interval(config.min_scan_interval, Instant::now());
        if !remaining.is_zero() && !wait_unless_stopped(gate, stop_flag, remaining) {
            break;
        }
        if stop_flag.load(Ordering::Acquire) {
            break;
        }

        let started = Instant::now();
        if let Err(panic_info) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            log::error!("[ScanWorker] Discovery callback panicked: {}", msg);
        }

        let mut state = gate.lock();
        state.last_scan_time = Some(Instant::now());
        state.complete = true;
        state.scans_completed += 1;
        log::debug!(
            "[ScanWorker] Scan #{} finished in {:?}",
            state.scans_completed,
            started.elapsed()
        );
    }
}

/// Sleep on the gate for `duration`. Returns false if stop was requested.
fn wait_unless_stopped(gate: &SharedGate, stop_flag: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    let mut state = gate.lock();
    loop {
        if stop_flag.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        state = gate.wait_timeout(state, deadline - now);
    }
}
