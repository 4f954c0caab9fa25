//! Consumer side of the scan handoff.
//!
//! The `Viewer` owns the scan worker and the double buffer. The UI calls
//! `frame()` once per rendered frame; it accepts, defers or discards the
//! worker's latest result and re-arms the worker strictly afterwards.

pub mod gesture;

use std::sync::Arc;

use crate::config::ViewerSettings;
use crate::discovery::{ConnectionEditor, DiscoveryService};
use crate::error::{AppError, ScanError};
use crate::layout::LayoutEngine;
use crate::models::{Point, Size};
use crate::scan::{DoubleBuffer, ScanWorker, ScanWorkerConfig, SnapshotBuilder};

pub use gesture::{ClickModifier, ClickOutcome, GestureState};

/// Lifecycle of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    NotStarted,
    Running,
    /// The network was down at startup; no worker runs
    Unavailable,
    Stopped,
}

/// What one call to [`Viewer::frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No finished scan to look at
    Idle,
    /// A new generation was published
    Accepted,
    /// A gesture was active; the result was dropped and the next one will be too
    Deferred,
    /// The result followed a gesture and was dropped
    Discarded,
    /// No live data: the network was not running at startup
    Unavailable,
}

/// Running totals of frame outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub accepted: u64,
    pub deferred: u64,
    pub discarded: u64,
}

pub struct Viewer {
    discovery: Arc<dyn DiscoveryService>,
    editor: Arc<dyn ConnectionEditor>,
    layout: Box<dyn LayoutEngine>,
    buffer: Arc<DoubleBuffer>,
    worker: Option<ScanWorker>,
    worker_config: ScanWorkerConfig,
    sweep_stale_entries: bool,
    gestures: GestureState,
    ignore_next_scan: bool,
    state: ViewerState,
    stats: FrameStats,
}

impl Viewer {
    pub fn new(
        discovery: Arc<dyn DiscoveryService>,
        editor: Arc<dyn ConnectionEditor>,
        layout: Box<dyn LayoutEngine>,
        settings: &ViewerSettings,
    ) -> Self {
        Viewer {
            discovery,
            editor,
            layout,
            buffer: Arc::new(DoubleBuffer::new()),
            worker: None,
            worker_config: settings.worker_config(),
            sweep_stale_entries: settings.sweep_stale_entries,
            gestures: GestureState::new(),
            ignore_next_scan: false,
            state: ViewerState::NotStarted,
            stats: FrameStats::default(),
        }
    }

    /// Check the network once and, if it is up, start scanning.
    pub fn start(&mut self) -> Result<ViewerState, AppError> {
        if self.state != ViewerState::NotStarted {
            return Err(ScanError::AlreadyRunning.into());
        }
        if !self.discovery.check_network() {
            log::warn!("[Viewer] Network is not running; no live data will be shown");
            self.state = ViewerState::Unavailable;
            return Ok(self.state);
        }

        let discovery = Arc::clone(&self.discovery);
        let buffer = Arc::clone(&self.buffer);
        let mut builder = SnapshotBuilder::new(self.sweep_stale_entries);
        let mut worker = ScanWorker::new(self.worker_config.clone(), move || {
            buffer.with_background(|background| {
                builder.gather(discovery.as_ref(), background);
            });
        });
        worker.start()?;
        worker.enable_scan();

        log::info!("[Viewer] Scanning started");
        self.worker = Some(worker);
        self.state = ViewerState::Running;
        Ok(self.state)
    }

    /// Per-frame handoff. Call after rendering has released the foreground.
    pub fn frame(&mut self, bounds: Size) -> FrameOutcome {
        let Some(worker) = &self.worker else {
            return if self.state == ViewerState::Unavailable {
                FrameOutcome::Unavailable
            } else {
                FrameOutcome::Idle
            };
        };
        if !worker.scan_complete() {
            return FrameOutcome::Idle;
        }

        let outcome = if self.gestures.is_active() {
            self.ignore_next_scan = true;
            self.stats.deferred += 1;
            FrameOutcome::Deferred
        } else if self.ignore_next_scan {
            self.ignore_next_scan = false;
            self.stats.discarded += 1;
            FrameOutcome::Discarded
        } else {
            let layout = self.layout.as_ref();
            let report = self.buffer.with_both(|background, foreground| {
                SnapshotBuilder::finalize(background, foreground, layout, bounds)
            });
            let swapped = self.buffer.try_swap(false);
            debug_assert!(swapped, "swap without a gesture always succeeds");
            self.stats.accepted += 1;
            log::debug!(
                "[Viewer] Accepted generation {} ({} connections, {} carried, {} laid out)",
                self.buffer.with_foreground(|fg| fg.generation()),
                report.connections,
                report.carried_forward,
                report.laid_out
            );
            FrameOutcome::Accepted
        };

        self.buffer.clear_background();
        worker.enable_scan();
        outcome
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn buffer(&self) -> &DoubleBuffer {
        &self.buffer
    }

    pub fn gestures(&self) -> &GestureState {
        &self.gestures
    }

    pub fn ignore_next_scan(&self) -> bool {
        self.ignore_next_scan
    }

    /// Scans finished by the worker so far.
    pub fn scans_completed(&self) -> u64 {
        self.worker.as_ref().map_or(0, |w| w.scans_completed())
    }

    pub fn click_port(&mut self, port: &str, modifier: ClickModifier) -> ClickOutcome {
        self.gestures
            .click_port(port, modifier, &self.buffer, self.editor.as_ref())
    }

    pub fn click_empty(&mut self, modifier: ClickModifier) -> ClickOutcome {
        self.gestures.click_empty(modifier)
    }

    pub fn begin_drag(&mut self, entity: &str) -> bool {
        self.gestures.begin_drag(entity, &self.buffer)
    }

    pub fn drag_to(&mut self, position: Point) -> bool {
        self.gestures.drag_to(position, &self.buffer)
    }

    pub fn end_drag(&mut self) {
        self.gestures.end_drag();
    }

    /// Stop and join the worker. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), AppError> {
        if let Some(mut worker) = self.worker.take() {
            worker.stop()?;
            log::info!(
                "[Viewer] Stopped after {} accepted, {} deferred, {} discarded",
                self.stats.accepted,
                self.stats.deferred,
                self.stats.discarded
            );
        }
        if self.state == ViewerState::Running {
            self.state = ViewerState::Stopped;
        }
        Ok(())
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("[Viewer] Shutdown error: {}", e);
        }
    }
}
