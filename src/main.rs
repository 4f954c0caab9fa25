use std::sync::Arc;

use anyhow::Context;
use eframe::egui;
use log::LevelFilter;

use service_viewer::discovery::{ConnectionEditor, DiscoveryService, StaticDiscovery, Topology};
use service_viewer::log_collector::get_global_logs_path;
use service_viewer::ui::ViewerApp;
use service_viewer::{GridLayout, LogCollector, SettingsManager, Viewer, ViewerState};

/// Lines of recent log output kept for the status bar
const RECENT_LOG_LINES: usize = 256;

fn main() -> anyhow::Result<()> {
    // =========================================================================
    // LOGGING INITIALIZATION - MUST BE FIRST
    // =========================================================================
    let log_dir = get_global_logs_path().map_err(anyhow::Error::msg)?;
    let log_collector = match LogCollector::new(&log_dir, RECENT_LOG_LINES, LevelFilter::Debug) {
        Ok(collector) => {
            if let Err(e) = collector.install() {
                eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
            }
            Some(collector)
        }
        Err(e) => {
            eprintln!("[Main] WARNING: LogCollector initialization failed: {}", e);
            None
        }
    };

    // =========================================================================
    // SETTINGS
    // =========================================================================
    let settings = SettingsManager::load().context("loading settings")?;
    log::set_max_level(if settings.debug_logging {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    log::info!("[Main] Service viewer {} starting", service_viewer::VERSION);

    // =========================================================================
    // DISCOVERY SOURCE
    // =========================================================================
    let discovery = match settings.topology_path() {
        Some(path) => StaticDiscovery::from_file(&path)
            .with_context(|| format!("loading topology from {}", path.display()))?,
        None => {
            log::info!("[Main] No topology file configured, showing the demo network");
            StaticDiscovery::new(Topology::demo())
        }
    };
    let discovery = Arc::new(discovery.with_probe_settings(settings.probe_settings()));
    let service: Arc<dyn DiscoveryService> = discovery.clone();
    let editor: Arc<dyn ConnectionEditor> = discovery;

    // =========================================================================
    // VIEWER
    // =========================================================================
    let mut viewer = Viewer::new(service, editor, Box::new(GridLayout::default()), &settings);
    if viewer.start()? == ViewerState::Unavailable {
        log::warn!("[Main] The network is not running");
    }

    // =========================================================================
    // LAUNCH EGUI
    // =========================================================================
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height]),
        ..Default::default()
    };
    let app = ViewerApp::new(viewer, log_collector.clone());
    let result = eframe::run_native("Service Viewer", options, Box::new(move |_cc| Box::new(app)));

    // =========================================================================
    // SHUTDOWN
    // =========================================================================
    log::info!("[Main] Application shutting down");
    if let Some(collector) = &log_collector {
        if let Err(e) = collector.wait_for_empty() {
            eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
        }
    }

    result.map_err(|e| anyhow::anyhow!("UI terminated with an error: {}", e))
}
