//! Configuration module for the service viewer.
//!
//! `ViewerSettings` holds the user-tunable timing and window settings and is
//! persisted as JSON under the user's config directory.
//!
//! # Module Structure
//!
//! - `loader`: settings paths, file loading and saving
//!
//! # Settings Management
//!
//! The `SettingsManager` loads and saves `ViewerSettings`:
//! - Persists state to `~/.config/service-viewer/settings.json`
//! - Falls back to defaults when the file is missing or unreadable
//! - Rejects settings that would make the scan loop spin

pub mod loader;

use crate::error::ConfigError;
use crate::scan::ScanWorkerConfig;
use crate::discovery::topology::ProbeSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User settings for the viewer
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    // Scanning
    /// Minimum time between the end of one scan and the start of the next
    pub min_scan_interval_ms: u64,
    /// How often the idle worker re-checks its gate
    pub idle_poll_ms: u64,
    /// Total wait budget for one direction probe
    pub probe_budget_ms: u64,
    pub probe_initial_backoff_ms: u64,
    /// Ask discovery to drop stale name-server entries before each scan
    pub sweep_stale_entries: bool,

    // Discovery source
    /// JSON topology file; the built-in demo network is used when unset
    pub topology_path: Option<String>,

    // Window
    pub window_width: f32,
    pub window_height: f32,

    // Debug
    pub debug_logging: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        ViewerSettings {
            min_scan_interval_ms: 5000,
            idle_poll_ms: 20,
            probe_budget_ms: 1000,
            probe_initial_backoff_ms: 50,
            sweep_stale_entries: false,
            topology_path: None,
            window_width: 1200.0,
            window_height: 800.0,
            debug_logging: false,
        }
    }
}

impl ViewerSettings {
    /// Reject values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_scan_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_scan_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.idle_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "idle_poll_ms must be greater than zero".to_string(),
            ));
        }
        if self.probe_budget_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "probe_budget_ms must be greater than zero".to_string(),
            ));
        }
        if !(self.window_width > 0.0 && self.window_height > 0.0) {
            return Err(ConfigError::ValidationFailed(format!(
                "window size must be positive, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        Ok(())
    }

    pub fn worker_config(&self) -> ScanWorkerConfig {
        ScanWorkerConfig {
            min_scan_interval: Duration::from_millis(self.min_scan_interval_ms),
            idle_poll: Duration::from_millis(self.idle_poll_ms),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            budget: Duration::from_millis(self.probe_budget_ms),
            initial_backoff: Duration::from_millis(self.probe_initial_backoff_ms),
        }
    }

    pub fn topology_path(&self) -> Option<PathBuf> {
        self.topology_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

/// Settings persistence
///
/// Loading never fails because of a bad file: unreadable or invalid settings
/// are logged and replaced by defaults.
pub struct SettingsManager;

impl SettingsManager {
    /// Load settings from the global settings path, or defaults.
    pub fn load() -> Result<ViewerSettings, ConfigError> {
        match loader::get_global_settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                log::warn!("[Config] {}; using default settings", e);
                Ok(ViewerSettings::default())
            }
        }
    }

    /// Load settings from `path`, or defaults if it is missing or invalid.
    pub fn load_from(path: &Path) -> Result<ViewerSettings, ConfigError> {
        match loader::load_settings_from_file(path) {
            Ok(settings) => match settings.validate() {
                Ok(()) => Ok(settings),
                Err(e) => {
                    log::warn!("[Config] Invalid settings in {}, falling back to defaults: {}", path.display(), e);
                    Ok(ViewerSettings::default())
                }
            },
            Err(ConfigError::FileNotFound(_)) => Ok(ViewerSettings::default()),
            Err(ConfigError::InvalidJson(e)) => {
                log::warn!("[Config] Failed to parse {}, falling back to defaults: {}", path.display(), e);
                Ok(ViewerSettings::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Save settings to the global settings path
    pub fn save(settings: &ViewerSettings) -> Result<(), ConfigError> {
        let path = loader::get_global_settings_path()?;
        Self::save_to(settings, &path)
    }

    pub fn save_to(settings: &ViewerSettings, path: &Path) -> Result<(), ConfigError> {
        settings.validate()?;
        loader::save_settings_to_file(settings, path)
    }
}
