//! Service Viewer
//!
//! A live view of a network of service ports and their connections. A gated
//! background worker rebuilds a complete snapshot of the network into a
//! background buffer; the UI publishes it with an O(1) buffer swap once per
//! frame, unless the user is in the middle of a gesture.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Keys, descriptors and small value types
//! - **snapshot**: One generation of entities, ports and connections
//! - **scan**: Gated worker, snapshot builder and double buffer
//! - **discovery**: Discovery traits, in-memory topology and direction probing
//! - **layout**: Placement of new entities
//! - **viewer**: Per-frame handoff and user gestures
//! - **config**: Settings persistence
//! - **ui**: egui window
//! - **log_collector**: File-backed `log` backend

// Core foundational modules
pub mod error;
pub mod models;
pub mod snapshot;

// Background scanning and generation handoff
pub mod scan;
pub mod discovery;
pub mod layout;
pub mod viewer;

pub mod config;
pub mod ui;

// Decoupled logging system
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AppError, ConfigError, DiscoveryError, Result, ScanError};

pub use models::{
    Associates, ConnectionMode, EndpointDescriptor, EntityKey, EntityKind, Point, PortDirection,
    PortKey, PortUsage, ServiceDescriptor, Size,
};

pub use snapshot::{Connection, Entity, Port, Snapshot};

pub use scan::{DoubleBuffer, ScanWorker, ScanWorkerConfig, SnapshotBuilder};

pub use discovery::{ConnectionEditor, DiscoveryService, StaticDiscovery, Topology};

pub use layout::{GridLayout, LayoutEngine};

pub use viewer::{ClickModifier, ClickOutcome, FrameOutcome, GestureState, Viewer, ViewerState};

pub use config::{SettingsManager, ViewerSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_error_reexport() {
        let _: Result<i32> = Ok(42);
    }

    #[test]
    fn test_models_reexport() {
        assert_eq!(ConnectionMode::default(), ConnectionMode::Tcp);
        assert!(PortDirection::Unknown.can_send());
    }
}
