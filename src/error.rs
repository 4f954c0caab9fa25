//! Unified error type hierarchy for Service Viewer
//!
//! Provides structured error handling with DiscoveryError, ConfigError,
//! ScanError, and AppError.

use std::io;
use thiserror::Error;

/// Discovery collaborator errors (service/endpoint enumeration and probing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Network is not running")]
    NetworkUnavailable,

    #[error("Direction probe timed out after {0} ms")]
    ProbeTimeout(u64),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
}

/// Settings and topology file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Background scan worker lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Scan worker is already running")]
    AlreadyRunning,

    #[error("Failed to spawn scan worker thread: {0}")]
    SpawnFailed(String),

    #[error("Scan worker thread panicked")]
    WorkerPanicked,
}

/// Global error type for all Service Viewer modules
///
/// Provides unified error categorization and user-facing messages.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Discovery collaborator failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Settings persist or deserialize error
    #[error("Settings error: {0}")]
    Settings(String),

    /// Scan worker failed to start or stop
    #[error("Scan worker error: {0}")]
    Scan(String),

    /// Connection add/remove request rejected
    #[error("Connection edit failed: {0}")]
    ConnectionEdit(String),

    /// File I/O error (read/write/delete)
    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    /// Get a user-facing error message suitable for UI display
    pub fn user_message(&self) -> String {
        match self {
            AppError::Discovery(msg) => format!("Could not enumerate the network: {}", msg),
            AppError::Settings(msg) => format!("Settings error: {}", msg),
            AppError::Scan(msg) => format!("Background scanning stopped: {}", msg),
            AppError::ConnectionEdit(msg) => format!("Could not change the connection: {}", msg),
            AppError::Io(msg) => format!("File operation failed: {}", msg),
        }
    }
}

impl From<DiscoveryError> for AppError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::ConnectionRefused(_) => AppError::ConnectionEdit(e.to_string()),
            other => AppError::Discovery(other.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Settings(e.to_string())
    }
}

impl From<ScanError> for AppError {
    fn from(e: ScanError) -> Self {
        AppError::Scan(e.to_string())
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

/// Top-level result type for operations that may fail.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_display() {
        let err = DiscoveryError::ProbeTimeout(250);
        assert_eq!(err.to_string(), "Direction probe timed out after 250 ms");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound("/etc/settings.json".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /etc/settings.json"
        );
    }

    #[test]
    fn test_refused_connection_maps_to_edit_error() {
        let err: AppError = DiscoveryError::ConnectionRefused("/a -> /b".to_string()).into();
        assert!(matches!(err, AppError::ConnectionEdit(_)));
        assert!(err.user_message().contains("/a -> /b"));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(ScanError::AlreadyRunning.into());
        assert!(result.is_err());
    }
}
