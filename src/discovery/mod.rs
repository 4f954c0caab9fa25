//! Discovery collaborators
//!
//! The scan core only talks to the network through these traits. The
//! `topology` module provides an in-memory implementation used by the binary
//! and by tests; `probe` holds the budgeted direction probe.

pub mod probe;
pub mod topology;

use crate::error::DiscoveryError;
use crate::models::{
    Associates, ConnectionMode, EndpointDescriptor, PortConnections, PortDirection,
    ServiceDescriptor,
};

pub use topology::{StaticDiscovery, Topology};

/// Enumerates services, endpoints and their connections.
///
/// Everything except `check_network` is called from the scan worker thread.
pub trait DiscoveryService: Send + Sync {
    /// Whether the name server is reachable at all.
    fn check_network(&self) -> bool;

    fn list_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError>;

    fn list_endpoints(&self) -> Result<Vec<EndpointDescriptor>, DiscoveryError>;

    /// Associated ports of an endpoint, or `None` if it has no group.
    fn get_associates(&self, endpoint: &str) -> Result<Option<Associates>, DiscoveryError>;

    fn get_connections(&self, endpoint: &str) -> Result<PortConnections, DiscoveryError>;

    /// Determine the direction of an endpoint whose descriptor left it open.
    fn probe_direction(&self, endpoint: &EndpointDescriptor)
        -> Result<PortDirection, DiscoveryError>;

    /// Drop name-server entries whose owners no longer answer.
    fn remove_stale_entries(&self) -> Result<usize, DiscoveryError> {
        Ok(0)
    }
}

/// Adds and removes connections between named ports.
pub trait ConnectionEditor: Send + Sync {
    fn add_connection(&self, from: &str, to: &str, mode: ConnectionMode)
        -> Result<(), DiscoveryError>;

    fn remove_connection(&self, from: &str, to: &str) -> Result<(), DiscoveryError>;
}
