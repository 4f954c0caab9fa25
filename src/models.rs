//! Core data types for Service Viewer.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an entity across scan generations.
///
/// Services are keyed by service name; adapters and standalone ports by
/// their primary port name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        EntityKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        EntityKey(s)
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Stable identifier of a port: its network name (e.g. `/svc/A/in`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortKey(String);

impl PortKey {
    pub fn new(name: impl Into<String>) -> Self {
        PortKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortKey {
    fn from(s: &str) -> Self {
        PortKey(s.to_string())
    }
}

impl From<String> for PortKey {
    fn from(s: String) -> Self {
        PortKey(s)
    }
}

impl Borrow<str> for PortKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What kind of visual entity groups a set of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An advertised service with request and channel ports
    Service,
    /// A client or adapter: a primary port plus its associates
    ClientOrAdapter,
    /// A standalone port with no grouping information
    Other,
}

/// How a port is used by its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortUsage {
    Service,
    Client,
    Other,
}

/// Data-flow direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
    InputOutput,
    /// Direction could not be determined (e.g. the probe ran out of budget)
    Unknown,
}

impl PortDirection {
    /// Whether a connection may start at a port with this direction.
    pub fn can_send(&self) -> bool {
        !matches!(self, PortDirection::Input)
    }

    /// Whether a connection may end at a port with this direction.
    pub fn can_receive(&self) -> bool {
        !matches!(self, PortDirection::Output)
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
            PortDirection::InputOutput => write!(f, "input/output"),
            PortDirection::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for PortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" | "in" => Ok(PortDirection::Input),
            "output" | "out" => Ok(PortDirection::Output),
            "input_output" | "input/output" | "inout" => Ok(PortDirection::InputOutput),
            "unknown" => Ok(PortDirection::Unknown),
            _ => Err(format!("Unknown port direction: {}", s)),
        }
    }
}

/// Transport carrying a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Tcp,
    Udp,
    Multicast,
    Other,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Tcp => write!(f, "tcp"),
            ConnectionMode::Udp => write!(f, "udp"),
            ConnectionMode::Multicast => write!(f, "mcast"),
            ConnectionMode::Other => write!(f, "other"),
        }
    }
}

/// Screen position of an entity's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Width/height pair used for size hints and view bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Size { width, height }
    }
}

/// An advertised service as reported by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Canonical service name, used as the entity key
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ports the service reads from
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Ports the service writes to
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A raw communication endpoint as reported by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    /// `host:port` the endpoint listens on
    #[serde(default)]
    pub address: String,
    /// Known direction; `None` means it must be probed
    #[serde(default)]
    pub direction: Option<PortDirection>,
}

/// Ports discovered to belong together with an endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Associates {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// True when the queried endpoint is the group's primary port
    #[serde(default)]
    pub primary: bool,
}

/// One end of a live connection as seen from an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPeer {
    pub port: String,
    pub mode: ConnectionMode,
}

/// Connections of one endpoint, split by data-flow side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortConnections {
    /// Peers sending into the endpoint
    pub inputs: Vec<ConnectionPeer>,
    /// Peers the endpoint sends to
    pub outputs: Vec<ConnectionPeer>,
}
