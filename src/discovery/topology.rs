//! In-memory network topology.
//!
//! `StaticDiscovery` answers discovery queries from a `Topology` held in
//! memory, optionally loaded from a JSON file that is re-read whenever its
//! modification time changes. It also accepts connection edits, so the viewer
//! can be driven end to end without a live name server.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::probe;
use super::{ConnectionEditor, DiscoveryService};
use crate::error::{ConfigError, DiscoveryError};
use crate::models::{
    Associates, ConnectionMode, ConnectionPeer, EndpointDescriptor, PortConnections,
    PortDirection, ServiceDescriptor,
};

fn default_true() -> bool {
    true
}

/// An endpoint entry in a topology file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEndpoint {
    #[serde(flatten)]
    pub descriptor: EndpointDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associates: Option<Associates>,
}

impl TopologyEndpoint {
    pub fn new(name: &str) -> Self {
        TopologyEndpoint {
            descriptor: EndpointDescriptor {
                name: name.to_string(),
                address: String::new(),
                direction: None,
            },
            associates: None,
        }
    }

    pub fn with_direction(mut self, direction: PortDirection) -> Self {
        self.descriptor.direction = Some(direction);
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.descriptor.address = address.to_string();
        self
    }

    pub fn with_associates(mut self, associates: Associates) -> Self {
        self.associates = Some(associates);
        self
    }
}

/// A live connection entry in a topology file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConnection {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub mode: ConnectionMode,
}

/// Complete description of a network: services, endpoints and connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default = "default_true")]
    pub network_available: bool,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
    #[serde(default)]
    pub endpoints: Vec<TopologyEndpoint>,
    #[serde(default)]
    pub connections: Vec<TopologyConnection>,
}

impl Default for Topology {
    fn default() -> Self {
        Topology {
            network_available: true,
            services: Vec::new(),
            endpoints: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl Topology {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let topology: Topology = serde_json::from_str(content)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject topologies that name the same endpoint or service twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut endpoints = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.descriptor.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "endpoint with empty name".to_string(),
                ));
            }
            if !endpoints.insert(endpoint.descriptor.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "endpoint '{}' listed twice",
                    endpoint.descriptor.name
                )));
            }
        }
        let mut services = HashSet::new();
        for service in &self.services {
            if !services.insert(service.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "service '{}' listed twice",
                    service.name
                )));
            }
        }
        Ok(())
    }

    /// Whether `name` is a port anywhere in the topology.
    pub fn knows_port(&self, name: &str) -> bool {
        self.endpoints.iter().any(|e| e.descriptor.name == name)
            || self
                .services
                .iter()
                .any(|s| s.inputs.iter().chain(&s.outputs).any(|p| p == name))
    }

    fn endpoint(&self, name: &str) -> Option<&TopologyEndpoint> {
        self.endpoints.iter().find(|e| e.descriptor.name == name)
    }

    /// A small network shown when no topology file is configured.
    pub fn demo() -> Self {
        let service = |name: &str, description: &str, inputs: &[&str], outputs: &[&str]| {
            ServiceDescriptor {
                name: name.to_string(),
                description: description.to_string(),
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
            }
        };
        let link = |from: &str, to: &str, mode: ConnectionMode| TopologyConnection {
            from: from.to_string(),
            to: to.to_string(),
            mode,
        };

        Topology {
            network_available: true,
            services: vec![
                service("Registry", "Service registry", &["/$service"], &[]),
                service("Echo", "Echo service", &["/echo"], &["/echo/out"]),
            ],
            endpoints: vec![
                TopologyEndpoint::new("/$service").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/echo").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/echo/out").with_direction(PortDirection::Output),
                TopologyEndpoint::new("/adapter/keyboard")
                    .with_address("127.0.0.1:10010")
                    .with_associates(Associates {
                        inputs: vec!["/adapter/keyboard/in".to_string()],
                        outputs: vec!["/adapter/keyboard/out".to_string()],
                        primary: true,
                    }),
                TopologyEndpoint::new("/adapter/keyboard/in").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/adapter/keyboard/out")
                    .with_direction(PortDirection::Output),
                TopologyEndpoint::new("/monitor").with_direction(PortDirection::Input),
            ],
            connections: vec![
                link("/adapter/keyboard/out", "/echo", ConnectionMode::Tcp),
                link("/echo/out", "/monitor", ConnectionMode::Udp),
            ],
        }
    }
}

/// Budget for direction probes of endpoints with an unknown direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSettings {
    pub budget: Duration,
    pub initial_backoff: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            budget: Duration::from_millis(1000),
            initial_backoff: Duration::from_millis(50),
        }
    }
}

struct FileSource {
    path: PathBuf,
    modified: Mutex<Option<SystemTime>>,
}

/// Discovery and connection editing backed by a `Topology`.
pub struct StaticDiscovery {
    topology: RwLock<Topology>,
    source: Option<FileSource>,
    probe: ProbeSettings,
}

impl StaticDiscovery {
    pub fn new(topology: Topology) -> Self {
        StaticDiscovery {
            topology: RwLock::new(topology),
            source: None,
            probe: ProbeSettings::default(),
        }
    }

    /// Load a topology file and keep watching it for changes.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let topology = Topology::load(&path)?;
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
        log::info!(
            "[Discovery] Loaded topology from {} ({} services, {} endpoints)",
            path.display(),
            topology.services.len(),
            topology.endpoints.len()
        );
        Ok(StaticDiscovery {
            topology: RwLock::new(topology),
            source: Some(FileSource {
                path,
                modified: Mutex::new(modified),
            }),
            probe: ProbeSettings::default(),
        })
    }

    pub fn with_probe_settings(mut self, probe: ProbeSettings) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the whole topology.
    pub fn set_topology(&self, topology: Topology) {
        *self.write() = topology;
    }

    /// Mutate the topology in place.
    pub fn update(&self, f: impl FnOnce(&mut Topology)) {
        f(&mut self.write());
    }

    pub fn topology(&self) -> Topology {
        self.read().clone()
    }

    /// Re-read the backing file if it changed since the last load.
    ///
    /// Returns true when a new topology was installed. A file that fails to
    /// parse is logged and the previous topology kept.
    pub fn refresh(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let current = match fs::metadata(&source.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("[Discovery] Cannot stat {}: {}", source.path.display(), e);
                return false;
            }
        };
        let mut modified = source
            .modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *modified == Some(current) {
            return false;
        }
        *modified = Some(current);

        match Topology::load(&source.path) {
            Ok(topology) => {
                log::info!("[Discovery] Topology file changed, reloaded");
                *self.write() = topology;
                true
            }
            Err(e) => {
                log::warn!("[Discovery] Keeping previous topology: {}", e);
                false
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Topology> {
        self.topology.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<RwLockReadGuard<'_, Topology>, DiscoveryError> {
        let topology = self.read();
        if topology.network_available {
            Ok(topology)
        } else {
            Err(DiscoveryError::NetworkUnavailable)
        }
    }
}

impl DiscoveryService for StaticDiscovery {
    fn check_network(&self) -> bool {
        self.refresh();
        self.read().network_available
    }

    fn list_services(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        self.refresh();
        Ok(self.available()?.services.clone())
    }

    fn list_endpoints(&self) -> Result<Vec<EndpointDescriptor>, DiscoveryError> {
        Ok(self
            .available()?
            .endpoints
            .iter()
            .map(|e| e.descriptor.clone())
            .collect())
    }

    fn get_associates(&self, endpoint: &str) -> Result<Option<Associates>, DiscoveryError> {
        let topology = self.available()?;
        match topology.endpoint(endpoint) {
            Some(entry) => Ok(entry.associates.clone()),
            None => Err(DiscoveryError::UnknownEndpoint(endpoint.to_string())),
        }
    }

    fn get_connections(&self, endpoint: &str) -> Result<PortConnections, DiscoveryError> {
        let topology = self.available()?;
        if !topology.knows_port(endpoint) {
            return Err(DiscoveryError::UnknownEndpoint(endpoint.to_string()));
        }
        let mut result = PortConnections::default();
        for link in &topology.connections {
            if link.from == endpoint {
                result.outputs.push(ConnectionPeer {
                    port: link.to.clone(),
                    mode: link.mode,
                });
            }
            if link.to == endpoint {
                result.inputs.push(ConnectionPeer {
                    port: link.from.clone(),
                    mode: link.mode,
                });
            }
        }
        Ok(result)
    }

    fn probe_direction(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<PortDirection, DiscoveryError> {
        if endpoint.address.is_empty() {
            return Err(DiscoveryError::UnknownEndpoint(endpoint.name.clone()));
        }
        probe::probe_tcp(&endpoint.address, self.probe.budget, self.probe.initial_backoff)
    }

    fn remove_stale_entries(&self) -> Result<usize, DiscoveryError> {
        let mut topology = self.write();
        if !topology.network_available {
            return Err(DiscoveryError::NetworkUnavailable);
        }
        let before = topology.connections.len();
        let Topology {
            connections,
            endpoints,
            services,
            ..
        } = &mut *topology;
        let known = |name: &str| {
            endpoints.iter().any(|e| e.descriptor.name == name)
                || services
                    .iter()
                    .any(|s| s.inputs.iter().chain(&s.outputs).any(|p| p == name))
        };
        connections.retain(|c| known(&c.from) && known(&c.to));
        let removed = before - connections.len();
        if removed > 0 {
            log::info!("[Discovery] Swept {} stale connections", removed);
        }
        Ok(removed)
    }
}

impl ConnectionEditor for StaticDiscovery {
    fn add_connection(
        &self,
        from: &str,
        to: &str,
        mode: ConnectionMode,
    ) -> Result<(), DiscoveryError> {
        let mut topology = self.write();
        if !topology.network_available {
            return Err(DiscoveryError::NetworkUnavailable);
        }
        for name in [from, to] {
            if !topology.knows_port(name) {
                return Err(DiscoveryError::ConnectionRefused(format!(
                    "{} -> {}: unknown port {}",
                    from, to, name
                )));
            }
        }
        if topology
            .connections
            .iter()
            .any(|c| c.from == from && c.to == to)
        {
            return Ok(());
        }
        topology.connections.push(TopologyConnection {
            from: from.to_string(),
            to: to.to_string(),
            mode,
        });
        log::info!("[Discovery] Connected {} -> {} ({})", from, to, mode);
        Ok(())
    }

    fn remove_connection(&self, from: &str, to: &str) -> Result<(), DiscoveryError> {
        let mut topology = self.write();
        let before = topology.connections.len();
        topology
            .connections
            .retain(|c| !(c.from == from && c.to == to));
        if topology.connections.len() == before {
            return Err(DiscoveryError::ConnectionRefused(format!(
                "{} -> {}: not connected",
                from, to
            )));
        }
        log::info!("[Discovery] Disconnected {} -> {}", from, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "services": [
            {"name": "svc.A", "description": "A", "inputs": ["/svc/A/in"]}
        ],
        "endpoints": [
            {"name": "/client/1", "address": "127.0.0.1:1", "direction": "output"}
        ],
        "connections": [
            {"from": "/client/1", "to": "/svc/A/in"}
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let topology = Topology::from_json(SAMPLE).unwrap();
        assert!(topology.network_available);
        assert_eq!(topology.services[0].inputs, vec!["/svc/A/in"]);
        assert_eq!(
            topology.endpoints[0].descriptor.direction,
            Some(PortDirection::Output)
        );
        assert_eq!(topology.connections[0].mode, ConnectionMode::Tcp);
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let json = r#"{"endpoints": [{"name": "/a"}, {"name": "/a"}]}"#;
        assert!(matches!(
            Topology::from_json(json),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_connections_split_by_side() {
        let discovery = StaticDiscovery::new(Topology::from_json(SAMPLE).unwrap());
        let client = discovery.get_connections("/client/1").unwrap();
        assert_eq!(client.outputs.len(), 1);
        assert_eq!(client.outputs[0].port, "/svc/A/in");
        let service = discovery.get_connections("/svc/A/in").unwrap();
        assert_eq!(service.inputs[0].port, "/client/1");
        assert!(matches!(
            discovery.get_connections("/nope"),
            Err(DiscoveryError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn test_unavailable_network_fails_listing() {
        let discovery = StaticDiscovery::new(Topology {
            network_available: false,
            ..Topology::default()
        });
        assert!(!discovery.check_network());
        assert_eq!(
            discovery.list_services(),
            Err(DiscoveryError::NetworkUnavailable)
        );
    }

    #[test]
    fn test_edit_connections() {
        let discovery = StaticDiscovery::new(Topology::from_json(SAMPLE).unwrap());
        discovery
            .remove_connection("/client/1", "/svc/A/in")
            .unwrap();
        assert!(discovery.topology().connections.is_empty());
        assert!(discovery.remove_connection("/client/1", "/svc/A/in").is_err());

        discovery
            .add_connection("/client/1", "/svc/A/in", ConnectionMode::Udp)
            .unwrap();
        assert_eq!(discovery.topology().connections[0].mode, ConnectionMode::Udp);
        assert!(matches!(
            discovery.add_connection("/client/1", "/ghost", ConnectionMode::Tcp),
            Err(DiscoveryError::ConnectionRefused(_))
        ));
    }

    #[test]
    fn test_sweep_removes_dangling_connections() {
        let discovery = StaticDiscovery::new(Topology::from_json(SAMPLE).unwrap());
        discovery.update(|t| {
            t.connections.push(TopologyConnection {
                from: "/gone".to_string(),
                to: "/svc/A/in".to_string(),
                mode: ConnectionMode::Tcp,
            })
        });
        assert_eq!(discovery.remove_stale_entries(), Ok(1));
        assert_eq!(discovery.topology().connections.len(), 1);
    }

    #[test]
    fn test_probe_without_address_is_unknown() {
        let discovery = StaticDiscovery::new(Topology::default());
        let endpoint = EndpointDescriptor {
            name: "/x".to_string(),
            address: String::new(),
            direction: None,
        };
        assert!(discovery.probe_direction(&endpoint).is_err());
    }

    #[test]
    fn test_file_reload_on_change() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let discovery = StaticDiscovery::from_file(file.path()).unwrap();
        assert_eq!(discovery.list_services().unwrap().len(), 1);
        assert!(!discovery.refresh());

        let updated = r#"{"services": [{"name": "svc.A"}, {"name": "svc.B"}]}"#;
        fs::write(file.path(), updated).unwrap();
        // Force a distinct mtime even on coarse-grained filesystems.
        let later = SystemTime::now() + Duration::from_secs(5);
        let handle = fs::OpenOptions::new().write(true).open(file.path()).unwrap();
        handle.set_modified(later).unwrap();

        assert_eq!(discovery.list_services().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StaticDiscovery::from_file("/definitely/not/here.json"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ \"services\": [ ").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            StaticDiscovery::from_file(file.path()),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_demo_is_valid() {
        let demo = Topology::demo();
        assert!(demo.validate().is_ok());
        for link in &demo.connections {
            assert!(demo.knows_port(&link.from) && demo.knows_port(&link.to));
        }
    }
}
