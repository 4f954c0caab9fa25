//! Snapshot construction.
//!
//! `gather` runs on the scan worker and only talks to discovery; `finalize`
//! runs on the consumer and only reads the foreground. Neither ever writes the
//! foreground.

use crate::discovery::DiscoveryService;
use crate::error::DiscoveryError;
use crate::layout::{LayoutEdge, LayoutEngine, LayoutNode};
use crate::models::{
    EndpointDescriptor, EntityKey, EntityKind, Point, PortDirection, PortUsage, Size,
};
use crate::snapshot::{Connection, Entity, Snapshot};

/// Counters from one `gather` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherReport {
    pub generation: u64,
    pub services: usize,
    pub adapters: usize,
    pub standalone: usize,
    pub raw_connections: usize,
    /// Discovery calls that failed and were skipped
    pub failures: usize,
}

/// Counters from one `finalize` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub connections: usize,
    pub carried_forward: usize,
    pub laid_out: usize,
}

/// Rebuilds the background snapshot from discovery.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    generation: u64,
    sweep_stale_entries: bool,
}

impl SnapshotBuilder {
    pub fn new(sweep_stale_entries: bool) -> Self {
        SnapshotBuilder {
            generation: 0,
            sweep_stale_entries,
        }
    }

    /// Generation stamped by the most recent `gather`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clear `background` and fill it from scratch.
    ///
    /// Discovery failures are logged and skipped; the result is whatever could
    /// be gathered.
    pub fn gather(&mut self, discovery: &dyn DiscoveryService, background: &mut Snapshot) -> GatherReport {
        background.clear();
        self.generation += 1;
        background.set_generation(self.generation);

        let mut report = GatherReport {
            generation: self.generation,
            ..Default::default()
        };

        if self.sweep_stale_entries {
            match discovery.remove_stale_entries() {
                Ok(0) => {}
                Ok(n) => log::debug!("[SnapshotBuilder] Swept {} stale entries", n),
                Err(e) => {
                    log::warn!("[SnapshotBuilder] Stale entry sweep failed: {}", e);
                    report.failures += 1;
                }
            }
        }

        add_services(discovery, background, &mut report);

        let endpoints = match discovery.list_endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                log::warn!("[SnapshotBuilder] Cannot list endpoints: {}", e);
                report.failures += 1;
                Vec::new()
            }
        };
        add_adapters(discovery, &endpoints, background, &mut report);
        add_standalone_endpoints(discovery, &endpoints, background, &mut report);
        add_raw_connections(discovery, &endpoints, background, &mut report);

        log::debug!(
            "[SnapshotBuilder] Generation {}: {} entities, {} ports, {} raw connections, {} failures",
            report.generation,
            background.entity_count(),
            background.port_count(),
            report.raw_connections,
            report.failures
        );
        report
    }

    /// Complete a gathered snapshot on the consumer side.
    ///
    /// Resolves raw connections, carries positions forward from `foreground`
    /// by entity key, then lets `layout` place whatever is still unplaced.
    pub fn finalize(
        background: &mut Snapshot,
        foreground: &Snapshot,
        layout: &dyn LayoutEngine,
        bounds: Size,
    ) -> FinalizeReport {
        let mut report = FinalizeReport::default();
        background.resolve_connections();
        report.connections = background.connection_count();

        let carried: Vec<(EntityKey, Point)> = background
            .entities()
            .iter()
            .filter_map(|entity| {
                foreground
                    .entity(entity.key.as_str())
                    .and_then(|previous| previous.position)
                    .map(|position| (entity.key.clone(), position))
            })
            .collect();
        for (key, position) in carried {
            if background.set_position(key.as_str(), position) {
                report.carried_forward += 1;
            }
        }

        let nodes: Vec<LayoutNode> = background
            .entities()
            .iter()
            .map(|entity| LayoutNode {
                key: entity.key.clone(),
                size: entity.size_hint(),
                position: entity.position,
            })
            .collect();
        if nodes.iter().any(|n| n.position.is_none()) {
            let edges: Vec<LayoutEdge> = background
                .connections()
                .iter()
                .filter_map(|c| {
                    let from = background.port(c.from.as_str())?.entity.clone();
                    let to = background.port(c.to.as_str())?.entity.clone();
                    Some(LayoutEdge { from, to })
                })
                .collect();
            for (key, position) in layout.place(&nodes, &edges, bounds) {
                let unplaced = background
                    .entity(key.as_str())
                    .map(|e| e.position.is_none())
                    .unwrap_or(false);
                if unplaced && background.set_position(key.as_str(), position) {
                    report.laid_out += 1;
                }
            }
        }
        report
    }
}

fn add_services(discovery: &dyn DiscoveryService, snapshot: &mut Snapshot, report: &mut GatherReport) {
    let services = match discovery.list_services() {
        Ok(services) => services,
        Err(e) => {
            log::warn!("[SnapshotBuilder] Cannot list services: {}", e);
            report.failures += 1;
            return;
        }
    };

    for service in services {
        let key = EntityKey::new(service.name.as_str());
        if !snapshot.add_entity(Entity::new(key.clone(), EntityKind::Service).with_description(&service.description)) {
            continue;
        }
        for input in &service.inputs {
            add_port_logged(snapshot, &key, input, PortUsage::Service, PortDirection::Input);
        }
        for output in &service.outputs {
            add_port_logged(snapshot, &key, output, PortUsage::Service, PortDirection::Output);
        }
        report.services += 1;
    }
}

fn add_adapters(
    discovery: &dyn DiscoveryService,
    endpoints: &[EndpointDescriptor],
    snapshot: &mut Snapshot,
    report: &mut GatherReport,
) {
    for endpoint in endpoints {
        if snapshot.has_port(&endpoint.name) {
            continue;
        }
        let associates = match discovery.get_associates(&endpoint.name) {
            Ok(Some(associates)) if associates.primary => associates,
            Ok(_) => continue,
            Err(e) => {
                log::debug!("[SnapshotBuilder] No associates for {}: {}", endpoint.name, e);
                report.failures += 1;
                continue;
            }
        };

        let key = EntityKey::new(endpoint.name.as_str());
        let entity = Entity::new(key.clone(), EntityKind::ClientOrAdapter).with_address(&endpoint.address);
        if !snapshot.add_entity(entity) {
            continue;
        }
        for input in &associates.inputs {
            add_port_logged(snapshot, &key, input, PortUsage::Other, PortDirection::Input);
        }
        for output in &associates.outputs {
            add_port_logged(snapshot, &key, output, PortUsage::Other, PortDirection::Output);
        }
        add_port_logged(snapshot, &key, &endpoint.name, PortUsage::Client, PortDirection::InputOutput);
        report.adapters += 1;
    }
}

fn add_standalone_endpoints(
    discovery: &dyn DiscoveryService,
    endpoints: &[EndpointDescriptor],
    snapshot: &mut Snapshot,
    report: &mut GatherReport,
) {
    for endpoint in endpoints {
        if snapshot.has_port(&endpoint.name) {
            continue;
        }
        let direction = match endpoint.direction {
            Some(direction) => direction,
            None => probe(discovery, endpoint),
        };
        let key = EntityKey::new(endpoint.name.as_str());
        let entity = Entity::new(key.clone(), EntityKind::Other).with_address(&endpoint.address);
        if !snapshot.add_entity(entity) {
            continue;
        }
        add_port_logged(snapshot, &key, &endpoint.name, PortUsage::Other, direction);
        report.standalone += 1;
    }
}

fn probe(discovery: &dyn DiscoveryService, endpoint: &EndpointDescriptor) -> PortDirection {
    match discovery.probe_direction(endpoint) {
        Ok(direction) => direction,
        Err(DiscoveryError::ProbeTimeout(ms)) => {
            log::debug!("[SnapshotBuilder] Probe of {} gave up after {} ms", endpoint.name, ms);
            PortDirection::Unknown
        }
        Err(e) => {
            log::debug!("[SnapshotBuilder] Probe of {} failed: {}", endpoint.name, e);
            PortDirection::Unknown
        }
    }
}

fn add_raw_connections(
    discovery: &dyn DiscoveryService,
    endpoints: &[EndpointDescriptor],
    snapshot: &mut Snapshot,
    report: &mut GatherReport,
) {
    for endpoint in endpoints {
        if !snapshot.has_port(&endpoint.name) {
            continue;
        }
        match discovery.get_connections(&endpoint.name) {
            Ok(connections) => {
                for peer in connections.outputs {
                    snapshot.push_unresolved(Connection::new(endpoint.name.as_str(), peer.port, peer.mode));
                    report.raw_connections += 1;
                }
            }
            Err(e) => {
                log::debug!("[SnapshotBuilder] No connections for {}: {}", endpoint.name, e);
                report.failures += 1;
            }
        }
    }
}

fn add_port_logged(
    snapshot: &mut Snapshot,
    entity: &EntityKey,
    name: &str,
    usage: PortUsage,
    direction: PortDirection,
) {
    if !snapshot.add_port(entity, name, usage, direction) {
        log::debug!("[SnapshotBuilder] Port {} already owned, not added to {}", name, entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::topology::{Topology, TopologyConnection, TopologyEndpoint};
    use crate::discovery::StaticDiscovery;
    use crate::layout::GridLayout;
    use crate::models::{Associates, ConnectionMode, ServiceDescriptor};

    fn scenario() -> StaticDiscovery {
        StaticDiscovery::new(Topology {
            network_available: true,
            services: vec![ServiceDescriptor {
                name: "svc.A".to_string(),
                description: "Service A".to_string(),
                inputs: vec!["/svc/A/in".to_string()],
                outputs: vec![],
            }],
            endpoints: vec![
                TopologyEndpoint::new("/svc/A/in").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/client/1").with_direction(PortDirection::Output),
            ],
            connections: vec![TopologyConnection {
                from: "/client/1".to_string(),
                to: "/svc/A/in".to_string(),
                mode: ConnectionMode::Tcp,
            }],
        })
    }

    fn bounds() -> Size {
        Size::new(1200.0, 800.0)
    }

    #[test]
    fn test_gather_and_finalize_scenario() {
        let discovery = scenario();
        let mut builder = SnapshotBuilder::new(false);
        let mut background = Snapshot::new();
        let report = builder.gather(&discovery, &mut background);

        assert_eq!(report.services, 1);
        assert_eq!(report.standalone, 1);
        assert_eq!(report.raw_connections, 1);
        assert_eq!(background.connection_count(), 0, "connections resolve at finalize");

        let finalized = SnapshotBuilder::finalize(&mut background, &Snapshot::new(), &GridLayout::default(), bounds());
        assert_eq!(finalized.connections, 1);
        assert_eq!(finalized.laid_out, 2);
        assert_eq!(background.entity_count(), 2);
        assert_eq!(background.port_count(), 2);
        assert!(background.has_connection("/client/1", "/svc/A/in"));
        assert!(background.check_consistency().is_ok());
        assert!(background.entities().iter().all(|e| e.position.is_some()));
    }

    #[test]
    fn test_adapter_groups_associates() {
        let discovery = StaticDiscovery::new(Topology {
            endpoints: vec![
                TopologyEndpoint::new("/adapter").with_associates(Associates {
                    inputs: vec!["/adapter/in".to_string()],
                    outputs: vec!["/adapter/out".to_string()],
                    primary: true,
                }),
                TopologyEndpoint::new("/adapter/in").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/adapter/out").with_direction(PortDirection::Output),
            ],
            ..Topology::default()
        });
        let mut background = Snapshot::new();
        let report = SnapshotBuilder::new(false).gather(&discovery, &mut background);

        assert_eq!(report.adapters, 1);
        assert_eq!(report.standalone, 0);
        let adapter = background.entity("/adapter").unwrap();
        assert_eq!(adapter.kind, EntityKind::ClientOrAdapter);
        assert_eq!(adapter.ports.len(), 3);
        let primary = background.port("/adapter").unwrap();
        assert_eq!(primary.usage, PortUsage::Client);
        assert_eq!(primary.direction, PortDirection::InputOutput);
    }

    #[test]
    fn test_probe_failure_records_unknown() {
        let discovery = StaticDiscovery::new(Topology {
            endpoints: vec![TopologyEndpoint::new("/mystery")],
            ..Topology::default()
        });
        let mut background = Snapshot::new();
        SnapshotBuilder::new(false).gather(&discovery, &mut background);
        assert_eq!(background.port("/mystery").unwrap().direction, PortDirection::Unknown);
    }

    #[test]
    fn test_unavailable_network_gives_empty_snapshot() {
        let discovery = StaticDiscovery::new(Topology {
            network_available: false,
            ..Topology::default()
        });
        let mut background = Snapshot::new();
        background.add_entity(Entity::new("stale", EntityKind::Other));
        let report = SnapshotBuilder::new(true).gather(&discovery, &mut background);
        assert!(background.is_empty());
        assert_eq!(report.failures, 3);
    }

    #[test]
    fn test_generation_increments() {
        let discovery = scenario();
        let mut builder = SnapshotBuilder::new(false);
        let mut background = Snapshot::new();
        builder.gather(&discovery, &mut background);
        builder.gather(&discovery, &mut background);
        assert_eq!(background.generation(), 2);
        assert_eq!(builder.generation(), 2);
    }

    #[test]
    fn test_finalize_carries_positions_forward() {
        let discovery = scenario();
        let mut builder = SnapshotBuilder::new(false);
        let mut foreground = Snapshot::new();
        builder.gather(&discovery, &mut foreground);
        SnapshotBuilder::finalize(&mut foreground, &Snapshot::new(), &GridLayout::default(), bounds());
        foreground.set_position("svc.A", Point::new(10.0, 20.0));

        let mut background = Snapshot::new();
        builder.gather(&discovery, &mut background);
        let report = SnapshotBuilder::finalize(&mut background, &foreground, &GridLayout::default(), bounds());

        assert_eq!(report.carried_forward, 2);
        assert_eq!(report.laid_out, 0);
        assert_eq!(background.entity("svc.A").unwrap().position, Some(Point::new(10.0, 20.0)));
        assert_eq!(
            foreground.entity("svc.A").unwrap().position,
            Some(Point::new(10.0, 20.0)),
            "finalize must not touch the foreground"
        );
    }
}
