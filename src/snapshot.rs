//! One generation of discovered world state.
//!
//! A `Snapshot` holds entities, ports and connections keyed by stable names.
//! Connections are pairs of `PortKey`s resolved through the port map, never
//! references into another generation, so a snapshot can be swapped or cleared
//! without invalidating anything held elsewhere.

use std::collections::{BTreeSet, HashMap};

use crate::models::{
    ConnectionMode, EntityKey, EntityKind, Point, PortDirection, PortKey, PortUsage, Size,
};

/// Width of an entity panel in view units.
pub const ENTITY_WIDTH: f32 = 180.0;
/// Height of the entity title row.
pub const ENTITY_HEADER_HEIGHT: f32 = 24.0;
/// Height of one port row.
pub const PORT_ROW_HEIGHT: f32 = 18.0;

/// A visual grouping of one or more ports.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    pub kind: EntityKind,
    pub description: String,
    /// `host:port` of the owning process, when known
    pub address: String,
    /// Ports in display order
    pub ports: Vec<PortKey>,
    /// `None` until carried forward or placed by layout
    pub position: Option<Point>,
}

impl Entity {
    pub fn new(key: impl Into<EntityKey>, kind: EntityKind) -> Self {
        Entity {
            key: key.into(),
            kind,
            description: String::new(),
            address: String::new(),
            ports: Vec::new(),
            position: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Size hint for layout: one header row plus one row per port.
    pub fn size_hint(&self) -> Size {
        Size::new(
            ENTITY_WIDTH,
            ENTITY_HEADER_HEIGHT + PORT_ROW_HEIGHT * self.ports.len() as f32,
        )
    }
}

/// A single communication endpoint owned by exactly one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub key: PortKey,
    pub entity: EntityKey,
    pub usage: PortUsage,
    pub direction: PortDirection,
}

/// A directed connection between two ports of the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub from: PortKey,
    pub to: PortKey,
    pub mode: ConnectionMode,
}

impl Connection {
    pub fn new(from: impl Into<PortKey>, to: impl Into<PortKey>, mode: ConnectionMode) -> Self {
        Connection {
            from: from.into(),
            to: to.into(),
            mode,
        }
    }
}

/// Consistency violations reported by [`Snapshot::check_consistency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    DanglingConnection(Connection),
    OrphanPort(PortKey),
    PortListedTwice(PortKey),
}

/// A complete, self-consistent generation of entities, ports and connections.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    generation: u64,
    entities: Vec<Entity>,
    entity_index: HashMap<EntityKey, usize>,
    ports: HashMap<PortKey, Port>,
    connections: Vec<Connection>,
    /// Raw connections gathered by the worker, resolved at finalize
    unresolved: Vec<Connection>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, keeping allocations for the next rebuild.
    pub fn clear(&mut self) {
        self.generation = 0;
        self.entities.clear();
        self.entity_index.clear();
        self.ports.clear();
        self.connections.clear();
        self.unresolved.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.ports.is_empty() && self.connections.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Add an entity. Returns false if an entity with the same key exists.
    /// Ports are attached afterwards with [`Snapshot::add_port`].
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        if self.entity_index.contains_key(&entity.key) {
            return false;
        }
        self.entity_index.insert(entity.key.clone(), self.entities.len());
        self.entities.push(entity);
        true
    }

    /// Attach a new port to an existing entity.
    ///
    /// Returns false if the entity is unknown or the port name is already
    /// taken by any entity in this snapshot.
    pub fn add_port(
        &mut self,
        entity: &EntityKey,
        name: &str,
        usage: PortUsage,
        direction: PortDirection,
    ) -> bool {
        if self.ports.contains_key(name) {
            return false;
        }
        let Some(&index) = self.entity_index.get(entity) else {
            return false;
        };
        let key = PortKey::new(name);
        self.entities[index].ports.push(key.clone());
        self.ports.insert(
            key.clone(),
            Port {
                key,
                entity: entity.clone(),
                usage,
                direction,
            },
        );
        true
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, key: &str) -> Option<&Entity> {
        self.entity_index.get(key).map(|&i| &self.entities[i])
    }

    pub fn entity_mut(&mut self, key: &str) -> Option<&mut Entity> {
        match self.entity_index.get(key) {
            Some(&i) => Some(&mut self.entities[i]),
            None => None,
        }
    }

    pub fn has_port(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn entity_for_port(&self, name: &str) -> Option<&Entity> {
        self.ports.get(name).and_then(|p| self.entity(p.entity.as_str()))
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Add a resolved connection. Both ports must exist; duplicates are refused.
    pub fn add_connection(&mut self, connection: Connection) -> bool {
        if !self.ports.contains_key(&connection.from) || !self.ports.contains_key(&connection.to) {
            return false;
        }
        if self.has_connection(connection.from.as_str(), connection.to.as_str()) {
            return false;
        }
        self.connections.push(connection);
        true
    }

    pub fn remove_connection(&mut self, from: &str, to: &str) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.from.as_str() == from && c.to.as_str() == to));
        before != self.connections.len()
    }

    pub fn has_connection(&self, from: &str, to: &str) -> bool {
        self.connections
            .iter()
            .any(|c| c.from.as_str() == from && c.to.as_str() == to)
    }

    /// Queue a raw connection for resolution at finalize time.
    pub fn push_unresolved(&mut self, connection: Connection) {
        self.unresolved.push(connection);
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Move queued raw connections into the connection list, dropping any
    /// whose endpoints are missing and any duplicates. Returns how many were
    /// accepted.
    pub fn resolve_connections(&mut self) -> usize {
        let pending = std::mem::take(&mut self.unresolved);
        let mut accepted = 0;
        for connection in pending {
            if self.add_connection(connection) {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn set_position(&mut self, key: &str, position: Point) -> bool {
        match self.entity_mut(key) {
            Some(entity) => {
                entity.position = Some(position);
                true
            }
            None => false,
        }
    }

    /// Move an entity to the end of the draw order so it renders on top.
    pub fn raise_entity(&mut self, key: &str) {
        let Some(&index) = self.entity_index.get(key) else {
            return;
        };
        let entity = self.entities.remove(index);
        self.entities.push(entity);
        for (i, e) in self.entities.iter().enumerate().skip(index) {
            self.entity_index.insert(e.key.clone(), i);
        }
    }

    pub fn entity_keys(&self) -> BTreeSet<EntityKey> {
        self.entities.iter().map(|e| e.key.clone()).collect()
    }

    pub fn port_keys(&self) -> BTreeSet<PortKey> {
        self.ports.keys().cloned().collect()
    }

    pub fn connection_keys(&self) -> BTreeSet<(PortKey, PortKey)> {
        self.connections
            .iter()
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect()
    }

    /// Verify the snapshot invariants: every connection joins two known ports
    /// and every port is listed by exactly one entity.
    pub fn check_consistency(&self) -> Result<(), Inconsistency> {
        for connection in &self.connections {
            if !self.ports.contains_key(&connection.from) || !self.ports.contains_key(&connection.to)
            {
                return Err(Inconsistency::DanglingConnection(connection.clone()));
            }
        }
        let mut listed: BTreeSet<&PortKey> = BTreeSet::new();
        for entity in &self.entities {
            for port in &entity.ports {
                if !listed.insert(port) {
                    return Err(Inconsistency::PortListedTwice(port.clone()));
                }
            }
        }
        for (key, port) in &self.ports {
            let owned = self
                .entity(port.entity.as_str())
                .map(|e| e.ports.contains(key))
                .unwrap_or(false);
            if !owned {
                return Err(Inconsistency::OrphanPort(key.clone()));
            }
        }
        Ok(())
    }
}
