//! User gestures that must hold off snapshot swaps.
//!
//! Connect and disconnect are two-click gestures: the first click arms a
//! source port, the second picks the destination and ends the gesture whether
//! or not the edit succeeds. Dragging moves an entity in the foreground.

use crate::discovery::ConnectionEditor;
use crate::error::AppError;
use crate::models::{ConnectionMode, EntityKey, Point, PortKey};
use crate::scan::DoubleBuffer;
use crate::snapshot::Connection;

/// Keyboard modifier held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickModifier {
    None,
    /// Shift: add a connection
    Add,
    /// Command: remove a connection
    Remove,
}

/// What a click did.
#[derive(Debug, Clone)]
pub enum ClickOutcome {
    /// Nothing happened (no modifier, wrong direction, unknown port)
    Ignored,
    /// First click: the port is now the pending source
    Armed(PortKey),
    Connected { from: PortKey, to: PortKey },
    Disconnected { from: PortKey, to: PortKey },
    /// The editor rejected the request; the gesture has ended
    Failed(AppError),
    /// A pending gesture ended without an edit
    Cleared,
}

/// Gesture flags plus the pending source ports they track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GestureState {
    pending_add: Option<PortKey>,
    pending_remove: Option<PortKey>,
    dragging: Option<EntityKey>,
}

impl GestureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_active(&self) -> bool {
        self.pending_add.is_some()
    }

    pub fn remove_active(&self) -> bool {
        self.pending_remove.is_some()
    }

    pub fn drag_active(&self) -> bool {
        self.dragging.is_some()
    }

    /// True while any gesture is in progress. Swaps are refused meanwhile.
    pub fn is_active(&self) -> bool {
        self.add_active() || self.remove_active() || self.drag_active()
    }

    pub fn pending_add(&self) -> Option<&PortKey> {
        self.pending_add.as_ref()
    }

    pub fn pending_remove(&self) -> Option<&PortKey> {
        self.pending_remove.as_ref()
    }

    pub fn dragged_entity(&self) -> Option<&EntityKey> {
        self.dragging.as_ref()
    }

    /// Handle a click on a port of the foreground snapshot.
    pub fn click_port(
        &mut self,
        port: &str,
        modifier: ClickModifier,
        buffer: &DoubleBuffer,
        editor: &dyn ConnectionEditor,
    ) -> ClickOutcome {
        let Some(direction) = buffer.with_foreground(|fg| fg.port(port).map(|p| p.direction)) else {
            return ClickOutcome::Ignored;
        };

        let remove = match modifier {
            ClickModifier::None => return ClickOutcome::Ignored,
            ClickModifier::Add => false,
            ClickModifier::Remove => true,
        };
        let pending = if remove {
            &mut self.pending_remove
        } else {
            &mut self.pending_add
        };

        let Some(first) = pending.take() else {
            if !direction.can_send() {
                return ClickOutcome::Ignored;
            }
            log::debug!("[Gesture] {} armed from {}", if remove { "Disconnect" } else { "Connect" }, port);
            let key = PortKey::new(port);
            *pending = Some(key.clone());
            return ClickOutcome::Armed(key);
        };

        if first.as_str() == port || !direction.can_receive() {
            return ClickOutcome::Cleared;
        }
        let second = PortKey::new(port);
        if remove {
            finish_remove(first, second, buffer, editor)
        } else {
            finish_add(first, second, buffer, editor)
        }
    }

    /// Handle a click that hit no port. With a modifier held it cancels the
    /// matching pending gesture.
    pub fn click_empty(&mut self, modifier: ClickModifier) -> ClickOutcome {
        let pending = match modifier {
            ClickModifier::None => return ClickOutcome::Ignored,
            ClickModifier::Add => &mut self.pending_add,
            ClickModifier::Remove => &mut self.pending_remove,
        };
        match pending.take() {
            Some(_) => ClickOutcome::Cleared,
            None => ClickOutcome::Ignored,
        }
    }

    /// Start dragging an entity of the foreground. Raises it to the top.
    pub fn begin_drag(&mut self, entity: &str, buffer: &DoubleBuffer) -> bool {
        let found = buffer.with_foreground_mut(|fg| {
            if fg.entity(entity).is_none() {
                return false;
            }
            fg.raise_entity(entity);
            true
        });
        if found {
            self.dragging = Some(EntityKey::new(entity));
        }
        found
    }

    /// Move the dragged entity to `position`. No-op when nothing is dragged.
    pub fn drag_to(&self, position: Point, buffer: &DoubleBuffer) -> bool {
        match &self.dragging {
            Some(key) => buffer.with_foreground_mut(|fg| fg.set_position(key.as_str(), position)),
            None => false,
        }
    }

    pub fn end_drag(&mut self) {
        self.dragging = None;
    }
}

fn finish_add(from: PortKey, to: PortKey, buffer: &DoubleBuffer, editor: &dyn ConnectionEditor) -> ClickOutcome {
    match editor.add_connection(from.as_str(), to.as_str(), ConnectionMode::Tcp) {
        Ok(()) => {
            buffer.with_foreground_mut(|fg| {
                fg.add_connection(Connection::new(from.clone(), to.clone(), ConnectionMode::Tcp))
            });
            ClickOutcome::Connected { from, to }
        }
        Err(e) => {
            log::warn!("[Gesture] Connect {} -> {} failed: {}", from, to, e);
            ClickOutcome::Failed(e.into())
        }
    }
}

fn finish_remove(from: PortKey, to: PortKey, buffer: &DoubleBuffer, editor: &dyn ConnectionEditor) -> ClickOutcome {
    match editor.remove_connection(from.as_str(), to.as_str()) {
        Ok(()) => {
            buffer.with_foreground_mut(|fg| fg.remove_connection(from.as_str(), to.as_str()));
            ClickOutcome::Disconnected { from, to }
        }
        Err(e) => {
            log::warn!("[Gesture] Disconnect {} -> {} failed: {}", from, to, e);
            ClickOutcome::Failed(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::topology::{Topology, TopologyEndpoint};
    use crate::discovery::StaticDiscovery;
    use crate::models::{EntityKind, PortDirection, PortUsage};
    use crate::snapshot::Entity;

    fn setup() -> (DoubleBuffer, StaticDiscovery) {
        let buffer = DoubleBuffer::new();
        buffer.with_foreground_mut(|fg| {
            for (name, direction) in [
                ("/out", PortDirection::Output),
                ("/in", PortDirection::Input),
                ("/both", PortDirection::InputOutput),
            ] {
                let key = EntityKey::from(name);
                fg.add_entity(Entity::new(key.clone(), EntityKind::Other));
                fg.add_port(&key, name, PortUsage::Other, direction);
            }
        });
        let discovery = StaticDiscovery::new(Topology {
            endpoints: vec![
                TopologyEndpoint::new("/out").with_direction(PortDirection::Output),
                TopologyEndpoint::new("/in").with_direction(PortDirection::Input),
                TopologyEndpoint::new("/both").with_direction(PortDirection::InputOutput),
            ],
            ..Topology::default()
        });
        (buffer, discovery)
    }

    #[test]
    fn test_connect_two_clicks() {
        let (buffer, discovery) = setup();
        let mut gestures = GestureState::new();

        let first = gestures.click_port("/out", ClickModifier::Add, &buffer, &discovery);
        assert!(matches!(first, ClickOutcome::Armed(_)));
        assert!(gestures.add_active() && gestures.is_active());

        let second = gestures.click_port("/in", ClickModifier::Add, &buffer, &discovery);
        assert!(matches!(second, ClickOutcome::Connected { .. }));
        assert!(!gestures.is_active());
        assert!(buffer.with_foreground(|fg| fg.has_connection("/out", "/in")));
        assert_eq!(discovery.topology().connections.len(), 1);
    }

    #[test]
    fn test_input_port_cannot_start() {
        let (buffer, discovery) = setup();
        let mut gestures = GestureState::new();
        let outcome = gestures.click_port("/in", ClickModifier::Add, &buffer, &discovery);
        assert!(matches!(outcome, ClickOutcome::Ignored));
        assert!(!gestures.is_active());
    }

    #[test]
    fn test_output_port_cannot_end_but_ends_gesture() {
        let (buffer, discovery) = setup();
        let mut gestures = GestureState::new();
        gestures.click_port("/both", ClickModifier::Add, &buffer, &discovery);
        let outcome = gestures.click_port("/out", ClickModifier::Add, &buffer, &discovery);
        assert!(matches!(outcome, ClickOutcome::Cleared));
        assert!(!gestures.add_active());
        assert_eq!(buffer.with_foreground(|fg| fg.connection_count()), 0);
    }

    #[test]
    fn test_disconnect_failure_ends_gesture() {
        let (buffer, discovery) = setup();
        let mut gestures = GestureState::new();
        gestures.click_port("/out", ClickModifier::Remove, &buffer, &discovery);
        assert!(gestures.remove_active());
        let outcome = gestures.click_port("/in", ClickModifier::Remove, &buffer, &discovery);
        assert!(matches!(outcome, ClickOutcome::Failed(AppError::ConnectionEdit(_))));
        assert!(!gestures.remove_active());
    }

    #[test]
    fn test_click_empty_cancels_matching_gesture() {
        let (buffer, discovery) = setup();
        let mut gestures = GestureState::new();
        gestures.click_port("/out", ClickModifier::Add, &buffer, &discovery);
        assert!(matches!(gestures.click_empty(ClickModifier::Remove), ClickOutcome::Ignored));
        assert!(gestures.add_active());
        assert!(matches!(gestures.click_empty(ClickModifier::Add), ClickOutcome::Cleared));
        assert!(!gestures.is_active());
    }

    #[test]
    fn test_drag_moves_and_raises() {
        let (buffer, _) = setup();
        let mut gestures = GestureState::new();
        assert!(!gestures.begin_drag("/missing", &buffer));
        assert!(gestures.begin_drag("/out", &buffer));
        assert!(gestures.drag_active());
        assert!(gestures.drag_to(Point::new(5.0, 6.0), &buffer));
        gestures.end_drag();
        assert!(!gestures.is_active());

        buffer.with_foreground(|fg| {
            assert_eq!(fg.entities().last().unwrap().key.as_str(), "/out");
            assert_eq!(fg.entity("/out").unwrap().position, Some(Point::new(5.0, 6.0)));
        });
    }
}
