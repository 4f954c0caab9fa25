//! Drawing and hit-testing of the foreground snapshot.
//!
//! Positions in the snapshot are canvas-relative; `origin` maps them onto the
//! screen. Geometry is plain rectangles and straight lines.

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Stroke, Vec2};

use crate::models::{EntityKey, EntityKind, PortDirection, PortKey};
use crate::snapshot::{Entity, Snapshot, ENTITY_HEADER_HEIGHT, PORT_ROW_HEIGHT};
use crate::viewer::GestureState;

/// What lies under a canvas point.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Port { port: PortKey, entity: EntityKey },
    /// Entity header; `grab` is the point relative to the entity's corner
    Entity { entity: EntityKey, grab: Vec2 },
    Nothing,
}

/// Canvas-relative rectangle of a placed entity.
pub fn entity_rect(entity: &Entity) -> Option<Rect> {
    let position = entity.position?;
    let size = entity.size_hint();
    Some(Rect::from_min_size(
        Pos2::new(position.x, position.y),
        Vec2::new(size.width, size.height),
    ))
}

fn port_row(rect: Rect, index: usize) -> Rect {
    let top = rect.top() + ENTITY_HEADER_HEIGHT + PORT_ROW_HEIGHT * index as f32;
    Rect::from_min_max(
        Pos2::new(rect.left(), top),
        Pos2::new(rect.right(), top + PORT_ROW_HEIGHT),
    )
}

/// Find the topmost entity or port at `point`. Later entities draw on top.
pub fn hit_test(snapshot: &Snapshot, point: Pos2) -> Hit {
    for entity in snapshot.entities().iter().rev() {
        let Some(rect) = entity_rect(entity) else {
            continue;
        };
        if !rect.contains(point) {
            continue;
        }
        for (index, port) in entity.ports.iter().enumerate() {
            if port_row(rect, index).contains(point) {
                return Hit::Port {
                    port: port.clone(),
                    entity: entity.key.clone(),
                };
            }
        }
        return Hit::Entity {
            entity: entity.key.clone(),
            grab: point - rect.min,
        };
    }
    Hit::Nothing
}

/// Where a connection leaves (`outgoing`) or enters a port row.
fn port_anchor(snapshot: &Snapshot, port: &str, outgoing: bool) -> Option<Pos2> {
    let entity = snapshot.entity_for_port(port)?;
    let rect = entity_rect(entity)?;
    let index = entity.ports.iter().position(|p| p.as_str() == port)?;
    let row = port_row(rect, index);
    let x = if outgoing { row.right() } else { row.left() };
    Some(Pos2::new(x, row.center().y))
}

fn kind_color(kind: EntityKind) -> Color32 {
    match kind {
        EntityKind::Service => Color32::from_rgb(52, 101, 164),
        EntityKind::ClientOrAdapter => Color32::from_rgb(78, 154, 6),
        EntityKind::Other => Color32::from_rgb(117, 80, 123),
    }
}

fn direction_marker(direction: PortDirection) -> &'static str {
    match direction {
        PortDirection::Input => "▶",
        PortDirection::Output => "◀",
        PortDirection::InputOutput => "◆",
        PortDirection::Unknown => "?",
    }
}

/// Paint every placed entity and every connection between placed entities.
pub fn paint(painter: &egui::Painter, snapshot: &Snapshot, origin: Vec2, gestures: &GestureState) {
    let text_color = Color32::from_gray(230);
    let line = Stroke::new(1.5, Color32::from_gray(170));

    for connection in snapshot.connections() {
        let from = port_anchor(snapshot, connection.from.as_str(), true);
        let to = port_anchor(snapshot, connection.to.as_str(), false);
        if let (Some(from), Some(to)) = (from, to) {
            painter.line_segment([from + origin, to + origin], line);
        }
    }

    for entity in snapshot.entities() {
        let Some(rect) = entity_rect(entity) else {
            continue;
        };
        let rect = rect.translate(origin);
        painter.rect(rect, 4.0, Color32::from_gray(40), Stroke::new(1.0, kind_color(entity.kind)));

        let header = Rect::from_min_size(rect.min, Vec2::new(rect.width(), ENTITY_HEADER_HEIGHT));
        painter.rect_filled(header, 4.0, kind_color(entity.kind));
        painter.text(
            header.left_center() + Vec2::new(6.0, 0.0),
            Align2::LEFT_CENTER,
            entity.key.as_str(),
            FontId::proportional(13.0),
            text_color,
        );

        for (index, port_key) in entity.ports.iter().enumerate() {
            let row = port_row(rect, index);
            let pending = gestures.pending_add() == Some(port_key) || gestures.pending_remove() == Some(port_key);
            if pending {
                painter.rect_filled(row, 0.0, Color32::from_rgb(196, 160, 0));
            }
            let marker = snapshot
                .port(port_key.as_str())
                .map_or("?", |p| direction_marker(p.direction));
            painter.text(
                row.left_center() + Vec2::new(6.0, 0.0),
                Align2::LEFT_CENTER,
                format!("{} {}", marker, port_key),
                FontId::monospace(11.0),
                text_color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, PortUsage};

    fn placed_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        let key = EntityKey::from("svc.A");
        snapshot.add_entity(Entity::new(key.clone(), EntityKind::Service));
        snapshot.add_port(&key, "/svc/A/in", PortUsage::Service, PortDirection::Input);
        snapshot.add_port(&key, "/svc/A/out", PortUsage::Service, PortDirection::Output);
        snapshot.set_position("svc.A", Point::new(100.0, 100.0));
        snapshot
    }

    #[test]
    fn test_hit_header_then_ports() {
        let snapshot = placed_snapshot();
        assert_eq!(
            hit_test(&snapshot, Pos2::new(110.0, 105.0)),
            Hit::Entity {
                entity: EntityKey::from("svc.A"),
                grab: Vec2::new(10.0, 5.0)
            }
        );
        let second_row_y = 100.0 + ENTITY_HEADER_HEIGHT + PORT_ROW_HEIGHT * 1.5;
        match hit_test(&snapshot, Pos2::new(150.0, second_row_y)) {
            Hit::Port { port, .. } => assert_eq!(port.as_str(), "/svc/A/out"),
            other => panic!("expected port hit, got {:?}", other),
        }
        assert_eq!(hit_test(&snapshot, Pos2::new(5.0, 5.0)), Hit::Nothing);
    }

    #[test]
    fn test_unplaced_entities_are_invisible() {
        let mut snapshot = Snapshot::new();
        snapshot.add_entity(Entity::new("loose", EntityKind::Other));
        assert!(entity_rect(&snapshot.entities()[0]).is_none());
        assert_eq!(hit_test(&snapshot, Pos2::new(0.0, 0.0)), Hit::Nothing);
    }

    #[test]
    fn test_anchor_sides() {
        let snapshot = placed_snapshot();
        let out = port_anchor(&snapshot, "/svc/A/out", true).unwrap();
        let input = port_anchor(&snapshot, "/svc/A/in", false).unwrap();
        assert!(out.x > input.x);
        assert_eq!(input.x, 100.0);
    }
}
