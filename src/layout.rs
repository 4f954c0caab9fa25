//! Placement of entities that have no position yet.

use std::collections::{HashMap, HashSet};

use crate::models::{EntityKey, Point, Size};
use crate::snapshot::ENTITY_WIDTH;

/// An entity as seen by the layout engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub key: EntityKey,
    pub size: Size,
    /// Already-placed nodes are obstacles, never moved
    pub position: Option<Point>,
}

/// A connection between two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEdge {
    pub from: EntityKey,
    pub to: EntityKey,
}

/// Chooses positions for unplaced entities.
pub trait LayoutEngine: Send + Sync {
    /// Return positions for the nodes whose `position` is `None`.
    fn place(&self, nodes: &[LayoutNode], edges: &[LayoutEdge], bounds: Size)
        -> HashMap<EntityKey, Point>;
}

/// Deterministic grid placement.
///
/// Unplaced nodes fill free cells in row-major order; a cell is free when no
/// pinned node overlaps it. Rows continue below the view bounds if needed.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub margin: f32,
    pub gap: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout {
            margin: 20.0,
            gap: 40.0,
        }
    }
}

impl GridLayout {
    fn cell_size(&self, nodes: &[LayoutNode]) -> Size {
        let tallest = nodes
            .iter()
            .filter(|n| n.position.is_none())
            .map(|n| n.size.height)
            .fold(0.0_f32, f32::max);
        let widest = nodes
            .iter()
            .map(|n| n.size.width)
            .fold(ENTITY_WIDTH, f32::max);
        Size::new(widest + self.gap, tallest + self.gap)
    }

    fn cell_origin(&self, column: usize, row: usize, cell: Size) -> Point {
        Point::new(
            self.margin + column as f32 * cell.width,
            self.margin + row as f32 * cell.height,
        )
    }
}

fn overlaps(a: Point, a_size: Size, b: Point, b_size: Size) -> bool {
    a.x < b.x + b_size.width
        && b.x < a.x + a_size.width
        && a.y < b.y + b_size.height
        && b.y < a.y + a_size.height
}

impl LayoutEngine for GridLayout {
    fn place(
        &self,
        nodes: &[LayoutNode],
        _edges: &[LayoutEdge],
        bounds: Size,
    ) -> HashMap<EntityKey, Point> {
        let mut placed = HashMap::new();
        if nodes.iter().all(|n| n.position.is_some()) {
            return placed;
        }

        let cell = self.cell_size(nodes);
        let usable = (bounds.width - 2.0 * self.margin).max(cell.width);
        let columns = ((usable / cell.width).floor() as usize).max(1);

        let pinned: Vec<(Point, Size)> = nodes
            .iter()
            .filter_map(|n| n.position.map(|p| (p, n.size)))
            .collect();
        let mut taken: HashSet<usize> = HashSet::new();
        let mut next = 0usize;

        for node in nodes.iter().filter(|n| n.position.is_none()) {
            loop {
                let (column, row) = (next % columns, next / columns);
                let origin = self.cell_origin(column, row, cell);
                let blocked = taken.contains(&next)
                    || pinned
                        .iter()
                        .any(|&(p, s)| overlaps(origin, cell, p, s));
                if !blocked {
                    taken.insert(next);
                    placed.insert(node.key.clone(), origin);
                    break;
                }
                next += 1;
            }
        }
        log::debug!(
            "[Layout] Placed {} entities on a {}-column grid",
            placed.len(),
            columns
        );
        placed
    }
}
