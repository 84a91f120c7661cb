use serde::Serialize;

use crate::geom::UvPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// Sample of a boundary loop.
    Loop { loop_index: usize, index: usize },
    /// Grid point inside the face.
    Inner { grid_index: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct IsoNode {
    pub kind: NodeKind,
    /// Position in uniformly scaled space.
    pub uv: UvPoint,
    /// Pool index, known up front for loop nodes.
    pub pool_index: Option<usize>,
    /// Loop neighbours for loop nodes.
    pub previous: Option<usize>,
    pub next: Option<usize>,
    /// Grid neighbours for inner nodes: -U, +U, -V, +V.
    pub iso_neighbours: [Option<usize>; 4],
    pub thin_zone: bool,
    /// Grid cell holding a loop node.
    pub cell: Option<(usize, usize)>,
    pub segments: Vec<usize>,
}

impl IsoNode {
    #[must_use]
    pub fn loop_node(loop_index: usize, index: usize, uv: UvPoint, pool_index: usize, cell: (usize, usize)) -> Self {
        Self {
            kind: NodeKind::Loop { loop_index, index },
            uv,
            pool_index: Some(pool_index),
            previous: None,
            next: None,
            iso_neighbours: [None; 4],
            thin_zone: false,
            cell: Some(cell),
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn inner_node(grid_index: usize, uv: UvPoint) -> Self {
        Self {
            kind: NodeKind::Inner { grid_index },
            uv,
            pool_index: None,
            previous: None,
            next: None,
            iso_neighbours: [None; 4],
            thin_zone: false,
            cell: None,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, NodeKind::Loop { .. })
    }

    #[must_use]
    pub fn loop_index(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Loop { loop_index, .. } => Some(loop_index),
            NodeKind::Inner { .. } => None,
        }
    }

    #[must_use]
    pub fn grid_index(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Inner { grid_index } => Some(grid_index),
            NodeKind::Loop { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentKind {
    Loop,
    ThinZone,
    InnerIsoU,
    InnerIsoV,
    LoopToLoop,
    InnerToLoop,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IsoSegment {
    pub first: usize,
    pub second: usize,
    pub kind: SegmentKind,
    /// Cleared when the segment is dropped from the graph.
    pub active: bool,
}

impl IsoSegment {
    #[must_use]
    pub const fn new(first: usize, second: usize, kind: SegmentKind) -> Self {
        Self { first, second, kind, active: true }
    }

    #[must_use]
    pub const fn other(&self, node: usize) -> usize {
        if self.first == node { self.second } else { self.first }
    }
}
