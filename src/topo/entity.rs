//! Topological entities stored in the arena.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::arena::TopoArena;
use super::ids::{
    BodyId, EdgeId, EntityId, EntityKind, FaceId, LoopId, MeshId, ShellId, StatusFlags, VertexId,
};
use crate::geom::{BBox, Interval, Point3, Surface, UvCurve, UvPoint};

/// Capability shared by every entity kind: an id, a status and a 3D extent.
pub trait TopologicalEntity {
    type Id: EntityId;

    fn id(&self) -> Self::Id;

    fn status(&self) -> StatusFlags;

    fn status_mut(&mut self) -> &mut StatusFlags;

    fn bbox(&self, arena: &TopoArena) -> Option<BBox>;

    fn kind(&self) -> EntityKind {
        Self::Id::KIND
    }

    fn is_deleted(&self) -> bool {
        self.status().contains(StatusFlags::DELETED)
    }

    fn is_degenerate(&self) -> bool {
        self.status().contains(StatusFlags::DEGENERATE)
    }
}

/// Entities that take part in twin groups.
pub trait Linkable: TopologicalEntity {
    /// The canonical representative of this entity's twin group.
    fn link_active(&self, arena: &TopoArena) -> Self::Id;

    fn twin_count(&self, arena: &TopoArena) -> usize;
}

// ─────────────────────────────────────────────────────────────────────────────
// Vertex
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) id: VertexId,
    pub(crate) point: Point3,
    pub(crate) connected_edges: Vec<EdgeId>,
    pub(crate) status: StatusFlags,
    pub(crate) mesh: Option<MeshId>,
}

impl Vertex {
    #[must_use]
    pub fn point(&self) -> Point3 {
        self.point
    }

    #[must_use]
    pub fn connected_edges(&self) -> &[EdgeId] {
        &self.connected_edges
    }

    #[must_use]
    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }
}

impl TopologicalEntity for Vertex {
    type Id = VertexId;

    fn id(&self) -> VertexId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, _arena: &TopoArena) -> Option<BBox> {
        Some(BBox::new(self.point, self.point))
    }
}

impl Linkable for Vertex {
    fn link_active(&self, arena: &TopoArena) -> VertexId {
        arena.active_vertex(self.id)
    }

    fn twin_count(&self, arena: &TopoArena) -> usize {
        arena.vertex_twins(self.id).len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Edge
// ─────────────────────────────────────────────────────────────────────────────

const EDGE_LENGTH_SAMPLES: usize = 32;

/// Restriction of a UV curve onto a carrier surface between two vertices.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) surface: Arc<dyn Surface>,
    pub(crate) curve: Arc<dyn UvCurve>,
    pub(crate) interval: Interval,
    pub(crate) start: VertexId,
    pub(crate) end: VertexId,
    pub(crate) owner: Option<LoopId>,
    pub(crate) length: f64,
    pub(crate) status: StatusFlags,
    pub(crate) mesh: Option<MeshId>,
}

impl Edge {
    #[must_use]
    pub fn start(&self) -> VertexId {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> VertexId {
        self.end
    }

    #[must_use]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    #[must_use]
    pub fn curve(&self) -> &Arc<dyn UvCurve> {
        &self.curve
    }

    #[must_use]
    pub fn owner(&self) -> Option<LoopId> {
        self.owner
    }

    /// 3D length measured on a fixed sampling of the curve.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[must_use]
    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }

    #[must_use]
    pub fn uv_at(&self, t: f64) -> UvPoint {
        self.curve.point_at(t)
    }

    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3 {
        self.surface.point_at(self.curve.point_at(t))
    }

    /// `segments + 1` points evenly spaced in parameter.
    #[must_use]
    pub fn polyline(&self, segments: usize) -> Vec<Point3> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(self.interval.lerp(i as f64 / segments as f64)))
            .collect()
    }

    pub(crate) fn measure_length(surface: &dyn Surface, curve: &dyn UvCurve, interval: Interval) -> f64 {
        let mut length = 0.0;
        let mut previous = surface.point_at(curve.point_at(interval.min));
        for i in 1..=EDGE_LENGTH_SAMPLES {
            let p = surface.point_at(curve.point_at(interval.lerp(i as f64 / EDGE_LENGTH_SAMPLES as f64)));
            length += previous.distance_to(p);
            previous = p;
        }
        length
    }

    /// Parameter of the point of this edge closest to `p`, and the distance.
    #[must_use]
    pub fn project_point(&self, p: Point3) -> (f64, f64) {
        let t = self.closest_parameter(|t| self.point_at(t).distance_squared_to(p));
        (t, self.point_at(t).distance_to(p))
    }

    /// Curve parameter of the point of this edge closest to `uv` in the
    /// parametric domain of its surface.
    #[must_use]
    pub fn project_uv(&self, uv: UvPoint) -> f64 {
        self.closest_parameter(|t| self.uv_at(t).distance_squared(uv))
    }

    /// Coarse scan of the interval refined with a ternary search around the
    /// best sample.
    fn closest_parameter(&self, distance2: impl Fn(f64) -> f64) -> f64 {
        let n = EDGE_LENGTH_SAMPLES;
        let mut best = 0;
        let mut best_d2 = f64::INFINITY;
        for i in 0..=n {
            let d2 = distance2(self.interval.lerp(i as f64 / n as f64));
            if d2 < best_d2 {
                best_d2 = d2;
                best = i;
            }
        }
        let mut lo = self.interval.lerp(best.saturating_sub(1) as f64 / n as f64);
        let mut hi = self.interval.lerp((best + 1).min(n) as f64 / n as f64);
        for _ in 0..60 {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            if distance2(m1) <= distance2(m2) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        0.5 * (lo + hi)
    }
}

impl TopologicalEntity for Edge {
    type Id = EdgeId;

    fn id(&self) -> EdgeId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, _arena: &TopoArena) -> Option<BBox> {
        BBox::from_points(&self.polyline(EDGE_LENGTH_SAMPLES))
    }
}

impl Linkable for Edge {
    fn link_active(&self, arena: &TopoArena) -> EdgeId {
        arena.active_edge(self.id)
    }

    fn twin_count(&self, arena: &TopoArena) -> usize {
        arena.edge_twins(self.id).len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrientedEdge {
    pub edge: EdgeId,
    pub direction: Direction,
}

impl OrientedEdge {
    #[must_use]
    pub const fn forward(edge: EdgeId) -> Self {
        Self { edge, direction: Direction::Forward }
    }

    #[must_use]
    pub const fn reversed(edge: EdgeId) -> Self {
        Self { edge, direction: Direction::Reversed }
    }
}

#[derive(Debug, Clone)]
pub struct Loop {
    pub(crate) id: LoopId,
    pub(crate) edges: Vec<OrientedEdge>,
    pub(crate) face: Option<FaceId>,
    pub(crate) status: StatusFlags,
}

impl Loop {
    #[must_use]
    pub fn edges(&self) -> &[OrientedEdge] {
        &self.edges
    }

    #[must_use]
    pub fn face(&self) -> Option<FaceId> {
        self.face
    }
}

impl TopologicalEntity for Loop {
    type Id = LoopId;

    fn id(&self) -> LoopId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, arena: &TopoArena) -> Option<BBox> {
        self.edges
            .iter()
            .filter_map(|oe| arena.edge(oe.edge).bbox(arena))
            .reduce(BBox::union)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Face, Shell, Body
// ─────────────────────────────────────────────────────────────────────────────

/// Trimmed carrier surface; `loops[0]` is the outer loop.
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) id: FaceId,
    pub(crate) surface: Arc<dyn Surface>,
    pub(crate) loops: Vec<LoopId>,
    pub(crate) shell: Option<ShellId>,
    pub(crate) status: StatusFlags,
    pub(crate) mesh: Option<MeshId>,
}

impl Face {
    #[must_use]
    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    #[must_use]
    pub fn loops(&self) -> &[LoopId] {
        &self.loops
    }

    #[must_use]
    pub fn outer_loop(&self) -> Option<LoopId> {
        self.loops.first().copied()
    }

    #[must_use]
    pub fn shell(&self) -> Option<ShellId> {
        self.shell
    }

    #[must_use]
    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }
}

impl TopologicalEntity for Face {
    type Id = FaceId;

    fn id(&self) -> FaceId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, arena: &TopoArena) -> Option<BBox> {
        self.loops
            .iter()
            .filter_map(|l| arena.topo_loop(*l).bbox(arena))
            .reduce(BBox::union)
    }
}

#[derive(Debug, Clone)]
pub struct Shell {
    pub(crate) id: ShellId,
    pub(crate) faces: Vec<FaceId>,
    pub(crate) body: Option<BodyId>,
    pub(crate) status: StatusFlags,
}

impl Shell {
    #[must_use]
    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    #[must_use]
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// No border edge among the shell's faces.
    #[must_use]
    pub fn is_watertight(&self, arena: &TopoArena) -> bool {
        self.faces.iter().all(|f| {
            arena.face(*f).loops.iter().all(|l| {
                arena
                    .topo_loop(*l)
                    .edges
                    .iter()
                    .all(|oe| arena.edge(oe.edge).is_degenerate() || !arena.is_border_edge(oe.edge))
            })
        })
    }
}

impl TopologicalEntity for Shell {
    type Id = ShellId;

    fn id(&self) -> ShellId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, arena: &TopoArena) -> Option<BBox> {
        self.faces
            .iter()
            .filter_map(|f| arena.face(*f).bbox(arena))
            .reduce(BBox::union)
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: BodyId,
    pub(crate) shells: Vec<ShellId>,
    pub(crate) status: StatusFlags,
}

impl Body {
    #[must_use]
    pub fn shells(&self) -> &[ShellId] {
        &self.shells
    }
}

impl TopologicalEntity for Body {
    type Id = BodyId;

    fn id(&self) -> BodyId {
        self.id
    }

    fn status(&self) -> StatusFlags {
        self.status
    }

    fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    fn bbox(&self, arena: &TopoArena) -> Option<BBox> {
        self.shells
            .iter()
            .filter_map(|s| arena.shell(*s).bbox(arena))
            .reduce(BBox::union)
    }
}
