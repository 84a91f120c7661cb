//! Owner of every topological entity and of the twin-group tables.

use std::sync::Arc;

use super::entity::{Body, Direction, Edge, Face, Loop, OrientedEdge, Shell, TopologicalEntity, Vertex};
use super::error::TopoError;
use super::ids::{BodyId, EdgeId, FaceId, LoopId, MeshId, ShellId, StatusFlags, VertexId};
use super::link::{LinkGroup, LinkTable};
use crate::geom::{Interval, Point3, Surface, Tolerance, UvCurve, UvLine, UvPoint, signed_area};

/// Gaps up to this multiple of the tolerance are bridged by a new edge when a
/// loop is closed; anything larger is reported.
const LOGICAL_CLOSING_FACTOR: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct TopoArena {
    tolerance: Tolerance,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    loops: Vec<Loop>,
    faces: Vec<Face>,
    shells: Vec<Shell>,
    bodies: Vec<Body>,
    vertex_links: LinkTable<VertexId, Point3>,
    edge_links: LinkTable<EdgeId>,
}

impl Default for TopoArena {
    fn default() -> Self {
        Self::new(Tolerance::DEFAULT)
    }
}

impl TopoArena {
    #[must_use]
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            vertices: Vec::new(),
            edges: Vec::new(),
            loops: Vec::new(),
            faces: Vec::new(),
            shells: Vec::new(),
            bodies: Vec::new(),
            vertex_links: LinkTable::new(),
            edge_links: LinkTable::new(),
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    // ── accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    #[must_use]
    pub fn topo_loop(&self, id: LoopId) -> &Loop {
        &self.loops[id.0]
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    #[must_use]
    pub fn shell(&self, id: ShellId) -> &Shell {
        &self.shells[id.0]
    }

    #[must_use]
    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.0]
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.iter().map(|f| f.id)
    }

    /// Every face of a body, shell by shell.
    #[must_use]
    pub fn body_faces(&self, body: BodyId) -> Vec<FaceId> {
        self.body(body)
            .shells
            .iter()
            .flat_map(|s| self.shell(*s).faces.iter().copied())
            .collect()
    }

    #[must_use]
    pub fn oriented_start(&self, oe: OrientedEdge) -> VertexId {
        let e = self.edge(oe.edge);
        match oe.direction {
            Direction::Forward => e.start,
            Direction::Reversed => e.end,
        }
    }

    #[must_use]
    pub fn oriented_end(&self, oe: OrientedEdge) -> VertexId {
        let e = self.edge(oe.edge);
        match oe.direction {
            Direction::Forward => e.end,
            Direction::Reversed => e.start,
        }
    }

    /// Every edge of every loop of the given faces, each listed once.
    #[must_use]
    pub fn face_edges(&self, faces: &[FaceId]) -> Vec<EdgeId> {
        let mut seen = vec![false; self.edges.len()];
        let mut out = Vec::new();
        for f in faces {
            for l in &self.face(*f).loops {
                for oe in &self.topo_loop(*l).edges {
                    if !seen[oe.edge.0] {
                        seen[oe.edge.0] = true;
                        out.push(oe.edge);
                    }
                }
            }
        }
        out
    }

    pub(crate) fn set_vertex_mesh(&mut self, id: VertexId, mesh: MeshId) {
        self.vertices[id.0].mesh = Some(mesh);
    }

    pub(crate) fn set_edge_mesh(&mut self, id: EdgeId, mesh: MeshId) {
        self.edges[id.0].mesh = Some(mesh);
        self.edges[id.0].status.insert(StatusFlags::MESHED);
    }

    pub(crate) fn set_face_mesh(&mut self, id: FaceId, mesh: MeshId) {
        self.faces[id.0].mesh = Some(mesh);
        self.faces[id.0].status.insert(StatusFlags::MESHED);
    }

    pub(crate) fn mark_face(&mut self, id: FaceId, flag: StatusFlags) {
        self.faces[id.0].status.insert(flag);
    }

    pub(crate) fn mark_edge(&mut self, id: EdgeId, flag: StatusFlags) {
        self.edges[id.0].status.insert(flag);
    }

    // ── builders ────────────────────────────────────────────────────────────

    pub fn add_vertex(&mut self, point: Point3) -> Result<VertexId, TopoError> {
        if !point.is_finite() {
            return Err(TopoError::NonFinite);
        }
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex {
            id,
            point,
            connected_edges: Vec::new(),
            status: StatusFlags::NONE,
            mesh: None,
        });
        self.vertex_links.register(id, point);
        Ok(id)
    }

    /// Creates an edge restricted to `interval` of `curve` on `surface`.
    ///
    /// An edge whose 3D length is below tolerance is kept but flagged
    /// `DEGENERATE`, and its two vertices are linked. It is rejected only when
    /// it is also collapsed in parametric space.
    pub fn make_edge(
        &mut self,
        surface: Arc<dyn Surface>,
        curve: Arc<dyn UvCurve>,
        interval: Interval,
        start: VertexId,
        end: VertexId,
    ) -> Result<EdgeId, TopoError> {
        if !interval.is_valid() {
            return Err(TopoError::InvalidInterval { min: interval.min, max: interval.max });
        }
        let uv_start = curve.point_at(interval.min);
        let uv_end = curve.point_at(interval.max);
        let mid = curve.point_at(interval.middle());
        if !(uv_start.is_finite() && uv_end.is_finite() && mid.is_finite()) {
            return Err(TopoError::NonFinite);
        }

        let length = Edge::measure_length(surface.as_ref(), curve.as_ref(), interval);
        if !length.is_finite() {
            return Err(TopoError::NonFinite);
        }

        let id = EdgeId::new(self.edges.len());
        let mut status = StatusFlags::NONE;
        if length <= self.tolerance.eps {
            let uv_extent = uv_start.distance(mid) + mid.distance(uv_end);
            if uv_extent <= Tolerance::SMALL_NUMBER.eps {
                return Err(TopoError::DegenerateEdge(id));
            }
            status.insert(StatusFlags::DEGENERATE);
        }

        self.edges.push(Edge {
            id,
            surface,
            curve,
            interval,
            start,
            end,
            owner: None,
            length,
            status,
            mesh: None,
        });
        self.edge_links.register(id, ());
        self.vertices[start.0].connected_edges.push(id);
        if end != start {
            self.vertices[end.0].connected_edges.push(id);
        }
        if status.contains(StatusFlags::DEGENERATE) && start != end {
            self.link_vertices(start, end);
        }
        log::trace!("created {id} ({start} -> {end}), length {length}");
        Ok(id)
    }

    /// Straight parametric edge between two UV points.
    pub fn make_line_edge(
        &mut self,
        surface: Arc<dyn Surface>,
        from: UvPoint,
        to: UvPoint,
        start: VertexId,
        end: VertexId,
    ) -> Result<EdgeId, TopoError> {
        self.make_edge(surface, Arc::new(UvLine::new(from, to)), Interval::new(0.0, 1.0), start, end)
    }

    /// Builds a loop and runs logical closing: consecutive edges whose shared
    /// vertices differ are welded when within tolerance, bridged by a new
    /// straight edge when the gap stays small, rejected otherwise.
    pub fn make_loop(&mut self, edges: Vec<OrientedEdge>) -> Result<LoopId, TopoError> {
        if edges.is_empty() || edges.iter().all(|oe| self.edge(oe.edge).is_degenerate()) {
            return Err(TopoError::DegenerateLoop);
        }

        let tol = self.tolerance.eps;
        let mut closed = Vec::with_capacity(edges.len());
        for (i, &oe) in edges.iter().enumerate() {
            closed.push(oe);
            let next = edges[(i + 1) % edges.len()];
            let end = self.oriented_end(oe);
            let start = self.oriented_start(next);
            if self.vertex_links.same_group(end, start) {
                continue;
            }
            let gap = self.vertex(end).point.distance_to(self.vertex(start).point);
            if gap <= tol {
                self.link_vertices(end, start);
            } else if gap <= LOGICAL_CLOSING_FACTOR * tol {
                let surface = Arc::clone(&self.edge(oe.edge).surface);
                let from = self.oriented_uv_end(oe);
                let to = self.oriented_uv_start(next);
                let bridge = self.make_line_edge(surface, from, to, end, start)?;
                log::debug!("closing loop gap {gap} between {end} and {start} with {bridge}");
                closed.push(OrientedEdge::forward(bridge));
            } else {
                return Err(TopoError::LoopNotClosed { end, start, gap });
            }
        }

        let id = LoopId::new(self.loops.len());
        for oe in &closed {
            self.edges[oe.edge.0].owner = Some(id);
        }
        self.loops.push(Loop { id, edges: closed, face: None, status: StatusFlags::NONE });
        Ok(id)
    }

    /// Creates a face; the first loop is the outer boundary.
    pub fn make_face(&mut self, surface: Arc<dyn Surface>, loops: Vec<LoopId>) -> Result<FaceId, TopoError> {
        if loops.is_empty() {
            return Err(TopoError::EmptyFace);
        }
        let id = FaceId::new(self.faces.len());
        for l in &loops {
            if let Some(owner) = self.loops[l.0].face {
                return Err(TopoError::LoopAlreadyUsed(*l, owner));
            }
        }
        for l in &loops {
            self.loops[l.0].face = Some(id);
        }
        self.faces.push(Face {
            id,
            surface,
            loops,
            shell: None,
            status: StatusFlags::NONE,
            mesh: None,
        });
        Ok(id)
    }

    pub fn make_shell(&mut self, faces: Vec<FaceId>) -> ShellId {
        let id = ShellId::new(self.shells.len());
        for f in &faces {
            self.faces[f.0].shell = Some(id);
        }
        self.shells.push(Shell { id, faces, body: None, status: StatusFlags::NONE });
        id
    }

    pub fn make_body(&mut self, shells: Vec<ShellId>) -> BodyId {
        let id = BodyId::new(self.bodies.len());
        for s in &shells {
            self.shells[s.0].body = Some(id);
        }
        self.bodies.push(Body { id, shells, status: StatusFlags::NONE });
        id
    }

    /// Face bounded by straight parametric polygons: the outer polygon is made
    /// counter-clockwise and every hole clockwise.
    pub fn make_planar_polygon_face(
        &mut self,
        surface: Arc<dyn Surface>,
        outer: &[UvPoint],
        holes: &[Vec<UvPoint>],
    ) -> Result<FaceId, TopoError> {
        let mut loops = Vec::with_capacity(1 + holes.len());
        loops.push(self.make_polygon_loop(&surface, outer, true)?);
        for hole in holes {
            loops.push(self.make_polygon_loop(&surface, hole, false)?);
        }
        self.make_face(surface, loops)
    }

    fn make_polygon_loop(
        &mut self,
        surface: &Arc<dyn Surface>,
        points: &[UvPoint],
        ccw: bool,
    ) -> Result<LoopId, TopoError> {
        let mut points: Vec<UvPoint> = points.to_vec();
        points.dedup_by(|a, b| a.distance(*b) <= Tolerance::SMALL_NUMBER.eps);
        if points.len() > 1 && points[0].distance(points[points.len() - 1]) <= Tolerance::SMALL_NUMBER.eps {
            points.pop();
        }
        if points.len() < 3 {
            return Err(TopoError::TooFewPoints(points.len()));
        }
        if (signed_area(&points) > 0.0) != ccw {
            points.reverse();
        }

        let vertices = points
            .iter()
            .map(|uv| self.add_vertex(surface.point_at(*uv)))
            .collect::<Result<Vec<_>, _>>()?;
        let n = points.len();
        let mut edges = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            let e = self.make_line_edge(Arc::clone(surface), points[i], points[j], vertices[i], vertices[j])?;
            edges.push(OrientedEdge::forward(e));
        }
        self.make_loop(edges)
    }

    fn oriented_uv_start(&self, oe: OrientedEdge) -> UvPoint {
        let e = self.edge(oe.edge);
        match oe.direction {
            Direction::Forward => e.uv_at(e.interval.min),
            Direction::Reversed => e.uv_at(e.interval.max),
        }
    }

    fn oriented_uv_end(&self, oe: OrientedEdge) -> UvPoint {
        let e = self.edge(oe.edge);
        match oe.direction {
            Direction::Forward => e.uv_at(e.interval.max),
            Direction::Reversed => e.uv_at(e.interval.min),
        }
    }

    // ── vertex links ────────────────────────────────────────────────────────

    #[must_use]
    pub fn vertex_group(&self, id: VertexId) -> &LinkGroup<VertexId, Point3> {
        self.vertex_links.group(id)
    }

    #[must_use]
    pub fn active_vertex(&self, id: VertexId) -> VertexId {
        self.vertex_links.group(id).active()
    }

    #[must_use]
    pub fn vertex_twins(&self, id: VertexId) -> &[VertexId] {
        self.vertex_links.group(id).twins()
    }

    #[must_use]
    pub fn vertex_barycenter(&self, id: VertexId) -> Point3 {
        *self.vertex_links.group(id).data()
    }

    #[must_use]
    pub fn are_vertices_linked(&self, a: VertexId, b: VertexId) -> bool {
        self.vertex_links.same_group(a, b)
    }

    /// Merges the twin groups of `a` and `b`. Returns `false` when already linked.
    pub fn link_vertices(&mut self, a: VertexId, b: VertexId) -> bool {
        if !self.vertex_links.merge(a, b) {
            return false;
        }
        self.refresh_vertex_group(a);
        true
    }

    /// Separates `a` from `b`; the other twins follow whichever seed is nearer.
    pub fn unlink_vertices(&mut self, a: VertexId, b: VertexId) -> bool {
        let pa = self.vertex(a).point;
        let pb = self.vertex(b).point;
        let previous_active = self.active_vertex(a);
        let vertices = &self.vertices;
        let split = self.vertex_links.split(a, b, pb, |twin| {
            let p = vertices[twin.0].point;
            p.distance_squared_to(pb) < p.distance_squared_to(pa)
        });
        if !split {
            return false;
        }
        // A freshly split group always starts with `b` active; reselect on both sides.
        self.vertex_links.set_active(b, b);
        self.refresh_vertex_group(a);
        self.refresh_vertex_group(b);
        if self.active_vertex(previous_active) != previous_active {
            self.vertices[previous_active.0].mesh = None;
        }
        true
    }

    /// Recomputes the barycenter and re-selects the twin nearest to it.
    fn refresh_vertex_group(&mut self, member: VertexId) {
        let group = self.vertex_links.group(member);
        let old_active = group.active();
        let twins = group.twins().to_vec();
        let Some(barycenter) = Point3::barycenter(twins.iter().map(|t| self.vertices[t.0].point)) else {
            return;
        };
        let mut active = twins[0];
        let mut best = f64::INFINITY;
        for twin in &twins {
            let d2 = self.vertices[twin.0].point.distance_squared_to(barycenter);
            if d2 < best {
                best = d2;
                active = *twin;
            }
        }
        self.vertex_links.set_data(member, barycenter);
        self.vertex_links.set_active(member, active);
        if active != old_active && self.vertices[old_active.0].mesh.take().is_some() {
            log::debug!("{old_active} is no longer active, its mesh is dropped");
        }
    }

    // ── edge links ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn active_edge(&self, id: EdgeId) -> EdgeId {
        self.edge_links.group(id).active()
    }

    #[must_use]
    pub fn edge_twins(&self, id: EdgeId) -> &[EdgeId] {
        self.edge_links.group(id).twins()
    }

    #[must_use]
    pub fn are_edges_linked(&self, a: EdgeId, b: EdgeId) -> bool {
        self.edge_links.same_group(a, b)
    }

    /// Exactly one twin: the edge bounds a single face.
    #[must_use]
    pub fn is_border_edge(&self, id: EdgeId) -> bool {
        self.edge_twins(id).len() == 1
    }

    #[must_use]
    pub fn is_manifold_edge(&self, id: EdgeId) -> bool {
        self.edge_twins(id).len() == 2
    }

    /// Merges the twin groups of two edges. The active edge of the result is
    /// its first non-degenerate twin in handle order.
    pub fn link_edges(&mut self, a: EdgeId, b: EdgeId) -> bool {
        let old_active = self.active_edge(a);
        if !self.edge_links.merge(a, b) {
            return false;
        }
        let twins = self.edge_twins(a);
        let active = twins
            .iter()
            .copied()
            .filter(|t| !self.edges[t.0].is_degenerate())
            .min()
            .or_else(|| twins.iter().copied().min())
            .unwrap_or(a);
        self.edge_links.set_active(a, active);
        if active != old_active {
            self.edges[old_active.0].mesh = None;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{PlaneSurface, UvBoundary};

    fn plane() -> Arc<dyn Surface> {
        Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()))
    }

    #[test]
    fn make_edge_rejects_inverted_interval() {
        let mut arena = TopoArena::default();
        let a = arena.add_vertex(Point3::ORIGIN).unwrap();
        let b = arena.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let line = Arc::new(UvLine::new(UvPoint::ZERO, UvPoint::new(1.0, 0.0)));
        let err = arena.make_edge(plane(), line, Interval::new(1.0, 0.0), a, b);
        assert!(matches!(err, Err(TopoError::InvalidInterval { .. })));
    }

    #[test]
    fn short_edge_is_flagged_degenerate_and_links_its_vertices() {
        let mut arena = TopoArena::new(Tolerance::new(1e-3));
        let a = arena.add_vertex(Point3::ORIGIN).unwrap();
        let b = arena.add_vertex(Point3::new(1e-4, 0.0, 0.0)).unwrap();
        let e = arena
            .make_line_edge(plane(), UvPoint::ZERO, UvPoint::new(1e-4, 0.0), a, b)
            .unwrap();
        assert!(arena.edge(e).is_degenerate());
        assert!(arena.are_vertices_linked(a, b));
    }

    #[test]
    fn collapsed_edge_is_rejected() {
        let mut arena = TopoArena::default();
        let a = arena.add_vertex(Point3::ORIGIN).unwrap();
        let err = arena.make_line_edge(plane(), UvPoint::ZERO, UvPoint::ZERO, a, a);
        assert!(matches!(err, Err(TopoError::DegenerateEdge(_))));
    }

    #[test]
    fn link_selects_twin_nearest_barycenter() {
        let mut arena = TopoArena::new(Tolerance::new(1e-2));
        let a = arena.add_vertex(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = arena.add_vertex(Point3::new(0.004, 0.0, 0.0)).unwrap();
        let c = arena.add_vertex(Point3::new(0.002, 0.0, 0.0)).unwrap();
        assert!(arena.link_vertices(a, b));
        // Tie between a and b: the first found wins.
        assert_eq!(arena.active_vertex(b), a);
        assert!(arena.link_vertices(a, c));
        assert_eq!(arena.active_vertex(a), c);
        assert!((arena.vertex_barycenter(b).x - 0.002).abs() < 1e-12);
        assert!(!arena.link_vertices(b, c));
    }

    #[test]
    fn unlink_redistributes_to_nearest_seed() {
        let mut arena = TopoArena::new(Tolerance::new(1.0));
        let a = arena.add_vertex(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = arena.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let near_a = arena.add_vertex(Point3::new(0.1, 0.0, 0.0)).unwrap();
        let near_b = arena.add_vertex(Point3::new(0.9, 0.0, 0.0)).unwrap();
        arena.link_vertices(a, b);
        arena.link_vertices(a, near_a);
        arena.link_vertices(a, near_b);
        assert!(arena.unlink_vertices(a, b));
        assert!(arena.are_vertices_linked(a, near_a));
        assert!(arena.are_vertices_linked(b, near_b));
        assert!(!arena.are_vertices_linked(a, b));
        assert!((arena.vertex_barycenter(b).x - 0.95).abs() < 1e-12);
    }

    #[test]
    fn logical_closing_welds_small_gaps_and_bridges_larger_ones() {
        let mut arena = TopoArena::new(Tolerance::new(1e-3));
        let s = plane();
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let v0 = arena.add_vertex(p(0.0, 0.0)).unwrap();
        let v1 = arena.add_vertex(p(1.0, 0.0)).unwrap();
        let v1b = arena.add_vertex(p(1.0, 0.0005)).unwrap();
        let v2 = arena.add_vertex(p(1.0, 1.0)).unwrap();
        let v2b = arena.add_vertex(p(1.005, 1.0)).unwrap();
        let e0 = arena.make_line_edge(Arc::clone(&s), UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), v0, v1).unwrap();
        let e1 = arena.make_line_edge(Arc::clone(&s), UvPoint::new(1.0, 0.0005), UvPoint::new(1.0, 1.0), v1b, v2).unwrap();
        let e2 = arena.make_line_edge(Arc::clone(&s), UvPoint::new(1.005, 1.0), UvPoint::new(0.0, 0.0), v2b, v0).unwrap();
        let l = arena
            .make_loop(vec![OrientedEdge::forward(e0), OrientedEdge::forward(e1), OrientedEdge::forward(e2)])
            .unwrap();
        assert!(arena.are_vertices_linked(v1, v1b));
        assert_eq!(arena.topo_loop(l).edges().len(), 4);
    }

    #[test]
    fn logical_closing_rejects_large_gaps() {
        let mut arena = TopoArena::new(Tolerance::new(1e-3));
        let s = plane();
        let v0 = arena.add_vertex(Point3::ORIGIN).unwrap();
        let v1 = arena.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let v2 = arena.add_vertex(Point3::new(0.0, 0.5, 0.0)).unwrap();
        let e0 = arena.make_line_edge(Arc::clone(&s), UvPoint::ZERO, UvPoint::new(1.0, 0.0), v0, v1).unwrap();
        let e1 = arena.make_line_edge(Arc::clone(&s), UvPoint::new(0.0, 0.5), UvPoint::ZERO, v2, v0).unwrap();
        let err = arena.make_loop(vec![OrientedEdge::forward(e0), OrientedEdge::forward(e1)]);
        assert!(matches!(err, Err(TopoError::LoopNotClosed { .. })));
    }

    #[test]
    fn polygon_face_orients_outer_ccw() {
        let mut arena = TopoArena::default();
        let cw = [
            UvPoint::new(0.0, 0.0),
            UvPoint::new(0.0, 1.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(1.0, 0.0),
        ];
        let f = arena.make_planar_polygon_face(plane(), &cw, &[]).unwrap();
        let outer = arena.face(f).outer_loop().unwrap();
        let first = arena.topo_loop(outer).edges()[0];
        let e = arena.edge(first.edge);
        let d = e.uv_at(1.0) - e.uv_at(0.0);
        // After reversal the first edge runs from (1,0) toward (1,1).
        assert_eq!(e.uv_at(0.0), UvPoint::new(1.0, 0.0));
        assert!(d.v > 0.0);
        assert!(arena.is_border_edge(first.edge));
    }
}
