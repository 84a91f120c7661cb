//! Cross-face welding of coincident vertices and edges.
//!
//! Vertices are ordered by the sum of their coordinates, which bounds the
//! candidate scan: two points closer than `d` differ in weight by at most
//! `sqrt(3) * d`. Edges are then bucketed by the pair of active vertices they
//! connect and linked when their geometry agrees.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::arena::TopoArena;
use super::entity::TopologicalEntity;
use super::ids::{EdgeId, FaceId, VertexId};
use crate::geom::Tolerance;

/// Vertices closer than this multiple of the joining tolerance, but not close
/// enough to merge, are reported as gaps.
const NEAR_MISS_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum WeldGap {
    Vertex { a: VertexId, b: VertexId, distance: f64 },
    Edge { a: EdgeId, b: EdgeId, distance: f64 },
}

impl fmt::Display for WeldGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex { a, b, distance } => write!(f, "{a} and {b} are {distance:.3e} apart"),
            Self::Edge { a, b, distance } => write!(f, "{a} and {b} deviate by {distance:.3e}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub merged_vertices: usize,
    pub linked_edges: usize,
    pub gaps: Vec<WeldGap>,
    pub refused_shared_edge: usize,
    pub skipped_degenerate: usize,
}

impl JoinReport {
    pub fn merge(&mut self, other: &Self) {
        self.merged_vertices += other.merged_vertices;
        self.linked_edges += other.linked_edges;
        self.gaps.extend(other.gaps.iter().copied());
        self.refused_shared_edge += other.refused_shared_edge;
        self.skipped_degenerate += other.skipped_degenerate;
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty() && self.refused_shared_edge == 0
    }
}

impl fmt::Display for JoinReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merged vertices={} linked edges={} gaps={} refused={} degenerate={}",
            self.merged_vertices,
            self.linked_edges,
            self.gaps.len(),
            self.refused_shared_edge,
            self.skipped_degenerate
        )
    }
}

pub struct Joiner<'a> {
    arena: &'a mut TopoArena,
    joining_tolerance: f64,
    border_only: bool,
    faces: Vec<FaceId>,
    report: JoinReport,
}

impl<'a> Joiner<'a> {
    /// Joiner over every face of the arena; vertices merge below `2 * tolerance`.
    pub fn new(arena: &'a mut TopoArena, tolerance: Tolerance) -> Self {
        let faces = arena.face_ids().collect();
        Self {
            arena,
            joining_tolerance: 2.0 * tolerance.eps,
            border_only: false,
            faces,
            report: JoinReport::default(),
        }
    }

    #[must_use]
    pub fn border_only(mut self, border_only: bool) -> Self {
        self.border_only = border_only;
        self
    }

    #[must_use]
    pub fn joining_tolerance(&self) -> f64 {
        self.joining_tolerance
    }

    #[must_use]
    pub fn report(&self) -> &JoinReport {
        &self.report
    }

    /// Restricts the joiner to `faces`, welds their vertices (border vertices
    /// only when configured so) and then their edges.
    pub fn join_faces(mut self, faces: &[FaceId]) -> JoinReport {
        self.faces = faces.to_vec();
        if self.border_only {
            self.join_border_vertices();
        } else {
            self.join_vertices();
        }
        self.join_edges();
        log::debug!("join over {} faces: {}", self.faces.len(), self.report);
        self.report
    }

    pub fn join_vertices(&mut self) {
        let candidates = self.collect_active_vertices(false);
        self.weld(&candidates, false);
    }

    /// Welds an explicit vertex set, resolved to active representatives.
    pub fn weld_vertices(&mut self, vertices: &[VertexId]) {
        let mut candidates: Vec<VertexId> = vertices.iter().map(|v| self.arena.active_vertex(*v)).collect();
        candidates.sort_unstable();
        candidates.dedup();
        self.weld(&candidates, false);
    }

    /// Welds only vertices incident to a border edge, never across an
    /// existing connecting edge.
    pub fn join_border_vertices(&mut self) {
        let candidates = self.collect_active_vertices(true);
        self.weld(&candidates, true);
    }

    pub fn join_edges(&mut self) {
        let jt = self.joining_tolerance;
        let mut buckets: BTreeMap<(VertexId, VertexId), Vec<EdgeId>> = BTreeMap::new();
        for edge in self.arena.face_edges(&self.faces) {
            if self.arena.edge(edge).is_degenerate() {
                self.report.skipped_degenerate += 1;
                continue;
            }
            if self.arena.active_edge(edge) != edge {
                continue;
            }
            let e = self.arena.edge(edge);
            let s = self.arena.active_vertex(e.start());
            let t = self.arena.active_vertex(e.end());
            buckets.entry((s.min(t), s.max(t))).or_default().push(edge);
        }

        for bucket in buckets.values().filter(|b| b.len() > 1) {
            for i in 0..bucket.len() {
                for j in (i + 1)..bucket.len() {
                    let (a, b) = (bucket[i], bucket[j]);
                    if self.arena.are_edges_linked(a, b) || self.same_face(a, b) {
                        continue;
                    }
                    match self.edge_deviation(a, b) {
                        Some(d) if d > jt => {
                            log::warn!("edges {a} and {b} share vertices but deviate by {d}");
                            self.report.gaps.push(WeldGap::Edge { a, b, distance: d });
                        }
                        _ => {
                            self.arena.link_edges(a, b);
                            self.report.linked_edges += 1;
                            log::trace!("linked {a} with {b}");
                        }
                    }
                }
            }
        }
    }

    /// Largest distance between the two edges, measured at the endpoints in
    /// the cheaper pairing and at the midpoint of `a`. `None` means coincident
    /// endpoints and a midpoint lying on `b`.
    fn edge_deviation(&self, a: EdgeId, b: EdgeId) -> Option<f64> {
        let ea = self.arena.edge(a);
        let eb = self.arena.edge(b);
        let sa = self.arena.vertex(ea.start()).point();
        let ta = self.arena.vertex(ea.end()).point();
        let sb = self.arena.vertex(eb.start()).point();
        let tb = self.arena.vertex(eb.end()).point();

        let same = sa.distance_squared_to(sb) + ta.distance_squared_to(tb);
        let reversed = sa.distance_squared_to(tb) + ta.distance_squared_to(sb);
        let endpoint_gap = if same <= reversed {
            sa.distance_to(sb).max(ta.distance_to(tb))
        } else {
            sa.distance_to(tb).max(ta.distance_to(sb))
        };
        if endpoint_gap > self.joining_tolerance {
            return Some(endpoint_gap);
        }

        let mid = ea.point_at(ea.interval().middle());
        let (_, mid_gap) = eb.project_point(mid);
        (mid_gap > self.joining_tolerance).then_some(mid_gap)
    }

    fn same_face(&self, a: EdgeId, b: EdgeId) -> bool {
        let face_of = |e: EdgeId| {
            self.arena
                .edge(e)
                .owner()
                .and_then(|l| self.arena.topo_loop(l).face())
        };
        matches!((face_of(a), face_of(b)), (Some(fa), Some(fb)) if fa == fb)
    }

    fn collect_active_vertices(&self, border_only: bool) -> Vec<VertexId> {
        let mut seen = vec![false; self.arena.vertices().len()];
        let mut out = Vec::new();
        for edge in self.arena.face_edges(&self.faces) {
            let e = self.arena.edge(edge);
            for v in [e.start(), e.end()] {
                let active = self.arena.active_vertex(v);
                if seen[active.0] {
                    continue;
                }
                seen[active.0] = true;
                if !border_only || self.is_border_vertex(active) {
                    out.push(active);
                }
            }
        }
        out
    }

    fn is_border_vertex(&self, v: VertexId) -> bool {
        self.arena.vertex_twins(v).iter().any(|twin| {
            self.arena.vertex(*twin).connected_edges().iter().any(|e| {
                !self.arena.edge(*e).is_degenerate() && self.arena.is_border_edge(*e)
            })
        })
    }

    /// A non-degenerate edge already runs between the groups of `a` and `b`.
    fn share_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.arena.vertex_twins(a).iter().any(|twin| {
            self.arena.vertex(*twin).connected_edges().iter().any(|id| {
                let e = self.arena.edge(*id);
                !e.is_degenerate()
                    && ((self.arena.are_vertices_linked(e.start(), a) && self.arena.are_vertices_linked(e.end(), b))
                        || (self.arena.are_vertices_linked(e.start(), b)
                            && self.arena.are_vertices_linked(e.end(), a)))
            })
        })
    }

    fn weld(&mut self, candidates: &[VertexId], check_shared_edge: bool) {
        let jt2 = Tolerance::new(self.joining_tolerance).eps_squared();
        let near2 = jt2 * NEAR_MISS_FACTOR * NEAR_MISS_FACTOR;
        let window = 3.0_f64.sqrt() * NEAR_MISS_FACTOR * self.joining_tolerance;

        let mut sorted: Vec<(f64, VertexId)> = candidates
            .iter()
            .map(|v| (self.arena.vertex_barycenter(*v).weight(), *v))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut processed = vec![false; sorted.len()];
        for i in 0..sorted.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let (weight, current) = sorted[i];
            for j in (i + 1)..sorted.len() {
                let (candidate_weight, candidate) = sorted[j];
                if candidate_weight - weight > window {
                    break;
                }
                if processed[j] {
                    continue;
                }
                let center = self.arena.vertex_barycenter(current);
                let other = self.arena.vertex_barycenter(candidate);
                let d2 = center.distance_squared_to(other);
                if d2 < jt2 {
                    if check_shared_edge && self.share_edge(current, candidate) {
                        log::warn!("refusing to weld {current} and {candidate}: they share an edge");
                        self.report.refused_shared_edge += 1;
                        continue;
                    }
                    self.arena.link_vertices(current, candidate);
                    processed[j] = true;
                    self.report.merged_vertices += 1;
                } else if d2 < near2 {
                    let distance = d2.sqrt();
                    log::warn!("{current} and {candidate} are {distance} apart, above the joining tolerance");
                    self.report.gaps.push(WeldGap::Vertex { a: current, b: candidate, distance });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geom::{PlaneSurface, Point3, Surface, UvBoundary, UvPoint};

    fn square(arena: &mut TopoArena, x0: f64) -> FaceId {
        let s: Arc<dyn Surface> = Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()));
        let pts = [
            UvPoint::new(x0, 0.0),
            UvPoint::new(x0 + 1.0, 0.0),
            UvPoint::new(x0 + 1.0, 1.0),
            UvPoint::new(x0, 1.0),
        ];
        arena.make_planar_polygon_face(s, &pts, &[]).unwrap()
    }

    #[test]
    fn near_miss_is_reported_not_merged() {
        let mut arena = TopoArena::new(Tolerance::new(1e-4));
        let f0 = square(&mut arena, 0.0);
        let f1 = square(&mut arena, 1.0 + 3e-4);
        let report = Joiner::new(&mut arena, Tolerance::new(1e-4)).join_faces(&[f0, f1]);
        assert_eq!(report.merged_vertices, 0);
        assert_eq!(report.linked_edges, 0);
        assert_eq!(report.gaps.len(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn border_variant_refuses_vertices_on_a_shared_edge() {
        let mut arena = TopoArena::new(Tolerance::new(1e-2));
        let s: Arc<dyn Surface> = Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()));
        // A short (non-degenerate) edge of length 0.015 between two vertices
        // that are inside the joining tolerance of 0.02.
        let pts = [
            UvPoint::new(0.0, 0.0),
            UvPoint::new(0.015, 0.0),
            UvPoint::new(1.0, 1.0),
        ];
        let f = arena.make_planar_polygon_face(s, &pts, &[]).unwrap();
        let mut joiner = Joiner::new(&mut arena, Tolerance::new(1e-2)).border_only(true);
        joiner.faces = vec![f];
        joiner.join_border_vertices();
        assert_eq!(joiner.report().refused_shared_edge, 1);
        assert_eq!(joiner.report().merged_vertices, 0);
    }

    #[test]
    fn weight_window_finds_diagonal_neighbours() {
        let mut arena = TopoArena::new(Tolerance::new(1e-3));
        let a = arena.add_vertex(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = arena.add_vertex(Point3::new(1e-3, -1e-3, 5e-4)).unwrap();
        let mut joiner = Joiner::new(&mut arena, Tolerance::new(1e-3));
        joiner.weld(&[a, b], false);
        assert_eq!(joiner.report().merged_vertices, 1);
        assert!(arena.are_vertices_linked(a, b));
    }
}
