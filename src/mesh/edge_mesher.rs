//! Discretisation of vertices and edges, and the closed UV samplings of loops
//! built on top of it.
//!
//! Only active entities own a mesh. A twin edge is sampled by projecting the
//! active edge's points onto its own carrier, so every face sharing an edge
//! uses the same boundary coordinates.

use crate::geom::{Point3, UvPoint, Vec3};
use crate::mesh::config::MesherConfig;
use crate::mesh::error::MeshError;
use crate::mesh::model::{EdgeMesh, EntityMesh, MeshModel, VertexMesh};
use crate::topo::{Direction, Edge, EdgeId, FaceId, LoopId, StatusFlags, TopoArena, TopologicalEntity, VertexId};

const MAX_SUBDIVISION_DEPTH: u32 = 12;

/// Sampling of one edge in its own parameter order.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSampling {
    pub params: Vec<f64>,
    pub uvs: Vec<UvPoint>,
    pub vertex_ids: Vec<usize>,
}

/// Closed UV polyline of a loop: the first point is repeated at the end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoopSampling {
    pub uvs: Vec<UvPoint>,
    pub vertex_ids: Vec<usize>,
    /// Edge carrying segment `i`, from point `i` to point `i + 1`.
    pub edges: Vec<EdgeId>,
}

impl LoopSampling {
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        match (self.vertex_ids.first(), self.vertex_ids.last()) {
            (Some(a), Some(b)) => a == b && self.uvs.first() == self.uvs.last(),
            _ => false,
        }
    }
}

/// Registers a vertex mesh for every active vertex touched by `faces` that has
/// none yet.
pub fn mesh_vertices(arena: &mut TopoArena, model: &MeshModel, faces: &[FaceId]) -> usize {
    let mut count = 0;
    for edge in arena.face_edges(faces) {
        let (start, end) = {
            let e = arena.edge(edge);
            (e.start(), e.end())
        };
        for v in [start, end] {
            let active = arena.active_vertex(v);
            if arena.vertex(active).mesh().is_some() {
                continue;
            }
            let point = arena.vertex(active).point();
            let (normal, uv) = vertex_normal_and_uv(arena, active);
            let index = model.register(&[point], &[normal], &[uv]);
            let id = model.insert(EntityMesh::Vertex(VertexMesh { vertex: active, index }));
            arena.set_vertex_mesh(active, id);
            count += 1;
        }
    }
    count
}

fn vertex_normal_and_uv(arena: &TopoArena, vertex: VertexId) -> (Vec3, UvPoint) {
    for twin in arena.vertex_twins(vertex) {
        if let Some(edge) = arena.vertex(*twin).connected_edges().first() {
            let e = arena.edge(*edge);
            let t = if e.start() == *twin { e.interval().min } else { e.interval().max };
            let uv = e.uv_at(t);
            return (e.surface().normal_at(uv).unwrap_or(Vec3::ZERO), uv);
        }
    }
    (Vec3::ZERO, UvPoint::ZERO)
}

/// Increasing cut parameters of an edge, ends included, such that every
/// chord is at most `max_edge_length` long and deviates from the curve by at
/// most `chord_error` at its middle.
#[must_use]
pub fn cut_parameters(edge: &Edge, config: &MesherConfig) -> Vec<f64> {
    let interval = edge.interval();
    let mut cuts = vec![interval.min];
    if !edge.is_degenerate() {
        subdivide(
            edge,
            config,
            (interval.min, edge.point_at(interval.min)),
            (interval.max, edge.point_at(interval.max)),
            0,
            &mut cuts,
        );
    }
    cuts.push(interval.max);
    cuts
}

fn subdivide(
    edge: &Edge,
    config: &MesherConfig,
    (t0, p0): (f64, Point3),
    (t1, p1): (f64, Point3),
    depth: u32,
    cuts: &mut Vec<f64>,
) {
    let tm = 0.5 * (t0 + t1);
    let pm = edge.point_at(tm);
    if !pm.is_finite() {
        // Kept as a cut so the edge is rejected when its points are built.
        cuts.push(tm);
        return;
    }
    let chord = p0.distance_to(p1);
    let sag = pm.distance_to(p0.lerp(p1, 0.5));
    if depth >= MAX_SUBDIVISION_DEPTH || (chord <= config.max_edge_length && sag <= config.chord_error) {
        return;
    }
    subdivide(edge, config, (t0, p0), (tm, pm), depth + 1, cuts);
    cuts.push(tm);
    subdivide(edge, config, (tm, pm), (t1, p1), depth + 1, cuts);
}

fn vertex_index(arena: &TopoArena, model: &MeshModel, vertex: VertexId) -> Option<usize> {
    let active = arena.active_vertex(vertex);
    arena.vertex(active).mesh().and_then(|id| model.vertex_mesh(id)).map(|m| m.index)
}

/// Result of [`mesh_active_edges`].
#[derive(Debug, Default)]
pub struct EdgeMeshingReport {
    pub meshed: usize,
    /// Active edges left without a mesh, flagged `DEGENERATE` and `MESH_FAILED`.
    pub failures: Vec<(EdgeId, MeshError)>,
}

impl EdgeMeshingReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Meshes every active edge of `faces` that has no mesh yet. Vertex meshes
/// must exist. An edge that cannot be meshed is flagged and reported, the
/// others are meshed anyway.
pub fn mesh_active_edges(
    arena: &mut TopoArena,
    model: &MeshModel,
    faces: &[FaceId],
    config: &MesherConfig,
) -> EdgeMeshingReport {
    let mut report = EdgeMeshingReport::default();
    for edge in arena.face_edges(faces) {
        let active = arena.active_edge(edge);
        if arena.edge(active).mesh().is_some() || arena.edge(active).status().contains(StatusFlags::MESH_FAILED) {
            continue;
        }
        match mesh_edge(arena, model, active, config) {
            Ok(mesh) => {
                log::trace!("{active} cut into {} segments", mesh.cuts.len() - 1);
                let id = model.insert(EntityMesh::Edge(mesh));
                arena.set_edge_mesh(active, id);
                report.meshed += 1;
            }
            Err(error) => {
                log::warn!("{active}: edge mesh failed: {error}");
                arena.mark_edge(active, StatusFlags::DEGENERATE);
                arena.mark_edge(active, StatusFlags::MESH_FAILED);
                report.failures.push((active, error));
            }
        }
    }
    log::debug!("meshed {} active edges, {} failed", report.meshed, report.failures.len());
    report
}

fn mesh_edge(arena: &TopoArena, model: &MeshModel, id: EdgeId, config: &MesherConfig) -> Result<EdgeMesh, MeshError> {
    let edge = arena.edge(id);
    let start = vertex_index(arena, model, edge.start()).ok_or(MeshError::EdgeNotMeshed(id))?;
    let end = vertex_index(arena, model, edge.end()).ok_or(MeshError::EdgeNotMeshed(id))?;

    let cuts = cut_parameters(edge, config);
    let uvs: Vec<UvPoint> = cuts.iter().map(|t| edge.uv_at(*t)).collect();
    let inner = &uvs[1..uvs.len() - 1];
    let points: Vec<Point3> = inner.iter().map(|uv| edge.surface().point_at(*uv)).collect();
    if points.iter().any(|p| !p.is_finite()) {
        return Err(MeshError::NonFinitePoint);
    }
    let normals: Vec<Vec3> = inner
        .iter()
        .map(|uv| edge.surface().normal_at(*uv).unwrap_or(Vec3::ZERO))
        .collect();
    let first = model.register(&points, &normals, inner);

    let mut vertex_ids = Vec::with_capacity(cuts.len());
    vertex_ids.push(start);
    vertex_ids.extend(first..first + points.len());
    vertex_ids.push(end);
    Ok(EdgeMesh { edge: id, cuts, uvs, vertex_ids })
}

/// Sampling of any edge: the stored mesh of an active edge, or the active
/// mesh re-projected onto a twin.
pub fn edge_sampling(arena: &TopoArena, model: &MeshModel, id: EdgeId) -> Result<EdgeSampling, MeshError> {
    let active = arena.active_edge(id);
    let mesh = arena
        .edge(active)
        .mesh()
        .and_then(|m| model.edge_mesh(m))
        .ok_or(MeshError::EdgeNotMeshed(active))?;
    if active == id {
        return Ok(EdgeSampling { params: mesh.cuts, uvs: mesh.uvs, vertex_ids: mesh.vertex_ids });
    }

    let edge = arena.edge(id);
    let interval = edge.interval();
    let mut inner: Vec<(f64, usize)> = Vec::with_capacity(mesh.vertex_ids.len());
    for index in &mesh.vertex_ids[1..mesh.vertex_ids.len() - 1] {
        let p = model.point(*index).ok_or(MeshError::EdgeNotMeshed(active))?;
        let uv = edge.surface().project_point(p);
        let t = edge.project_uv(uv);
        if t > interval.min && t < interval.max {
            inner.push((t, *index));
        }
    }
    inner.sort_by(|a, b| a.0.total_cmp(&b.0));

    let start = vertex_index(arena, model, edge.start()).ok_or(MeshError::EdgeNotMeshed(id))?;
    let end = vertex_index(arena, model, edge.end()).ok_or(MeshError::EdgeNotMeshed(id))?;
    let mut params = Vec::with_capacity(inner.len() + 2);
    let mut vertex_ids = Vec::with_capacity(inner.len() + 2);
    params.push(interval.min);
    vertex_ids.push(start);
    for (t, index) in inner {
        params.push(t);
        vertex_ids.push(index);
    }
    params.push(interval.max);
    vertex_ids.push(end);
    let uvs = params.iter().map(|t| edge.uv_at(*t)).collect();
    Ok(EdgeSampling { params, uvs, vertex_ids })
}

/// Closed sampling of a loop following the orientation of its edges.
pub fn loop_sampling(arena: &TopoArena, model: &MeshModel, id: LoopId) -> Result<LoopSampling, MeshError> {
    let mut out = LoopSampling::default();
    for oe in arena.topo_loop(id).edges() {
        let mut s = edge_sampling(arena, model, oe.edge)?;
        if oe.direction == Direction::Reversed {
            s.uvs.reverse();
            s.vertex_ids.reverse();
        }
        let skip = usize::from(!out.uvs.is_empty());
        out.uvs.extend_from_slice(&s.uvs[skip..]);
        out.vertex_ids.extend_from_slice(&s.vertex_ids[skip..]);
        out.edges.extend(std::iter::repeat_n(oe.edge, s.uvs.len() - 1));
    }
    if let (Some(first_uv), Some(first_id)) = (out.uvs.first().copied(), out.vertex_ids.first().copied()) {
        if let Some(last) = out.uvs.last_mut() {
            *last = first_uv;
        }
        if let Some(last) = out.vertex_ids.last_mut() {
            *last = first_id;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::sync::Arc;

    use super::*;
    use crate::geom::{CylinderSurface, Interval, PlaneSurface, Surface, Tolerance, UvBoundary};

    fn unit_square(arena: &mut TopoArena) -> FaceId {
        let s: Arc<dyn Surface> = Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()));
        let pts = [
            UvPoint::new(0.0, 0.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(1.0, 1.0),
            UvPoint::new(0.0, 1.0),
        ];
        arena.make_planar_polygon_face(s, &pts, &[]).unwrap()
    }

    #[test]
    fn straight_edge_is_cut_by_length() {
        let mut arena = TopoArena::default();
        let f = unit_square(&mut arena);
        let config = MesherConfig::default().with_max_edge_length(0.3);
        let e = arena.face_edges(&[f])[0];
        let cuts = cut_parameters(arena.edge(e), &config);
        assert_eq!(cuts.len(), 5);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn arc_on_cylinder_is_cut_by_chord_error() {
        let mut arena = TopoArena::default();
        let boundary = UvBoundary::new(Interval::new(0.0, PI), Interval::new(0.0, 1.0));
        let cyl = CylinderSurface::new(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0, boundary).unwrap();
        let s: Arc<dyn Surface> = Arc::new(cyl);
        let a = arena.add_vertex(s.point_at(UvPoint::new(0.0, 0.0))).unwrap();
        let b = arena.add_vertex(s.point_at(UvPoint::new(PI, 0.0))).unwrap();
        let e = arena.make_line_edge(Arc::clone(&s), UvPoint::ZERO, UvPoint::new(PI, 0.0), a, b).unwrap();
        let config = MesherConfig { chord_error: 0.01, ..MesherConfig::default() };
        let cuts = cut_parameters(arena.edge(e), &config);
        for w in cuts.windows(2) {
            let mid = arena.edge(e).point_at(0.5 * (w[0] + w[1]));
            let chord_mid = arena.edge(e).point_at(w[0]).lerp(arena.edge(e).point_at(w[1]), 0.5);
            assert!(mid.distance_to(chord_mid) <= 0.01);
        }
        assert!(cuts.len() > 8);
    }

    #[test]
    fn loop_sampling_is_closed_and_shares_corner_vertices() {
        let mut arena = TopoArena::new(Tolerance::new(1e-6));
        let f = unit_square(&mut arena);
        let model = MeshModel::new();
        let config = MesherConfig::default().with_max_edge_length(0.5);
        assert_eq!(mesh_vertices(&mut arena, &model, &[f]), 4);
        assert_eq!(mesh_active_edges(&mut arena, &model, &[f], &config).meshed, 4);

        let outer = arena.face(f).outer_loop().unwrap();
        let sampling = loop_sampling(&arena, &model, outer).unwrap();
        assert!(sampling.is_closed());
        assert_eq!(sampling.segment_count(), 8);
        assert_eq!(sampling.uvs.len(), 9);
        // 4 corners plus one midpoint per edge.
        assert_eq!(model.coordinate_count(), 8);
    }
}
