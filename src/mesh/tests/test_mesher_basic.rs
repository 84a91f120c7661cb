use std::collections::HashSet;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::geom::{CylinderSurface, Interval, PlaneSurface, Point3, Surface, UvBoundary, UvPoint, Vec3};
use crate::mesh::{FaceMesh, MeshDiagnostics, MeshError, MeshModel, MeshSummary, Mesher, MesherConfig, loop_sampling};
use crate::topo::{FaceId, StatusFlags, TopoArena, TopologicalEntity};

fn plane() -> Arc<dyn Surface> {
    Arc::new(PlaneSurface::xy(0.0, UvBoundary::new(Interval::new(-1.0, 3.0), Interval::new(-1.0, 3.0))))
}

fn rect(arena: &mut TopoArena, x0: f64, y0: f64, x1: f64, y1: f64) -> FaceId {
    let pts = [UvPoint::new(x0, y0), UvPoint::new(x1, y0), UvPoint::new(x1, y1), UvPoint::new(x0, y1)];
    arena.make_planar_polygon_face(plane(), &pts, &[]).unwrap()
}

fn face_mesh(arena: &TopoArena, model: &MeshModel, face: FaceId) -> FaceMesh {
    model.face_mesh(arena.face(face).mesh().unwrap()).unwrap()
}

fn area_3d(model: &MeshModel, mesh: &FaceMesh) -> f64 {
    mesh.triangles
        .iter()
        .map(|[a, b, c]| {
            let (pa, pb, pc) = (model.point(*a).unwrap(), model.point(*b).unwrap(), model.point(*c).unwrap());
            0.5 * (pb - pa).cross(pc - pa).length()
        })
        .sum()
}

#[test]
fn loop_samplings_are_closed() {
    let mut arena = TopoArena::default();
    let face = rect(&mut arena, 0.0, 0.0, 1.0, 1.0);
    let model = MeshModel::new();
    let mesher = Mesher::new(MesherConfig::default().with_max_edge_length(0.3));
    mesher.mesh_faces(&mut arena, &model, &[face]).unwrap();

    for l in arena.face(face).loops() {
        let sampling = loop_sampling(&arena, &model, *l).unwrap();
        assert!(sampling.is_closed());
        assert_eq!(sampling.vertex_ids[0], sampling.vertex_ids[sampling.vertex_ids.len() - 1]);
        assert_eq!(sampling.segment_count() + 1, sampling.uvs.len());
    }
    let mesh = face_mesh(&arena, &model, face);
    for cycle in &mesh.boundary_cycles {
        assert_eq!(cycle.first(), cycle.last());
    }
}

#[test]
fn joined_squares_share_their_edge_samples() {
    let mut arena = TopoArena::default();
    let left = rect(&mut arena, 0.0, 0.0, 1.0, 1.0);
    let right = rect(&mut arena, 1.0, 0.0, 2.0, 1.0);
    let model = MeshModel::new();
    let mesher = Mesher::new(MesherConfig::default().with_max_edge_length(0.25));
    let report = mesher.mesh_faces(&mut arena, &model, &[left, right]).unwrap();

    assert_eq!(report.join.linked_edges, 1);
    assert!(report.failures.is_empty());
    assert_eq!(report.meshed_faces.len(), 2);

    let (a, b) = (face_mesh(&arena, &model, left), face_mesh(&arena, &model, right));
    assert!((area_3d(&model, &a) + area_3d(&model, &b) - 2.0).abs() < 1e-9);

    // The shared edge is cut into 4 segments, both faces use its 5 samples.
    let ids_a: HashSet<usize> = a.boundary_cycles[0].iter().copied().collect();
    let ids_b: HashSet<usize> = b.boundary_cycles[0].iter().copied().collect();
    assert_eq!(ids_a.intersection(&ids_b).count(), 5);

    let mut all = a.triangles.clone();
    all.extend_from_slice(&b.triangles);
    let together = MeshDiagnostics::from_triangles(&all);
    assert_eq!(together.non_manifold_edge_count, 0);
    let apart = MeshDiagnostics::from_triangles(&a.triangles).boundary_edge_count
        + MeshDiagnostics::from_triangles(&b.triangles).boundary_edge_count;
    assert_eq!(together.boundary_edge_count, apart - 8);

    let summary = MeshSummary::from(&report);
    assert_eq!(summary.faces, 2);
    assert_eq!(summary.linked_edges, 1);
}

#[test]
fn body_faces_are_meshed_through_the_body() {
    let mut arena = TopoArena::default();
    let faces = vec![rect(&mut arena, 0.0, 0.0, 1.0, 1.0), rect(&mut arena, 0.0, 1.0, 1.0, 2.0)];
    let shell = arena.make_shell(faces.clone());
    let body = arena.make_body(vec![shell]);
    let model = MeshModel::new();
    let report = Mesher::default().mesh_body(&mut arena, &model, body).unwrap();
    assert_eq!(report.meshed_faces.len(), 2);
    assert!(faces.iter().all(|f| arena.face(*f).mesh().is_some()));
    assert_eq!(model.face_meshes().len(), 2);
}

#[test]
fn cylinder_patch_lies_on_its_surface() {
    let radius = 2.0;
    let boundary = UvBoundary::new(Interval::new(0.0, FRAC_PI_2), Interval::new(0.0, 1.0));
    let cylinder: Arc<dyn Surface> =
        Arc::new(CylinderSurface::new(Point3::ORIGIN, Vec3::Z, Vec3::X, radius, boundary).unwrap());
    let mut arena = TopoArena::default();
    let outer = [
        UvPoint::new(0.0, 0.0),
        UvPoint::new(FRAC_PI_2, 0.0),
        UvPoint::new(FRAC_PI_2, 1.0),
        UvPoint::new(0.0, 1.0),
    ];
    let face = arena.make_planar_polygon_face(cylinder, &outer, &[]).unwrap();

    let model = MeshModel::new();
    let report = Mesher::new(MesherConfig::default().with_max_edge_length(0.5)).mesh_faces(&mut arena, &model, &[face]).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    let mesh = face_mesh(&arena, &model, face);
    assert!(!mesh.triangles.is_empty());
    let pool = model.coordinates();
    for index in &mesh.vertex_ids {
        let p = pool.points[*index];
        assert!((p.x.hypot(p.y) - radius).abs() < 1e-9);
        assert!(p.z > -1e-9 && p.z < 1.0 + 1e-9);
    }
    // Chords cut the curved side, so the mesh is a little smaller than the patch.
    let area = area_3d(&model, &mesh);
    let exact = FRAC_PI_2 * radius;
    assert!(area < exact && area > 0.95 * exact, "area {area}");
}

/// Plane that, once torn, cannot be evaluated along the inside of its top
/// border.
#[derive(Debug)]
struct TornPlane {
    plane: PlaneSurface,
    torn: AtomicBool,
}

impl Surface for TornPlane {
    fn point_at(&self, uv: UvPoint) -> Point3 {
        if self.torn.load(Ordering::Relaxed) && uv.v > 0.99 && uv.u > 3.1 && uv.u < 3.9 {
            return Point3::new(f64::NAN, f64::NAN, f64::NAN);
        }
        self.plane.point_at(uv)
    }

    fn boundary(&self) -> UvBoundary {
        self.plane.boundary()
    }

    fn partial_derivatives_at(&self, uv: UvPoint) -> (Vec3, Vec3) {
        self.plane.partial_derivatives_at(uv)
    }

    fn project_point(&self, p: Point3) -> UvPoint {
        self.plane.project_point(p)
    }
}

#[test]
fn edge_that_cannot_be_evaluated_fails_only_its_face() {
    let mut arena = TopoArena::default();
    let good = rect(&mut arena, 0.0, 0.0, 1.0, 1.0);
    let torn = Arc::new(TornPlane {
        plane: PlaneSurface::xy(0.0, UvBoundary::new(Interval::new(2.0, 5.0), Interval::new(-1.0, 2.0))),
        torn: AtomicBool::new(false),
    });
    let corners = [UvPoint::new(3.0, 0.0), UvPoint::new(4.0, 0.0), UvPoint::new(4.0, 1.0), UvPoint::new(3.0, 1.0)];
    let bad = arena.make_planar_polygon_face(Arc::clone(&torn) as Arc<dyn Surface>, &corners, &[]).unwrap();
    torn.torn.store(true, Ordering::Relaxed);

    let model = MeshModel::new();
    let mesher = Mesher::new(MesherConfig::default().with_max_edge_length(0.25));
    let report = mesher.mesh_faces(&mut arena, &model, &[bad, good]).unwrap();

    assert_eq!(report.meshed_faces, vec![good]);
    assert!(arena.face(good).mesh().is_some());
    assert!((area_3d(&model, &face_mesh(&arena, &model, good)) - 1.0).abs() < 1e-9);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].face, bad);
    let MeshError::EdgeFailed { edge, source } = &report.failures[0].error else {
        panic!("unexpected failure {}", report.failures[0].error);
    };
    assert!(matches!(source.as_ref(), MeshError::NonFinitePoint));
    assert!(arena.edge(*edge).status().contains(StatusFlags::DEGENERATE));
    assert!(arena.edge(*edge).mesh().is_none());
    assert!(arena.face(bad).status().contains(StatusFlags::DEGENERATE));
    assert!(arena.face(bad).mesh().is_none());
    assert_eq!(report.diagnostics.failed_faces, 1);
    assert!(!report.is_clean());
}
