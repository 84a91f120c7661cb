use std::sync::Arc;

use approx::assert_relative_eq;
use brep_mesher::geom::{Interval, PlaneSurface, Surface, Tolerance, UvBoundary, UvPoint};
use brep_mesher::mesh::{BridgePolicy, MeshDiagnostics, MeshModel, MeshSummary, Mesher, MesherConfig};
use brep_mesher::topo::{FaceId, StatusFlags, TopoArena, TopologicalEntity};

fn plane() -> Arc<dyn Surface> {
    Arc::new(PlaneSurface::xy(0.0, UvBoundary::new(Interval::new(-1.0, 3.0), Interval::new(-1.0, 3.0))))
}

fn rect(arena: &mut TopoArena, x0: f64, y0: f64, x1: f64, y1: f64) -> FaceId {
    let pts = [UvPoint::new(x0, y0), UvPoint::new(x1, y0), UvPoint::new(x1, y1), UvPoint::new(x0, y1)];
    arena.make_planar_polygon_face(plane(), &pts, &[]).unwrap()
}

fn block(arena: &mut TopoArena) -> Vec<FaceId> {
    vec![
        rect(arena, 0.0, 0.0, 1.0, 1.0),
        rect(arena, 1.0, 0.0, 2.0, 1.0),
        rect(arena, 0.0, 1.0, 1.0, 2.0),
        rect(arena, 1.0, 1.0, 2.0, 2.0),
    ]
}

#[test]
fn two_by_two_block_meshes_into_one_sheet() {
    let mut arena = TopoArena::new(Tolerance::new(1e-4));
    let faces = block(&mut arena);
    let model = MeshModel::new();
    let report = Mesher::new(MesherConfig::default().with_max_edge_length(0.25))
        .mesh_faces(&mut arena, &model, &faces)
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.join.linked_edges, 4);
    assert_eq!(report.meshed_faces.len(), 4);

    let meshes = model.face_meshes();
    assert_eq!(meshes.len(), 4);
    let triangles: Vec<[usize; 3]> = meshes.iter().flat_map(|m| m.triangles.iter().copied()).collect();
    let sheet = MeshDiagnostics::from_triangles(&triangles);
    assert_eq!(sheet.non_manifold_edge_count, 0);
    // Only the outer border stays open: 4 sides of 8 segments.
    assert_eq!(sheet.boundary_edge_count, 32);

    let pool = model.coordinates();
    let area: f64 = triangles
        .iter()
        .map(|[a, b, c]| {
            let (pa, pb, pc) = (pool.points[*a], pool.points[*b], pool.points[*c]);
            0.5 * (pb - pa).cross(pc - pa).length()
        })
        .sum();
    assert_relative_eq!(area, 4.0, epsilon = 1e-9);
    assert!(faces.iter().all(|f| !arena.face(*f).status().contains(StatusFlags::DEGENERATE)));
}

#[test]
fn configuration_is_read_from_json() {
    let config: MesherConfig =
        serde_json::from_str(r#"{ "max_edge_length": 0.5, "bridge_policy": "most_iso", "join_border_only": true }"#)
            .unwrap();
    assert_relative_eq!(config.max_edge_length, 0.5);
    assert_eq!(config.bridge_policy, BridgePolicy::MostIso);
    assert!(config.join_border_only);
    assert_eq!(config.tolerance, MesherConfig::default().tolerance);
    assert!(config.validate().is_ok());

    let unbounded: MesherConfig = serde_json::from_str("{}").unwrap();
    assert!(unbounded.max_edge_length.is_infinite());
}

#[test]
fn summary_is_serialized_for_reports() {
    let mut arena = TopoArena::default();
    let faces = block(&mut arena);
    let model = MeshModel::new();
    let report = Mesher::default().mesh_faces(&mut arena, &model, &faces).unwrap();

    let summary = MeshSummary::from(&report);
    assert_eq!(summary.faces, 4);
    assert_eq!(summary.failed, 0);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["linked_edges"], 4);
    assert_eq!(json["triangles"].as_u64(), Some(summary.triangles as u64));
}

#[test]
fn meshing_twice_reuses_edge_meshes() {
    let mut arena = TopoArena::default();
    let face = rect(&mut arena, 0.0, 0.0, 1.0, 1.0);
    let model = MeshModel::new();
    let mesher = Mesher::new(MesherConfig::default().with_max_edge_length(0.5));
    mesher.mesh_faces(&mut arena, &model, &[face]).unwrap();
    let first = model.face_mesh(arena.face(face).mesh().unwrap()).unwrap();

    mesher.mesh_faces(&mut arena, &model, &[face]).unwrap();
    let second = model.face_mesh(arena.face(face).mesh().unwrap()).unwrap();
    assert_eq!(first.boundary_cycles, second.boundary_cycles);
}
