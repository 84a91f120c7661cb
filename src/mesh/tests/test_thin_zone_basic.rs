use std::sync::Arc;

use crate::geom::{PlaneSurface, Surface, UvBoundary, UvPoint};
use crate::mesh::{
    Grid, MeshModel, MesherConfig, ThinZoneFinder, ThinZoneKind, loop_sampling, mark_thin_zones, mesh_active_edges,
    mesh_vertices,
};
use crate::topo::{EdgeId, StatusFlags, TopoArena, TopologicalEntity};

fn closed(points: &[(f64, f64)]) -> (Vec<UvPoint>, Vec<EdgeId>) {
    let mut pts: Vec<UvPoint> = points.iter().map(|(u, v)| UvPoint::new(*u, *v)).collect();
    pts.push(pts[0]);
    (pts, (0..points.len()).map(EdgeId).collect())
}

#[test]
fn close_segments_are_mutual() {
    // A slot: two long sides 0.03 apart joined by wide ends.
    let slot = closed(&[
        (0.0, 0.0),
        (2.0, 0.0),
        (2.0, 0.5),
        (1.5, 0.5),
        (1.5, 0.03),
        (0.5, 0.03),
        (0.5, 0.5),
        (0.0, 0.5),
    ]);
    let mut finder = ThinZoneFinder::from_polylines(vec![slot], 0.05);
    finder.find_close_segments();
    finder.link_close_segments();

    let segments = finder.segments();
    let linked: Vec<usize> = (0..segments.len()).filter(|s| segments[*s].close_segment().is_some()).collect();
    assert!(!linked.is_empty());
    for s in linked {
        let c = segments[s].close_segment().unwrap();
        assert_eq!(segments[c].close_segment(), Some(s));
        assert!((segments[s].close_distance() - segments[c].close_distance()).abs() < 1e-12);
        assert!(segments[s].close_distance() <= finder.tolerance());
    }
}

#[test]
fn thin_rib_edges_are_flagged() {
    let mut arena = TopoArena::default();
    let plane: Arc<dyn Surface> = Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()));
    let rib = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 0.02), UvPoint::new(0.0, 0.02)];
    let face = arena.make_planar_polygon_face(plane, &rib, &[]).unwrap();

    let model = MeshModel::new();
    let config = MesherConfig::default().with_max_edge_length(0.25);
    mesh_vertices(&mut arena, &model, &[face]);
    assert!(mesh_active_edges(&mut arena, &model, &[face], &config).is_clean());
    let f = arena.face(face);
    let samplings = f.loops().iter().map(|l| loop_sampling(&arena, &model, *l).unwrap()).collect();
    let grid = Grid::build(face, f.surface().as_ref(), samplings, &config).unwrap();

    let zones = ThinZoneFinder::new(grid.loops(), 0.05).search();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].kind, ThinZoneKind::Global);
    assert!(!zones[0].node_pairs.is_empty());

    mark_thin_zones(&mut arena, &zones);
    let flagged = arena
        .face_edges(&[face])
        .into_iter()
        .filter(|e| arena.edge(*e).status().contains(StatusFlags::THIN_ZONE))
        .count();
    assert_eq!(flagged, 2);
}
