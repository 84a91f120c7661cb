use std::sync::Arc;

use std::f64::consts::FRAC_PI_2;

use crate::geom::{Interval, PlaneSurface, Point3, Surface, Tolerance, UvArc, UvBoundary, UvPoint};
use crate::topo::{FaceId, Joiner, OrientedEdge, Shell, TopoArena, TopologicalEntity, WeldGap};

fn plane() -> Arc<dyn Surface> {
    Arc::new(PlaneSurface::xy(0.0, UvBoundary::new(Interval::new(-1.0, 3.0), Interval::new(-1.0, 3.0))))
}

fn rect(arena: &mut TopoArena, x0: f64, y0: f64, x1: f64, y1: f64) -> FaceId {
    let pts = [
        UvPoint::new(x0, y0),
        UvPoint::new(x1, y0),
        UvPoint::new(x1, y1),
        UvPoint::new(x0, y1),
    ];
    arena.make_planar_polygon_face(plane(), &pts, &[]).unwrap()
}

fn shared_edges(arena: &TopoArena, face: FaceId) -> Vec<crate::topo::EdgeId> {
    arena
        .face_edges(&[face])
        .into_iter()
        .filter(|e| {
            let edge = arena.edge(*e);
            let a = arena.vertex(edge.start()).point();
            let b = arena.vertex(edge.end()).point();
            a.x > 0.9 && b.x > 0.9 && a.x < 1.1 && b.x < 1.1
        })
        .collect()
}

#[test]
fn two_squares_share_one_manifold_edge() {
    let mut arena = TopoArena::new(Tolerance::new(1e-4));
    let left = rect(&mut arena, 0.0, 0.0, 1.0, 1.0);
    let right = rect(&mut arena, 1.0 + 1e-6, 0.0, 2.0, 1.0);

    let report = Joiner::new(&mut arena, Tolerance::new(1e-4)).join_faces(&[left, right]);
    assert_eq!(report.merged_vertices, 2);
    assert_eq!(report.linked_edges, 1);
    assert!(report.is_clean(), "{report}");

    let left_shared = shared_edges(&arena, left);
    let right_shared = shared_edges(&arena, right);
    assert_eq!(left_shared.len(), 1);
    assert_eq!(right_shared.len(), 1);
    assert_eq!(arena.edge_twins(left_shared[0]).len(), 2);
    assert!(arena.is_manifold_edge(right_shared[0]));
    assert!(!arena.is_border_edge(left_shared[0]));
    assert_eq!(arena.active_edge(right_shared[0]), left_shared[0].min(right_shared[0]));

    let border = arena.face_edges(&[left, right]).into_iter().filter(|e| arena.is_border_edge(*e)).count();
    assert_eq!(border, 6);
}

#[test]
fn two_by_two_block_welds_centre_vertex_and_is_not_watertight() {
    let mut arena = TopoArena::new(Tolerance::new(1e-4));
    let faces = vec![
        rect(&mut arena, 0.0, 0.0, 1.0, 1.0),
        rect(&mut arena, 1.0, 0.0, 2.0, 1.0),
        rect(&mut arena, 0.0, 1.0, 1.0, 2.0),
        rect(&mut arena, 1.0, 1.0, 2.0, 2.0),
    ];
    let report = Joiner::new(&mut arena, Tolerance::new(1e-4)).join_faces(&faces);
    assert_eq!(report.linked_edges, 4);
    // 16 corner vertices collapse into 9 groups.
    assert_eq!(report.merged_vertices, 7);

    let shell = arena.make_shell(faces);
    let shell: &Shell = arena.shell(shell);
    assert!(!shell.is_watertight(&arena));
    assert!(shell.bbox(&arena).is_some());
}

#[test]
fn edges_with_shared_ends_but_different_paths_stay_apart() {
    let mut arena = TopoArena::new(Tolerance::new(1e-4));
    let s = plane();
    let tri = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0)];
    let f0 = arena.make_planar_polygon_face(Arc::clone(&s), &tri, &[]).unwrap();

    // Half-disc bounded by an arc bulging to u = 1.5 and the chord u = 1.
    let bottom = arena.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
    let top = arena.add_vertex(Point3::new(1.0, 1.0, 0.0)).unwrap();
    let arc = Arc::new(UvArc::new(UvPoint::new(1.0, 0.5), 0.5, Interval::new(-FRAC_PI_2, FRAC_PI_2)));
    let arc_edge = arena
        .make_edge(Arc::clone(&s), arc, Interval::new(-FRAC_PI_2, FRAC_PI_2), bottom, top)
        .unwrap();
    let chord = arena
        .make_line_edge(Arc::clone(&s), UvPoint::new(1.0, 1.0), UvPoint::new(1.0, 0.0), top, bottom)
        .unwrap();
    let l = arena
        .make_loop(vec![OrientedEdge::forward(arc_edge), OrientedEdge::forward(chord)])
        .unwrap();
    let f1 = arena.make_face(s, vec![l]).unwrap();

    let report = Joiner::new(&mut arena, Tolerance::new(1e-4)).join_faces(&[f0, f1]);
    assert_eq!(report.merged_vertices, 2);
    assert_eq!(report.linked_edges, 1);
    assert_eq!(report.gaps.len(), 1);
    assert!(matches!(report.gaps[0], WeldGap::Edge { distance, .. } if distance > 0.4));
    assert!(arena.is_border_edge(arc_edge));
    assert!(arena.is_manifold_edge(chord));
    assert!(arena.face(f0).status().is_empty());
}
