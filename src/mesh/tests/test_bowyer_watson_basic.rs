use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{UvPoint, orient2d};
use crate::mesh::{BowyerWatson, MeshError};

fn random_points(seed: u64, count: usize) -> Vec<UvPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| UvPoint::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0))).collect()
}

/// Positive when `d` lies strictly inside the circle through the
/// counter-clockwise triangle `a b c`.
fn in_circle(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> f64 {
    let (adx, ady) = (a.u - d.u, a.v - d.v);
    let (bdx, bdy) = (b.u - d.u, b.v - d.v);
    let (cdx, cdy) = (c.u - d.u, c.v - d.v);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

fn sorted(t: [usize; 3]) -> [usize; 3] {
    let mut t = t;
    t.sort_unstable();
    t
}

#[test]
fn random_points_have_empty_circumcircles() {
    let points = random_points(7, 60);
    let t = BowyerWatson::new(&points).triangulate().unwrap();
    assert!(!t.is_empty());
    for [a, b, c] in t.triangles() {
        let (pa, pb, pc) = (points[*a], points[*b], points[*c]);
        assert!(orient2d(pa, pb, pc) > 0.0);
        for (k, p) in points.iter().enumerate() {
            if k == *a || k == *b || k == *c {
                continue;
            }
            assert!(in_circle(pa, pb, pc, *p) <= 1e-12, "point {k} inside circle of {a} {b} {c}");
        }
    }
}

#[test]
fn triangles_are_a_subset_of_delaunator() {
    let points = random_points(42, 120);
    let ours = BowyerWatson::new(&points).triangulate().unwrap();

    let reference_points: Vec<delaunator::Point> = points.iter().map(|p| delaunator::Point { x: p.u, y: p.v }).collect();
    let reference = delaunator::triangulate(&reference_points);
    let mut theirs: Vec<[usize; 3]> = reference
        .triangles
        .chunks_exact(3)
        .map(|t| sorted([t[0], t[1], t[2]]))
        .collect();
    theirs.sort_unstable();

    for t in ours.triangles() {
        assert!(theirs.binary_search(&sorted(*t)).is_ok(), "{t:?} is not a Delaunay triangle");
    }
    // Hull triangles may be lost to the super-quadrilateral, never many.
    assert!(ours.len() * 10 >= theirs.len() * 9, "{} of {}", ours.len(), theirs.len());
}

#[test]
fn skipped_points_are_left_out() {
    let points = vec![
        UvPoint::new(10.0, 10.0),
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 0.0),
        UvPoint::new(0.0, 1.0),
    ];
    let t = BowyerWatson::new(&points).skip_first(1).triangulate().unwrap();
    assert_eq!(t.len(), 1);
    assert_eq!(sorted(t.triangles()[0]), [1, 2, 3]);
}

#[test]
fn too_few_or_non_finite_points_are_refused() {
    let two = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)];
    assert!(matches!(BowyerWatson::new(&two).triangulate(), Err(MeshError::TooFewPoints(2))));

    let nan = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(f64::NAN, 1.0)];
    assert!(matches!(BowyerWatson::new(&nan).triangulate(), Err(MeshError::NonFinitePoint)));
}
