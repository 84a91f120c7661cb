//! Incremental Delaunay triangulation of a small 2D point set.
//!
//! The triangulation starts from a super-quadrilateral (two triangles) around
//! the offset bounding box of the inserted points. Each insertion removes the
//! triangles whose circumcircle contains the new point and fans the point
//! against the boundary of the cavity. The cavity boundary is found by
//! cancelling opposite half-edges, so the scan order of the deleted triangles
//! is part of the result.

use serde::Serialize;

use crate::geom::{UvPoint, orient2d};
use crate::mesh::error::MeshError;

/// Points on a circumcircle within this relative margin count as inside.
const CIRCLE_TIE_MARGIN: f64 = 1e-12;
/// Offset of the super-quadrilateral, relative to the bounding box size.
const SUPER_QUAD_OFFSET: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct Triangle {
    vertices: [usize; 3],
    center: UvPoint,
    radius_squared: f64,
}

impl Triangle {
    fn new(points: &[UvPoint], vertices: [usize; 3]) -> Self {
        let (center, radius_squared) = circumcircle(points[vertices[0]], points[vertices[1]], points[vertices[2]]);
        Self { vertices, center, radius_squared }
    }

    fn circle_contains(&self, p: UvPoint) -> bool {
        p.distance_squared(self.center) <= self.radius_squared * (1.0 + CIRCLE_TIE_MARGIN)
    }

    fn half_edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Circumcenter and squared circumradius. Collinear triples get an infinite
/// circle so that any later point removes them.
fn circumcircle(a: UvPoint, b: UvPoint, c: UvPoint) -> (UvPoint, f64) {
    let d = 2.0 * orient2d(a, b, c);
    if d == 0.0 {
        return (a, f64::INFINITY);
    }
    let ab = b - a;
    let ac = c - a;
    let ab2 = ab.dot(ab);
    let ac2 = ac.dot(ac);
    let ux = (ac.v * ab2 - ab.v * ac2) / d;
    let uy = (ab.u * ac2 - ac.u * ab2) / d;
    (UvPoint::new(a.u + ux, a.v + uy), ux * ux + uy * uy)
}

/// Builder for a Bowyer–Watson run.
#[derive(Debug, Clone)]
pub struct BowyerWatson<'a> {
    points: &'a [UvPoint],
    skip_first: usize,
}

impl<'a> BowyerWatson<'a> {
    #[must_use]
    pub const fn new(points: &'a [UvPoint]) -> Self {
        Self { points, skip_first: 0 }
    }

    /// Leaves the first `n` points out of the triangulation. Triangle indices
    /// still refer to the full input slice.
    #[must_use]
    pub const fn skip_first(mut self, n: usize) -> Self {
        self.skip_first = n;
        self
    }

    pub fn triangulate(self) -> Result<Triangulation, MeshError> {
        let first = self.skip_first.min(self.points.len());
        let inserted = &self.points[first..];
        if inserted.len() < 3 {
            return Err(MeshError::TooFewPoints(inserted.len()));
        }
        if inserted.iter().any(|p| !p.is_finite()) {
            return Err(MeshError::NonFinitePoint);
        }

        let (mut min_u, mut max_u) = (f64::MAX, f64::MIN);
        let (mut min_v, mut max_v) = (f64::MAX, f64::MIN);
        for p in inserted {
            min_u = min_u.min(p.u);
            max_u = max_u.max(p.u);
            min_v = min_v.min(p.v);
            max_v = max_v.max(p.v);
        }
        let offset = SUPER_QUAD_OFFSET * (max_u - min_u).max(max_v - min_v).max(1e-10);

        let n = self.points.len();
        let mut points = self.points.to_vec();
        points.extend_from_slice(&[
            UvPoint::new(min_u - offset, min_v - offset),
            UvPoint::new(max_u + offset, min_v - offset),
            UvPoint::new(max_u + offset, max_v + offset),
            UvPoint::new(min_u - offset, max_v + offset),
        ]);

        let mut triangles = vec![
            Triangle::new(&points, [n, n + 1, n + 2]),
            Triangle::new(&points, [n, n + 2, n + 3]),
        ];

        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for index in first..n {
            let p = points[index];

            boundary.clear();
            let mut k = 0;
            while k < triangles.len() {
                if !triangles[k].circle_contains(p) {
                    k += 1;
                    continue;
                }
                for (a, b) in triangles[k].half_edges() {
                    if let Some(twin) = boundary.iter().position(|e| *e == (b, a)) {
                        boundary.swap_remove(twin);
                    } else {
                        boundary.push((a, b));
                    }
                }
                triangles.swap_remove(k);
            }

            for (a, b) in &boundary {
                triangles.push(Triangle::new(&points, [*a, *b, index]));
            }
        }

        triangles.retain(|t| t.vertices.iter().all(|v| *v < n));
        let triangles: Vec<[usize; 3]> = triangles.iter().map(|t| t.vertices).collect();
        log::trace!("bowyer-watson: {} points, {} triangles", n - first, triangles.len());
        Ok(Triangulation::from_triangles(triangles))
    }
}

/// Result of a Bowyer–Watson run, super vertices removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
    outer_edges: Vec<[usize; 2]>,
    inner_edges: Vec<[usize; 2]>,
}

impl Triangulation {
    fn from_triangles(triangles: Vec<[usize; 3]>) -> Self {
        let mut half_edges: Vec<[usize; 2]> = triangles
            .iter()
            .flat_map(|[a, b, c]| [[*a, *b], [*b, *c], [*c, *a]])
            .collect();
        half_edges.sort_unstable_by_key(|[a, b]| ((*a).min(*b), (*a).max(*b)));

        let mut outer_edges = Vec::new();
        let mut inner_edges = Vec::new();
        let mut k = 0;
        while k < half_edges.len() {
            let [a, b] = half_edges[k];
            let key = (a.min(b), a.max(b));
            let mut run = 1;
            while k + run < half_edges.len() {
                let [c, d] = half_edges[k + run];
                if (c.min(d), c.max(d)) != key {
                    break;
                }
                run += 1;
            }
            if run == 1 {
                outer_edges.push([a, b]);
            } else {
                inner_edges.push([key.0, key.1]);
            }
            k += run;
        }
        Self { triangles, outer_edges, inner_edges }
    }

    /// Counter-clockwise vertex triples.
    #[must_use]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Edges used by a single triangle, oriented as in that triangle.
    #[must_use]
    pub fn outer_edges(&self) -> &[[usize; 2]] {
        &self.outer_edges
    }

    #[must_use]
    pub fn outer_edge_count(&self) -> usize {
        self.outer_edges.len()
    }

    /// Edges shared by two triangles, as `[min, max]`.
    #[must_use]
    pub fn inner_edges(&self) -> &[[usize; 2]] {
        &self.inner_edges
    }

    #[must_use]
    pub fn outer_vertices(&self) -> Vec<usize> {
        let mut vertices: Vec<usize> = self.outer_edges.iter().flatten().copied().collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }
}
