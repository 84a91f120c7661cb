//! Segment index answering "does this new segment touch an existing one".
//!
//! Segments are kept sorted by their lowest U so that a query only scans the
//! entries whose U range can overlap its own.

use crate::geom::{UvPoint, orient2d};

/// Relative tolerance on orientation tests, scaled by the segment lengths.
const ORIENTATION_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
struct Entry {
    nodes: [usize; 2],
    a: UvPoint,
    b: UvPoint,
    u_min: f64,
    u_max: f64,
    v_min: f64,
    v_max: f64,
}

impl Entry {
    fn new(nodes: [usize; 2], a: UvPoint, b: UvPoint) -> Self {
        Self { nodes, a, b, u_min: a.u.min(b.u), u_max: a.u.max(b.u), v_min: a.v.min(b.v), v_max: a.v.max(b.v) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntersectionTool {
    entries: Vec<Entry>,
}

impl IntersectionTool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, nodes: [usize; 2], a: UvPoint, b: UvPoint) {
        let entry = Entry::new(nodes, a, b);
        let at = self.entries.partition_point(|e| e.u_min <= entry.u_min);
        self.entries.insert(at, entry);
    }

    /// First stored segment intersecting `[a, b]`. Segments sharing a node
    /// with the query only count when they overlap it.
    #[must_use]
    pub fn find_intersection(&self, nodes: [usize; 2], a: UvPoint, b: UvPoint) -> Option<[usize; 2]> {
        let query = Entry::new(nodes, a, b);
        for e in &self.entries {
            if e.u_min > query.u_max {
                break;
            }
            if e.u_max < query.u_min || e.v_max < query.v_min || e.v_min > query.v_max {
                continue;
            }
            if e.nodes == nodes || e.nodes == [nodes[1], nodes[0]] {
                return Some(e.nodes);
            }
            let shared = e.nodes.iter().find(|n| nodes.contains(n)).copied();
            let hit = match shared {
                Some(node) => {
                    let (apex, free_query) = if node == nodes[0] { (a, b) } else { (b, a) };
                    let free_entry = if node == e.nodes[0] { e.b } else { e.a };
                    overlap_from_shared(apex, free_query, free_entry)
                }
                None => segments_intersect(a, b, e.a, e.b),
            };
            if hit {
                return Some(e.nodes);
            }
        }
        None
    }

    #[must_use]
    pub fn does_intersect(&self, nodes: [usize; 2], a: UvPoint, b: UvPoint) -> bool {
        self.find_intersection(nodes, a, b).is_some()
    }
}

fn eps_for(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> f64 {
    ORIENTATION_EPS * a.distance(b).max(f64::MIN_POSITIVE) * c.distance(d).max(f64::MIN_POSITIVE)
}

/// Two segments leaving the same point overlap when they are collinear and
/// point the same way.
fn overlap_from_shared(apex: UvPoint, p: UvPoint, q: UvPoint) -> bool {
    let eps = eps_for(apex, p, apex, q);
    orient2d(apex, p, q).abs() <= eps && (p - apex).dot(q - apex) > 0.0
}

/// Closed segment intersection, touching included.
#[must_use]
pub fn segments_intersect(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> bool {
    let eps = eps_for(a, b, c, d);
    let d1 = orient2d(c, d, a);
    let d2 = orient2d(c, d, b);
    let d3 = orient2d(a, b, c);
    let d4 = orient2d(a, b, d);
    let straddles = |x: f64, y: f64| (x > eps && y < -eps) || (x < -eps && y > eps);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }
    (d1.abs() <= eps && within(c, d, a))
        || (d2.abs() <= eps && within(c, d, b))
        || (d3.abs() <= eps && within(a, b, c))
        || (d4.abs() <= eps && within(a, b, d))
}

/// `p`, known to be collinear with `[a, b]`, lies between them.
fn within(a: UvPoint, b: UvPoint, p: UvPoint) -> bool {
    let ab = b - a;
    let t = (p - a).dot(ab);
    t >= 0.0 && t <= ab.dot(ab)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(u: f64, v: f64) -> UvPoint {
        UvPoint::new(u, v)
    }

    #[test]
    fn crossing_touching_and_disjoint() {
        assert!(segments_intersect(p(0.0, 0.0), p(1.0, 1.0), p(0.0, 1.0), p(1.0, 0.0)));
        assert!(segments_intersect(p(0.0, 0.0), p(1.0, 0.0), p(0.5, 0.0), p(0.5, 1.0)));
        assert!(!segments_intersect(p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.1), p(1.0, 0.1)));
        assert!(!segments_intersect(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(3.0, 0.0)));
    }

    #[test]
    fn shared_nodes_only_count_when_overlapping() {
        let mut tool = IntersectionTool::new();
        tool.add([0, 1], p(0.0, 0.0), p(1.0, 0.0));
        tool.add([1, 2], p(1.0, 0.0), p(1.0, 1.0));
        assert!(!tool.does_intersect([0, 3], p(0.0, 0.0), p(0.5, 0.5)));
        assert!(tool.does_intersect([0, 4], p(0.0, 0.0), p(2.0, 0.0)));
        assert!(tool.does_intersect([3, 4], p(0.5, -1.0), p(0.5, 1.0)));
        assert!(tool.does_intersect([1, 0], p(1.0, 0.0), p(0.0, 0.0)));
        // Passing through a stored node is a hit.
        assert!(tool.does_intersect([5, 6], p(0.0, -1.0), p(2.0, 1.0)));
        assert_eq!(tool.len(), 2);
    }
}
