//! Faces of the segment graph and their tessellation.
//!
//! A cycle is walked by always taking, at the end of a half-edge, the next
//! segment clockwise from the way back. Starting from half-edges that have
//! the face on their left, every cycle found is counter-clockwise.

use std::collections::HashSet;

use crate::geom::{UvPoint, orient2d, signed_area};
use crate::mesh::iso::intersection::segments_intersect;
use crate::mesh::iso::node::{IsoNode, IsoSegment, SegmentKind};
use crate::mesh::iso::slope::{relative_slope, slope};

/// Above this size the first valid ear is clipped instead of the best one.
const BEST_EAR_LIMIT: usize = 64;

/// Triangles below this quality are flat.
pub const FLAT_TRIANGLE_QUALITY: f64 = 1e-6;

/// Neighbours of every node with the slope of the segment leaving towards them.
#[must_use]
pub fn sorted_neighbours(nodes: &[IsoNode], segments: &[IsoSegment]) -> Vec<Vec<(f64, usize)>> {
    let mut adjacency: Vec<Vec<(f64, usize)>> = vec![Vec::new(); nodes.len()];
    for s in segments.iter().filter(|s| s.active) {
        adjacency[s.first].push((slope(nodes[s.first].uv, nodes[s.second].uv), s.second));
        adjacency[s.second].push((slope(nodes[s.second].uv, nodes[s.first].uv), s.first));
    }
    for list in &mut adjacency {
        list.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    adjacency
}

/// Next node after arriving at `at` from `from`: the first neighbour met when
/// turning clockwise from the way back.
fn next_node(nodes: &[IsoNode], adjacency: &[Vec<(f64, usize)>], from: usize, at: usize) -> usize {
    let back = slope(nodes[at].uv, nodes[from].uv);
    adjacency[at]
        .iter()
        .filter(|(_, n)| *n != from)
        .map(|(s, n)| (relative_slope(back, *s), *n))
        .filter(|(turn, _)| *turn > 0.0)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map_or(from, |(_, n)| n)
}

/// Walked cycles, plus the number of walks that had to be abandoned.
#[must_use]
pub fn walk_cycles(nodes: &[IsoNode], segments: &[IsoSegment]) -> (Vec<Vec<usize>>, usize) {
    let adjacency = sorted_neighbours(nodes, segments);
    let guard = 2 * segments.len() + 2;
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    let mut cycles = Vec::new();
    let mut abandoned = 0;

    for s in segments.iter().filter(|s| s.active) {
        // Loop segments only have the face on their left.
        let reverse = (s.kind != SegmentKind::Loop).then_some((s.second, s.first));
        for (a, b) in std::iter::once((s.first, s.second)).chain(reverse) {
            if visited.contains(&(a, b)) {
                continue;
            }
            let mut cycle = Vec::new();
            let (mut x, mut y) = (a, b);
            let mut valid = true;
            loop {
                // Running backwards along a loop means walking outside the face.
                if !visited.insert((x, y)) || nodes[y].next == Some(x) || cycle.len() > guard {
                    valid = false;
                    break;
                }
                cycle.push(x);
                let z = next_node(nodes, &adjacency, x, y);
                (x, y) = (y, z);
                if (x, y) == (a, b) {
                    break;
                }
            }
            let points: Vec<UvPoint> = cycle.iter().map(|n| nodes[*n].uv).collect();
            if valid && signed_area(&points) > 0.0 {
                cycles.push(cycle);
            } else {
                log::warn!("cycle of {} nodes starting at node {a} abandoned", cycle.len());
                abandoned += 1;
            }
        }
    }
    (cycles, abandoned)
}

/// Removes back-and-forth runs left by dangling segments.
fn remove_spikes(polygon: &mut Vec<usize>) {
    let mut k = 0;
    while polygon.len() >= 3 && k < polygon.len() {
        let n = polygon.len();
        let (prev, next) = (polygon[(k + n - 1) % n], polygon[(k + 1) % n]);
        if prev == next {
            let second = (k + 1) % n;
            let (first, second) = if k < second { (k, second) } else { (second, k) };
            polygon.remove(second);
            polygon.remove(first);
            k = 0;
        } else {
            k += 1;
        }
    }
}

/// Regularity of a triangle, 1 for equilateral and 0 when flat.
#[must_use]
pub fn triangle_quality(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    let area2 = orient2d(a, b, c).abs();
    let sum = a.distance_squared(b) + b.distance_squared(c) + c.distance_squared(a);
    if !(area2.is_finite() && sum.is_finite()) || area2 <= 0.0 || sum <= 0.0 {
        return 0.0;
    }
    (2.0 * 3.0_f64.sqrt() * area2 / sum).clamp(0.0, 1.0)
}

#[must_use]
pub fn is_flat(a: UvPoint, b: UvPoint, c: UvPoint) -> bool {
    triangle_quality(a, b, c) < FLAT_TRIANGLE_QUALITY
}

/// Whether every corner left after clipping the ear at `k` is flat.
fn leaves_flat_remainder(nodes: &[IsoNode], polygon: &[usize], k: usize) -> bool {
    let rest: Vec<UvPoint> =
        polygon.iter().enumerate().filter(|(j, _)| *j != k).map(|(_, id)| nodes[*id].uv).collect();
    let m = rest.len();
    (0..m).all(|j| is_flat(rest[(j + m - 1) % m], rest[j], rest[(j + 1) % m]))
}

fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint) -> bool {
    orient2d(a, b, p) >= 0.0 && orient2d(b, c, p) >= 0.0 && orient2d(c, a, p) >= 0.0
}

fn is_ear(nodes: &[IsoNode], polygon: &[usize], k: usize) -> bool {
    let n = polygon.len();
    let (ip, ii, inx) = (polygon[(k + n - 1) % n], polygon[k], polygon[(k + 1) % n]);
    if ip == ii || ii == inx || ip == inx {
        return false;
    }
    let (p, i, x) = (nodes[ip].uv, nodes[ii].uv, nodes[inx].uv);
    if orient2d(p, i, x) <= 1e-14 * p.distance(i) * i.distance(x) {
        return false;
    }
    for (j, id) in polygon.iter().enumerate() {
        if *id == ip || *id == ii || *id == inx {
            continue;
        }
        if point_in_triangle(p, i, x, nodes[*id].uv) {
            return false;
        }
        let next = polygon[(j + 1) % n];
        if next == ip || next == inx {
            continue;
        }
        if segments_intersect(p, x, nodes[*id].uv, nodes[next].uv) {
            return false;
        }
    }
    true
}

/// Ear clipping of a counter-clockwise cycle, preferring the most regular
/// ear. Flat ears, and ears that would leave a flat remainder, are clipped
/// only when nothing else is left. `None` when no valid ear is left.
#[must_use]
pub fn mesh_cycle(nodes: &[IsoNode], cycle: &[usize]) -> Option<Vec<[usize; 3]>> {
    let mut polygon = cycle.to_vec();
    remove_spikes(&mut polygon);
    let mut triangles = Vec::with_capacity(polygon.len().saturating_sub(2));
    while polygon.len() > 3 {
        let n = polygon.len();
        let mut best: Option<(usize, f64)> = None;
        let mut fallback: Option<(usize, f64)> = None;
        for k in 0..n {
            if !is_ear(nodes, &polygon, k) {
                continue;
            }
            let (ip, ii, inx) = (polygon[(k + n - 1) % n], polygon[k], polygon[(k + 1) % n]);
            let q = triangle_quality(nodes[ip].uv, nodes[ii].uv, nodes[inx].uv);
            if q < FLAT_TRIANGLE_QUALITY || leaves_flat_remainder(nodes, &polygon, k) {
                if fallback.is_none_or(|(_, fq)| q > fq) {
                    fallback = Some((k, q));
                }
                continue;
            }
            if best.is_none_or(|(_, bq)| q > bq) {
                best = Some((k, q));
            }
            if n > BEST_EAR_LIMIT {
                break;
            }
        }
        let (k, _) = best.or(fallback)?;
        triangles.push([polygon[(k + n - 1) % n], polygon[k], polygon[(k + 1) % n]]);
        polygon.remove(k);
        remove_spikes(&mut polygon);
    }
    if polygon.len() == 3 {
        let [a, b, c] = [polygon[0], polygon[1], polygon[2]];
        if orient2d(nodes[a].uv, nodes[b].uv, nodes[c].uv) <= 0.0 {
            return None;
        }
        triangles.push([a, b, c]);
    }
    Some(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_nodes(points: &[(f64, f64)]) -> Vec<IsoNode> {
        points.iter().enumerate().map(|(k, (u, v))| IsoNode::inner_node(k, UvPoint::new(*u, *v))).collect()
    }

    fn area(nodes: &[IsoNode], triangles: &[[usize; 3]]) -> f64 {
        triangles.iter().map(|[a, b, c]| 0.5 * orient2d(nodes[*a].uv, nodes[*b].uv, nodes[*c].uv)).sum()
    }

    #[test]
    fn concave_polygon_is_clipped_completely() {
        let nodes = inner_nodes(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (1.0, 0.5), (0.0, 2.0)]);
        let triangles = mesh_cycle(&nodes, &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(triangles.len(), 3);
        assert!((area(&nodes, &triangles) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn dangling_segment_is_ignored() {
        let nodes = inner_nodes(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)]);
        // 3 -> 4 -> 3 is a dangling segment inside the square.
        let triangles = mesh_cycle(&nodes, &[0, 1, 2, 3, 4, 3]).unwrap();
        assert_eq!(triangles.len(), 2);
        assert!((area(&nodes, &triangles) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn walks_the_two_faces_of_a_split_square() {
        let nodes = inner_nodes(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let segments: Vec<IsoSegment> = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]
            .iter()
            .map(|(a, b)| IsoSegment::new(*a, *b, SegmentKind::InnerToLoop))
            .collect();
        let (cycles, abandoned) = walk_cycles(&nodes, &segments);
        // Two triangles inside plus the outer face, which is clockwise.
        assert_eq!(cycles.len(), 2);
        assert_eq!(abandoned, 1);
        assert!(cycles.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn nearly_collinear_run_is_not_left_for_last() {
        // 1 sits a hair below the line from 0 to 2.
        let nodes = inner_nodes(&[(0.0, 0.0), (1.0, -1e-13), (2.0, 0.0), (1.0, 1.0)]);
        let triangles = mesh_cycle(&nodes, &[0, 1, 2, 3]).unwrap();
        assert_eq!(triangles.len(), 2);
        for [a, b, c] in &triangles {
            assert!(!is_flat(nodes[*a].uv, nodes[*b].uv, nodes[*c].uv), "flat triangle {a} {b} {c}");
        }
        assert!((area(&nodes, &triangles) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn quality_of_equilateral_triangle_is_one() {
        let q = triangle_quality(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(0.5, 3.0_f64.sqrt() / 2.0));
        assert!((q - 1.0).abs() < 1e-12);
    }
}
