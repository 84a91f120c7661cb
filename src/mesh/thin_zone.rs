//! Detection of thin zones: portions of the face boundary that face each other
//! closer than the finder tolerance while being far apart along the loops.
//!
//! Loops are resampled into short boundary segments. Every segment looks for
//! the nearest facing segment, links are made mutual, linked runs become
//! sides, and facing sides become zones.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::Serialize;

use crate::geom::{Tolerance, UvPoint, project_on_segment};
use crate::mesh::grid::{GridLoop, GridSpace};
use crate::topo::{EdgeId, StatusFlags, TopoArena};

/// Facing segments make an angle above 135°.
const MAX_FACING_COSINE: f64 = -std::f64::consts::FRAC_1_SQRT_2;
/// The midpoint-to-projection direction must stay within 60° of the normal.
const MAX_OBLIQUITY_COSINE: f64 = 0.5;
/// Unlinked runs up to this many thicknesses are absorbed into a side, and
/// side ends this close are considered to meet.
const GAP_FACTOR: f64 = 4.0;
/// Zones shorter than this many thicknesses are noise.
const MIN_LENGTH_FACTOR: f64 = 5.0;
const MAX_SEGMENTS_PER_LOOP: f64 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ThinZoneKind {
    /// The two sides cover nearly the whole loop.
    Global,
    /// The sides meet before the start of the first side.
    PeakStart,
    /// The sides meet after the end of the first side.
    PeakEnd,
    /// Both ends open on wider regions.
    Butterfly,
    /// The sides lie on different loops.
    BetweenLoops,
}

/// Reference to a loop point: loop index and index of the point in the loop.
pub type LoopPoint = (usize, usize);

#[derive(Debug, Clone, Serialize)]
pub struct BoundarySegment {
    pub loop_index: usize,
    /// Index of the loop polyline segment this piece belongs to.
    pub loop_segment: usize,
    pub piece: usize,
    pub piece_count: usize,
    pub edge: EdgeId,
    pub start: UvPoint,
    pub end: UvPoint,
    close_segment: Option<usize>,
    close_distance: f64,
    chain_index: Option<usize>,
}

impl BoundarySegment {
    #[must_use]
    pub fn middle(&self) -> UvPoint {
        self.start.midpoint(self.end)
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    #[must_use]
    pub fn close_segment(&self) -> Option<usize> {
        self.close_segment
    }

    #[must_use]
    pub fn close_distance(&self) -> f64 {
        self.close_distance
    }

    #[must_use]
    pub fn chain_index(&self) -> Option<usize> {
        self.chain_index
    }

    fn direction(&self) -> UvPoint {
        (self.end - self.start) * (1.0 / self.length())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinZoneSide {
    pub loop_index: usize,
    /// Boundary segment indices, in loop order.
    pub segments: Vec<usize>,
    pub edges: Vec<EdgeId>,
    pub length: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinZone {
    pub kind: ThinZoneKind,
    pub sides: [ThinZoneSide; 2],
    pub thickness: f64,
    pub length: f64,
    /// Loop points facing each other across the zone.
    pub node_pairs: Vec<[LoopPoint; 2]>,
}

impl ThinZone {
    /// Edges carrying the zone, both sides together.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.sides.iter().flat_map(|s| s.edges.iter().copied())
    }

    /// Edges at the ends where the two sides meet.
    #[must_use]
    pub fn peak_edges(&self) -> Vec<EdgeId> {
        let [a, b] = &self.sides;
        let first = |s: &ThinZoneSide| s.edges.first().copied();
        let last = |s: &ThinZoneSide| s.edges.last().copied();
        let ends = match self.kind {
            ThinZoneKind::PeakStart => vec![first(a), last(b)],
            ThinZoneKind::PeakEnd => vec![last(a), first(b)],
            ThinZoneKind::Global => vec![first(a), last(a), first(b), last(b)],
            ThinZoneKind::Butterfly | ThinZoneKind::BetweenLoops => Vec::new(),
        };
        ends.into_iter().flatten().collect()
    }
}

#[derive(Debug, Clone)]
struct Side {
    loop_index: usize,
    segments: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ThinZoneFinder {
    tolerance: f64,
    segments: Vec<BoundarySegment>,
    loop_ranges: Vec<Range<usize>>,
    loop_lengths: Vec<f64>,
    loop_points: Vec<Vec<UvPoint>>,
    chains: Vec<Vec<usize>>,
}

impl ThinZoneFinder {
    /// Finder over the loops of a grid, measured in uniformly scaled space.
    #[must_use]
    pub fn new(loops: &[GridLoop], tolerance: f64) -> Self {
        let polylines = loops
            .iter()
            .map(|l| (l.points(GridSpace::UniformScaled).to_vec(), l.edges().to_vec()))
            .collect();
        Self::from_polylines(polylines, tolerance)
    }

    /// Finder over closed polylines, each with one edge per segment.
    #[must_use]
    pub fn from_polylines(loops: Vec<(Vec<UvPoint>, Vec<EdgeId>)>, tolerance: f64) -> Self {
        let mut segments = Vec::new();
        let mut loop_ranges = Vec::with_capacity(loops.len());
        let mut loop_lengths = Vec::with_capacity(loops.len());
        let mut loop_points = Vec::with_capacity(loops.len());

        for (loop_index, (mut points, edges)) in loops.into_iter().enumerate() {
            if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
                if first.distance(last) > Tolerance::SMALL_NUMBER.eps {
                    points.push(first);
                }
            }
            let length: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
            let step = tolerance.max(length / MAX_SEGMENTS_PER_LOOP);
            let begin = segments.len();
            for (j, w) in points.windows(2).enumerate() {
                let (a, b) = (w[0], w[1]);
                let len = a.distance(b);
                if len <= Tolerance::SMALL_NUMBER.eps {
                    continue;
                }
                let piece_count = ((len / step).ceil() as usize).max(1);
                let edge = edges.get(j).or(edges.last()).copied().unwrap_or(EdgeId(0));
                for piece in 0..piece_count {
                    let t0 = piece as f64 / piece_count as f64;
                    let t1 = (piece + 1) as f64 / piece_count as f64;
                    segments.push(BoundarySegment {
                        loop_index,
                        loop_segment: j,
                        piece,
                        piece_count,
                        edge,
                        start: a + (b - a) * t0,
                        end: a + (b - a) * t1,
                        close_segment: None,
                        close_distance: f64::INFINITY,
                        chain_index: None,
                    });
                }
            }
            loop_ranges.push(begin..segments.len());
            loop_lengths.push(length);
            loop_points.push(points);
        }

        Self { tolerance, segments, loop_ranges, loop_lengths, loop_points, chains: Vec::new() }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn segments(&self) -> &[BoundarySegment] {
        &self.segments
    }

    /// Runs of consecutive linked segments, after `search`.
    #[must_use]
    pub fn chains(&self) -> &[Vec<usize>] {
        &self.chains
    }

    pub fn search(&mut self) -> Vec<ThinZone> {
        self.find_close_segments();
        self.link_close_segments();
        self.build_chains();
        if self.chains.is_empty() {
            return Vec::new();
        }
        let mut sides: Vec<Side> = self
            .chains
            .iter()
            .map(|c| Side { loop_index: self.segments[c[0]].loop_index, segments: c.clone() })
            .collect();
        self.merge_gaps(&mut sides);
        self.split_sides(&mut sides);
        let zones = self.build_zones(&sides);
        log::debug!(
            "thin zones: {} segments, {} chains, {} zones",
            self.segments.len(),
            self.chains.len(),
            zones.len()
        );
        zones
    }

    /// Records for every segment its nearest facing segment.
    pub fn find_close_segments(&mut self) {
        let n = self.segments.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|a, b| self.segments[*a].middle().u.total_cmp(&self.segments[*b].middle().u));
        let sorted_u: Vec<f64> = order.iter().map(|i| self.segments[*i].middle().u).collect();
        let max_length = self.segments.iter().map(BoundarySegment::length).fold(0.0, f64::max);
        let window = max_length + self.tolerance;

        let mut found = Vec::with_capacity(n);
        for s in 0..n {
            let seg = &self.segments[s];
            let m = seg.middle();
            let ds = seg.direction();
            let first = sorted_u.partition_point(|u| *u < m.u - window);
            let mut best: Option<(usize, f64)> = None;
            for (k, c) in order.iter().enumerate().skip(first) {
                if sorted_u[k] > m.u + window {
                    break;
                }
                if *c == s || self.are_neighbours(s, *c) {
                    continue;
                }
                let cand = &self.segments[*c];
                if ds.dot(cand.direction()) > MAX_FACING_COSINE {
                    continue;
                }
                let (q, _) = project_on_segment(m, cand.start, cand.end);
                let to = q - m;
                let d = to.length();
                if d >= self.tolerance || d <= Tolerance::SMALL_NUMBER.eps {
                    continue;
                }
                // The opposite side must lie inside the face, on the left.
                if ds.cross(to) <= 0.0 || (ds.dot(to) / d).abs() > MAX_OBLIQUITY_COSINE {
                    continue;
                }
                if best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((*c, d));
                }
            }
            found.push(best);
        }
        for (seg, best) in self.segments.iter_mut().zip(found) {
            seg.close_segment = best.map(|b| b.0);
            seg.close_distance = best.map_or(f64::INFINITY, |b| b.1);
        }
    }

    /// Makes close-segment references mutual: among competing pairs the
    /// shorter one wins and the loser drops its link.
    pub fn link_close_segments(&mut self) {
        let mut pairs: Vec<(f64, usize, usize)> = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(s, seg)| seg.close_segment.map(|c| (seg.close_distance, s, c)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut matched: Vec<Option<(usize, f64)>> = vec![None; self.segments.len()];
        for (d, s, c) in pairs {
            if matched[s].is_none() && matched[c].is_none() {
                matched[s] = Some((c, d));
                matched[c] = Some((s, d));
            }
        }
        let mut dropped = 0;
        for (seg, m) in self.segments.iter_mut().zip(matched) {
            if seg.close_segment.is_some() && m.is_none() {
                dropped += 1;
            }
            seg.close_segment = m.map(|m| m.0);
            seg.close_distance = m.map_or(f64::INFINITY, |m| m.1);
        }
        log::trace!("thin zones: {dropped} one-way links dropped");
    }

    fn are_neighbours(&self, a: usize, b: usize) -> bool {
        let (sa, sb) = (&self.segments[a], &self.segments[b]);
        if sa.loop_index != sb.loop_index {
            return false;
        }
        let range = &self.loop_ranges[sa.loop_index];
        let len = range.len();
        let (ia, ib) = (a - range.start, b - range.start);
        (ia + 1) % len == ib || (ib + 1) % len == ia
    }

    fn build_chains(&mut self) {
        self.chains.clear();
        for range in self.loop_ranges.clone() {
            let linked = |i: usize| self.segments[i].close_segment.is_some();
            let mut runs: Vec<Vec<usize>> = Vec::new();
            let mut current: Vec<usize> = Vec::new();
            for i in range.clone() {
                if linked(i) {
                    current.push(i);
                } else if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                // A run reaching the end of the loop continues into the first one.
                if runs.first().is_some_and(|first| first[0] == range.start) {
                    current.append(&mut runs[0]);
                    runs[0] = current;
                } else {
                    runs.push(current);
                }
            }
            self.chains.extend(runs);
        }
        for (index, chain) in self.chains.iter().enumerate() {
            for s in chain {
                self.segments[*s].chain_index = Some(index);
            }
        }
    }

    fn side_of(&self, sides: &[Side]) -> Vec<Option<usize>> {
        let mut side_of = vec![None; self.segments.len()];
        for (index, side) in sides.iter().enumerate() {
            for s in &side.segments {
                side_of[*s] = Some(index);
            }
        }
        side_of
    }

    fn opposite_sides(&self, side: &Side, side_of: &[Option<usize>]) -> BTreeSet<usize> {
        side.segments
            .iter()
            .filter_map(|s| self.segments[*s].close_segment)
            .filter_map(|c| side_of[c])
            .collect()
    }

    fn thickness(&self, segments: &[usize]) -> f64 {
        let (sum, count) = segments
            .iter()
            .filter(|s| self.segments[**s].close_segment.is_some())
            .fold((0.0, 0_usize), |(sum, count), s| (sum + self.segments[*s].close_distance, count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    fn length(&self, segments: &[usize]) -> f64 {
        segments.iter().map(|s| self.segments[*s].length()).sum()
    }

    /// Segments strictly between `from` and `to`, walking forward in the loop.
    fn between(&self, loop_index: usize, from: usize, to: usize) -> Vec<usize> {
        let range = &self.loop_ranges[loop_index];
        let len = range.len();
        let mut out = Vec::new();
        let mut i = (from - range.start + 1) % len;
        let end = to - range.start;
        while i != end && out.len() < len {
            out.push(range.start + i);
            i = (i + 1) % len;
        }
        out
    }

    /// Joins consecutive sides of a loop separated by a short unlinked run,
    /// as long as they face the same loop and not each other.
    fn merge_gaps(&self, sides: &mut Vec<Side>) {
        'restart: loop {
            let side_of = self.side_of(sides);
            for loop_index in 0..self.loop_ranges.len() {
                let mut on_loop: Vec<usize> = (0..sides.len()).filter(|i| sides[*i].loop_index == loop_index).collect();
                if on_loop.len() < 2 {
                    continue;
                }
                on_loop.sort_by_key(|i| sides[*i].segments[0]);
                for k in 0..on_loop.len() {
                    let (a, b) = (on_loop[k], on_loop[(k + 1) % on_loop.len()]);
                    let (sa, sb) = (&sides[a], &sides[b]);
                    let (Some(&a_last), Some(&b_first)) = (sa.segments.last(), sb.segments.first()) else {
                        continue;
                    };
                    let gap = self.between(loop_index, a_last, b_first);
                    let mut both = sa.segments.clone();
                    both.extend_from_slice(&sb.segments);
                    if self.length(&gap) > GAP_FACTOR * self.thickness(&both) {
                        continue;
                    }
                    let opp_a = self.opposite_sides(sa, &side_of);
                    let opp_b = self.opposite_sides(sb, &side_of);
                    if opp_a.contains(&b) || opp_b.contains(&a) {
                        continue;
                    }
                    let loops_of = |opp: &BTreeSet<usize>| -> BTreeSet<usize> {
                        opp.iter().map(|o| sides[*o].loop_index).collect()
                    };
                    if loops_of(&opp_a).is_disjoint(&loops_of(&opp_b)) {
                        continue;
                    }
                    let mut merged = sa.segments.clone();
                    merged.extend(gap);
                    merged.extend_from_slice(&sb.segments);
                    sides[a].segments = merged;
                    sides.remove(b);
                    continue 'restart;
                }
            }
            break;
        }
    }

    /// Splits sides wherever their opposite side changes, until every side
    /// faces a single other side.
    fn split_sides(&self, sides: &mut Vec<Side>) {
        for _ in 0..self.segments.len().max(1) {
            let side_of = self.side_of(sides);
            let mut next: Vec<Side> = Vec::with_capacity(sides.len());
            for side in sides.iter() {
                let mut current: Vec<usize> = Vec::new();
                let mut facing: Option<usize> = None;
                for s in &side.segments {
                    let opp = self.segments[*s].close_segment.and_then(|c| side_of[c]);
                    if let (Some(o), Some(f)) = (opp, facing) {
                        if o != f {
                            next.push(Side { loop_index: side.loop_index, segments: std::mem::take(&mut current) });
                        }
                    }
                    if opp.is_some() {
                        facing = opp;
                    }
                    current.push(*s);
                }
                next.push(Side { loop_index: side.loop_index, segments: current });
            }
            let stable = next.len() == sides.len();
            *sides = next;
            if stable {
                break;
            }
        }
    }

    fn build_zones(&self, sides: &[Side]) -> Vec<ThinZone> {
        let side_of = self.side_of(sides);
        let mut zones = Vec::new();
        for (a, side_a) in sides.iter().enumerate() {
            for b in self.opposite_sides(side_a, &side_of) {
                if b <= a {
                    continue;
                }
                let side_b = &sides[b];
                let mut both = side_a.segments.clone();
                both.extend_from_slice(&side_b.segments);
                let thickness = self.thickness(&both);
                let (len_a, len_b) = (self.length(&side_a.segments), self.length(&side_b.segments));
                let length = 0.5 * (len_a + len_b);
                if length < MIN_LENGTH_FACTOR * thickness {
                    log::trace!("thin zone discarded: length {length} for thickness {thickness}");
                    continue;
                }
                let kind = self.classify(side_a, side_b, thickness);
                zones.push(ThinZone {
                    kind,
                    sides: [self.zone_side(side_a, len_a), self.zone_side(side_b, len_b)],
                    thickness,
                    length,
                    node_pairs: self.node_pairs(&both),
                });
            }
        }
        zones
    }

    fn classify(&self, a: &Side, b: &Side, thickness: f64) -> ThinZoneKind {
        if a.loop_index != b.loop_index {
            return ThinZoneKind::BetweenLoops;
        }
        let (Some(&a_first), Some(&a_last), Some(&b_first), Some(&b_last)) =
            (a.segments.first(), a.segments.last(), b.segments.first(), b.segments.last())
        else {
            return ThinZoneKind::Butterfly;
        };
        let peak = GAP_FACTOR * thickness;
        let after_a = self.length(&self.between(a.loop_index, a_last, b_first)) <= peak;
        let before_a = self.length(&self.between(a.loop_index, b_last, a_first)) <= peak;
        match (before_a, after_a) {
            (true, true) => ThinZoneKind::Global,
            (true, false) => ThinZoneKind::PeakStart,
            (false, true) => ThinZoneKind::PeakEnd,
            (false, false) => ThinZoneKind::Butterfly,
        }
    }

    fn zone_side(&self, side: &Side, length: f64) -> ThinZoneSide {
        let mut edges: Vec<EdgeId> = Vec::new();
        for s in &side.segments {
            let e = self.segments[*s].edge;
            if !edges.contains(&e) {
                edges.push(e);
            }
        }
        ThinZoneSide { loop_index: side.loop_index, segments: side.segments.clone(), edges, length }
    }

    /// Pairs every loop point bounding a linked segment with the nearest
    /// loop point of the facing segment.
    fn node_pairs(&self, segments: &[usize]) -> Vec<[LoopPoint; 2]> {
        let mut pairs: Vec<[LoopPoint; 2]> = Vec::new();
        for s in segments {
            let seg = &self.segments[*s];
            let Some(c) = seg.close_segment else {
                continue;
            };
            let mut nodes = Vec::with_capacity(2);
            if seg.piece == 0 {
                nodes.push(self.loop_point(seg.loop_index, seg.loop_segment));
            }
            if seg.piece + 1 == seg.piece_count {
                nodes.push(self.loop_point(seg.loop_index, seg.loop_segment + 1));
            }
            let opposite = &self.segments[c];
            let candidates = [
                self.loop_point(opposite.loop_index, opposite.loop_segment),
                self.loop_point(opposite.loop_index, opposite.loop_segment + 1),
            ];
            for node in nodes {
                let p = self.loop_points[node.0][node.1];
                let best = candidates
                    .iter()
                    .copied()
                    .min_by(|x, y| {
                        p.distance(self.loop_points[x.0][x.1]).total_cmp(&p.distance(self.loop_points[y.0][y.1]))
                    })
                    .unwrap_or(candidates[0]);
                if p.distance(self.loop_points[best.0][best.1]) > 2.0 * self.tolerance {
                    continue;
                }
                let pair = if node <= best { [node, best] } else { [best, node] };
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    fn loop_point(&self, loop_index: usize, index: usize) -> LoopPoint {
        let count = self.loop_points[loop_index].len() - 1;
        (loop_index, index % count)
    }

    #[must_use]
    pub fn loop_length(&self, loop_index: usize) -> f64 {
        self.loop_lengths[loop_index]
    }
}

/// Flags the edges of every zone on the topology.
pub fn mark_thin_zones(arena: &mut TopoArena, zones: &[ThinZone]) {
    for zone in zones {
        for edge in zone.edges() {
            arena.mark_edge(edge, StatusFlags::THIN_ZONE);
        }
        for edge in zone.peak_edges() {
            arena.mark_edge(edge, StatusFlags::THIN_PEAK);
        }
    }
}
