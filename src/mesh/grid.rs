//! Parametric sampling grid of a face.
//!
//! The grid is the tensor product of one set of cutting coordinates per axis.
//! Every grid point carries its 3D position and normal, an inside/outside
//! flag, and a near-loop flag. Points too close to a loop are discarded so
//! that the triangulator never has to build slivers against the boundary.
//!
//! Points are indexed `i + j * nu`, `i` running along U.

use serde::Serialize;

use crate::geom::{Iso, PerIso, Point3, Surface, Tolerance, UvBoundary, UvPoint, Vec3, project_on_segment, signed_area};
use crate::mesh::config::MesherConfig;
use crate::mesh::edge_mesher::LoopSampling;
use crate::mesh::error::GridError;
use crate::topo::{EdgeId, FaceId};

/// Samples used to measure the mid iso-lines.
const ISO_LINE_SAMPLES: usize = 64;
/// Upper bound on the number of criteria cuts per axis.
const MAX_CUTS_PER_AXIS: usize = 512;
/// A grid point is dropped when its normalized distance to a loop is below this.
const LOOP_PROXIMITY_RADIUS: f64 = 1.0 / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GridSpace {
    /// Raw surface parameters.
    Default2D,
    /// Each axis rescaled by the mean 3D length of its iso-lines.
    UniformScaled,
    /// Cumulative 3D arc length along the most irregular axis.
    Scaled,
}

impl GridSpace {
    pub const ALL: [GridSpace; 3] = [GridSpace::Default2D, GridSpace::UniformScaled, GridSpace::Scaled];

    const fn index(self) -> usize {
        match self {
            GridSpace::Default2D => 0,
            GridSpace::UniformScaled => 1,
            GridSpace::Scaled => 2,
        }
    }
}

/// Loop of a face as seen by the grid: closed, outer loop counter-clockwise,
/// inner loops clockwise.
#[derive(Debug, Clone)]
pub struct GridLoop {
    points: [Vec<UvPoint>; 3],
    vertex_ids: Vec<usize>,
    edges: Vec<EdgeId>,
}

impl GridLoop {
    /// Closed polyline in `space`: the last point repeats the first.
    #[must_use]
    pub fn points(&self, space: GridSpace) -> &[UvPoint] {
        &self.points[space.index()]
    }

    #[must_use]
    pub fn vertex_ids(&self) -> &[usize] {
        &self.vertex_ids
    }

    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    face: FaceId,
    cuts: PerIso<Vec<f64>>,
    nu: usize,
    nv: usize,
    points2d: [Vec<UvPoint>; 3],
    points3d: Vec<Point3>,
    normals: Vec<Vec3>,
    inside: Vec<bool>,
    near_loop: Vec<bool>,
    loops: Vec<GridLoop>,
    min_element_size: f64,
    max_element_size: f64,
    removed_near_loop: usize,
}

impl Grid {
    /// Builds the grid of `face` from its loop samplings, outer loop first.
    pub fn build(
        face: FaceId,
        surface: &dyn Surface,
        samplings: Vec<LoopSampling>,
        config: &MesherConfig,
    ) -> Result<Self, GridError> {
        if samplings.is_empty() {
            return Err(GridError::NoOuterLoop(face));
        }
        let mut loops = Vec::with_capacity(samplings.len());
        for (index, sampling) in samplings.into_iter().enumerate() {
            loops.push(orient_loop(face, index, sampling)?);
        }
        let outer: &[UvPoint] = &loops[0].0;
        let boundary = UvBoundary::from_points(outer).ok_or(GridError::NoOuterLoop(face))?;

        let mut preferred: PerIso<Vec<f64>> = PerIso::new(Vec::new(), Vec::new());
        for (points, _, _) in &loops {
            for p in points {
                preferred.u.push(p.u);
                preferred.v.push(p.v);
            }
        }

        let mut cuts = PerIso::new(Vec::new(), Vec::new());
        for iso in Iso::BOTH {
            cuts[iso] = cutting_coordinates(surface, boundary, iso, config, &mut preferred[iso]);
        }

        let iso_tolerance = surface.iso_tolerances(config.tolerance);
        for iso in Iso::BOTH {
            let max_delta = cuts[iso].windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max);
            if max_delta < iso_tolerance[iso] {
                return Err(GridError::Degenerate {
                    face,
                    axis: if iso == Iso::IsoU { "U" } else { "V" },
                    delta: max_delta,
                    tolerance: iso_tolerance[iso],
                });
            }
        }

        let nu = cuts.u.len();
        let nv = cuts.v.len();
        let mut default2d = Vec::with_capacity(nu * nv);
        for v in &cuts.v {
            for u in &cuts.u {
                default2d.push(UvPoint::new(*u, *v));
            }
        }
        let points3d: Vec<Point3> = default2d.iter().map(|uv| surface.point_at(*uv)).collect();
        let normals: Vec<Vec3> = default2d
            .iter()
            .map(|uv| surface.normal_at(*uv).unwrap_or(Vec3::ZERO))
            .collect();

        let mut grid = Self {
            face,
            cuts,
            nu,
            nv,
            points2d: [default2d, Vec::new(), Vec::new()],
            points3d,
            normals,
            inside: vec![false; nu * nv],
            near_loop: vec![false; nu * nv],
            loops: loops
                .into_iter()
                .map(|(points, vertex_ids, edges)| GridLoop {
                    points: [points, Vec::new(), Vec::new()],
                    vertex_ids,
                    edges,
                })
                .collect(),
            min_element_size: 0.0,
            max_element_size: 0.0,
            removed_near_loop: 0,
        };

        grid.classify_inside();
        grid.mark_points_near_loops();
        grid.remove_points_close_to_loops();
        grid.scale();
        grid.compute_element_sizes(config.tolerance);
        log::debug!(
            "{face}: grid {nu}x{nv}, {} inner points, {} dropped near loops",
            grid.inner_point_count(),
            grid.removed_near_loop
        );
        Ok(grid)
    }

    #[must_use]
    pub fn face(&self) -> FaceId {
        self.face
    }

    #[must_use]
    pub fn cuts(&self, iso: Iso) -> &[f64] {
        &self.cuts[iso]
    }

    #[must_use]
    pub fn cut_count(&self, iso: Iso) -> usize {
        self.cuts[iso].len()
    }

    #[must_use]
    pub fn nu(&self) -> usize {
        self.nu
    }

    #[must_use]
    pub fn nv(&self) -> usize {
        self.nv
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nu * self.nv
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn index(&self, i: usize, j: usize) -> usize {
        i + j * self.nu
    }

    #[must_use]
    pub fn ij(&self, index: usize) -> (usize, usize) {
        (index % self.nu, index / self.nu)
    }

    #[must_use]
    pub fn uv(&self, space: GridSpace, index: usize) -> UvPoint {
        self.points2d[space.index()][index]
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Point3 {
        self.points3d[index]
    }

    #[must_use]
    pub fn normal(&self, index: usize) -> Vec3 {
        self.normals[index]
    }

    /// Inside the face and far enough from every loop.
    #[must_use]
    pub fn is_inner(&self, index: usize) -> bool {
        self.inside[index]
    }

    #[must_use]
    pub fn is_near_loop(&self, index: usize) -> bool {
        self.near_loop[index]
    }

    #[must_use]
    pub fn inner_point_count(&self) -> usize {
        self.inside.iter().filter(|b| **b).count()
    }

    #[must_use]
    pub fn loops(&self) -> &[GridLoop] {
        &self.loops
    }

    #[must_use]
    pub fn min_element_size(&self) -> f64 {
        self.min_element_size
    }

    #[must_use]
    pub fn max_element_size(&self) -> f64 {
        self.max_element_size
    }

    /// Smallest spacing between consecutive cuts in `space`, over both axes.
    #[must_use]
    pub fn min_delta(&self, space: GridSpace) -> f64 {
        let mut min = f64::INFINITY;
        for i in 0..self.nu.saturating_sub(1) {
            min = min.min(self.uv(space, i + 1).u - self.uv(space, i).u);
        }
        for j in 0..self.nv.saturating_sub(1) {
            min = min.min(self.uv(space, self.index(0, j + 1)).v - self.uv(space, self.index(0, j)).v);
        }
        min
    }

    /// Cell `(i, j)` holding `uv` (Default2D), clamped to the grid.
    #[must_use]
    pub fn cell_of(&self, uv: UvPoint) -> (usize, usize) {
        (cell_index(&self.cuts.u, uv.u), cell_index(&self.cuts.v, uv.v))
    }

    /// Maps a Default2D point into `space` by bilinear interpolation in its cell.
    #[must_use]
    pub fn transform(&self, space: GridSpace, uv: UvPoint) -> UvPoint {
        if space == GridSpace::Default2D {
            return uv;
        }
        let (i, j) = self.cell_of(uv);
        let a = fraction(&self.cuts.u, i, uv.u);
        let b = fraction(&self.cuts.v, j, uv.v);
        let p00 = self.uv(space, self.index(i, j));
        let p10 = self.uv(space, self.index(i + 1, j));
        let p01 = self.uv(space, self.index(i, j + 1));
        let p11 = self.uv(space, self.index(i + 1, j + 1));
        p00 * ((1.0 - a) * (1.0 - b)) + p10 * (a * (1.0 - b)) + p01 * ((1.0 - a) * b) + p11 * (a * b)
    }

    // ── classification ──────────────────────────────────────────────────────

    /// Four parity rays per point; inside needs at least three odd counts.
    fn classify_inside(&mut self) {
        let points = &self.points2d[0];
        for (index, p) in points.iter().enumerate() {
            let mut crossings = [0_u32; 4];
            for l in &self.loops {
                for w in l.points[0].windows(2) {
                    let (a, b) = (w[0], w[1]);
                    if (a.v > p.v) != (b.v > p.v) {
                        let u = a.u + (p.v - a.v) * (b.u - a.u) / (b.v - a.v);
                        if u > p.u {
                            crossings[0] += 1;
                        } else if u < p.u {
                            crossings[1] += 1;
                        }
                    }
                    if (a.u > p.u) != (b.u > p.u) {
                        let v = a.v + (p.u - a.u) * (b.v - a.v) / (b.u - a.u);
                        if v > p.v {
                            crossings[2] += 1;
                        } else if v < p.v {
                            crossings[3] += 1;
                        }
                    }
                }
            }
            let odd = crossings.iter().filter(|c| *c % 2 == 1).count();
            self.inside[index] = odd >= 3;
        }
    }

    /// Walks every loop segment through the cells it crosses and flags the
    /// points around each crossed cell.
    fn mark_points_near_loops(&mut self) {
        let mut crossed = vec![false; (self.nu - 1) * (self.nv - 1)];
        let cells_u = self.nu - 1;
        for l in &self.loops {
            for w in l.points[0].windows(2) {
                for (i, j) in cells_along(&self.cuts, w[0], w[1]) {
                    crossed[i + j * cells_u] = true;
                }
            }
        }
        for (cell, hit) in crossed.iter().enumerate() {
            if !hit {
                continue;
            }
            let (ci, cj) = (cell % cells_u, cell / cells_u);
            for j in cj.saturating_sub(1)..=(cj + 2).min(self.nv - 1) {
                for i in ci.saturating_sub(1)..=(ci + 2).min(self.nu - 1) {
                    let index = self.index(i, j);
                    self.near_loop[index] = true;
                }
            }
        }
    }

    /// Drops inside points whose distance to a loop, normalized by the local
    /// half-span of the neighbouring cuts, is below a third of a cell.
    fn remove_points_close_to_loops(&mut self) {
        struct Segment {
            a: UvPoint,
            b: UvPoint,
            min_weight: f64,
            max_weight: f64,
        }
        let mut segments: Vec<Segment> = self
            .loops
            .iter()
            .flat_map(|l| l.points[0].windows(2))
            .map(|w| {
                let (wa, wb) = (w[0].u + w[0].v, w[1].u + w[1].v);
                Segment { a: w[0], b: w[1], min_weight: wa.min(wb), max_weight: wa.max(wb) }
            })
            .collect();
        segments.sort_by(|x, y| x.min_weight.total_cmp(&y.min_weight));

        let delta_u = half_spans(&self.cuts.u);
        let delta_v = half_spans(&self.cuts.v);
        let r2 = LOOP_PROXIMITY_RADIUS * LOOP_PROXIMITY_RADIUS;
        for index in 0..self.len() {
            if !(self.inside[index] && self.near_loop[index]) {
                continue;
            }
            let (i, j) = self.ij(index);
            let p = self.points2d[0][index];
            let (du, dv) = (delta_u[i], delta_v[j]);
            let weight = p.u + p.v;
            let reach = du + dv;
            for s in &segments {
                if s.min_weight > weight + reach {
                    break;
                }
                if s.max_weight < weight - reach {
                    continue;
                }
                let (q, _) = project_on_segment(p, s.a, s.b);
                let nu = (p.u - q.u) / du;
                let nv = (p.v - q.v) / dv;
                if nu * nu + nv * nv <= r2 {
                    self.inside[index] = false;
                    self.removed_near_loop += 1;
                    break;
                }
            }
        }
    }

    // ── scaling ─────────────────────────────────────────────────────────────

    fn scale(&mut self) {
        let (nu, nv) = (self.nu, self.nv);
        let row_lengths: Vec<f64> = (0..nv)
            .map(|j| (0..nu - 1).map(|i| self.edge_length(self.index(i, j), self.index(i + 1, j))).sum())
            .collect();
        let col_lengths: Vec<f64> = (0..nu)
            .map(|i| (0..nv - 1).map(|j| self.edge_length(self.index(i, j), self.index(i, j + 1))).sum())
            .collect();

        let factor = |lengths: &[f64], cuts: &[f64]| {
            let span = cuts[cuts.len() - 1] - cuts[0];
            let f = mean(lengths) / span;
            if f.is_finite() && f > Tolerance::ZERO_LENGTH.eps { f } else { 1.0 }
        };
        let fu = factor(&row_lengths, &self.cuts.u);
        let fv = factor(&col_lengths, &self.cuts.v);

        let uniform: Vec<UvPoint> = self.points2d[0].iter().map(|p| UvPoint::new(p.u * fu, p.v * fv)).collect();

        // Cumulative arc length along the axis whose iso-line lengths vary
        // most, anchored on the middle iso-line.
        let along_u = std_deviation(&row_lengths) >= std_deviation(&col_lengths);
        let mut scaled = uniform.clone();
        if along_u {
            let mid = nu / 2;
            for j in 0..nv {
                let mut cumulative = vec![0.0; nu];
                for i in 1..nu {
                    cumulative[i] = cumulative[i - 1] + self.edge_length(self.index(i - 1, j), self.index(i, j));
                }
                let anchor = uniform[self.index(mid, j)].u;
                for i in 0..nu {
                    scaled[self.index(i, j)].u = anchor + cumulative[i] - cumulative[mid];
                }
            }
        } else {
            let mid = nv / 2;
            for i in 0..nu {
                let mut cumulative = vec![0.0; nv];
                for j in 1..nv {
                    cumulative[j] = cumulative[j - 1] + self.edge_length(self.index(i, j - 1), self.index(i, j));
                }
                let anchor = uniform[self.index(i, mid)].v;
                for j in 0..nv {
                    scaled[self.index(i, j)].v = anchor + cumulative[j] - cumulative[mid];
                }
            }
        }
        self.points2d[1] = uniform;
        self.points2d[2] = scaled;

        for k in 0..self.loops.len() {
            for space in [GridSpace::UniformScaled, GridSpace::Scaled] {
                let transformed: Vec<UvPoint> =
                    self.loops[k].points[0].iter().map(|p| self.transform(space, *p)).collect();
                self.loops[k].points[space.index()] = transformed;
            }
        }
    }

    fn edge_length(&self, a: usize, b: usize) -> f64 {
        self.points3d[a].distance_to(self.points3d[b])
    }

    fn compute_element_sizes(&mut self, tolerance: f64) {
        let mut min = f64::INFINITY;
        let mut max: f64 = 0.0;
        for j in 0..self.nv {
            for i in 0..self.nu {
                let here = self.index(i, j);
                let mut visit = |len: f64| {
                    if len > tolerance {
                        min = min.min(len);
                    }
                    max = max.max(len);
                };
                if i + 1 < self.nu {
                    visit(self.edge_length(here, self.index(i + 1, j)));
                }
                if j + 1 < self.nv {
                    visit(self.edge_length(here, self.index(i, j + 1)));
                }
            }
        }
        self.min_element_size = if min.is_finite() { min } else { max };
        self.max_element_size = max;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loops
// ─────────────────────────────────────────────────────────────────────────────

type OrientedLoop = (Vec<UvPoint>, Vec<usize>, Vec<EdgeId>);

/// Removes consecutive duplicates and orients the loop: the first one
/// counter-clockwise, the others clockwise.
fn orient_loop(face: FaceId, index: usize, sampling: LoopSampling) -> Result<OrientedLoop, GridError> {
    let LoopSampling { uvs, vertex_ids, edges } = sampling;
    let mut points: Vec<UvPoint> = Vec::with_capacity(uvs.len());
    let mut ids: Vec<usize> = Vec::with_capacity(uvs.len());
    let mut segment_edges: Vec<EdgeId> = Vec::with_capacity(edges.len());
    for (k, uv) in uvs.iter().enumerate() {
        if let Some(last) = points.last() {
            if last.distance(*uv) <= Tolerance::SMALL_NUMBER.eps {
                // Keep the closing point exact.
                if k + 1 == uvs.len() {
                    let n = points.len();
                    points[n - 1] = *uv;
                    ids[n - 1] = vertex_ids[k];
                }
                continue;
            }
            segment_edges.push(edges[k - 1]);
        }
        points.push(*uv);
        ids.push(vertex_ids[k]);
    }
    // Distinct points exclude the closing repeat.
    if points.len() < 4 {
        return Err(GridError::EmptyLoop { face, loop_index: index });
    }

    let ccw = signed_area(&points) > 0.0;
    if ccw != (index == 0) {
        points.reverse();
        ids.reverse();
        segment_edges.reverse();
    }
    Ok((points, ids, segment_edges))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cutting coordinates
// ─────────────────────────────────────────────────────────────────────────────

/// Criteria-driven cuts along `iso`, snapped to the loop coordinates so
/// shared boundaries keep their discretisation.
fn cutting_coordinates(
    surface: &dyn Surface,
    boundary: UvBoundary,
    iso: Iso,
    config: &MesherConfig,
    preferred: &mut Vec<f64>,
) -> Vec<f64> {
    let span = boundary.get(iso);
    let other_mid = boundary.get(iso.other()).middle();
    let at = |t: f64| match iso {
        Iso::IsoU => UvPoint::new(t, other_mid),
        Iso::IsoV => UvPoint::new(other_mid, t),
    };

    let mut params = Vec::with_capacity(ISO_LINE_SAMPLES + 1);
    let mut lengths = Vec::with_capacity(ISO_LINE_SAMPLES + 1);
    let mut total = 0.0;
    let mut previous = surface.point_at(at(span.min));
    for k in 0..=ISO_LINE_SAMPLES {
        let t = span.lerp(k as f64 / ISO_LINE_SAMPLES as f64);
        let p = surface.point_at(at(t));
        total += previous.distance_to(p);
        previous = p;
        params.push(t);
        lengths.push(total);
    }

    let mut count = if config.max_edge_length.is_finite() {
        ((total / config.max_edge_length).ceil() as usize).clamp(1, MAX_CUTS_PER_AXIS)
    } else {
        1
    };
    while count < MAX_CUTS_PER_AXIS && max_sag(surface, &params, &lengths, count, &at) > config.chord_error {
        count *= 2;
    }

    let mut cuts = Vec::with_capacity(count + 1);
    cuts.push(span.min);
    for k in 1..count {
        cuts.push(param_at_length(&params, &lengths, total * k as f64 / count as f64));
    }
    cuts.push(span.max);

    preferred.sort_by(f64::total_cmp);
    preferred.dedup_by(|a, b| (*a - *b).abs() <= Tolerance::SMALL_NUMBER.eps);
    if !preferred.is_empty() {
        for k in 1..count {
            let spacing = 0.5 * (cuts[k] - cuts[k - 1]).min(cuts[k + 1] - cuts[k]);
            if let Some(p) = nearest(preferred, cuts[k]) {
                if (p - cuts[k]).abs() <= spacing {
                    cuts[k] = p;
                }
            }
        }
    }
    cuts.sort_by(f64::total_cmp);
    cuts.dedup_by(|a, b| (*a - *b).abs() <= Tolerance::SMALL_NUMBER.eps);
    cuts
}

fn max_sag(
    surface: &dyn Surface,
    params: &[f64],
    lengths: &[f64],
    count: usize,
    at: &dyn Fn(f64) -> UvPoint,
) -> f64 {
    let total = lengths[lengths.len() - 1];
    let mut sag: f64 = 0.0;
    for k in 0..count {
        let t0 = param_at_length(params, lengths, total * k as f64 / count as f64);
        let t1 = param_at_length(params, lengths, total * (k + 1) as f64 / count as f64);
        let p0 = surface.point_at(at(t0));
        let p1 = surface.point_at(at(t1));
        let pm = surface.point_at(at(0.5 * (t0 + t1)));
        sag = sag.max(pm.distance_to(p0.lerp(p1, 0.5)));
    }
    sag
}

fn param_at_length(params: &[f64], lengths: &[f64], target: f64) -> f64 {
    let k = lengths.partition_point(|l| *l < target).clamp(1, lengths.len() - 1);
    let (l0, l1) = (lengths[k - 1], lengths[k]);
    let s = if l1 > l0 { (target - l0) / (l1 - l0) } else { 0.0 };
    params[k - 1] + s * (params[k] - params[k - 1])
}

fn nearest(sorted: &[f64], x: f64) -> Option<f64> {
    let k = sorted.partition_point(|p| *p < x);
    let below = k.checked_sub(1).map(|i| sorted[i]);
    let above = sorted.get(k).copied();
    match (below, above) {
        (Some(b), Some(a)) => Some(if x - b <= a - x { b } else { a }),
        (b, a) => b.or(a),
    }
}

/// Half-span of the neighbouring cuts at each coordinate, or the single
/// adjacent delta at both ends.
fn half_spans(cuts: &[f64]) -> Vec<f64> {
    let n = cuts.len();
    (0..n)
        .map(|i| {
            if i == 0 {
                cuts[1] - cuts[0]
            } else if i == n - 1 {
                cuts[n - 1] - cuts[n - 2]
            } else {
                0.5 * (cuts[i + 1] - cuts[i - 1])
            }
        })
        .collect()
}

fn cell_index(cuts: &[f64], x: f64) -> usize {
    cuts.partition_point(|c| *c <= x).saturating_sub(1).min(cuts.len() - 2)
}

fn fraction(cuts: &[f64], i: usize, x: f64) -> f64 {
    let d = cuts[i + 1] - cuts[i];
    if d > 0.0 { (x - cuts[i]) / d } else { 0.0 }
}

/// Cells crossed by the segment `[a, b]`, found by stepping through its
/// crossings with the cutting lines.
fn cells_along(cuts: &PerIso<Vec<f64>>, a: UvPoint, b: UvPoint) -> Vec<(usize, usize)> {
    let mut params = vec![0.0, 1.0];
    for (iso, from, to) in [(Iso::IsoU, a.u, b.u), (Iso::IsoV, a.v, b.v)] {
        let (lo, hi) = (from.min(to), from.max(to));
        let c = &cuts[iso];
        let start = c.partition_point(|x| *x < lo);
        for x in &c[start..] {
            if *x > hi {
                break;
            }
            if to != from {
                params.push((x - from) / (to - from));
            }
        }
    }
    params.sort_by(f64::total_cmp);
    let mut cells = Vec::with_capacity(params.len());
    for w in params.windows(2) {
        let mid = a + (b - a) * (0.5 * (w[0] + w[1]));
        let cell = (cell_index(&cuts.u, mid.u), cell_index(&cuts.v, mid.v));
        if cells.last() != Some(&cell) {
            cells.push(cell);
        }
    }
    // Endpoints lying on a cutting line also touch the cells on the other side.
    for p in [a, b] {
        let cell = (cell_index(&cuts.u, p.u), cell_index(&cuts.v, p.v));
        if !cells.contains(&cell) {
            cells.push(cell);
        }
    }
    cells
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_deviation(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / values.len().max(1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PlaneSurface;

    fn closed(points: &[UvPoint], first_id: usize) -> LoopSampling {
        let mut uvs = points.to_vec();
        uvs.push(points[0]);
        let mut vertex_ids: Vec<usize> = (first_id..first_id + points.len()).collect();
        vertex_ids.push(first_id);
        LoopSampling { uvs, vertex_ids, edges: vec![EdgeId(0); points.len()] }
    }

    fn square(min: f64, max: f64, steps: usize) -> Vec<UvPoint> {
        let mut pts = Vec::new();
        let d = (max - min) / steps as f64;
        for k in 0..steps {
            pts.push(UvPoint::new(min + d * k as f64, min));
        }
        for k in 0..steps {
            pts.push(UvPoint::new(max, min + d * k as f64));
        }
        for k in 0..steps {
            pts.push(UvPoint::new(max - d * k as f64, max));
        }
        for k in 0..steps {
            pts.push(UvPoint::new(min, max - d * k as f64));
        }
        pts
    }

    #[test]
    fn cut_index_helpers() {
        let cuts = [0.0, 0.25, 0.5, 1.0];
        assert_eq!(cell_index(&cuts, -1.0), 0);
        assert_eq!(cell_index(&cuts, 0.3), 1);
        assert_eq!(cell_index(&cuts, 1.0), 2);
        assert_eq!(half_spans(&cuts), vec![0.25, 0.25, 0.375, 0.5]);
        assert_eq!(nearest(&[0.1, 0.4, 0.9], 0.6), Some(0.4));
    }

    #[test]
    fn square_with_hole_keeps_eight_inner_points() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let outer = closed(&square(0.0, 1.0, 4), 0);
        let mut hole_points = square(0.4, 0.6, 1);
        hole_points.reverse();
        let hole = closed(&hole_points, 100);
        let config = MesherConfig::default().with_max_edge_length(0.25);
        let grid = Grid::build(FaceId(0), &plane, vec![outer, hole], &config).unwrap();

        assert_eq!(grid.cut_count(Iso::IsoU), 5);
        assert_eq!(grid.cut_count(Iso::IsoV), 5);
        assert_eq!(grid.inner_point_count(), 8);
        assert!(!grid.is_inner(grid.index(2, 2)));
        assert!(grid.is_inner(grid.index(1, 2)));
        assert!(signed_area(grid.loops()[0].points(GridSpace::Default2D)) > 0.0);
        assert!(signed_area(grid.loops()[1].points(GridSpace::Default2D)) < 0.0);
        assert!((grid.min_element_size() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn unit_plane_scaled_spaces_match_parameters() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let config = MesherConfig::default().with_max_edge_length(0.5);
        let grid = Grid::build(FaceId(0), &plane, vec![closed(&square(0.0, 1.0, 2), 0)], &config).unwrap();
        for index in 0..grid.len() {
            let p = grid.uv(GridSpace::Default2D, index);
            assert!(grid.uv(GridSpace::UniformScaled, index).distance(p) < 1e-9);
            assert!(grid.uv(GridSpace::Scaled, index).distance(p) < 1e-9);
        }
        let mid = grid.transform(GridSpace::UniformScaled, UvPoint::new(0.3, 0.7));
        assert!(mid.distance(UvPoint::new(0.3, 0.7)) < 1e-9);
    }

    #[test]
    fn flat_loop_is_degenerate() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let thin = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(0.5, 1e-9)];
        let err = Grid::build(FaceId(2), &plane, vec![closed(&thin, 0)], &MesherConfig::default());
        assert!(matches!(err, Err(GridError::Degenerate { axis: "V", .. })));
    }

    #[test]
    fn collapsed_loop_is_rejected() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let pts = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)];
        let err = Grid::build(FaceId(1), &plane, vec![closed(&pts, 0)], &MesherConfig::default());
        assert_eq!(err.unwrap_err(), GridError::EmptyLoop { face: FaceId(1), loop_index: 0 });
    }
}
