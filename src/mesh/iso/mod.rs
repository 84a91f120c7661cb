//! Triangulation of a face from its grid and its boundary loops.
//!
//! Nodes are the loop samples and the grid points kept inside the face, all
//! expressed in uniformly scaled space. Segments are added in phases, each
//! candidate checked against the segments already placed so that the graph
//! stays planar. The faces of the graph are then walked and tessellated;
//! complete grid cells are split directly into two triangles.

mod cell;
mod cycle;
mod intersection;
mod node;
mod slope;

pub use cell::{Cell, build_cells, sub_loop_candidates};
pub use cycle::{FLAT_TRIANGLE_QUALITY, is_flat, mesh_cycle, sorted_neighbours, triangle_quality, walk_cycles};
pub use intersection::{IntersectionTool, segments_intersect};
pub use node::{IsoNode, IsoSegment, NodeKind, SegmentKind};
pub use slope::{FLAT_ANGLE, MAX_SLOPE_TO_BE_ISO, is_inside_sector, is_iso, iso_deviation, relative_slope, slope};

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use crate::geom::{Iso, Point3, UvPoint, Vec3, project_on_segment};
use crate::mesh::config::MesherConfig;
use crate::mesh::diagnostics::MeshDiagnostics;
use crate::mesh::error::MeshError;
use crate::mesh::grid::{Grid, GridSpace};
use crate::mesh::model::{FaceMesh, MeshModel};
use crate::mesh::thin_zone::ThinZone;
use crate::topo::FaceId;

/// Nodes of the main component tried per node when reconnecting a component.
const RECONNECT_CANDIDATES: usize = 8;
/// Weight of the secondary coordinate when ordering loop nodes along an axis,
/// relative to the smallest grid step.
const ORDER_WEIGHT: f64 = 1e-3;
/// Distance to a segment, relative to its length, under which a node lies on it.
const ON_SEGMENT_EPS: f64 = 1e-9;

fn key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Largest step between consecutive grid lines in `space`.
fn max_step(grid: &Grid, space: GridSpace) -> f64 {
    let mut max: f64 = 0.0;
    for i in 0..grid.nu().saturating_sub(1) {
        max = max.max(grid.uv(space, i + 1).u - grid.uv(space, i).u);
    }
    for j in 0..grid.nv().saturating_sub(1) {
        max = max.max(grid.uv(space, grid.index(0, j + 1)).v - grid.uv(space, grid.index(0, j)).v);
    }
    max
}

pub struct IsoTriangulator<'a> {
    grid: &'a Grid,
    zones: &'a [ThinZone],
    config: &'a MesherConfig,
    nodes: Vec<IsoNode>,
    segments: Vec<IsoSegment>,
    known: HashSet<(usize, usize)>,
    loop_ranges: Vec<Range<usize>>,
    inner_of_grid: Vec<Option<usize>>,
    complete: Vec<bool>,
    loop_tool: IntersectionTool,
    bridge_tool: IntersectionTool,
    inner_tool: IntersectionTool,
    /// Grid line coordinates in uniformly scaled space.
    lines_u: Vec<f64>,
    lines_v: Vec<f64>,
    max_step: f64,
    diagnostics: MeshDiagnostics,
}

impl<'a> IsoTriangulator<'a> {
    #[must_use]
    pub fn new(grid: &'a Grid, zones: &'a [ThinZone], config: &'a MesherConfig) -> Self {
        Self {
            grid,
            zones,
            config,
            nodes: Vec::new(),
            segments: Vec::new(),
            known: HashSet::new(),
            loop_ranges: Vec::new(),
            inner_of_grid: Vec::new(),
            complete: Vec::new(),
            loop_tool: IntersectionTool::new(),
            bridge_tool: IntersectionTool::new(),
            inner_tool: IntersectionTool::new(),
            lines_u: (0..grid.nu()).map(|i| grid.uv(GridSpace::UniformScaled, i).u).collect(),
            lines_v: (0..grid.nv()).map(|j| grid.uv(GridSpace::UniformScaled, grid.index(0, j)).v).collect(),
            max_step: max_step(grid, GridSpace::UniformScaled),
            diagnostics: MeshDiagnostics::new(),
        }
    }

    #[must_use]
    pub fn face(&self) -> FaceId {
        self.grid.face()
    }

    #[must_use]
    pub fn nodes(&self) -> &[IsoNode] {
        &self.nodes
    }

    #[must_use]
    pub fn segments(&self) -> &[IsoSegment] {
        &self.segments
    }

    /// Meshes the face, registering the inner points used by the triangles.
    pub fn triangulate(mut self, model: &MeshModel) -> Result<(FaceMesh, MeshDiagnostics), MeshError> {
        self.build_graph()?;
        let triangles = self.tessellate();
        Ok(self.finish(model, &triangles))
    }

    /// Places every segment of the graph, without tessellating it.
    pub fn build_graph(&mut self) -> Result<(), MeshError> {
        self.create_nodes();
        self.add_loop_segments()?;
        self.add_thin_zone_segments();
        self.add_inner_segments();
        self.classify_cells();
        self.add_iso_bridges();
        self.add_inner_to_loop();
        self.complete_cells();
        self.connect_components()?;
        log::debug!(
            "{}: {} nodes, {} segments, {} rejected candidates",
            self.face(),
            self.nodes.len(),
            self.segments.iter().filter(|s| s.active).count(),
            self.diagnostics.rejected_segments
        );
        Ok(())
    }

    // ── nodes ───────────────────────────────────────────────────────────────

    fn create_nodes(&mut self) {
        let grid = self.grid;
        for (loop_index, l) in grid.loops().iter().enumerate() {
            let scaled = l.points(GridSpace::UniformScaled);
            let params = l.points(GridSpace::Default2D);
            let count = scaled.len().saturating_sub(1);
            let begin = self.nodes.len();
            for k in 0..count {
                let cell = grid.cell_of(params[k]);
                self.nodes.push(IsoNode::loop_node(loop_index, k, scaled[k], l.vertex_ids()[k], cell));
            }
            for k in 0..count {
                let node = &mut self.nodes[begin + k];
                node.next = Some(begin + (k + 1) % count);
                node.previous = Some(begin + (k + count - 1) % count);
            }
            self.loop_ranges.push(begin..begin + count);
        }

        self.inner_of_grid = vec![None; grid.len()];
        for index in 0..grid.len() {
            if grid.is_inner(index) {
                self.inner_of_grid[index] = Some(self.nodes.len());
                self.nodes.push(IsoNode::inner_node(index, grid.uv(GridSpace::UniformScaled, index)));
            }
        }
        for index in 0..grid.len() {
            let Some(node) = self.inner_of_grid[index] else {
                continue;
            };
            let (i, j) = grid.ij(index);
            let neighbours = [
                i.checked_sub(1).and_then(|i| self.inner_at(i, j)),
                self.inner_at(i + 1, j),
                j.checked_sub(1).and_then(|j| self.inner_at(i, j)),
                self.inner_at(i, j + 1),
            ];
            self.nodes[node].iso_neighbours = neighbours;
        }
    }

    fn inner_at(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.grid.nu() || j >= self.grid.nv() {
            return None;
        }
        self.inner_of_grid[self.grid.index(i, j)]
    }

    /// Inner nodes at the corners of cell `(i, j)`, counter-clockwise from
    /// the lowest one, when all four exist.
    fn cell_corners(&self, i: usize, j: usize) -> Option<[usize; 4]> {
        Some([self.inner_at(i, j)?, self.inner_at(i + 1, j)?, self.inner_at(i + 1, j + 1)?, self.inner_at(i, j + 1)?])
    }

    fn cell_columns(&self) -> usize {
        self.grid.nu().saturating_sub(1)
    }

    fn is_complete(&self, i: Option<usize>, j: Option<usize>) -> bool {
        let (cu, cv) = (self.cell_columns(), self.grid.nv().saturating_sub(1));
        match (i, j) {
            (Some(i), Some(j)) if i < cu && j < cv => self.complete[i + j * cu],
            _ => false,
        }
    }

    // ── segments ────────────────────────────────────────────────────────────

    fn push_segment(&mut self, a: usize, b: usize, kind: SegmentKind) -> usize {
        let id = self.segments.len();
        self.segments.push(IsoSegment::new(a, b, kind));
        self.known.insert(key(a, b));
        self.nodes[a].segments.push(id);
        self.nodes[b].segments.push(id);
        id
    }

    /// Leaving loop node `at` towards `towards` enters the face.
    fn opens_inside(&self, at: usize, towards: usize) -> bool {
        let node = &self.nodes[at];
        match (node.previous, node.next) {
            (Some(p), Some(n)) => {
                is_inside_sector(node.uv, self.nodes[p].uv, self.nodes[n].uv, self.nodes[towards].uv, FLAT_ANGLE)
            }
            _ => true,
        }
    }

    fn crosses(&self, a: usize, b: usize) -> bool {
        let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
        [&self.loop_tool, &self.bridge_tool, &self.inner_tool].iter().any(|tool| tool.does_intersect([a, b], pa, pb))
            || self.covers_inner_node(a, b)
    }

    /// An inner node other than the ends lies on `[a, b]`. Inner nodes
    /// without segments are not in any intersection tool.
    fn covers_inner_node(&self, a: usize, b: usize) -> bool {
        let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
        let eps = ON_SEGMENT_EPS * pa.distance(pb);
        let range = |lines: &[f64], x: f64, y: f64| {
            lines.partition_point(|l| *l < x.min(y) - eps)..lines.partition_point(|l| *l <= x.max(y) + eps)
        };
        for j in range(&self.lines_v, pa.v, pb.v) {
            for i in range(&self.lines_u, pa.u, pb.u) {
                let Some(n) = self.inner_at(i, j) else {
                    continue;
                };
                if n == a || n == b {
                    continue;
                }
                let p = self.nodes[n].uv;
                let (q, _) = project_on_segment(p, pa, pb);
                if p.distance(q) <= eps {
                    return true;
                }
            }
        }
        false
    }

    /// Adds the segment `[a, b]` if it is new, enters the face at its loop
    /// ends and crosses nothing already placed.
    fn try_add(&mut self, a: usize, b: usize, kind: SegmentKind) -> bool {
        if a == b || self.known.contains(&key(a, b)) {
            return false;
        }
        if !(self.opens_inside(a, b) && self.opens_inside(b, a)) || self.crosses(a, b) {
            self.diagnostics.rejected_segments += 1;
            return false;
        }
        let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
        self.bridge_tool.add([a, b], pa, pb);
        self.push_segment(a, b, kind);
        true
    }

    fn bridge_kind(&self, a: usize, b: usize) -> SegmentKind {
        if self.nodes[a].is_loop() && self.nodes[b].is_loop() {
            SegmentKind::LoopToLoop
        } else {
            SegmentKind::InnerToLoop
        }
    }

    fn are_loop_neighbours(&self, a: usize, b: usize) -> bool {
        self.nodes[a].next == Some(b) || self.nodes[b].next == Some(a)
    }

    fn add_loop_segments(&mut self) -> Result<(), MeshError> {
        for loop_index in 0..self.loop_ranges.len() {
            for a in self.loop_ranges[loop_index].clone() {
                let Some(b) = self.nodes[a].next else {
                    continue;
                };
                let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
                if let Some(hit) = self.loop_tool.find_intersection([a, b], pa, pb) {
                    log::warn!("{}: loop {loop_index} segment {a}-{b} crosses segment {}-{}", self.face(), hit[0], hit[1]);
                    return Err(MeshError::SelfIntersection { face: self.face(), loop_index });
                }
                self.loop_tool.add([a, b], pa, pb);
                self.push_segment(a, b, SegmentKind::Loop);
            }
        }
        Ok(())
    }

    fn add_thin_zone_segments(&mut self) {
        let zones = self.zones;
        for zone in zones {
            for [p, q] in &zone.node_pairs {
                let (Some(ra), Some(rb)) = (self.loop_ranges.get(p.0), self.loop_ranges.get(q.0)) else {
                    continue;
                };
                let (a, b) = (ra.start + p.1, rb.start + q.1);
                if a >= ra.end || b >= rb.end || self.are_loop_neighbours(a, b) {
                    continue;
                }
                if self.try_add(a, b, SegmentKind::ThinZone) {
                    self.nodes[a].thin_zone = true;
                    self.nodes[b].thin_zone = true;
                }
            }
        }
    }

    fn add_inner_segments(&mut self) {
        for a in 0..self.nodes.len() {
            if self.nodes[a].is_loop() {
                continue;
            }
            let [_, plus_u, _, plus_v] = self.nodes[a].iso_neighbours;
            for (b, kind) in [(plus_u, SegmentKind::InnerIsoU), (plus_v, SegmentKind::InnerIsoV)] {
                let Some(b) = b else {
                    continue;
                };
                let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
                if self.loop_tool.does_intersect([a, b], pa, pb) || self.bridge_tool.does_intersect([a, b], pa, pb) {
                    continue;
                }
                self.push_segment(a, b, kind);
            }
        }
    }

    /// Flags the cells meshed as two triangles and records the inner
    /// segments that later candidates may run into.
    fn classify_cells(&mut self) {
        let cu = self.cell_columns();
        let cv = self.grid.nv().saturating_sub(1);
        let mut occupied = vec![false; cu * cv];
        for node in self.nodes.iter().filter(|n| n.is_loop()) {
            if let Some((i, j)) = node.cell {
                occupied[i + j * cu] = true;
            }
        }
        let complete: Vec<bool> = (0..cu * cv)
            .map(|c| {
                let (i, j) = (c % cu, c / cu);
                !occupied[c]
                    && self.cell_corners(i, j).is_some_and(|[c00, c10, c11, c01]| {
                        [(c00, c10), (c10, c11), (c01, c11), (c00, c01)]
                            .iter()
                            .all(|(a, b)| self.known.contains(&key(*a, *b)))
                    })
            })
            .collect();
        self.complete = complete;

        let bordering: Vec<usize> = (0..self.segments.len())
            .filter(|s| {
                let seg = self.segments[*s];
                let Some(index) = self.nodes[seg.first].grid_index() else {
                    return false;
                };
                let (i, j) = self.grid.ij(index);
                let (i, j) = (Some(i), Some(j));
                let complete = match seg.kind {
                    SegmentKind::InnerIsoU => self.is_complete(i, j) && self.is_complete(i, j.and_then(|j| j.checked_sub(1))),
                    SegmentKind::InnerIsoV => self.is_complete(i, j) && self.is_complete(i.and_then(|i| i.checked_sub(1)), j),
                    _ => return false,
                };
                !complete
            })
            .collect();
        for s in bordering {
            let seg = self.segments[s];
            self.inner_tool.add([seg.first, seg.second], self.nodes[seg.first].uv, self.nodes[seg.second].uv);
        }
        log::trace!(
            "{}: {} complete cells, {} inner obstacles",
            self.face(),
            self.complete.iter().filter(|c| **c).count(),
            self.inner_tool.len()
        );
    }

    /// Joins loop nodes that follow each other along an axis and are
    /// iso-aligned.
    fn add_iso_bridges(&mut self) {
        let loop_nodes: Vec<usize> = (0..self.nodes.len()).filter(|n| self.nodes[*n].is_loop()).collect();
        if loop_nodes.len() < 2 {
            return;
        }
        let weight = ORDER_WEIGHT * self.grid.min_delta(GridSpace::UniformScaled);
        let max_length = 2.0 * self.max_step;
        let u_min = loop_nodes.iter().map(|n| self.nodes[*n].uv.u).fold(f64::INFINITY, f64::min);
        let v_min = loop_nodes.iter().map(|n| self.nodes[*n].uv.v).fold(f64::INFINITY, f64::min);

        for iso in Iso::BOTH {
            let mut order = loop_nodes.clone();
            let sort_key = |n: usize| {
                let p = self.nodes[n].uv;
                match iso {
                    Iso::IsoU => p.u + (p.v - v_min) * weight,
                    Iso::IsoV => p.v + (p.u - u_min) * weight,
                }
            };
            order.sort_by(|a, b| sort_key(*a).total_cmp(&sort_key(*b)));
            for w in order.windows(2) {
                let (a, b) = (w[0], w[1]);
                if self.are_loop_neighbours(a, b) {
                    continue;
                }
                let (pa, pb) = (self.nodes[a].uv, self.nodes[b].uv);
                if !is_iso(pa, pb) || pa.distance(pb) > max_length {
                    continue;
                }
                self.try_add(a, b, SegmentKind::LoopToLoop);
            }
        }
    }

    /// Joins every loop node to the inner corners of its cell, nearest first.
    fn add_inner_to_loop(&mut self) {
        for n in 0..self.nodes.len() {
            let Some((i, j)) = self.nodes[n].cell else {
                continue;
            };
            let p = self.nodes[n].uv;
            let mut corners: Vec<usize> =
                [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)].iter().filter_map(|(i, j)| self.inner_at(*i, *j)).collect();
            corners.sort_by(|a, b| p.distance(self.nodes[*a].uv).total_cmp(&p.distance(self.nodes[*b].uv)));
            for corner in corners {
                self.try_add(corner, n, SegmentKind::InnerToLoop);
            }
        }
    }

    /// Bridges the sub-loops sharing a cell, then ties each corner of the
    /// cell to every sub-loop it does not reach yet.
    fn complete_cells(&mut self) {
        let loops: Vec<Vec<usize>> = self.loop_ranges.iter().map(|r| r.clone().collect()).collect();
        let cells = build_cells(&self.nodes, &loops, |i, j| self.inner_at(i, j));
        for cell in &cells {
            if cell.sub_loops.len() > 1 {
                for [a, b] in sub_loop_candidates(&self.nodes, cell, self.config.bridge_policy) {
                    self.try_add(a, b, SegmentKind::LoopToLoop);
                }
            }
            for corner in &cell.corners {
                for run in &cell.sub_loops {
                    if run.iter().any(|n| self.known.contains(&key(*corner, *n))) {
                        continue;
                    }
                    let p = self.nodes[*corner].uv;
                    let mut ordered = run.clone();
                    ordered.sort_by(|a, b| p.distance(self.nodes[*a].uv).total_cmp(&p.distance(self.nodes[*b].uv)));
                    for n in ordered {
                        if self.try_add(*corner, n, SegmentKind::InnerToLoop) {
                            break;
                        }
                    }
                }
            }
        }
    }

    // ── connectivity ────────────────────────────────────────────────────────

    /// Connected groups of nodes owning an active segment, the group of the
    /// first outer loop node first.
    fn components(&self) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        for s in self.segments.iter().filter(|s| s.active) {
            let (a, b) = (find(&mut parent, s.first), find(&mut parent, s.second));
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for n in 0..self.nodes.len() {
            if self.nodes[n].segments.iter().any(|s| self.segments[*s].active) {
                let root = find(&mut parent, n);
                groups.entry(root).or_default().push(n);
            }
        }
        groups.into_values().collect()
    }

    fn attach(&mut self, group: &[usize], main: &[usize]) -> bool {
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for n in group {
            let p = self.nodes[*n].uv;
            let mut near: Vec<(f64, usize, usize)> =
                main.iter().map(|m| (p.distance(self.nodes[*m].uv), *n, *m)).collect();
            if near.len() > RECONNECT_CANDIDATES {
                near.select_nth_unstable_by(RECONNECT_CANDIDATES, |a, b| a.0.total_cmp(&b.0));
                near.truncate(RECONNECT_CANDIDATES);
            }
            candidates.extend(near);
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.into_iter().any(|(_, a, b)| {
            let kind = self.bridge_kind(a, b);
            self.try_add(a, b, kind)
        })
    }

    /// Links every isolated group of segments to the main one. Groups
    /// without loop nodes that cannot be linked are dropped.
    fn connect_components(&mut self) -> Result<(), MeshError> {
        let mut groups = self.components();
        if groups.len() <= 1 {
            return Ok(());
        }
        let mut main = groups.remove(0);
        for group in groups {
            if self.attach(&group, &main) {
                main.extend(group);
                continue;
            }
            if let Some(loop_index) = group.iter().find_map(|n| self.nodes[*n].loop_index()) {
                return Err(MeshError::UnconnectedLoop { face: self.face(), loop_index });
            }
            log::debug!("{}: dropping {} unconnected inner nodes", self.face(), group.len());
            for n in &group {
                for k in 0..self.nodes[*n].segments.len() {
                    let s = self.nodes[*n].segments[k];
                    self.segments[s].active = false;
                }
            }
        }
        Ok(())
    }

    // ── tessellation ────────────────────────────────────────────────────────

    fn is_complete_cell_cycle(&self, cycle: &[usize]) -> bool {
        if cycle.len() != 4 {
            return false;
        }
        let Some(ij) = cycle
            .iter()
            .map(|n| self.nodes[*n].grid_index().map(|g| self.grid.ij(g)))
            .collect::<Option<Vec<(usize, usize)>>>()
        else {
            return false;
        };
        let i = ij.iter().map(|c| c.0).min().unwrap_or(0);
        let j = ij.iter().map(|c| c.1).min().unwrap_or(0);
        self.is_complete(Some(i), Some(j))
            && self.cell_corners(i, j).is_some_and(|corners| corners.iter().all(|c| cycle.contains(c)))
    }

    fn tessellate(&mut self) -> Vec<[usize; 3]> {
        let cu = self.cell_columns();
        let mut triangles = Vec::new();
        for c in 0..self.complete.len() {
            if !self.complete[c] {
                continue;
            }
            if let Some([c00, c10, c11, c01]) = self.cell_corners(c % cu, c / cu) {
                triangles.push([c00, c10, c11]);
                triangles.push([c00, c11, c01]);
            }
        }

        let (cycles, abandoned) = walk_cycles(&self.nodes, &self.segments);
        self.diagnostics.abandoned_cycles += abandoned;
        for cycle in cycles {
            if self.is_complete_cell_cycle(&cycle) {
                continue;
            }
            match mesh_cycle(&self.nodes, &cycle) {
                Some(t) => {
                    let uv = |n: usize| self.nodes[n].uv;
                    let flat = t.iter().filter(|[a, b, c]| is_flat(uv(*a), uv(*b), uv(*c))).count();
                    if flat > 0 {
                        log::warn!("{}: {flat} flat triangles in a cycle of {} nodes", self.face(), cycle.len());
                    }
                    self.diagnostics.degenerate_triangles += flat;
                    triangles.extend(t);
                }
                None => {
                    self.diagnostics.abandoned_cycles += 1;
                    let face = self.face();
                    self.diagnostics.add_warning(format!("{face}: cycle of {} nodes could not be meshed", cycle.len()));
                }
            }
        }
        triangles
    }

    fn finish(mut self, model: &MeshModel, triangles: &[[usize; 3]]) -> (FaceMesh, MeshDiagnostics) {
        let grid = self.grid;
        let mut fresh: Vec<usize> =
            triangles.iter().flatten().copied().filter(|n| self.nodes[*n].pool_index.is_none()).collect();
        fresh.sort_unstable();
        fresh.dedup();
        let indices: Vec<usize> = fresh.iter().filter_map(|n| self.nodes[*n].grid_index()).collect();
        if !indices.is_empty() {
            let points: Vec<Point3> = indices.iter().map(|g| grid.point(*g)).collect();
            let normals: Vec<Vec3> = indices.iter().map(|g| grid.normal(*g)).collect();
            let uvs: Vec<UvPoint> = indices.iter().map(|g| grid.uv(GridSpace::Default2D, *g)).collect();
            let first = model.register(&points, &normals, &uvs);
            for (k, n) in fresh.iter().enumerate() {
                self.nodes[*n].pool_index = Some(first + k);
            }
        }

        let pooled: Vec<[usize; 3]> = triangles
            .iter()
            .filter_map(|[a, b, c]| {
                Some([self.nodes[*a].pool_index?, self.nodes[*b].pool_index?, self.nodes[*c].pool_index?])
            })
            .collect();
        let boundary_cycles: Vec<Vec<usize>> = grid.loops().iter().map(|l| l.vertex_ids().to_vec()).collect();
        let mut vertex_ids: Vec<usize> = pooled.iter().flatten().chain(boundary_cycles.iter().flatten()).copied().collect();
        vertex_ids.sort_unstable();
        vertex_ids.dedup();

        let mut diagnostics = MeshDiagnostics::from_triangles(&pooled);
        diagnostics.rejected_segments = self.diagnostics.rejected_segments;
        diagnostics.abandoned_cycles = self.diagnostics.abandoned_cycles;
        diagnostics.degenerate_triangles = self.diagnostics.degenerate_triangles;
        diagnostics.warnings = std::mem::take(&mut self.diagnostics.warnings);
        log::debug!("{}: {}", self.face(), diagnostics.summary());

        let mesh = FaceMesh { face: self.face(), triangles: pooled, vertex_ids, boundary_cycles };
        (mesh, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{PlaneSurface, UvBoundary, orient2d};
    use crate::mesh::edge_mesher::LoopSampling;
    use crate::topo::EdgeId;

    fn square_loop(steps: usize) -> LoopSampling {
        let d = 1.0 / steps as f64;
        let mut uvs = Vec::new();
        for k in 0..steps {
            uvs.push(UvPoint::new(d * k as f64, 0.0));
        }
        for k in 0..steps {
            uvs.push(UvPoint::new(1.0, d * k as f64));
        }
        for k in 0..steps {
            uvs.push(UvPoint::new(1.0 - d * k as f64, 1.0));
        }
        for k in 0..steps {
            uvs.push(UvPoint::new(0.0, 1.0 - d * k as f64));
        }
        let n = uvs.len();
        uvs.push(uvs[0]);
        let mut vertex_ids: Vec<usize> = (0..n).collect();
        vertex_ids.push(0);
        LoopSampling { uvs, vertex_ids, edges: vec![EdgeId(0); n] }
    }

    #[test]
    fn unit_square_with_one_inner_point() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let config = MesherConfig::default().with_max_edge_length(0.5);
        let grid = Grid::build(FaceId(0), &plane, vec![square_loop(2)], &config).unwrap();
        assert_eq!(grid.inner_point_count(), 1);

        let model = MeshModel::new();
        model.register(&[Point3::ORIGIN; 8], &[Vec3::ZERO; 8], &[UvPoint::ZERO; 8]);
        let (mesh, diagnostics) = IsoTriangulator::new(&grid, &[], &config).triangulate(&model).unwrap();

        assert_eq!(diagnostics.non_manifold_edge_count, 0);
        assert_eq!(diagnostics.boundary_edge_count, 8);
        assert_eq!(diagnostics.abandoned_cycles, 0);
        // Euler on a disc: T = 2V - B - 2.
        assert_eq!(diagnostics.triangle_count, 2 * diagnostics.vertex_count - 8 - 2);
        assert_eq!(mesh.boundary_cycles.len(), 1);

        let pool = model.coordinates();
        let area: f64 = mesh
            .triangles
            .iter()
            .map(|[a, b, c]| {
                let uv = |k: usize| if k < 8 { grid.loops()[0].points(GridSpace::Default2D)[k] } else { pool.uvs[k] };
                0.5 * orient2d(uv(*a), uv(*b), uv(*c))
            })
            .sum();
        assert!((area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_loops_are_refused() {
        let plane = PlaneSurface::xy(0.0, UvBoundary::unit());
        let config = MesherConfig::default().with_max_edge_length(0.5);
        let outer = square_loop(2);
        // A hole poking out of the face through its right side.
        let hole_points = [
            UvPoint::new(0.6, 0.4),
            UvPoint::new(0.6, 0.6),
            UvPoint::new(1.2, 0.6),
            UvPoint::new(1.2, 0.4),
        ];
        let mut uvs = hole_points.to_vec();
        uvs.push(hole_points[0]);
        let hole = LoopSampling { uvs, vertex_ids: vec![20, 21, 22, 23, 20], edges: vec![EdgeId(1); 4] };
        let grid = Grid::build(FaceId(3), &plane, vec![outer, hole], &config).unwrap();
        let model = MeshModel::new();
        let err = IsoTriangulator::new(&grid, &[], &config).triangulate(&model).unwrap_err();
        assert!(err.is_self_intersection());
    }
}
