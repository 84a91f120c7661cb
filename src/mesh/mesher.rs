//! Face and body meshing driver.
//!
//! The joiner runs first and to completion over the whole batch: it fixes
//! the active representative of every vertex and edge. Edges are then
//! meshed once each, and every face goes through grid, thin zones and
//! triangulation on its own, in parallel with the `parallel` feature.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::mesh::config::MesherConfig;
use crate::mesh::diagnostics::MeshDiagnostics;
use crate::mesh::edge_mesher::{loop_sampling, mesh_active_edges, mesh_vertices};
use crate::mesh::error::MeshError;
use crate::mesh::grid::Grid;
use crate::mesh::iso::IsoTriangulator;
use crate::mesh::metrics::{MeshMetrics, MeshTimingReport, TimingBucket};
use crate::mesh::model::{EntityMesh, FaceMesh, MeshModel};
use crate::mesh::thin_zone::{ThinZone, ThinZoneFinder, mark_thin_zones};
use crate::topo::{BodyId, EdgeId, FaceId, JoinReport, Joiner, StatusFlags, TopoArena, TopologicalEntity};

/// Divisor applied to the smallest grid element when no thin-zone
/// tolerance is configured.
const THIN_ZONE_DIVISOR: f64 = 3.0;

/// A face whose mesh was cancelled.
#[derive(Debug)]
pub struct FaceFailure {
    pub face: FaceId,
    pub error: MeshError,
}

impl fmt::Display for FaceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.face, self.error)
    }
}

#[derive(Debug, Default)]
pub struct MeshReport {
    pub join: JoinReport,
    pub diagnostics: MeshDiagnostics,
    pub failures: Vec<FaceFailure>,
    pub meshed_faces: Vec<FaceId>,
    pub timing: Option<MeshTimingReport>,
}

impl MeshReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.diagnostics.is_clean() && self.join.is_clean()
    }

    fn record_failure(&mut self, arena: &mut TopoArena, face: FaceId, error: MeshError) {
        log::warn!("{face}: mesh cancelled: {error}");
        arena.mark_face(face, StatusFlags::DEGENERATE);
        arena.mark_face(face, StatusFlags::MESH_FAILED);
        self.diagnostics.failed_faces += 1;
        if error.is_self_intersection() {
            self.diagnostics.self_intersection_failures += 1;
        }
        self.failures.push(FaceFailure { face, error });
    }
}

/// Short form used by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct MeshSummary {
    pub faces: usize,
    pub failed: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub merged_vertices: usize,
    pub linked_edges: usize,
}

impl From<&MeshReport> for MeshSummary {
    fn from(report: &MeshReport) -> Self {
        Self {
            faces: report.meshed_faces.len(),
            failed: report.failures.len(),
            vertices: report.diagnostics.vertex_count,
            triangles: report.diagnostics.triangle_count,
            merged_vertices: report.join.merged_vertices,
            linked_edges: report.join.linked_edges,
        }
    }
}

struct FaceOutcome {
    face: FaceId,
    result: Result<(FaceMesh, MeshDiagnostics, Vec<ThinZone>), MeshError>,
    metrics: MeshMetrics,
}

#[derive(Debug, Clone, Default)]
pub struct Mesher {
    config: MesherConfig,
}

impl Mesher {
    #[must_use]
    pub fn new(config: MesherConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MesherConfig {
        &self.config
    }

    pub fn mesh_body(&self, arena: &mut TopoArena, model: &MeshModel, body: BodyId) -> Result<MeshReport, MeshError> {
        let faces = arena.body_faces(body);
        self.mesh_faces(arena, model, &faces)
    }

    /// Joins, meshes the edges and then every face of `faces`. A face that
    /// fails is flagged degenerate and reported; its siblings are unaffected.
    pub fn mesh_faces(&self, arena: &mut TopoArena, model: &MeshModel, faces: &[FaceId]) -> Result<MeshReport, MeshError> {
        self.config.validate()?;
        let mut metrics = MeshMetrics::new(self.config.collect_timing);
        metrics.begin();

        let tolerance = self.config.tolerance();
        let border_only = self.config.join_border_only;
        let join = metrics.time(TimingBucket::Join, || Joiner::new(&mut *arena, tolerance).border_only(border_only).join_faces(faces));

        let faces: Vec<FaceId> = faces.iter().copied().filter(|f| !arena.face(*f).is_deleted()).collect();
        let edges = metrics.time(TimingBucket::EdgeMesh, || {
            mesh_vertices(&mut *arena, model, &faces);
            mesh_active_edges(&mut *arena, model, &faces, &self.config)
        });

        let mut report = MeshReport { join, ..MeshReport::default() };
        let failed_edges: HashMap<EdgeId, Arc<MeshError>> =
            edges.failures.into_iter().map(|(edge, error)| (edge, Arc::new(error))).collect();
        let mut meshable = Vec::with_capacity(faces.len());
        for face in faces {
            let broken = arena
                .face_edges(&[face])
                .into_iter()
                .map(|e| arena.active_edge(e))
                .find_map(|e| failed_edges.get(&e).map(|source| (e, Arc::clone(source))));
            match broken {
                Some((edge, source)) => report.record_failure(arena, face, MeshError::EdgeFailed { edge, source }),
                None => meshable.push(face),
            }
        }

        let outcomes = run_faces(arena, model, &self.config, &meshable);
        for outcome in outcomes {
            metrics.absorb(&outcome.metrics);
            match outcome.result {
                Ok((mesh, diagnostics, zones)) => {
                    mark_thin_zones(arena, &zones);
                    let id = model.insert(EntityMesh::Face(mesh));
                    arena.set_face_mesh(outcome.face, id);
                    report.diagnostics.merge(&diagnostics);
                    report.meshed_faces.push(outcome.face);
                }
                Err(error) => report.record_failure(arena, outcome.face, error),
            }
        }
        report.timing = metrics.end();
        log::debug!(
            "meshed {} faces, {} failed: {}",
            report.meshed_faces.len(),
            report.failures.len(),
            report.diagnostics.summary()
        );
        Ok(report)
    }
}

/// Grid, thin zones and triangulation of one face. Reads the topology only.
fn mesh_face(arena: &TopoArena, model: &MeshModel, config: &MesherConfig, face: FaceId) -> FaceOutcome {
    let mut metrics = MeshMetrics::new(config.collect_timing);
    let result = triangulate_face(arena, model, config, face, &mut metrics);
    FaceOutcome { face, result, metrics }
}

fn triangulate_face(
    arena: &TopoArena,
    model: &MeshModel,
    config: &MesherConfig,
    face: FaceId,
    metrics: &mut MeshMetrics,
) -> Result<(FaceMesh, MeshDiagnostics, Vec<ThinZone>), MeshError> {
    let f = arena.face(face);
    let samplings = f.loops().iter().map(|l| loop_sampling(arena, model, *l)).collect::<Result<Vec<_>, _>>()?;
    let grid = metrics.time(TimingBucket::Grid, || Grid::build(face, f.surface().as_ref(), samplings, config))?;

    let thin_tolerance = config.thin_zone_tolerance.unwrap_or(grid.min_element_size() / THIN_ZONE_DIVISOR);
    let zones = metrics.time(TimingBucket::ThinZone, || ThinZoneFinder::new(grid.loops(), thin_tolerance).search());
    if !zones.is_empty() {
        log::debug!("{face}: {} thin zones", zones.len());
    }

    let (mesh, diagnostics) =
        metrics.time(TimingBucket::IsoTriangulate, || IsoTriangulator::new(&grid, &zones, config).triangulate(model))?;
    Ok((mesh, diagnostics, zones))
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn run_faces(arena: &TopoArena, model: &MeshModel, config: &MesherConfig, faces: &[FaceId]) -> Vec<FaceOutcome> {
            use rayon::prelude::*;
            faces.par_iter().map(|f| mesh_face(arena, model, config, *f)).collect()
        }
    } else {
        fn run_faces(arena: &TopoArena, model: &MeshModel, config: &MesherConfig, faces: &[FaceId]) -> Vec<FaceOutcome> {
            faces.iter().map(|f| mesh_face(arena, model, config, *f)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geom::{PlaneSurface, Surface, UvBoundary, UvPoint};

    #[test]
    fn failed_face_does_not_stop_its_siblings() {
        let mut arena = TopoArena::default();
        let plane: Arc<dyn Surface> = Arc::new(PlaneSurface::xy(0.0, UvBoundary::unit()));
        let square = [UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0), UvPoint::new(0.0, 1.0)];
        let good = arena.make_planar_polygon_face(Arc::clone(&plane), &square, &[]).unwrap();
        // The hole crosses the outer boundary.
        let hole = vec![UvPoint::new(0.5, 0.4), UvPoint::new(1.5, 0.4), UvPoint::new(1.5, 0.6), UvPoint::new(0.5, 0.6)];
        let shifted: Vec<UvPoint> = square.iter().map(|p| UvPoint::new(p.u, p.v + 2.0)).collect();
        let shifted_hole: Vec<UvPoint> = hole.iter().map(|p| UvPoint::new(p.u, p.v + 2.0)).collect();
        let bad = arena.make_planar_polygon_face(plane, &shifted, &[shifted_hole]).unwrap();

        let model = MeshModel::new();
        let mesher = Mesher::new(MesherConfig::default().with_max_edge_length(0.25));
        let report = mesher.mesh_faces(&mut arena, &model, &[good, bad]).unwrap();

        assert_eq!(report.meshed_faces, vec![good]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].face, bad);
        assert!(report.failures[0].error.is_self_intersection());
        assert_eq!(report.diagnostics.self_intersection_failures, 1);
        assert!(arena.face(bad).status().contains(StatusFlags::DEGENERATE));
        assert!(arena.face(good).mesh().is_some());
        assert!(!report.is_clean());
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut arena = TopoArena::default();
        let model = MeshModel::new();
        let mesher = Mesher::new(MesherConfig::default().with_tolerance(-1.0));
        assert!(mesher.mesh_faces(&mut arena, &model, &[]).is_err());
    }
}
