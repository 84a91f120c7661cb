//! Meshing of B-Rep faces: edge discretisation, sampling grids, thin-zone
//! detection and the iso-triangulator, driven face by face by [`Mesher`].

mod bowyer_watson;
mod config;
mod diagnostics;
mod edge_mesher;
mod error;
mod grid;
pub mod iso;
mod mesher;
mod metrics;
mod model;
mod thin_zone;

pub use bowyer_watson::{BowyerWatson, Triangulation};
pub use config::{BridgePolicy, ConfigError, MesherConfig};
pub use diagnostics::MeshDiagnostics;
pub use edge_mesher::{
    EdgeMeshingReport, EdgeSampling, LoopSampling, cut_parameters, edge_sampling, loop_sampling, mesh_active_edges, mesh_vertices,
};
pub use error::{GridError, MeshError};
pub use grid::{Grid, GridLoop, GridSpace};
pub use iso::IsoTriangulator;
pub use mesher::{FaceFailure, MeshReport, MeshSummary, Mesher};
pub use metrics::{MeshMetrics, MeshTimingReport, TimingBucket};
pub use model::{CoordinatePool, EdgeMesh, EntityMesh, FaceMesh, MeshModel, VertexMesh};
pub use thin_zone::{
    BoundarySegment, LoopPoint, ThinZone, ThinZoneFinder, ThinZoneKind, ThinZoneSide, mark_thin_zones,
};

#[cfg(test)]
mod tests;
