use std::sync::Arc;

use crate::mesh::config::ConfigError;
use crate::topo::{EdgeId, FaceId, TopoError};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridError {
    /// The parametric spacing collapses below the iso tolerance.
    #[error("{face} is degenerate: largest {axis} step {delta} is below {tolerance}")]
    Degenerate { face: FaceId, axis: &'static str, delta: f64, tolerance: f64 },
    #[error("{0} has no outer loop")]
    NoOuterLoop(FaceId),
    #[error("loop {loop_index} of {face} samples to fewer than 3 points")]
    EmptyLoop { face: FaceId, loop_index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Topo(#[from] TopoError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("loop {loop_index} of {face} intersects itself or another loop")]
    SelfIntersection { face: FaceId, loop_index: usize },
    #[error("triangulation requires at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("input point is not finite")]
    NonFinitePoint,
    #[error("{face}: boundary loop {loop_index} could not be connected to the rest of the mesh")]
    UnconnectedLoop { face: FaceId, loop_index: usize },
    #[error("{0} has no mesh")]
    EdgeNotMeshed(EdgeId),
    /// A boundary edge of the face could not be meshed.
    #[error("{edge} could not be meshed: {source}")]
    EdgeFailed { edge: EdgeId, source: Arc<MeshError> },
}

impl MeshError {
    #[must_use]
    pub fn is_self_intersection(&self) -> bool {
        matches!(self, Self::SelfIntersection { .. })
    }
}
