use super::ids::{EdgeId, FaceId, LoopId, VertexId};

#[derive(Debug, thiserror::Error)]
pub enum TopoError {
    #[error("edge interval [{min}, {max}] is empty or inverted")]
    InvalidInterval { min: f64, max: f64 },
    #[error("edge geometry is not finite")]
    NonFinite,
    #[error("{0} has near-zero 3D length")]
    DegenerateEdge(EdgeId),
    #[error("loop is not closed: gap of {gap} between {end} and {start}")]
    LoopNotClosed { end: VertexId, start: VertexId, gap: f64 },
    #[error("loop has no usable edge")]
    DegenerateLoop,
    #[error("{0} already belongs to {1}")]
    LoopAlreadyUsed(LoopId, FaceId),
    #[error("face requires an outer loop")]
    EmptyFace,
    #[error("polygon requires at least 3 distinct points, got {0}")]
    TooFewPoints(usize),
}
