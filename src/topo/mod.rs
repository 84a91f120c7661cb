//! Boundary-representation topology: an arena of typed entities, twin groups
//! with an active representative, and the joiner that welds faces together.

mod arena;
mod entity;
mod error;
mod ids;
mod joiner;
mod link;

pub use arena::TopoArena;
pub use entity::{Body, Direction, Edge, Face, Linkable, Loop, OrientedEdge, Shell, TopologicalEntity, Vertex};
pub use error::TopoError;
pub use ids::{BodyId, EdgeId, EntityId, EntityKind, FaceId, LoopId, MeshId, ShellId, StatusFlags, VertexId};
pub use joiner::{JoinReport, Joiner, WeldGap};
pub use link::LinkGroup;

#[cfg(test)]
mod tests;
