#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Boundary-representation meshing: topology welding, edge discretisation and
//! grid-driven triangulation of trimmed faces.

pub mod geom;
pub mod mesh;
pub mod topo;

pub use mesh::{MeshError, MeshModel, MeshReport, Mesher, MesherConfig};
pub use topo::{Joiner, TopoArena};
