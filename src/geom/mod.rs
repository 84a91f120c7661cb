//! Geometric primitives shared by the topology and the meshers.

mod core;
mod curve;
mod surface;
mod uv;

pub use core::{BBox, Point3, Tolerance, Vec3};
pub use curve::{UvArc, UvCurve, UvLine, UvPolyline};
pub use surface::{CylinderSurface, PlaneSurface, Surface};
pub use uv::{Interval, Iso, PerIso, UvBoundary, UvPoint, orient2d, project_on_segment, signed_area};
