use std::fmt;

use super::core::{Point3, Tolerance, Vec3};
use super::uv::{Interval, PerIso, UvBoundary, UvPoint};

/// Carrier surface contract consumed by the topology and the meshers.
///
/// Only `point_at` and `boundary` are mandatory; derivatives default to
/// central differences and the inverse projection to a Gauss-Newton search.
pub trait Surface: Send + Sync + fmt::Debug {
    fn point_at(&self, uv: UvPoint) -> Point3;

    fn boundary(&self) -> UvBoundary;

    #[must_use]
    fn partial_derivatives_at(&self, uv: UvPoint) -> (Vec3, Vec3) {
        let b = self.boundary();
        let diff = |iso_span: Interval, at: f64, eval: &dyn Fn(f64) -> Point3| -> Vec3 {
            let h = Tolerance::DERIVATIVE.relative_to(iso_span.length());
            if !h.is_finite() || h == 0.0 {
                return Vec3::ZERO;
            }
            let a = (at - h).max(iso_span.min);
            let c = (at + h).min(iso_span.max);
            if c <= a {
                return Vec3::ZERO;
            }
            eval(c).sub_point(eval(a)).mul_scalar(1.0 / (c - a))
        };
        let du = diff(b.u, uv.u, &|u| self.point_at(UvPoint::new(u, uv.v)));
        let dv = diff(b.v, uv.v, &|v| self.point_at(UvPoint::new(uv.u, v)));
        (du, dv)
    }

    #[must_use]
    fn normal_at(&self, uv: UvPoint) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(uv);
        du.cross(dv).normalized()
    }

    /// Inverse projection of a 3D point onto the parametric domain.
    #[must_use]
    fn project_point(&self, p: Point3) -> UvPoint {
        project_point_newton(self, p)
    }

    /// Parametric tolerance per axis equivalent to the 3D tolerance `tol`.
    #[must_use]
    fn iso_tolerances(&self, tol: f64) -> PerIso<f64> {
        let b = self.boundary();
        let mut sum_u = 0.0;
        let mut sum_v = 0.0;
        let mut count = 0.0;
        for i in 0..3_u32 {
            for j in 0..3_u32 {
                let uv = UvPoint::new(b.u.lerp(f64::from(i) * 0.5), b.v.lerp(f64::from(j) * 0.5));
                let (du, dv) = self.partial_derivatives_at(uv);
                sum_u += du.length();
                sum_v += dv.length();
                count += 1.0;
            }
        }
        let mean_u = sum_u / count;
        let mean_v = sum_v / count;
        let iso = |mean: f64, span: f64| {
            if mean > Tolerance::ZERO_LENGTH.eps {
                tol / mean
            } else {
                Tolerance::SMALL_NUMBER.relative_to(span)
            }
        };
        PerIso::new(iso(mean_u, b.u.length()), iso(mean_v, b.v.length()))
    }
}

const PROJECTION_SEED_SAMPLES: u32 = 9;
const PROJECTION_MAX_ITERATIONS: usize = 24;

fn project_point_newton<S: Surface + ?Sized>(surface: &S, p: Point3) -> UvPoint {
    let b = surface.boundary();

    let mut best = UvPoint::new(b.u.min, b.v.min);
    let mut best_d2 = f64::INFINITY;
    let n = PROJECTION_SEED_SAMPLES;
    for i in 0..=n {
        for j in 0..=n {
            let uv = UvPoint::new(
                b.u.lerp(f64::from(i) / f64::from(n)),
                b.v.lerp(f64::from(j) / f64::from(n)),
            );
            let d2 = surface.point_at(uv).distance_squared_to(p);
            if d2 < best_d2 {
                best_d2 = d2;
                best = uv;
            }
        }
    }

    let mut uv = best;
    for _ in 0..PROJECTION_MAX_ITERATIONS {
        let r = surface.point_at(uv).sub_point(p);
        let (su, sv) = surface.partial_derivatives_at(uv);
        let a11 = su.dot(su);
        let a12 = su.dot(sv);
        let a22 = sv.dot(sv);
        let b1 = -su.dot(r);
        let b2 = -sv.dot(r);
        let det = a11 * a22 - a12 * a12;
        if det.abs() <= Tolerance::ZERO_LENGTH.eps {
            break;
        }
        let du = (b1 * a22 - b2 * a12) / det;
        let dv = (a11 * b2 - a12 * b1) / det;
        let next = b.clamp(UvPoint::new(uv.u + du, uv.v + dv));
        let step = next.distance(uv);
        uv = next;
        if step <= Tolerance::SMALL_NUMBER.relative_to(b.u.length().max(b.v.length())) {
            break;
        }
    }
    uv
}

// ─────────────────────────────────────────────────────────────────────────────
// Plane
// ─────────────────────────────────────────────────────────────────────────────

/// `origin + u * u_axis + v * v_axis` over a rectangular boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub boundary: UvBoundary,
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3, boundary: UvBoundary) -> Self {
        Self { origin, u_axis, v_axis, boundary }
    }

    /// The XY plane through `z`, parametrised by world X/Y over `boundary`.
    #[must_use]
    pub const fn xy(z: f64, boundary: UvBoundary) -> Self {
        Self::new(Point3::new(0.0, 0.0, z), Vec3::X, Vec3::Y, boundary)
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, uv: UvPoint) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(uv.u))
            .add_vec(self.v_axis.mul_scalar(uv.v))
    }

    fn boundary(&self) -> UvBoundary {
        self.boundary
    }

    fn partial_derivatives_at(&self, _uv: UvPoint) -> (Vec3, Vec3) {
        (self.u_axis, self.v_axis)
    }

    fn project_point(&self, p: Point3) -> UvPoint {
        let d = p.sub_point(self.origin);
        let a11 = self.u_axis.dot(self.u_axis);
        let a12 = self.u_axis.dot(self.v_axis);
        let a22 = self.v_axis.dot(self.v_axis);
        let b1 = self.u_axis.dot(d);
        let b2 = self.v_axis.dot(d);
        let det = a11 * a22 - a12 * a12;
        if det.abs() <= Tolerance::ZERO_LENGTH.eps {
            return UvPoint::new(self.boundary.u.min, self.boundary.v.min);
        }
        UvPoint::new((b1 * a22 - b2 * a12) / det, (a11 * b2 - a12 * b1) / det)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cylinder
// ─────────────────────────────────────────────────────────────────────────────

/// Circular cylinder: `u` is the angle around `axis` measured from `x_dir`,
/// `v` the height along `axis`.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderSurface {
    pub origin: Point3,
    pub axis: Vec3,
    pub x_dir: Vec3,
    pub radius: f64,
    pub boundary: UvBoundary,
}

impl CylinderSurface {
    /// Returns `None` when the axis or reference direction is degenerate or
    /// the two are parallel.
    #[must_use]
    pub fn new(origin: Point3, axis: Vec3, x_dir: Vec3, radius: f64, boundary: UvBoundary) -> Option<Self> {
        let axis = axis.normalized()?;
        let x_dir = (x_dir - axis.mul_scalar(x_dir.dot(axis))).normalized()?;
        if !(radius.is_finite() && radius > 0.0) {
            return None;
        }
        Some(Self { origin, axis, x_dir, radius, boundary })
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.cross(self.x_dir)
    }
}

impl Surface for CylinderSurface {
    fn point_at(&self, uv: UvPoint) -> Point3 {
        let (s, c) = uv.u.sin_cos();
        let radial = self.x_dir.mul_scalar(c) + self.y_dir().mul_scalar(s);
        self.origin
            .add_vec(radial.mul_scalar(self.radius))
            .add_vec(self.axis.mul_scalar(uv.v))
    }

    fn boundary(&self) -> UvBoundary {
        self.boundary
    }

    fn partial_derivatives_at(&self, uv: UvPoint) -> (Vec3, Vec3) {
        let (s, c) = uv.u.sin_cos();
        let du = (self.x_dir.mul_scalar(-s) + self.y_dir().mul_scalar(c)).mul_scalar(self.radius);
        (du, self.axis)
    }

    fn project_point(&self, p: Point3) -> UvPoint {
        let d = p.sub_point(self.origin);
        let v = d.dot(self.axis);
        let mut u = d.dot(self.y_dir()).atan2(d.dot(self.x_dir));
        let tau = std::f64::consts::TAU;
        let mid = self.boundary.u.middle();
        while u < mid - std::f64::consts::PI {
            u += tau;
        }
        while u > mid + std::f64::consts::PI {
            u -= tau;
        }
        UvPoint::new(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_projection_inverts_evaluation() {
        let plane = PlaneSurface::new(
            Point3::new(1.0, 2.0, 3.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            UvBoundary::unit(),
        );
        let uv = UvPoint::new(0.3, 0.7);
        let back = plane.project_point(plane.point_at(uv));
        assert!(back.distance(uv) < 1e-12);
    }

    #[test]
    fn cylinder_projection_lands_in_boundary_period() {
        let cyl = CylinderSurface::new(
            Point3::ORIGIN,
            Vec3::Z,
            Vec3::X,
            2.0,
            UvBoundary::new(Interval::new(3.0, 6.0), Interval::new(0.0, 1.0)),
        )
        .unwrap();
        let uv = UvPoint::new(5.5, 0.25);
        let back = cyl.project_point(cyl.point_at(uv));
        assert!(back.distance(uv) < 1e-9);
    }

    #[test]
    fn iso_tolerance_scales_with_derivative_norm() {
        let plane = PlaneSurface::new(
            Point3::ORIGIN,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
            UvBoundary::unit(),
        );
        let tol = plane.iso_tolerances(1e-3);
        assert!((tol.u - 1e-4).abs() < 1e-12);
        assert!((tol.v - 2e-3).abs() < 1e-12);
    }
}
