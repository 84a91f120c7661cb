use std::fmt;

use super::core::Tolerance;
use super::uv::{Interval, UvPoint};

/// A curve drawn in the parametric space of a carrier surface.
///
/// Edges are restrictions of such curves onto their surface, so the 3D
/// geometry of an edge is `surface.point_at(curve.point_at(t))`.
pub trait UvCurve: Send + Sync + fmt::Debug {
    fn point_at(&self, t: f64) -> UvPoint;

    fn boundary(&self) -> Interval;

    #[must_use]
    fn tangent_at(&self, t: f64) -> UvPoint {
        let b = self.boundary();
        let h = Tolerance::DERIVATIVE.relative_to(b.length());
        if !h.is_finite() || h == 0.0 {
            return UvPoint::ZERO;
        }
        let a = (t - h).max(b.min);
        let c = (t + h).min(b.max);
        if c <= a {
            return UvPoint::ZERO;
        }
        (self.point_at(c) - self.point_at(a)) * (1.0 / (c - a))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line
// ─────────────────────────────────────────────────────────────────────────────

/// Straight segment `start -> end` parametrised over `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvLine {
    pub start: UvPoint,
    pub end: UvPoint,
}

impl UvLine {
    #[must_use]
    pub const fn new(start: UvPoint, end: UvPoint) -> Self {
        Self { start, end }
    }
}

impl UvCurve for UvLine {
    fn point_at(&self, t: f64) -> UvPoint {
        self.start + (self.end - self.start) * t
    }

    fn boundary(&self) -> Interval {
        Interval::new(0.0, 1.0)
    }

    fn tangent_at(&self, _t: f64) -> UvPoint {
        self.end - self.start
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polyline
// ─────────────────────────────────────────────────────────────────────────────

/// Open polyline, parametrised by vertex index: `t = i` hits vertex `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct UvPolyline {
    points: Vec<UvPoint>,
}

impl UvPolyline {
    /// `None` with fewer than two points.
    #[must_use]
    pub fn new(points: Vec<UvPoint>) -> Option<Self> {
        (points.len() >= 2).then_some(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[UvPoint] {
        &self.points
    }
}

impl UvCurve for UvPolyline {
    fn point_at(&self, t: f64) -> UvPoint {
        let last = self.points.len() - 1;
        let t = t.clamp(0.0, last as f64);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let i = (t.floor() as usize).min(last - 1);
        let s = t - i as f64;
        self.points[i] + (self.points[i + 1] - self.points[i]) * s
    }

    fn boundary(&self) -> Interval {
        Interval::new(0.0, (self.points.len() - 1) as f64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arc
// ─────────────────────────────────────────────────────────────────────────────

/// Circular arc `center + radius * (cos t, sin t)` for `t` in `angles`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvArc {
    pub center: UvPoint,
    pub radius: f64,
    pub angles: Interval,
}

impl UvArc {
    #[must_use]
    pub const fn new(center: UvPoint, radius: f64, angles: Interval) -> Self {
        Self { center, radius, angles }
    }
}

impl UvCurve for UvArc {
    fn point_at(&self, t: f64) -> UvPoint {
        let (s, c) = t.sin_cos();
        UvPoint::new(self.center.u + self.radius * c, self.center.v + self.radius * s)
    }

    fn boundary(&self) -> Interval {
        self.angles
    }

    fn tangent_at(&self, t: f64) -> UvPoint {
        let (s, c) = t.sin_cos();
        UvPoint::new(-self.radius * s, self.radius * c)
    }
}
