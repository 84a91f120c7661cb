//! Parametric-space primitives: UV points, iso axes and boundaries.

use std::ops::{Add, Index, IndexMut, Mul, Sub};

use serde::{Deserialize, Serialize};

// ============================================================================
// Iso
// ============================================================================

/// Parametric axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Iso {
    IsoU,
    IsoV,
}

impl Iso {
    pub const BOTH: [Self; 2] = [Self::IsoU, Self::IsoV];

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::IsoU => Self::IsoV,
            Self::IsoV => Self::IsoU,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::IsoU => 0,
            Self::IsoV => 1,
        }
    }
}

/// A pair of values indexed by [`Iso`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerIso<T> {
    pub u: T,
    pub v: T,
}

impl<T> PerIso<T> {
    #[must_use]
    pub const fn new(u: T, v: T) -> Self {
        Self { u, v }
    }
}

impl<T> Index<Iso> for PerIso<T> {
    type Output = T;
    fn index(&self, iso: Iso) -> &T {
        match iso {
            Iso::IsoU => &self.u,
            Iso::IsoV => &self.v,
        }
    }
}

impl<T> IndexMut<Iso> for PerIso<T> {
    fn index_mut(&mut self, iso: Iso) -> &mut T {
        match iso {
            Iso::IsoU => &mut self.u,
            Iso::IsoV => &mut self.v,
        }
    }
}

// ============================================================================
// UvPoint
// ============================================================================

/// A point (or vector) in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    #[must_use]
    pub fn distance_squared(&self, other: UvPoint) -> f64 {
        let du = self.u - other.u;
        let dv = self.v - other.v;
        du * du + dv * dv
    }

    #[must_use]
    pub fn distance(&self, other: UvPoint) -> f64 {
        self.distance_squared(other).sqrt()
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.u * rhs.u + self.v * rhs.v
    }

    /// Z component of the 3D cross product.
    #[must_use]
    pub const fn cross(self, rhs: Self) -> f64 {
        self.u * rhs.v - self.v * rhs.u
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn perpendicular(self) -> Self {
        Self::new(-self.v, self.u)
    }

    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new(0.5 * (self.u + other.u), 0.5 * (self.v + other.v))
    }

    #[must_use]
    pub const fn get(self, iso: Iso) -> f64 {
        match iso {
            Iso::IsoU => self.u,
            Iso::IsoV => self.v,
        }
    }
}

impl Add for UvPoint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.u + rhs.u, self.v + rhs.v)
    }
}

impl Sub for UvPoint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.u - rhs.u, self.v - rhs.v)
    }
}

impl Mul<f64> for UvPoint {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.u * rhs, self.v * rhs)
    }
}

/// Signed double area of the triangle `(a, b, c)`; positive when counter-clockwise.
#[must_use]
pub fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

/// Signed area of a polygon given as an open ring.
#[must_use]
pub fn signed_area(points: &[UvPoint]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        area += a.cross(b);
    }
    0.5 * area
}

/// Projection of `p` onto the segment `[a, b]`, returned with its clamped
/// segment coordinate in `[0, 1]`.
#[must_use]
pub fn project_on_segment(p: UvPoint, a: UvPoint, b: UvPoint) -> (UvPoint, f64) {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= 0.0 {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    (a + ab * t, t)
}

// ============================================================================
// Boundaries
// ============================================================================

/// Linear boundary of a curve parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.max - self.min
    }

    /// `min < max` with finite bounds.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    #[must_use]
    pub fn contains(self, t: f64, tol: f64) -> bool {
        t >= self.min - tol && t <= self.max + tol
    }

    #[must_use]
    pub fn clamp(self, t: f64) -> f64 {
        t.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn lerp(self, s: f64) -> f64 {
        self.min + (self.max - self.min) * s
    }

    #[must_use]
    pub fn middle(self) -> f64 {
        0.5 * (self.min + self.max)
    }
}

/// Surfacic boundary: one interval per parametric axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvBoundary {
    pub u: Interval,
    pub v: Interval,
}

impl UvBoundary {
    #[must_use]
    pub const fn new(u: Interval, v: Interval) -> Self {
        Self { u, v }
    }

    #[must_use]
    pub const fn unit() -> Self {
        Self::new(Interval::new(0.0, 1.0), Interval::new(0.0, 1.0))
    }

    /// Smallest boundary containing every point, `None` when empty.
    #[must_use]
    pub fn from_points(points: &[UvPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Self::new(Interval::new(first.u, first.u), Interval::new(first.v, first.v));
        for p in &points[1..] {
            b.u.min = b.u.min.min(p.u);
            b.u.max = b.u.max.max(p.u);
            b.v.min = b.v.min.min(p.v);
            b.v.max = b.v.max.max(p.v);
        }
        Some(b)
    }

    #[must_use]
    pub const fn get(&self, iso: Iso) -> Interval {
        match iso {
            Iso::IsoU => self.u,
            Iso::IsoV => self.v,
        }
    }

    #[must_use]
    pub fn length(&self, iso: Iso) -> f64 {
        self.get(iso).length()
    }

    #[must_use]
    pub fn contains(&self, p: UvPoint, tol: f64) -> bool {
        self.u.contains(p.u, tol) && self.v.contains(p.v, tol)
    }

    #[must_use]
    pub fn clamp(&self, p: UvPoint) -> UvPoint {
        UvPoint::new(self.u.clamp(p.u), self.v.clamp(p.v))
    }

    /// Boundary grown by `margin` on every side.
    #[must_use]
    pub fn offset(&self, margin: f64) -> Self {
        Self::new(
            Interval::new(self.u.min - margin, self.u.max + margin),
            Interval::new(self.v.min - margin, self.v.max + margin),
        )
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.u.is_valid() && self.v.is_valid()
    }
}
