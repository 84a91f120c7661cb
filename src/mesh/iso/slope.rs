//! Pseudo-angles on a `[0, 8)` scale: 0 is +U, 2 is +V, 4 is -U, 6 is -V.
//! Each octant is linear in the tangent, which is enough to order directions
//! and to measure sectors without trigonometry.

use crate::geom::{Tolerance, UvPoint};

/// A direction within this slope of an axis is iso-aligned.
pub const MAX_SLOPE_TO_BE_ISO: f64 = 0.125;
/// Margin kept on both sides of a sector so that flat candidates are refused.
pub const FLAT_ANGLE: f64 = 0.1;
pub const FULL_TURN: f64 = 8.0;

#[must_use]
pub fn slope(from: UvPoint, to: UvPoint) -> f64 {
    let du = to.u - from.u;
    let dv = to.v - from.v;
    if du.abs() <= Tolerance::ZERO_LENGTH.eps && dv.abs() <= Tolerance::ZERO_LENGTH.eps {
        return 0.0;
    }
    match (du >= 0.0, dv >= 0.0) {
        (true, true) => {
            if du >= dv {
                dv / du
            } else {
                2.0 - du / dv
            }
        }
        (false, true) => {
            if dv >= -du {
                2.0 - du / dv
            } else {
                4.0 + dv / du
            }
        }
        (false, false) => {
            if du <= dv {
                4.0 + dv / du
            } else {
                6.0 - du / dv
            }
        }
        (true, false) => {
            if -dv >= du {
                6.0 - du / dv
            } else {
                8.0 + dv / du
            }
        }
    }
}

/// Counter-clockwise turn from `reference` to `slope`, in `[0, 8)`.
#[must_use]
pub fn relative_slope(slope: f64, reference: f64) -> f64 {
    (slope - reference).rem_euclid(FULL_TURN)
}

/// Whether `candidate` leaves `node` strictly inside the sector swept
/// counter-clockwise from `next` to `previous`, with a `flat` margin on both
/// sides. For a loop walked with the face on its left this is the face side.
#[must_use]
pub fn is_inside_sector(node: UvPoint, previous: UvPoint, next: UvPoint, candidate: UvPoint, flat: f64) -> bool {
    let start = slope(node, next);
    let width = relative_slope(slope(node, previous), start);
    let width = if width == 0.0 { FULL_TURN } else { width };
    let turn = relative_slope(slope(node, candidate), start);
    turn > flat && turn < width - flat
}

/// Distance of a direction to the nearest axis on the slope scale.
#[must_use]
pub fn iso_deviation(from: UvPoint, to: UvPoint) -> f64 {
    let s = slope(from, to) % 2.0;
    s.min(2.0 - s)
}

#[must_use]
pub fn is_iso(from: UvPoint, to: UvPoint) -> bool {
    iso_deviation(from, to) <= MAX_SLOPE_TO_BE_ISO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(u: f64, v: f64) -> UvPoint {
        UvPoint::new(u, v)
    }

    #[test]
    fn slope_is_monotonic_around_the_circle() {
        let o = p(0.0, 0.0);
        assert_eq!(slope(o, p(1.0, 0.0)), 0.0);
        assert_eq!(slope(o, p(1.0, 1.0)), 1.0);
        assert_eq!(slope(o, p(0.0, 1.0)), 2.0);
        assert_eq!(slope(o, p(-1.0, 1.0)), 3.0);
        assert_eq!(slope(o, p(-1.0, 0.0)), 4.0);
        assert_eq!(slope(o, p(-1.0, -1.0)), 5.0);
        assert_eq!(slope(o, p(0.0, -1.0)), 6.0);
        assert_eq!(slope(o, p(1.0, -1.0)), 7.0);
        let mut previous = -1.0;
        for k in 0..64_u32 {
            let a = f64::from(k) * std::f64::consts::TAU / 64.0;
            let s = slope(o, p(a.cos(), a.sin()));
            assert!(s > previous, "slope must grow with the angle");
            assert!(s < FULL_TURN);
            previous = s;
        }
    }

    #[test]
    fn sector_of_a_convex_corner() {
        // Outer loop corner at the origin: coming from (0,1), leaving to (1,0).
        let node = p(0.0, 0.0);
        let previous = p(0.0, 1.0);
        let next = p(1.0, 0.0);
        assert!(is_inside_sector(node, previous, next, p(1.0, 1.0), FLAT_ANGLE));
        assert!(!is_inside_sector(node, previous, next, p(-1.0, 1.0), FLAT_ANGLE));
        assert!(!is_inside_sector(node, previous, next, p(1.0, 0.01), FLAT_ANGLE));
    }

    #[test]
    fn iso_alignment() {
        assert!(is_iso(p(0.0, 0.0), p(0.0, -1.0)));
        assert!(is_iso(p(0.0, 0.0), p(1.0, 0.05)));
        assert!(!is_iso(p(0.0, 0.0), p(1.0, 0.5)));
        assert!((iso_deviation(p(0.0, 0.0), p(1.0, 1.0)) - 1.0).abs() < 1e-12);
    }
}
