//! Geometric predicates for plan-view triangulation.
//!
//! Every predicate works on the `x`/`y` coordinates of [`Point3`] values.
//! [`orientation`] and [`incircle_determinant`] use Shewchuk's adaptive
//! arithmetic from the `robust` crate, so their signs are exact. Legalisation
//! adds a max-min angle fallback on top of the exact in-circle sign for
//! near-cocircular convex quads; constraint insertion uses the tolerance-aware
//! [`side_of_line`] so that points within `pl_tol` of a line are treated as
//! lying on it.

#![forbid(unsafe_code)]

use robust::Coord;

use crate::geometry::point::Point3;

/// Smallest gain in the minimum angle, in radians, for which the max-min test
/// prefers the other diagonal.
const MIN_ANGLE_GAIN: f64 = 1e-10;

#[inline]
fn coord(p: &Point3) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

/// Represents the orientation of a point triple, or the side of a directed line
/// a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Clockwise turn; the point is right of the line
    NEGATIVE,
    /// Colinear; the point is on the line
    DEGENERATE,
    /// Counter-clockwise turn; the point is left of the line
    POSITIVE,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NEGATIVE => write!(f, "NEGATIVE"),
            Self::DEGENERATE => write!(f, "DEGENERATE"),
            Self::POSITIVE => write!(f, "POSITIVE"),
        }
    }
}

/// Twice the signed area of the triangle `a, b, c`.
///
/// Positive when the triple turns counter-clockwise.
#[inline]
#[must_use]
pub fn signed_area2(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)))
}

/// Orientation of `a, b, c`, with an exact sign.
///
/// # Examples
///
/// ```
/// use tin::geometry::point::Point3;
/// use tin::geometry::predicates::{orientation, Orientation};
///
/// let a = Point3::new(0.0, 0.0, 0.0);
/// let b = Point3::new(1.0, 0.0, 0.0);
/// let c = Point3::new(0.0, 1.0, 0.0);
/// assert_eq!(orientation(&a, &b, &c), Orientation::POSITIVE);
/// assert_eq!(orientation(&a, &c, &b), Orientation::NEGATIVE);
/// ```
#[must_use]
pub fn orientation(a: &Point3, b: &Point3, c: &Point3) -> Orientation {
    let det = robust::orient2d(coord(a), coord(b), coord(c));
    if det > 0.0 {
        Orientation::POSITIVE
    } else if det < 0.0 {
        Orientation::NEGATIVE
    } else {
        Orientation::DEGENERATE
    }
}

/// Side of the directed line `a → b` that `p` lies on, treating points whose
/// perpendicular distance is at most `pl_tol` as on the line.
#[must_use]
pub fn side_of_line(a: &Point3, b: &Point3, p: &Point3, pl_tol: f64) -> Orientation {
    let det = signed_area2(a, b, p);
    let length = a.distance_2d(b);
    let distance = if length > 0.0 { det / length } else { 0.0 };
    if distance.abs() <= pl_tol {
        Orientation::DEGENERATE
    } else if distance > 0.0 {
        Orientation::POSITIVE
    } else {
        Orientation::NEGATIVE
    }
}

/// Parameter of the orthogonal projection of `p` onto `a → b`, unclamped.
#[must_use]
pub fn projection_parameter(a: &Point3, b: &Point3, p: &Point3) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx.mul_add(dx, dy * dy);
    if len2 == 0.0 {
        return 0.0;
    }
    (p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / len2
}

/// Distance from `p` to the closed segment `a b`.
#[must_use]
pub fn distance_to_segment(a: &Point3, b: &Point3, p: &Point3) -> f64 {
    let t = projection_parameter(a, b, p).clamp(0.0, 1.0);
    let q = a.lerp(b, t);
    q.distance_2d(p)
}

/// In-circle determinant of `d` against the triangle `a, b, c`.
///
/// For a counter-clockwise triangle the value is positive when `d` lies inside
/// the circumcircle, negative when outside, and zero exactly when the four
/// points are cocircular.
#[must_use]
pub fn incircle_determinant(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> f64 {
    robust::incircle(coord(a), coord(b), coord(c), coord(d))
}

/// Interior angle at `apex` of the triangle `(prev, apex, next)`, in radians.
fn interior_angle(prev: &Point3, apex: &Point3, next: &Point3) -> f64 {
    let ux = prev.x - apex.x;
    let uy = prev.y - apex.y;
    let vx = next.x - apex.x;
    let vy = next.y - apex.y;
    let cross = ux.mul_add(vy, -(uy * vx));
    let dot = ux.mul_add(vx, uy * vy);
    cross.abs().atan2(dot)
}

/// Smallest interior angle of the triangle `a, b, c`, in radians.
#[must_use]
pub fn triangle_min_angle(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    interior_angle(c, a, b)
        .min(interior_angle(a, b, c))
        .min(interior_angle(b, c, a))
}

/// Returns `true` if the quadrilateral `a, b, c, d` is strictly convex, i.e.
/// both diagonals separate the other two corners.
#[must_use]
pub fn is_strictly_convex(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> bool {
    let across = |p: &Point3, q: &Point3, r: &Point3, s: &Point3| {
        let first = orientation(p, q, r);
        first != Orientation::DEGENERATE && orientation(p, q, s) == opposite(first)
    };
    across(a, c, b, d) && across(b, d, a, c)
}

const fn opposite(o: Orientation) -> Orientation {
    match o {
        Orientation::NEGATIVE => Orientation::POSITIVE,
        Orientation::DEGENERATE => Orientation::DEGENERATE,
        Orientation::POSITIVE => Orientation::NEGATIVE,
    }
}

/// Max-min angle test for the quadrilateral `a, b, c, d` whose current diagonal
/// is `a c`.
///
/// Returns `true` when replacing the diagonal with `b d` increases the smallest
/// angle of the two triangles by more than a rounding margin. A quadrilateral
/// that is not strictly convex never prefers the swap.
#[must_use]
pub fn max_min_angle_prefers_swap(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> bool {
    if !is_strictly_convex(a, b, c, d) {
        return false;
    }
    let current = triangle_min_angle(a, b, c).min(triangle_min_angle(a, c, d));
    let swapped = triangle_min_angle(a, b, d).min(triangle_min_angle(b, c, d));
    swapped > current + MIN_ANGLE_GAIN
}

/// Delaunay swap decision for the diagonal `a c` of the quadrilateral `a, b, c, d`.
///
/// `a, b, c` must be counter-clockwise and `d` must lie across `a c` from `b`.
/// Returns `true` when `d` is inside the circumcircle of `a, b, c`, i.e. when `b d`
/// is the locally Delaunay diagonal. A strictly convex quad whose determinant
/// magnitude is below `tolerance` is decided by [`max_min_angle_prefers_swap`]
/// instead, which keeps the current diagonal on exact ties.
///
/// # Examples
///
/// ```
/// use tin::geometry::point::Point3;
/// use tin::geometry::predicates::should_swap_diagonal;
///
/// // A thin quad whose long diagonal should be replaced by the short one.
/// let a = Point3::new(0.0, 0.0, 0.0);
/// let b = Point3::new(2.0, -0.2, 0.0);
/// let c = Point3::new(4.0, 0.0, 0.0);
/// let d = Point3::new(2.0, 0.2, 0.0);
/// assert!(should_swap_diagonal(&a, &b, &c, &d, 1e-12));
/// assert!(!should_swap_diagonal(&b, &c, &d, &a, 1e-12));
/// ```
#[must_use]
pub fn should_swap_diagonal(a: &Point3, b: &Point3, c: &Point3, d: &Point3, tolerance: f64) -> bool {
    let det = incircle_determinant(a, b, c, d);
    if det.abs() < tolerance && is_strictly_convex(a, b, c, d) {
        max_min_angle_prefers_swap(a, b, c, d)
    } else {
        det > 0.0
    }
}

/// Proper intersection of the segments `p1 p2` and `p3 p4`.
///
/// Returns the parameters `(t, u)` along each segment when both lie strictly
/// inside `(0, 1)`; touching endpoints and parallel overlaps return `None`.
#[must_use]
pub fn segment_intersection(
    p1: &Point3,
    p2: &Point3,
    p3: &Point3,
    p4: &Point3,
) -> Option<(f64, f64)> {
    let rx = p2.x - p1.x;
    let ry = p2.y - p1.y;
    let sx = p4.x - p3.x;
    let sy = p4.y - p3.y;
    let denom = rx.mul_add(sy, -(ry * sx));
    if denom == 0.0 {
        return None;
    }
    let qpx = p3.x - p1.x;
    let qpy = p3.y - p1.y;
    let t = qpx.mul_add(sy, -(qpy * sx)) / denom;
    let u = qpx.mul_add(ry, -(qpy * rx)) / denom;
    if t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0 {
        Some((t, u))
    } else {
        None
    }
}

/// Returns `true` if the segments `p1 p2` and `p3 p4` cross at a single interior
/// point of both.
#[must_use]
pub fn segments_cross(p1: &Point3, p2: &Point3, p3: &Point3, p4: &Point3) -> bool {
    orientation(p1, p2, p3) != orientation(p1, p2, p4)
        && orientation(p3, p4, p1) != orientation(p3, p4, p2)
        && orientation(p1, p2, p3) != Orientation::DEGENERATE
        && orientation(p1, p2, p4) != Orientation::DEGENERATE
        && orientation(p3, p4, p1) != Orientation::DEGENERATE
        && orientation(p3, p4, p2) != Orientation::DEGENERATE
}

// =============================================================================
// TESTS
// =============================================================================
