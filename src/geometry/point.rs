//! Three-dimensional survey points.
//!
//! Triangulation happens in plan (x, y); the elevation `z` rides along and is
//! only consulted when new points are interpolated onto constraint lines or the
//! surface.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// POINT STRUCT DEFINITION
// =============================================================================

/// A point with plan coordinates `x`, `y` and elevation `z`.
///
/// # Examples
///
/// ```
/// use tin::geometry::point::Point3;
///
/// let p = Point3::new(3.0, 4.0, 10.0);
/// let q = Point3::new(0.0, 0.0, 2.0);
/// assert_eq!(p.distance_2d(&q), 5.0);
/// assert_eq!(p.distance_squared_2d(&q), 25.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
    /// Elevation.
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns `true` if all three coordinates are finite.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Squared plan distance to `other`.
    #[must_use]
    pub fn distance_squared_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Plan distance to `other`.
    #[must_use]
    pub fn distance_2d(&self, other: &Self) -> f64 {
        self.distance_squared_2d(other).sqrt()
    }

    /// Returns the point at parameter `t` along `self → other`, interpolating all
    /// three coordinates.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            x: (other.x - self.x).mul_add(t, self.x),
            y: (other.y - self.y).mul_add(t, self.y),
            z: (other.z - self.z).mul_add(t, self.z),
        }
    }

    /// Plan midpoint of `self` and `other`.
    #[must_use]
    pub fn midpoint_2d(&self, other: &Self) -> (f64, f64) {
        (0.5 * (self.x + other.x), 0.5 * (self.y + other.y))
    }

    /// Bit-exact coordinate comparison, used when verifying snapshots.
    #[must_use]
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(coords: [f64; 3]) -> Self {
        Self::new(coords[0], coords[1], coords[2])
    }
}

impl From<(f64, f64, f64)> for Point3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn point_distance_ignores_elevation() {
        let a = Point3::new(0.0, 0.0, 100.0);
        let b = Point3::new(3.0, 4.0, -50.0);
        assert_relative_eq!(a.distance_2d(&b), 5.0);
    }

    #[test]
    fn point_lerp_interpolates_elevation() {
        let a = Point3::new(0.0, 0.0, 10.0);
        let b = Point3::new(10.0, 0.0, 20.0);
        let m = a.lerp(&b, 0.25);
        assert_relative_eq!(m.x, 2.5);
        assert_relative_eq!(m.z, 12.5);
    }

    #[test]
    fn point_conversions_and_finiteness() {
        let p: Point3 = [1.0, 2.0, 3.0].into();
        assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
        let arr: [f64; 3] = p.into();
        assert_eq!(arr, [1.0, 2.0, 3.0]);
        assert!(p.is_finite());
        assert!(!Point3::new(f64::NAN, 0.0, 0.0).is_finite());
        assert_eq!(format!("{p}"), "(1, 2, 3)");
    }

    #[test]
    fn point_serde_roundtrip() {
        let p = Point3::new(1.5, -2.25, 7.0);
        let json = serde_json::to_string(&p).unwrap();
        let back: Point3 = serde_json::from_str(&json).unwrap();
        assert!(p.bitwise_eq(&back));
    }
}
