//! Point location.
//!
//! Implements a visibility walk: starting from a triangle incident to a hint
//! vertex, repeatedly cross the edge that separates the current triangle from
//! the query point until no such edge remains.
//!
//! # Algorithm
//!
//! 1. Pick a starting triangle incident to the hint (or the hull start)
//! 2. Test the query point against each directed edge of the triangle
//! 3. Cross the first edge with the point strictly on its right
//! 4. Stop when the point is on the left of (or within tolerance of) all edges
//!
//! A walk that reaches the hull through a concavity, revisits a triangle or
//! exceeds its step limit falls back to an exhaustive scan, so the answer is
//! always exact with respect to the tolerances.
//!
//! # References
//!
//! - O. Devillers, S. Pion, and M. Teillaud, "Walking in a Triangulation",
//!   International Journal of Foundations of Computer Science, 2001.

#![forbid(unsafe_code)]

use crate::core::collections::FastHashSet;
use crate::core::tin::Tin;
use crate::geometry::point::Point3;
use crate::geometry::predicates::{projection_parameter, signed_area2};

/// Result of a point-location query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Within the point-to-point tolerance of a vertex.
    Vertex(usize),
    /// On the interior of an edge, within the point-to-line tolerance.
    Edge(usize, usize),
    /// Strictly inside a counter-clockwise triangle.
    Triangle(usize, usize, usize),
    /// Outside the triangulated area.
    Outside,
}

/// Error during point location.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LocateError {
    /// The triangulation has no points.
    #[error("Cannot locate in empty triangulation")]
    EmptyTriangulation,

    /// The hint is not a triangulated point.
    #[error("Invalid hint vertex: {point}")]
    InvalidHint {
        /// The hint index
        point: usize,
    },
}

/// Walk steps before falling back to the exhaustive scan.
const MAX_STEPS: usize = 100_000;

/// Locates `(x, y)` in `tin`.
///
/// # Errors
///
/// Returns [`LocateError`] if the triangulation is empty or `hint` is out of
/// range.
///
/// # Examples
///
/// ```rust
/// use tin::prelude::*;
///
/// let points = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(10.0, 0.0, 0.0),
///     Point3::new(0.0, 10.0, 0.0),
/// ];
/// let build = TinBuilder::new(points).build().unwrap();
/// assert!(matches!(build.tin.locate(2.0, 2.0), Ok(Location::Triangle(..))));
/// assert_eq!(build.tin.locate(20.0, 20.0), Ok(Location::Outside));
/// ```
pub fn locate(tin: &Tin, x: f64, y: f64, hint: Option<usize>) -> Result<Location, LocateError> {
    if tin.points.is_empty() {
        return Err(LocateError::EmptyTriangulation);
    }
    if let Some(h) = hint
        && h >= tin.points.len()
    {
        return Err(LocateError::InvalidHint { point: h });
    }
    let query = Point3::new(x, y, 0.0);

    let Some(start) = starting_triangle(tin, hint) else {
        return Ok(scan(tin, &query));
    };

    let mut current = start;
    let mut visited = FastHashSet::default();
    for _ in 0..MAX_STEPS {
        if !visited.insert(canonical(current)) {
            break;
        }
        let [a, b, c] = current;
        let mut crossed = false;
        for (p, q) in [(a, b), (b, c), (c, a)] {
            if signed_distance(tin, p, q, &query) < -tin.tolerances.pl_tol {
                match tin.left_apex(q, p) {
                    Some(apex) => {
                        current = [q, p, apex];
                        crossed = true;
                        break;
                    }
                    None => {
                        if tin.hull.is_convex() {
                            return Ok(snap_to_vertex(tin, &current, &query).unwrap_or(Location::Outside));
                        }
                        return Ok(scan(tin, &query));
                    }
                }
            }
        }
        if !crossed {
            return Ok(classify_in_triangle(tin, current, &query));
        }
    }
    tracing::debug!(x, y, "visibility walk did not settle; scanning");
    Ok(scan(tin, &query))
}

/// Signed perpendicular distance of `query` from the line `p → q`; positive
/// on the left.
fn signed_distance(tin: &Tin, p: usize, q: usize, query: &Point3) -> f64 {
    let (pp, pq) = (&tin.points[p], &tin.points[q]);
    let len = pp.distance_2d(pq);
    if len == 0.0 {
        return 0.0;
    }
    signed_area2(pp, pq, query) / len
}

fn canonical(t: [usize; 3]) -> [usize; 3] {
    let [a, b, c] = t;
    if a < b && a < c {
        [a, b, c]
    } else if b < c {
        [b, c, a]
    } else {
        [c, a, b]
    }
}

fn starting_triangle(tin: &Tin, hint: Option<usize>) -> Option<[usize; 3]> {
    let mut candidates = hint.into_iter().chain(tin.hull.start());
    let from_candidates = candidates.find_map(|v| triangle_at(tin, v));
    from_candidates.or_else(|| (0..tin.points.len()).find_map(|v| triangle_at(tin, v)))
}

fn triangle_at(tin: &Tin, v: usize) -> Option<[usize; 3]> {
    tin.clist
        .ring(v)
        .find_map(|q| tin.left_apex(v, q).map(|c| [v, q, c]))
}

fn snap_to_vertex(tin: &Tin, triangle: &[usize; 3], query: &Point3) -> Option<Location> {
    let pp_tol = tin.tolerances.pp_tol;
    triangle
        .iter()
        .find(|&&v| tin.points[v].distance_2d(query) <= pp_tol)
        .map(|&v| Location::Vertex(v))
}

/// Final classification once the walk has stopped in `triangle`.
fn classify_in_triangle(tin: &Tin, triangle: [usize; 3], query: &Point3) -> Location {
    if let Some(vertex) = snap_to_vertex(tin, &triangle, query) {
        return vertex;
    }
    let [a, b, c] = triangle;
    for (p, q) in [(a, b), (b, c), (c, a)] {
        if on_segment(tin, p, q, query) {
            return Location::Edge(p, q);
        }
    }
    Location::Triangle(a, b, c)
}

fn on_segment(tin: &Tin, p: usize, q: usize, query: &Point3) -> bool {
    let t = projection_parameter(&tin.points[p], &tin.points[q], query);
    (0.0..=1.0).contains(&t) && signed_distance(tin, p, q, query).abs() <= tin.tolerances.pl_tol
}

/// Exhaustive location: nearest vertex within tolerance, then edges, then
/// triangles.
fn scan(tin: &Tin, query: &Point3) -> Location {
    let pp_tol = tin.tolerances.pp_tol;
    let nearest = (0..tin.points.len())
        .filter(|&v| tin.clist.has_ring(v))
        .map(|v| (v, tin.points[v].distance_2d(query)))
        .min_by(|l, r| l.1.total_cmp(&r.1));
    if let Some((v, d)) = nearest
        && d <= pp_tol
    {
        return Location::Vertex(v);
    }
    for (p, q) in tin.clist.edges() {
        if on_segment(tin, p, q, query) {
            return Location::Edge(p, q);
        }
    }
    for [a, b, c] in tin.triangles() {
        let inside = [(a, b), (b, c), (c, a)]
            .iter()
            .all(|&(p, q)| signed_area2(&tin.points[p], &tin.points[q], query) > 0.0);
        if inside {
            return Location::Triangle(a, b, c);
        }
    }
    Location::Outside
}

// =============================================================================
// TESTS
// =============================================================================
