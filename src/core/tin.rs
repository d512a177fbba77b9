//! The triangulation object.
//!
//! A [`Tin`] owns the point table, the circular-list edge store, the feature
//! table with its per-point feature list, the hull ring and the numeric
//! tolerances every predicate uses. Triangles are implicit: `(a, b, c)` is a
//! triangle when the three points are mutually adjacent, `c` follows `b` in the
//! ring of `a`, and the triple turns counter-clockwise.
//!
//! The topological primitives here (diagonal swap, edge and triangle split,
//! hull-edge removal, interior point removal) each leave the edge store
//! symmetric; the higher-level algorithms compose them.

#![forbid(unsafe_code)]

use crate::core::algorithms::locate::{LocateError, Location, locate};
use crate::core::circular_list::{CircularList, CircularListError};
use crate::core::collections::{NeighborBuffer, SmallBuffer};
use crate::core::feature::{Feature, FeatureGeometry, FeatureId, FeatureState, FeatureTable};
use crate::core::feature_list::{FeatureList, PointRole};
use crate::core::hull::HullRing;
use crate::geometry::point::Point3;
use crate::geometry::predicates::{
    Orientation, is_strictly_convex, orientation, projection_parameter, should_swap_diagonal, signed_area2,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// TOLERANCES
// =============================================================================

/// Numeric tolerances shared by every predicate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Point-to-point tolerance: closer points are coincident.
    pub pp_tol: f64,
    /// Point-to-line tolerance: closer points lie on the line.
    pub pl_tol: f64,
    /// In-circle determinants below this magnitude use the max-min angle test.
    pub incircle: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            pp_tol: 1e-4,
            pl_tol: 1e-4,
            incircle: 1e-3,
        }
    }
}

// =============================================================================
// TIN
// =============================================================================

/// Triangulated irregular network.
#[derive(Clone, Debug, Default)]
pub struct Tin {
    pub(crate) points: Vec<Point3>,
    pub(crate) clist: CircularList,
    pub(crate) features: FeatureTable,
    pub(crate) flist: FeatureList,
    pub(crate) hull: HullRing,
    pub(crate) tolerances: Tolerances,
}

impl Tin {
    /// Creates an untriangulated object over `points`.
    #[must_use]
    pub fn new(points: Vec<Point3>, tolerances: Tolerances) -> Self {
        let n = points.len();
        Self {
            points,
            clist: CircularList::with_points(n),
            features: FeatureTable::new(),
            flist: FeatureList::with_points(n),
            hull: HullRing::with_points(n),
            tolerances,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Point table.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Point lookup.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<&Point3> {
        self.points.get(index)
    }

    /// Number of points in the table, including points removed but not yet
    /// compacted away.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of triangulation edges.
    #[must_use]
    pub fn num_lines(&self) -> usize {
        self.clist.num_edges()
    }

    /// Tolerances in use.
    #[must_use]
    pub const fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Edge store.
    #[must_use]
    pub const fn circular_list(&self) -> &CircularList {
        &self.clist
    }

    /// Feature table.
    #[must_use]
    pub const fn features(&self) -> &FeatureTable {
        &self.features
    }

    /// Per-point feature list.
    #[must_use]
    pub const fn feature_list(&self) -> &FeatureList {
        &self.flist
    }

    /// Hull ring.
    #[must_use]
    pub const fn hull(&self) -> &HullRing {
        &self.hull
    }

    /// Neighbours of `p` in counter-clockwise order.
    #[must_use]
    pub fn neighbors(&self, p: usize) -> NeighborBuffer {
        self.clist.neighbors(p)
    }

    /// Returns `true` if `a b` is an edge.
    #[must_use]
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.clist.has_edge(a, b)
    }

    /// All edges `(a, b)` with `a < b`.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.clist.edges()
    }

    /// Apex of the triangle on the left of `a → b`, if that triangle exists.
    #[must_use]
    pub fn left_apex(&self, a: usize, b: usize) -> Option<usize> {
        let c = self.clist.next_ccw(a, b)?;
        if c == b || !self.clist.has_edge(b, c) {
            return None;
        }
        (orientation(&self.points[a], &self.points[b], &self.points[c]) == Orientation::POSITIVE)
            .then_some(c)
    }

    /// Every triangle as a counter-clockwise index triple, smallest index first.
    #[must_use]
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let mut out = Vec::new();
        for a in 0..self.points.len() {
            for b in self.clist.ring(a) {
                if b < a {
                    continue;
                }
                if let Some(c) = self.left_apex(a, b)
                    && c > a
                {
                    out.push([a, b, c]);
                }
            }
        }
        out
    }

    /// Number of triangles.
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles().len()
    }

    /// Hull points in counter-clockwise order.
    #[must_use]
    pub fn hull_points(&self) -> Vec<usize> {
        self.hull.cycle()
    }

    /// Returns `true` if `p` is on the hull.
    #[must_use]
    pub fn is_hull_point(&self, p: usize) -> bool {
        self.hull.contains(p)
    }

    /// Returns `true` if `a b` is on the hull.
    #[must_use]
    pub fn is_hull_edge(&self, a: usize, b: usize) -> bool {
        self.hull.next(a) == Some(b) || self.hull.next(b) == Some(a)
    }

    /// Row lookup.
    #[must_use]
    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Rows sharing the stable id. Knot splitting can leave several rows per id.
    #[must_use]
    pub fn features_with_id(&self, id: FeatureId) -> Vec<usize> {
        self.features.indices_with_id(id)
    }

    /// Returns `true` if a live edge-constraining feature steps along `a b`.
    #[must_use]
    pub fn is_constrained(&self, a: usize, b: usize) -> bool {
        self.flist.features_on_edge(a, b).iter().any(|&f| {
            self.features
                .get(f)
                .is_some_and(|row| row.kind.constrains_edges() && row.state == FeatureState::Tin)
        })
    }

    /// Like [`Self::is_constrained`], but also honours the chain of `current`,
    /// the feature being inserted.
    pub(crate) fn is_locked(&self, a: usize, b: usize, current: usize) -> bool {
        self.flist.features_on_edge(a, b).iter().any(|&f| {
            f == current
                || self
                    .features
                    .get(f)
                    .is_some_and(|row| row.kind.constrains_edges() && row.state == FeatureState::Tin)
        })
    }

    /// Point chain of a `Tin` feature; closed chains repeat the first point.
    #[must_use]
    pub fn feature_points(&self, index: usize) -> Vec<usize> {
        let Some(first) = self.features.get(index).and_then(Feature::first_point) else {
            return Vec::new();
        };
        let mut chain = vec![first];
        let mut current = first;
        while chain.len() <= self.points.len() {
            match self.flist.find(current, index).and_then(|e| e.next_point) {
                Some(next) => {
                    chain.push(next);
                    if next == first {
                        break;
                    }
                    current = next;
                }
                None => break,
            }
        }
        chain
    }

    /// Coordinates of any feature row, whatever its state.
    #[must_use]
    pub fn feature_coordinates(&self, index: usize) -> Vec<Point3> {
        let Some(feature) = self.features.get(index) else {
            return Vec::new();
        };
        match &feature.geometry {
            FeatureGeometry::Offsets(offsets) => offsets
                .iter()
                .filter_map(|&o| self.points.get(o).copied())
                .collect(),
            FeatureGeometry::Points(points) => points.clone(),
            FeatureGeometry::Chain { .. } => self
                .feature_points(index)
                .into_iter()
                .map(|p| self.points[p])
                .collect(),
            FeatureGeometry::Empty => Vec::new(),
        }
    }

    /// Locates `(x, y)` in the triangulation.
    ///
    /// # Errors
    ///
    /// Fails on an empty triangulation.
    pub fn locate(&self, x: f64, y: f64) -> Result<Location, LocateError> {
        locate(self, x, y, None)
    }

    /// Elevation of the surface at `(x, y)`, or `None` outside the hull.
    #[must_use]
    pub fn interpolate_z(&self, x: f64, y: f64) -> Option<f64> {
        match self.locate(x, y).ok()? {
            Location::Vertex(v) => Some(self.points[v].z),
            Location::Edge(a, b) => {
                let q = Point3::new(x, y, 0.0);
                let t = projection_parameter(&self.points[a], &self.points[b], &q).clamp(0.0, 1.0);
                Some(self.points[a].lerp(&self.points[b], t).z)
            }
            Location::Triangle(a, b, c) => Some(planar_z(
                &self.points[a],
                &self.points[b],
                &self.points[c],
                x,
                y,
            )),
            Location::Outside => None,
        }
    }

    // -------------------------------------------------------------------------
    // Topological primitives
    // -------------------------------------------------------------------------

    /// Appends a point with empty rings.
    pub(crate) fn add_point(&mut self, p: Point3) -> usize {
        self.points.push(p);
        self.clist.push_point();
        self.flist.push_point();
        self.hull.push_point();
        self.points.len() - 1
    }

    /// Swaps the diagonal of the convex quadrilateral around `a b`.
    ///
    /// Returns the new diagonal `(l, r)` where `l` was the left apex, or `None`
    /// if either triangle is missing or the quadrilateral is not strictly convex.
    pub(crate) fn swap_diagonal(&mut self, a: usize, b: usize) -> Result<Option<(usize, usize)>, CircularListError> {
        let (Some(l), Some(r)) = (self.left_apex(a, b), self.left_apex(b, a)) else {
            return Ok(None);
        };
        if l == r || self.clist.has_edge(l, r) {
            return Ok(None);
        }
        let (pa, pb, pl, pr) = (self.points[a], self.points[b], self.points[l], self.points[r]);
        if !is_strictly_convex(&pa, &pr, &pb, &pl) {
            return Ok(None);
        }
        self.clist.delete_edge(a, b)?;
        self.clist.insert_after(l, r, a)?;
        self.clist.insert_after(r, l, b)?;
        Ok(Some((l, r)))
    }

    /// Splits edge `a b` at the new point `x`, re-threading features that ran
    /// along it. Returns the new point's index.
    pub(crate) fn split_edge(&mut self, a: usize, b: usize, x: Point3) -> Result<usize, CircularListError> {
        let l = self.left_apex(a, b);
        let r = self.left_apex(b, a);
        let on_edge = self.flist.features_on_edge(a, b);
        let xi = self.add_point(x);

        self.clist.replace_neighbor(a, b, xi)?;
        self.clist.replace_neighbor(b, a, xi)?;
        self.clist.insert_first(xi, a)?;
        let mut previous = a;
        if let Some(r) = r {
            self.clist.insert_after(xi, r, previous)?;
            self.clist.insert_after(r, xi, b)?;
            previous = r;
        }
        self.clist.insert_after(xi, b, previous)?;
        if let Some(l) = l {
            self.clist.insert_after(xi, l, b)?;
            self.clist.insert_after(l, xi, a)?;
        }

        let hull_edge = if self.hull.next(a) == Some(b) {
            Some((a, b))
        } else if self.hull.next(b) == Some(a) {
            Some((b, a))
        } else {
            None
        };
        if let Some((p, q)) = hull_edge {
            self.hull.insert_between(p, xi, q);
            if orientation(&self.points[p], &x, &self.points[q]) != Orientation::DEGENERATE {
                self.hull.set_convex(false);
            }
        }

        for feature in on_edge {
            if self.flist.find(a, feature).and_then(|e| e.next_point) == Some(b) {
                self.flist.set_next_point(a, feature, Some(xi));
                self.flist.add(xi, feature, Some(b), PointRole::Intersected);
            } else {
                self.flist.set_next_point(b, feature, Some(xi));
                self.flist.add(xi, feature, Some(a), PointRole::Intersected);
            }
        }
        Ok(xi)
    }

    /// Splits the counter-clockwise triangle `(a, b, c)` at the new point `x`.
    pub(crate) fn split_triangle(&mut self, a: usize, b: usize, c: usize, x: Point3) -> Result<usize, CircularListError> {
        let xi = self.add_point(x);
        self.clist.insert_after(a, xi, b)?;
        self.clist.insert_after(b, xi, c)?;
        self.clist.insert_after(c, xi, a)?;
        self.clist.insert_first(xi, a)?;
        self.clist.insert_after(xi, b, a)?;
        self.clist.insert_after(xi, c, b)?;
        Ok(xi)
    }

    /// Inserts a point inside the triangulation without restoring the Delaunay
    /// property. Points within `pp_tol` of an existing vertex resolve to it.
    pub(crate) fn insert_point(&mut self, p: Point3) -> Result<InsertedPoint, TopologyError> {
        match locate(self, p.x, p.y, None)? {
            Location::Vertex(v) => Ok(InsertedPoint::Existing(v)),
            Location::Edge(a, b) => Ok(InsertedPoint::New(self.split_edge(a, b, p)?)),
            Location::Triangle(a, b, c) => Ok(InsertedPoint::New(self.split_triangle(a, b, c, p)?)),
            Location::Outside => Err(TopologyError::OutsideTin { x: p.x, y: p.y }),
        }
    }

    /// Lawson edge flipping from a worklist, skipping edges for which `locked`
    /// returns `true`. Returns the number of swaps.
    pub(crate) fn legalize<F>(&mut self, mut worklist: Vec<(usize, usize)>, locked: F) -> Result<usize, CircularListError>
    where
        F: Fn(&Self, usize, usize) -> bool,
    {
        let mut swaps = 0;
        let limit = 16 * (self.clist.num_edges() + worklist.len() + 16);
        let mut steps = 0;
        while let Some((a, b)) = worklist.pop() {
            steps += 1;
            if steps > limit {
                tracing::warn!(swaps, "edge legalisation stopped at step limit");
                break;
            }
            if !self.clist.has_edge(a, b) || locked(self, a, b) {
                continue;
            }
            let (Some(l), Some(r)) = (self.left_apex(a, b), self.left_apex(b, a)) else {
                continue;
            };
            let (pa, pb, pl, pr) = (self.points[a], self.points[b], self.points[l], self.points[r]);
            if !should_swap_diagonal(&pb, &pl, &pa, &pr, self.tolerances.incircle) {
                continue;
            }
            if self.swap_diagonal(a, b)?.is_some() {
                swaps += 1;
                worklist.extend([(a, l), (l, b), (b, r), (r, a)]);
            }
        }
        Ok(swaps)
    }

    /// Edges of every triangle incident to `p`, for seeding [`Self::legalize`].
    pub(crate) fn star_edges(&self, p: usize) -> Vec<(usize, usize)> {
        let ring = self.clist.neighbors(p);
        let mut edges: Vec<(usize, usize)> = ring.iter().map(|&q| (p, q)).collect();
        for &q in &ring {
            if let Some(c) = self.left_apex(p, q) {
                edges.push((q, c));
            }
        }
        edges
    }

    /// Deletes hull edge `a → b` and promotes the interior apex to the hull.
    pub(crate) fn remove_hull_edge(&mut self, a: usize, b: usize) -> Result<Option<usize>, CircularListError> {
        if self.hull.next(a) != Some(b) {
            return Ok(None);
        }
        let Some(apex) = self.left_apex(a, b) else {
            return Ok(None);
        };
        if self.hull.contains(apex) {
            return Ok(None);
        }
        self.clist.delete_edge(a, b)?;
        self.hull.insert_between(a, apex, b);
        self.hull.set_convex(false);
        Ok(Some(apex))
    }

    /// Removes an interior point that touches no feature and re-triangulates its
    /// star by ear clipping.
    pub(crate) fn remove_interior_point(&mut self, p: usize) -> Result<bool, CircularListError> {
        if self.hull.contains(p) || self.flist.has_features(p) || !self.clist.has_ring(p) {
            return Ok(false);
        }
        let ring = self.clist.neighbors(p);
        for &q in &ring {
            if self.left_apex(p, q).is_none() {
                return Ok(false);
            }
        }
        self.clist.isolate_point(p);

        let mut polygon: SmallBuffer<usize, 16> = ring.iter().copied().collect();
        let mut added = Vec::new();
        let mut guard = polygon.len() * polygon.len() + 8;
        while polygon.len() > 3 && guard > 0 {
            guard -= 1;
            let n = polygon.len();
            let ear = (0..n).find(|&i| {
                let a = polygon[(i + n - 1) % n];
                let b = polygon[i];
                let c = polygon[(i + 1) % n];
                let (pa, pb, pc) = (self.points[a], self.points[b], self.points[c]);
                if orientation(&pa, &pb, &pc) != Orientation::POSITIVE || self.clist.has_edge(a, c) {
                    return false;
                }
                polygon.iter().all(|&v| {
                    v == a
                        || v == b
                        || v == c
                        || !point_in_triangle(&pa, &pb, &pc, &self.points[v])
                })
            });
            let Some(i) = ear else {
                break;
            };
            let a = polygon[(i + n - 1) % n];
            let b = polygon[i];
            let c = polygon[(i + 1) % n];
            self.clist.insert_after(a, c, b)?;
            self.clist.insert_before(c, a, b)?;
            added.push((a, c));
            polygon.remove(i);
        }
        self.legalize(added, |tin, a, b| tin.is_constrained(a, b))?;
        Ok(true)
    }
}

/// Outcome of [`Tin::insert_point`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InsertedPoint {
    /// An existing vertex within tolerance.
    Existing(usize),
    /// A newly created point.
    New(usize),
}

impl InsertedPoint {
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Existing(i) | Self::New(i) => i,
        }
    }
}

/// Structural failures of topological primitives.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum TopologyError {
    /// Edge-store inconsistency.
    #[error("edge store: {source}")]
    CircularList {
        /// Underlying error.
        #[from]
        source: CircularListError,
    },
    /// Point location failed.
    #[error("point location: {source}")]
    Locate {
        /// Underlying error.
        #[from]
        source: LocateError,
    },
    /// The point falls outside the triangulated area.
    #[error("point ({x}, {y}) is outside the triangulation")]
    OutsideTin {
        /// Easting.
        x: f64,
        /// Northing.
        y: f64,
    },
}

/// Elevation of the plane through `a, b, c` at `(x, y)`.
pub(crate) fn planar_z(a: &Point3, b: &Point3, c: &Point3, x: f64, y: f64) -> f64 {
    let det = signed_area2(a, b, c);
    if det == 0.0 {
        return (a.z + b.z + c.z) / 3.0;
    }
    let q = Point3::new(x, y, 0.0);
    let wa = signed_area2(b, c, &q) / det;
    let wb = signed_area2(c, a, &q) / det;
    let wc = 1.0 - wa - wb;
    wa.mul_add(a.z, wb.mul_add(b.z, wc * c.z))
}

fn point_in_triangle(a: &Point3, b: &Point3, c: &Point3, p: &Point3) -> bool {
    signed_area2(a, b, p) >= 0.0 && signed_area2(b, c, p) >= 0.0 && signed_area2(c, a, p) >= 0.0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Unit square split along the 0-2 diagonal.
    fn square() -> Tin {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let mut tin = Tin::new(points, Tolerances::default());
        let pts = tin.points.clone();
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)] {
            tin.clist.add_edge(a, b, &pts).unwrap();
        }
        tin.hull.set_cycle(&[0, 1, 2, 3]);
        tin
    }

    #[test]
    fn triangles_and_apexes() {
        let tin = square();
        assert_eq!(tin.triangles(), vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(tin.left_apex(0, 2), Some(3));
        assert_eq!(tin.left_apex(2, 0), Some(1));
        assert_eq!(tin.left_apex(1, 0), None);
        assert_eq!(tin.num_lines(), 5);
        assert!(tin.is_hull_edge(1, 2));
    }

    #[test]
    fn swap_diagonal_flips_quad() {
        let mut tin = square();
        assert_eq!(tin.swap_diagonal(0, 2).unwrap(), Some((3, 1)));
        assert!(tin.has_edge(1, 3));
        assert!(!tin.has_edge(0, 2));
        assert_eq!(tin.triangles(), vec![[0, 1, 3], [1, 2, 3]]);
        assert_eq!(tin.swap_diagonal(0, 1).unwrap(), None);
    }

    #[test]
    fn split_edge_on_hull_and_interior() {
        let mut tin = square();
        let x = tin.split_edge(0, 1, Point3::new(0.5, 0.0, 0.5)).unwrap();
        assert_eq!(tin.hull_points(), vec![0, x, 1, 2, 3]);
        assert_eq!(tin.num_triangles(), 3);
        let y = tin.split_edge(0, 2, Point3::new(0.5, 0.5, 1.0)).unwrap();
        assert_eq!(tin.num_triangles(), 5);
        assert!(tin.has_edge(y, 3) && tin.has_edge(y, 1) && tin.has_edge(y, x));
    }

    #[test]
    fn insert_and_remove_interior_point() {
        let mut tin = square();
        let inserted = tin.insert_point(Point3::new(0.7, 0.2, 0.0)).unwrap();
        let p = inserted.index();
        assert_eq!(tin.num_triangles(), 4);
        assert!(tin.remove_interior_point(p).unwrap());
        assert_eq!(tin.num_triangles(), 2);
        assert!(!tin.clist.has_ring(p));
    }

    #[test]
    fn interpolate_on_plane() {
        let tin = square();
        // z = x + y on this square
        assert_relative_eq!(tin.interpolate_z(0.25, 0.5).unwrap(), 0.75, epsilon = 1e-12);
        assert_relative_eq!(tin.interpolate_z(1.0, 1.0).unwrap(), 2.0);
        assert!(tin.interpolate_z(3.0, 3.0).is_none());
    }

    #[test]
    fn remove_hull_edge_promotes_apex() {
        let mut tin = square();
        let x = tin.split_triangle(0, 1, 2, Point3::new(0.6, 0.3, 0.0)).unwrap();
        assert_eq!(tin.remove_hull_edge(0, 1).unwrap(), Some(x));
        assert_eq!(tin.hull_points(), vec![0, x, 1, 2, 3]);
        assert!(!tin.hull().is_convex());
    }
}
