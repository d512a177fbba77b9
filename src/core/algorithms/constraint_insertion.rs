//! Constraint insertion engine.
//!
//! Threads features through an existing triangulation one at a time, in
//! feature-table order. For each feature:
//!
//! 1. **Validate**: polygons must be closed with at least three distinct points
//!    and are forced counter-clockwise; lines need two distinct points.
//! 2. **Check crossings**: void, island and hole polygons may not cross a live
//!    polygon of the same family (touching is allowed).
//! 3. **Insert segments**: each segment becomes a chain of triangulation
//!    edges, either by swapping crossing diagonals away or by splitting every
//!    crossed edge at the crossing point.
//! 4. **Split at knots**: a line that runs back into its own chain is cut; the
//!    uninserted tail becomes a new row sharing the id, processed later in the
//!    same pass. Polygons with a knot fail instead.
//! 5. **Check connectivity** and **commit**, or record the failure.
//!
//! One feature's failure never aborts the batch: the row becomes `TinError`
//! with a coordinate snapshot and the engine moves on.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::circular_list::CircularListError;
use crate::core::collections::{FastHashSet, fast_hash_set_with_capacity};
use crate::core::feature::{
    ElevationRule, Feature, FeatureGeometry, FeatureId, FeatureKind, FeatureState, InsertionMethod,
};
use crate::core::feature_list::PointRole;
use crate::core::rollback::RollbackStore;
use crate::core::tin::{Tin, TopologyError};
use crate::geometry::point::Point3;
use crate::geometry::polygon::{intersect_rings, signed_area};
use crate::geometry::predicates::{
    Orientation, orientation, projection_parameter, segments_cross, side_of_line, signed_area2,
};
use thiserror::Error;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Feature-local insertion failures. The offending row is marked `TinError`.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum FeatureInsertError {
    /// The polygon is not closed or has too few points.
    #[error("invalid polygon: {reason}")]
    InvalidPolygon {
        /// What is wrong.
        reason: String,
    },
    /// The polygon runs back into its own chain.
    #[error("knot at point {point}")]
    Knot {
        /// The point where insertion could not proceed.
        point: usize,
    },
    /// The threaded chain is not one connected walk.
    #[error("threaded chain is disconnected: reached {reached} of {expected} points")]
    Disconnected {
        /// Points carrying the feature.
        expected: usize,
        /// Points reached from the first point.
        reached: usize,
    },
    /// The polygon crosses a live void, island or hole.
    #[error("polygon crosses feature {other}")]
    IntersectsFeature {
        /// The crossed feature.
        other: FeatureId,
    },
    /// A segment leaves the triangulated area.
    #[error("segment towards ({x}, {y}) leaves the triangulation")]
    OutsideTin {
        /// Easting of the unreachable target.
        x: f64,
        /// Northing of the unreachable target.
        y: f64,
    },
    /// Swap-only insertion met a constrained edge.
    #[error("segment crosses constrained edge {a}-{b}")]
    ConstrainedCrossing {
        /// Edge endpoint.
        a: usize,
        /// Edge endpoint.
        b: usize,
    },
    /// Too few distinct points, zero area or a non-converging segment.
    #[error("degenerate feature: {reason}")]
    Degenerate {
        /// What is degenerate.
        reason: String,
    },
    /// A topological primitive failed.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl From<CircularListError> for FeatureInsertError {
    fn from(source: CircularListError) -> Self {
        Self::Topology(TopologyError::CircularList { source })
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// One failed row.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureFailure {
    /// Row index at the time of failure.
    pub feature: usize,
    /// Stable id.
    pub id: FeatureId,
    /// Type.
    pub kind: FeatureKind,
    /// Cause.
    pub error: FeatureInsertError,
}

/// Outcome counts of an insertion batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureInsertReport {
    /// Rows that reached `Tin`.
    pub inserted: usize,
    /// Rows that ended in `TinError`.
    pub failed: usize,
    /// Rows appended by knot splitting or clipping.
    pub split: usize,
    /// Every failure, in processing order.
    pub failures: Vec<FeatureFailure>,
}

impl FeatureInsertReport {
    /// Adds `other`'s counts to this report.
    pub fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.failed += other.failed;
        self.split += other.split;
        self.failures.extend(other.failures);
    }
}

// =============================================================================
// INSERTER
// =============================================================================

/// Segment insertion strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SegmentMode {
    /// Swap diagonals; fall back to [`SegmentMode::Intersect`].
    Swap,
    /// Swap diagonals; fail on constrained crossings.
    SwapOnly,
    /// Split crossed edges.
    Intersect,
}

/// Where a segment goes next from its current point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    /// The target is a neighbour.
    Reached,
    /// A neighbour lies on the segment.
    Vertex(usize),
    /// The segment leaves through edge `v w`, `v` on its right.
    Crossing(usize, usize),
    /// The segment leaves the triangulation.
    Blocked,
}

enum SwapOutcome {
    Reached(usize, Vec<(usize, usize)>),
    Locked(usize, usize),
    Stalled,
}

#[derive(Clone, Copy)]
enum Link {
    Added(usize),
    SetNext(usize),
}

enum SegmentFailure {
    Knot(usize),
    Error(FeatureInsertError),
}

impl From<FeatureInsertError> for SegmentFailure {
    fn from(error: FeatureInsertError) -> Self {
        Self::Error(error)
    }
}

impl From<CircularListError> for SegmentFailure {
    fn from(source: CircularListError) -> Self {
        Self::Error(source.into())
    }
}

/// Inserts features into a triangulation, recording outcomes in a report.
pub(crate) struct FeatureInserter<'a> {
    tin: &'a mut Tin,
    rollback: Option<&'a mut RollbackStore>,
    report: FeatureInsertReport,
}

impl<'a> FeatureInserter<'a> {
    pub(crate) fn new(tin: &'a mut Tin, rollback: Option<&'a mut RollbackStore>) -> Self {
        Self {
            tin,
            rollback,
            report: FeatureInsertReport::default(),
        }
    }

    pub(crate) fn finish(self) -> FeatureInsertReport {
        self.report
    }

    /// Inserts every pending row of `kind`, including rows appended while the
    /// pass runs.
    pub(crate) fn insert_kind(&mut self, kind: FeatureKind, token: &CancellationToken) -> Result<(), Cancelled> {
        token.check(BuildPhase::FeatureInsertion)?;
        let mut passes = 0;
        loop {
            let pending = self
                .tin
                .features
                .indices_of(kind, &[FeatureState::OffsetsArray, FeatureState::PointsArray]);
            if pending.is_empty() {
                break;
            }
            passes += 1;
            tracing::debug!(%kind, rows = pending.len(), passes, "inserting features");
            for f in pending {
                self.insert_feature(f);
            }
        }
        token.check(BuildPhase::FeatureInsertion)
    }

    /// Inserts one row, recording the outcome.
    pub(crate) fn insert_feature(&mut self, f: usize) -> bool {
        let Some((kind, coordinates)) = self
            .tin
            .features
            .get(f)
            .map(|row| (row.kind, matches!(row.geometry, FeatureGeometry::Points(_))))
        else {
            return false;
        };
        let result = match kind {
            FeatureKind::GroupSpots => self.chain_spots(f),
            _ if coordinates && kind.is_polygonal() => self.insert_draped_polygon(f),
            _ => self.insert_offsets(f),
        };
        match result {
            Ok(()) => {
                self.report.inserted += 1;
                true
            }
            Err(error) => {
                self.fail(f, error);
                false
            }
        }
    }

    fn fail(&mut self, f: usize, error: FeatureInsertError) {
        let snapshot = self.tin.feature_coordinates(f);
        for p in 0..self.tin.flist.num_points() {
            self.tin.flist.remove(p, f);
        }
        let Some(row) = self.tin.features.get_mut(f) else {
            return;
        };
        tracing::warn!(feature = f, id = %row.id, kind = %row.kind, %error, "feature insertion failed");
        row.state = FeatureState::TinError;
        row.geometry = FeatureGeometry::Points(snapshot);
        row.failure = Some(error.to_string());
        self.report.failed += 1;
        self.report.failures.push(FeatureFailure {
            feature: f,
            id: row.id,
            kind: row.kind,
            error,
        });
    }

    fn coordinates(&self, offsets: &[usize]) -> Vec<Point3> {
        offsets.iter().map(|&o| self.tin.points[o]).collect()
    }

    fn set_geometry(&mut self, f: usize, geometry: FeatureGeometry) {
        if let Some(row) = self.tin.features.get_mut(f) {
            row.geometry = geometry;
        }
    }

    /// Appends a row that copies `f`'s identity with new geometry.
    fn push_sibling(&mut self, f: usize, state: FeatureState, geometry: FeatureGeometry) -> Option<usize> {
        let row = self.tin.features.get(f)?;
        let sibling = Feature {
            kind: row.kind,
            state,
            user_tag: row.user_tag,
            id: row.id,
            drape: row.drape,
            geometry,
            failure: None,
        };
        self.report.split += 1;
        Some(self.tin.features.push(sibling))
    }

    fn snapshot(&mut self, f: usize, points: &[Point3]) {
        if let (Some(store), Some(row)) = (self.rollback.as_deref_mut(), self.tin.features.get(f)) {
            store.snapshot(row, points);
        }
    }

    // -------------------------------------------------------------------------
    // Per-type entry points
    // -------------------------------------------------------------------------

    fn insert_offsets(&mut self, f: usize) -> Result<(), FeatureInsertError> {
        let (kind, mut offsets) = {
            let row = self.tin.features.get(f).ok_or_else(|| degenerate("missing row"))?;
            let offsets = row
                .offsets()
                .ok_or_else(|| degenerate("row has no point offsets"))?
                .to_vec();
            (row.kind, offsets)
        };
        offsets.dedup();
        if kind.is_polygonal() {
            self.normalize_polygon(&mut offsets)?;
        } else if offsets.len() < 2 {
            return Err(degenerate("a line needs two distinct points"));
        }
        self.set_geometry(f, FeatureGeometry::Offsets(offsets.clone()));

        if kind.checks_polygon_intersection() {
            self.check_polygon_crossings(f, &offsets)?;
        }
        let mode = match (kind, kind.insertion_method()) {
            (FeatureKind::HullLine, _) => SegmentMode::SwapOnly,
            (_, InsertionMethod::Swap) => SegmentMode::Swap,
            (_, InsertionMethod::Intersect) => SegmentMode::Intersect,
        };
        self.thread_feature(f, kind, &offsets, mode, kind.elevation_rule())
    }

    fn normalize_polygon(&self, offsets: &mut Vec<usize>) -> Result<(), FeatureInsertError> {
        if offsets.len() < 2 || offsets.first() != offsets.last() {
            return Err(FeatureInsertError::InvalidPolygon {
                reason: "first and last points differ".into(),
            });
        }
        let distinct: FastHashSet<usize> = offsets.iter().copied().collect();
        if distinct.len() < 3 {
            return Err(FeatureInsertError::InvalidPolygon {
                reason: format!("{} distinct points, at least 3 required", distinct.len()),
            });
        }
        let ring = self.coordinates(&offsets[..offsets.len() - 1]);
        let area = signed_area(&ring);
        if area == 0.0 {
            return Err(degenerate("polygon has zero area"));
        }
        if area < 0.0 {
            offsets.reverse();
        }
        Ok(())
    }

    fn check_polygon_crossings(&self, f: usize, offsets: &[usize]) -> Result<(), FeatureInsertError> {
        let ring = self.coordinates(offsets);
        for (g, other) in self.tin.features.iter() {
            if g == f || !other.is_tin() || !other.kind.checks_polygon_intersection() {
                continue;
            }
            let other_ring = self.tin.feature_coordinates(g);
            for s in ring.windows(2) {
                for o in other_ring.windows(2) {
                    if segments_cross(&s[0], &s[1], &o[0], &o[1]) {
                        return Err(FeatureInsertError::IntersectsFeature { other: other.id });
                    }
                }
            }
        }
        Ok(())
    }

    /// Chains spot heights without connectivity.
    fn chain_spots(&mut self, f: usize) -> Result<(), FeatureInsertError> {
        let mut offsets = self
            .tin
            .features
            .get(f)
            .and_then(Feature::offsets)
            .ok_or_else(|| degenerate("row has no point offsets"))?
            .to_vec();
        let mut seen = fast_hash_set_with_capacity(offsets.len());
        offsets.retain(|&o| seen.insert(o));
        let Some(&first) = offsets.first() else {
            return Err(degenerate("no spots"));
        };
        for (i, &p) in offsets.iter().enumerate() {
            self.tin.flist.add(p, f, offsets.get(i + 1).copied(), PointRole::Inserted);
        }
        self.commit(f, first, &offsets);
        Ok(())
    }

    /// Draped polygons (drape voids and drape boundaries) keep coordinates
    /// until now: they are clipped to the hull, their vertices are inserted with surface elevations, and the
    /// result is threaded like any other polygon.
    fn insert_draped_polygon(&mut self, f: usize) -> Result<(), FeatureInsertError> {
        let geometry = self.tin.features.get(f).map(|row| row.geometry.clone());
        let mut ring = match geometry {
            Some(FeatureGeometry::Points(points)) => points,
            Some(FeatureGeometry::Offsets(_)) => return self.insert_offsets(f),
            _ => return Err(degenerate("row has no coordinates")),
        };
        let pp_tol = self.tin.tolerances.pp_tol;
        if ring.len() >= 2 && ring[0].distance_2d(&ring[ring.len() - 1]) <= pp_tol {
            ring.pop();
        } else {
            return Err(FeatureInsertError::InvalidPolygon {
                reason: "first and last points differ".into(),
            });
        }
        if ring.len() < 3 {
            return Err(FeatureInsertError::InvalidPolygon {
                reason: format!("{} distinct points, at least 3 required", ring.len()),
            });
        }
        if signed_area(&ring) < 0.0 {
            ring.reverse();
        }
        let hull: Vec<Point3> = self
            .tin
            .hull_points()
            .into_iter()
            .map(|p| self.tin.points[p])
            .collect();
        let mut pieces = intersect_rings(&ring, &hull).into_iter();
        let Some(piece) = pieces.next() else {
            return Err(FeatureInsertError::OutsideTin {
                x: ring[0].x,
                y: ring[0].y,
            });
        };
        for extra in pieces {
            let mut closed = extra;
            if let Some(&start) = closed.first() {
                closed.push(start);
            }
            self.push_sibling(f, FeatureState::PointsArray, FeatureGeometry::Points(closed));
        }

        let mut offsets = Vec::with_capacity(piece.len() + 1);
        for vertex in &piece {
            let z = self.tin.interpolate_z(vertex.x, vertex.y).unwrap_or(vertex.z);
            let inserted = self.tin.insert_point(Point3::new(vertex.x, vertex.y, z))?;
            let p = inserted.index();
            let seeds = self.tin.star_edges(p);
            self.tin.legalize(seeds, |tin, a, b| tin.is_constrained(a, b))?;
            offsets.push(p);
        }
        if let Some(&first) = offsets.first() {
            offsets.push(first);
        }
        if let Some(row) = self.tin.features.get_mut(f) {
            row.state = FeatureState::OffsetsArray;
            row.geometry = FeatureGeometry::Offsets(offsets);
        }
        self.insert_offsets(f)
    }

    // -------------------------------------------------------------------------
    // Threading
    // -------------------------------------------------------------------------

    fn thread_feature(
        &mut self,
        f: usize,
        kind: FeatureKind,
        offsets: &[usize],
        mode: SegmentMode,
        rule: ElevationRule,
    ) -> Result<(), FeatureInsertError> {
        let first = offsets[0];
        let mut touched = vec![first];
        self.tin.flist.add(first, f, None, PointRole::Inserted);

        let last_segment = offsets.len() - 2;
        for k in 0..=last_segment {
            let (p, q) = (offsets[k], offsets[k + 1]);
            let closing = (k == last_segment && q == first).then_some(first);
            match self.thread_segment(f, p, q, mode, rule, closing, &mut touched) {
                Ok(()) => {}
                Err(SegmentFailure::Knot(point)) => {
                    if kind.is_polygonal() || k == 0 {
                        return Err(FeatureInsertError::Knot { point });
                    }
                    self.split_at_knot(f, offsets, k, point);
                    break;
                }
                Err(SegmentFailure::Error(error)) => return Err(error),
            }
        }

        self.check_connectivity(f, first, kind.is_polygonal(), &touched)?;
        self.commit(f, first, &touched);
        Ok(())
    }

    fn split_at_knot(&mut self, f: usize, offsets: &[usize], k: usize, point: usize) {
        let original = self.coordinates(offsets);
        self.snapshot(f, &original);
        self.set_geometry(f, FeatureGeometry::Offsets(offsets[..=k].to_vec()));
        let tail = offsets[k..].to_vec();
        let sibling = self.push_sibling(f, FeatureState::OffsetsArray, FeatureGeometry::Offsets(tail));
        tracing::debug!(feature = f, knot = point, ?sibling, "feature split at knot");
    }

    fn commit(&mut self, f: usize, first: usize, touched: &[usize]) {
        for &p in touched {
            self.tin.flist.set_role(p, f, PointRole::Inserted);
        }
        if let Some(row) = self.tin.features.get_mut(f) {
            row.state = FeatureState::Tin;
            row.geometry = FeatureGeometry::Chain { first };
            row.failure = None;
        }
    }

    fn check_connectivity(
        &mut self,
        f: usize,
        first: usize,
        polygonal: bool,
        touched: &[usize],
    ) -> Result<(), FeatureInsertError> {
        let expected: FastHashSet<usize> = touched
            .iter()
            .copied()
            .filter(|&p| self.tin.flist.find(p, f).is_some())
            .collect();
        let mut visited = fast_hash_set_with_capacity(touched.len());
        let mut current = first;
        let mut closed = false;
        while visited.insert(current) {
            match self.tin.flist.find(current, f).and_then(|e| e.next_point) {
                Some(next) if next == first => {
                    if polygonal {
                        closed = true;
                    } else {
                        // Accidental closure of a line.
                        self.tin.flist.set_next_point(current, f, None);
                    }
                    break;
                }
                Some(next) => current = next,
                None => break,
            }
        }
        if visited.len() != expected.len() || (polygonal && !closed) {
            return Err(FeatureInsertError::Disconnected {
                expected: expected.len(),
                reached: visited.len(),
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn thread_segment(
        &mut self,
        f: usize,
        p: usize,
        q: usize,
        mode: SegmentMode,
        rule: ElevationRule,
        closing: Option<usize>,
        touched: &mut Vec<usize>,
    ) -> Result<(), SegmentFailure> {
        let mut journal = Vec::new();
        let result = self.thread_segment_inner(f, p, q, mode, rule, closing, touched, &mut journal);
        if matches!(result, Err(SegmentFailure::Knot(_))) {
            for link in journal.into_iter().rev() {
                match link {
                    Link::Added(point) => {
                        self.tin.flist.remove(point, f);
                    }
                    Link::SetNext(point) => {
                        self.tin.flist.set_next_point(point, f, None);
                    }
                }
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn thread_segment_inner(
        &mut self,
        f: usize,
        p: usize,
        q: usize,
        mut mode: SegmentMode,
        rule: ElevationRule,
        closing: Option<usize>,
        touched: &mut Vec<usize>,
        journal: &mut Vec<Link>,
    ) -> Result<(), SegmentFailure> {
        let (pp, pq) = (self.tin.points[p], self.tin.points[q]);
        let mut seeds = Vec::new();
        let mut cur = p;
        let limit = 4 * self.tin.points.len() + 64;
        let mut steps = 0;
        while cur != q {
            steps += 1;
            if steps > limit {
                return Err(degenerate("segment insertion did not converge").into());
            }
            let next = match mode {
                SegmentMode::Swap | SegmentMode::SwapOnly => match self.swap_step(f, cur, q)? {
                    SwapOutcome::Reached(stop, flipped) => {
                        seeds.extend(flipped);
                        stop
                    }
                    SwapOutcome::Locked(a, b) if mode == SegmentMode::SwapOnly => {
                        return Err(FeatureInsertError::ConstrainedCrossing { a, b }.into());
                    }
                    SwapOutcome::Stalled if mode == SegmentMode::SwapOnly => {
                        return Err(degenerate("diagonal swapping stalled").into());
                    }
                    SwapOutcome::Locked(..) | SwapOutcome::Stalled => {
                        tracing::trace!(feature = f, from = cur, to = q, "swap insertion falls back to intersection");
                        mode = SegmentMode::Intersect;
                        continue;
                    }
                },
                SegmentMode::Intersect => {
                    let next = self.intersect_step(f, cur, q, &pp, &pq, rule, &mut seeds)?;
                    if next != q && self.tin.flist.find(next, f).is_some() {
                        touched.push(next);
                    }
                    next
                }
            };
            self.link(f, cur, next, closing, touched, journal)?;
            cur = next;
        }
        self.tin.legalize(seeds, |tin, a, b| tin.is_locked(a, b, f))?;
        Ok(())
    }

    fn link(
        &mut self,
        f: usize,
        a: usize,
        b: usize,
        closing: Option<usize>,
        touched: &mut Vec<usize>,
        journal: &mut Vec<Link>,
    ) -> Result<(), SegmentFailure> {
        if self.tin.flist.find(b, f).is_some() && Some(b) != closing {
            return Err(SegmentFailure::Knot(b));
        }
        match self.tin.flist.find(a, f).map(|e| e.next_point) {
            Some(Some(_)) => return Err(SegmentFailure::Knot(a)),
            Some(None) => {
                self.tin.flist.set_next_point(a, f, Some(b));
                journal.push(Link::SetNext(a));
            }
            None => {
                self.tin.flist.add(a, f, Some(b), PointRole::Intersected);
                journal.push(Link::Added(a));
                touched.push(a);
            }
        }
        if self.tin.flist.find(b, f).is_none() {
            self.tin.flist.add(b, f, None, PointRole::Intersected);
            journal.push(Link::Added(b));
            touched.push(b);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Geometry of a segment walk
    // -------------------------------------------------------------------------

    fn side(&self, from: usize, to: usize, x: usize) -> Orientation {
        let t = &self.tin;
        side_of_line(&t.points[from], &t.points[to], &t.points[x], t.tolerances.pl_tol)
    }

    fn next_event(&self, cur: usize, q: usize) -> Event {
        let tin = &self.tin;
        if tin.has_edge(cur, q) {
            return Event::Reached;
        }
        let (pc, pq) = (&tin.points[cur], &tin.points[q]);
        let ring = tin.neighbors(cur);
        let on_segment = ring
            .iter()
            .copied()
            .filter(|&v| self.side(cur, q, v) == Orientation::DEGENERATE)
            .map(|v| (v, projection_parameter(pc, pq, &tin.points[v])))
            .filter(|&(_, t)| t > 0.0 && t < 1.0)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((v, _)) = on_segment {
            return Event::Vertex(v);
        }
        let crossing = |strict: bool| {
            ring.iter().copied().find_map(|v| {
                let w = tin.left_apex(cur, v)?;
                let (sv, sw) = if strict {
                    (self.side(cur, q, v), self.side(cur, q, w))
                } else {
                    (
                        orientation(pc, pq, &tin.points[v]),
                        orientation(pc, pq, &tin.points[w]),
                    )
                };
                (sv == Orientation::NEGATIVE && sw == Orientation::POSITIVE).then_some((v, w))
            })
        };
        match crossing(true).or_else(|| crossing(false)) {
            Some((v, w)) => Event::Crossing(v, w),
            None => Event::Blocked,
        }
    }

    fn outside(&self, q: usize) -> FeatureInsertError {
        FeatureInsertError::OutsideTin {
            x: self.tin.points[q].x,
            y: self.tin.points[q].y,
        }
    }

    /// Edges crossed by `cur → q` from the first crossing `v w` up to the next
    /// vertex on the segment, which is returned with them.
    fn crossing_run(
        &self,
        cur: usize,
        q: usize,
        mut v: usize,
        mut w: usize,
    ) -> Result<(Vec<(usize, usize)>, usize), FeatureInsertError> {
        let mut edges = vec![(v, w)];
        let limit = self.tin.num_lines() + 1;
        while edges.len() <= limit {
            let x = self.tin.left_apex(w, v).ok_or_else(|| self.outside(q))?;
            if x == q {
                return Ok((edges, q));
            }
            match self.side(cur, q, x) {
                Orientation::DEGENERATE => return Ok((edges, x)),
                Orientation::POSITIVE => w = x,
                Orientation::NEGATIVE => v = x,
            }
            edges.push((v, w));
        }
        Err(degenerate("crossing walk did not terminate"))
    }

    fn swap_step(&mut self, f: usize, cur: usize, q: usize) -> Result<SwapOutcome, FeatureInsertError> {
        let (v, w) = match self.next_event(cur, q) {
            Event::Reached => return Ok(SwapOutcome::Reached(q, Vec::new())),
            Event::Vertex(v) => return Ok(SwapOutcome::Reached(v, Vec::new())),
            Event::Blocked => return Err(self.outside(q)),
            Event::Crossing(v, w) => (v, w),
        };
        let (crossed, stop) = self.crossing_run(cur, q, v, w)?;
        if let Some(&(a, b)) = crossed.iter().find(|&&(a, b)| self.tin.is_locked(a, b, f)) {
            return Ok(SwapOutcome::Locked(a, b));
        }

        let (pc, ps) = (self.tin.points[cur], self.tin.points[stop]);
        let still_crosses = |tin: &Tin, l: usize, r: usize| {
            l != cur
                && l != stop
                && r != cur
                && r != stop
                && {
                    let (sl, sr) = (orientation(&pc, &ps, &tin.points[l]), orientation(&pc, &ps, &tin.points[r]));
                    sl != Orientation::DEGENERATE && sr != Orientation::DEGENERATE && sl != sr
                }
        };
        let mut queue: VecDeque<(usize, usize)> = crossed.into();
        let mut flipped = Vec::new();
        let limit = 8 * queue.len() * queue.len() + 64;
        let mut steps = 0;
        while let Some((a, b)) = queue.pop_front() {
            steps += 1;
            if steps > limit {
                return Ok(SwapOutcome::Stalled);
            }
            if !self.tin.has_edge(a, b) {
                continue;
            }
            match self.tin.swap_diagonal(a, b)? {
                Some((l, r)) if still_crosses(&*self.tin, l, r) => queue.push_back((l, r)),
                Some(diagonal) => flipped.push(diagonal),
                None => queue.push_back((a, b)),
            }
        }
        if self.tin.has_edge(cur, stop) {
            Ok(SwapOutcome::Reached(stop, flipped))
        } else {
            Ok(SwapOutcome::Stalled)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn intersect_step(
        &mut self,
        f: usize,
        cur: usize,
        q: usize,
        p_start: &Point3,
        p_end: &Point3,
        rule: ElevationRule,
        seeds: &mut Vec<(usize, usize)>,
    ) -> Result<usize, FeatureInsertError> {
        let (v, w) = match self.next_event(cur, q) {
            Event::Reached => return Ok(q),
            Event::Vertex(v) => return Ok(v),
            Event::Blocked => return Err(self.outside(q)),
            Event::Crossing(v, w) => (v, w),
        };
        let (pc, pq) = (self.tin.points[cur], self.tin.points[q]);
        let (pv, pw) = (self.tin.points[v], self.tin.points[w]);
        let dv = signed_area2(&pc, &pq, &pv);
        let dw = signed_area2(&pc, &pq, &pw);
        let u = if dv == dw { 0.5 } else { (dv / (dv - dw)).clamp(0.0, 1.0) };
        let on_edge = pv.lerp(&pw, u);
        let z = match rule {
            ElevationRule::Drape => on_edge.z,
            ElevationRule::Break => {
                let t = projection_parameter(p_start, p_end, &on_edge).clamp(0.0, 1.0);
                p_start.lerp(p_end, t).z
            }
        };
        let x = self.tin.split_edge(v, w, Point3::new(on_edge.x, on_edge.y, z))?;
        tracing::trace!(feature = f, point = x, "crossing point added");
        seeds.extend(self.tin.star_edges(x));
        Ok(x)
    }
}

fn degenerate(reason: &str) -> FeatureInsertError {
    FeatureInsertError::Degenerate {
        reason: reason.to_owned(),
    }
}

/// Re-legalises every unconstrained edge of the triangulation.
pub(crate) fn relegalize_all(tin: &mut Tin) -> Result<usize, CircularListError> {
    let edges = tin.edges();
    let swaps = tin.legalize(edges, |tin, a, b| tin.is_constrained(a, b))?;
    tracing::debug!(swaps, "constrained Delaunay legalisation");
    Ok(swaps)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithms::divide_and_conquer::triangulate;
    use crate::core::tin::Tolerances;

    /// `n × n` grid with spacing 10, slightly jittered to avoid cocircularity.
    #[allow(clippy::cast_precision_loss)]
    fn grid(n: usize) -> Tin {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let jitter = ((i * 7 + j * 13) % 10) as f64 * 1e-3;
                points.push(Point3::new(
                    i as f64 * 10.0 + jitter,
                    j as f64 * 10.0 - jitter,
                    (i + j) as f64,
                ));
            }
        }
        let mut tin = Tin::new(points, Tolerances::default());
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        tin
    }

    fn push(tin: &mut Tin, kind: FeatureKind, geometry: FeatureGeometry, id: u64) -> usize {
        let state = match geometry {
            FeatureGeometry::Points(_) => FeatureState::PointsArray,
            _ => FeatureState::OffsetsArray,
        };
        tin.features.push(Feature {
            kind,
            state,
            user_tag: 0,
            id: FeatureId(id),
            drape: false,
            geometry,
            failure: None,
        })
    }

    fn add_coordinate_points(tin: &mut Tin, coords: &[(f64, f64, f64)]) -> Vec<usize> {
        coords
            .iter()
            .map(|&(x, y, z)| tin.insert_point(Point3::new(x, y, z)).unwrap().index())
            .collect()
    }

    fn chain_is_edges(tin: &Tin, f: usize) -> bool {
        tin.feature_points(f).windows(2).all(|w| tin.has_edge(w[0], w[1]))
    }

    #[test]
    fn breakline_across_grid_becomes_edges() {
        let mut tin = grid(6);
        // Diagonal against the grain: from (0, 10) to (50, 30).
        let f = push(&mut tin, FeatureKind::Breakline, FeatureGeometry::Offsets(vec![6, 23]), 1);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        inserter.insert_kind(FeatureKind::Breakline, &CancellationToken::new()).unwrap();
        let report = inserter.finish();
        assert_eq!(report.inserted, 1);
        assert_eq!(tin.features.get(f).unwrap().state, FeatureState::Tin);
        let chain = tin.feature_points(f);
        assert_eq!(chain.first(), Some(&6));
        assert_eq!(chain.last(), Some(&23));
        assert!(chain_is_edges(&tin, f));
        assert!(tin.is_constrained(chain[0], chain[1]));
    }

    #[test]
    fn contour_crossing_a_breakline_shares_a_point() {
        let mut tin = grid(6);
        let ends = add_coordinate_points(&mut tin, &[(5.0, 25.0, 0.0), (45.0, 25.0, 0.0)]);
        let cross = add_coordinate_points(&mut tin, &[(25.0, 5.0, 0.0), (25.0, 45.0, 0.0)]);
        let a = push(&mut tin, FeatureKind::Breakline, FeatureGeometry::Offsets(ends), 1);
        let b = push(&mut tin, FeatureKind::ContourLine, FeatureGeometry::Offsets(cross), 2);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        let token = CancellationToken::new();
        inserter.insert_kind(FeatureKind::Breakline, &token).unwrap();
        inserter.insert_kind(FeatureKind::ContourLine, &token).unwrap();
        assert_eq!(inserter.finish().inserted, 2);
        let pa: FastHashSet<usize> = tin.feature_points(a).into_iter().collect();
        let shared = tin.feature_points(b).into_iter().filter(|p| pa.contains(p)).count();
        assert_eq!(shared, 1);
        assert!(chain_is_edges(&tin, a) && chain_is_edges(&tin, b));
    }

    #[test]
    fn self_crossing_line_is_split_at_knot() {
        let mut tin = grid(6);
        let pts = add_coordinate_points(
            &mut tin,
            &[(5.0, 5.0, 0.0), (45.0, 45.0, 0.0), (45.0, 5.0, 0.0), (5.0, 45.0, 0.0)],
        );
        let f = push(&mut tin, FeatureKind::ContourLine, FeatureGeometry::Offsets(pts.clone()), 7);
        let mut store = RollbackStore::new(Tolerances::default());
        let mut inserter = FeatureInserter::new(&mut tin, Some(&mut store));
        inserter.insert_kind(FeatureKind::ContourLine, &CancellationToken::new()).unwrap();
        let report = inserter.finish();
        assert_eq!(report.split, 1);
        assert_eq!(report.failed, 0);
        let rows = tin.features_with_id(FeatureId(7));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|&r| tin.features.get(r).unwrap().is_tin()));
        assert!(rows.iter().all(|&r| chain_is_edges(&tin, r)));
        assert_eq!(store.points(FeatureId(7)).map(|p| p.len()), Some(4));
        let head = tin.feature_points(f);
        assert_eq!(head.first(), Some(&pts[0]));
        assert_eq!(head.last(), Some(&pts[2]));
    }

    #[test]
    fn crossing_voids_are_rejected() {
        let mut tin = grid(6);
        let first = push(
            &mut tin,
            FeatureKind::Void,
            FeatureGeometry::Offsets(vec![7, 9, 21, 19, 7]),
            1,
        );
        // Clockwise input, crossing the first void.
        let second = push(
            &mut tin,
            FeatureKind::Void,
            FeatureGeometry::Offsets(vec![14, 26, 28, 16, 14]),
            2,
        );
        let mut inserter = FeatureInserter::new(&mut tin, None);
        inserter.insert_kind(FeatureKind::Void, &CancellationToken::new()).unwrap();
        let report = inserter.finish();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(tin.features.get(first).unwrap().state, FeatureState::Tin);
        let failed = tin.features.get(second).unwrap();
        assert_eq!(failed.state, FeatureState::TinError);
        assert!(matches!(failed.geometry, FeatureGeometry::Points(ref p) if p.len() == 5));
        assert_eq!(
            report.failures[0].error,
            FeatureInsertError::IntersectsFeature { other: FeatureId(1) }
        );
    }

    #[test]
    fn polygon_is_forced_counter_clockwise_and_closed() {
        let mut tin = grid(5);
        let f = push(
            &mut tin,
            FeatureKind::Island,
            FeatureGeometry::Offsets(vec![6, 16, 18, 8, 6]),
            3,
        );
        let mut inserter = FeatureInserter::new(&mut tin, None);
        assert!(inserter.insert_feature(f));
        let chain = tin.feature_points(f);
        assert_eq!(chain.first(), chain.last());
        let ring: Vec<Point3> = chain[..chain.len() - 1].iter().map(|&p| tin.points[p]).collect();
        assert!(signed_area(&ring) > 0.0);
    }

    #[test]
    fn unclosed_polygon_and_short_line_fail() {
        let mut tin = grid(4);
        let open = push(&mut tin, FeatureKind::Hole, FeatureGeometry::Offsets(vec![0, 1, 5]), 1);
        let short = push(&mut tin, FeatureKind::Breakline, FeatureGeometry::Offsets(vec![3, 3]), 2);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        assert!(!inserter.insert_feature(open));
        assert!(!inserter.insert_feature(short));
        let report = inserter.finish();
        assert!(matches!(report.failures[0].error, FeatureInsertError::InvalidPolygon { .. }));
        assert!(matches!(report.failures[1].error, FeatureInsertError::Degenerate { .. }));
    }

    #[test]
    fn group_spots_chain_without_edges() {
        let mut tin = grid(4);
        let f = push(
            &mut tin,
            FeatureKind::GroupSpots,
            FeatureGeometry::Offsets(vec![0, 15, 0, 5]),
            9,
        );
        let mut inserter = FeatureInserter::new(&mut tin, None);
        assert!(inserter.insert_feature(f));
        assert_eq!(tin.feature_points(f), vec![0, 15, 5]);
        assert!(!tin.is_constrained(0, 15));
    }

    #[test]
    fn draped_void_is_clipped_to_hull() {
        let mut tin = grid(5);
        let ring = vec![
            Point3::new(20.0, 20.0, 0.0),
            Point3::new(60.0, 20.0, 0.0),
            Point3::new(60.0, 30.0, 0.0),
            Point3::new(20.0, 30.0, 0.0),
            Point3::new(20.0, 20.0, 0.0),
        ];
        let f = push(&mut tin, FeatureKind::DrapeVoid, FeatureGeometry::Points(ring), 4);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        inserter.insert_kind(FeatureKind::DrapeVoid, &CancellationToken::new()).unwrap();
        assert_eq!(inserter.finish().inserted, 1);
        let chain = tin.feature_points(f);
        assert!(chain.iter().all(|&p| tin.points[p].x <= 40.01));
        assert!(chain_is_edges(&tin, f));
    }
}
