//! Boundary and edge-option post-processing.
//!
//! Exactly one [`EdgeOption`] shapes the outer boundary of a build:
//!
//! - **Sliver** and **`MaxSide`** peel hull triangles: deleting hull edge
//!   `a → b` promotes the interior apex of its triangle to the hull.
//! - **`BoundaryPolygon`**, **`DrapeBoundary`** and **`BoundaryLines`** thread a
//!   boundary ring through the triangulation and delete every edge that no
//!   longer borders a triangle inside it. Features losing geometry are
//!   snapshotted for rollback first.
//!
//! Hull edges carrying a live feature are never removed by peeling.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::algorithms::constraint_insertion::{FeatureInsertReport, FeatureInserter};
use crate::core::algorithms::voids::{clip_feature_chain, snapshot_feature};
use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::circular_list::CircularListError;
use crate::core::collections::{FastHashSet, fast_hash_set_with_capacity};
use crate::core::feature::{Feature, FeatureGeometry, FeatureKind, FeatureState};
use crate::core::feature_list::PointRole;
use crate::core::rollback::RollbackStore;
use crate::core::tin::Tin;
use crate::geometry::point::Point3;
use crate::geometry::polygon::{contains, signed_area};
use crate::geometry::predicates::distance_to_segment;

/// Boundary policy applied after feature insertion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOption {
    /// Keep the convex hull.
    #[default]
    None,
    /// Peel thin hull triangles.
    Sliver,
    /// Peel hull edges longer than the maximum side.
    MaxSide,
    /// Clip to a hard [`FeatureKind::Hull`] polygon.
    BoundaryPolygon,
    /// Clip to joined [`FeatureKind::HullLine`] features.
    BoundaryLines,
    /// Clip to a draped [`FeatureKind::Hull`] polygon.
    DrapeBoundary,
}

/// Numeric parameters of the peeling options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeParameters {
    /// Maximum hull edge length; `0` disables.
    pub max_side: f64,
    /// Tolerated excess of the two short sides over the hull side.
    pub sliver_ratio: f64,
}

/// Fatal failures while applying an edge option.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EdgeOptionError {
    /// The edge store is inconsistent.
    #[error(transparent)]
    CircularList(#[from] CircularListError),
    /// The caller cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Outcome of [`apply_edge_option`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeOptionReport {
    /// Edges deleted by peeling or clipping.
    pub removed_edges: usize,
    /// Rows that lost part of their geometry.
    pub clipped_features: usize,
    /// Rows appended for surviving runs.
    pub split: usize,
    /// Whether a boundary ring was applied.
    pub clipped: bool,
    /// Insertion of the boundary features.
    pub insertion: FeatureInsertReport,
}

/// Applies `option` to `tin`.
///
/// Boundary features that fail to insert leave the hull untouched; the
/// failure is recorded in the insertion report.
///
/// # Errors
///
/// Fails on cancellation or an edge-store inconsistency.
pub(crate) fn apply_edge_option(
    tin: &mut Tin,
    option: EdgeOption,
    params: EdgeParameters,
    rollback: Option<&mut RollbackStore>,
    token: &CancellationToken,
) -> Result<EdgeOptionReport, EdgeOptionError> {
    token.check(BuildPhase::EdgeOption)?;
    let mut report = EdgeOptionReport::default();
    match option {
        EdgeOption::None => {}
        EdgeOption::Sliver => report.removed_edges = remove_slivers(tin, params.sliver_ratio)?,
        EdgeOption::MaxSide => report.removed_edges = remove_long_edges(tin, params.max_side)?,
        EdgeOption::BoundaryPolygon | EdgeOption::DrapeBoundary => {
            clip_to_boundary_polygon(tin, rollback, &mut report, token)?;
        }
        EdgeOption::BoundaryLines => {
            if params.max_side > 0.0 {
                report.removed_edges = remove_long_edges(tin, params.max_side)?;
            }
            clip_to_boundary_lines(tin, rollback, &mut report, token)?;
        }
    }
    tracing::debug!(
        ?option,
        removed_edges = report.removed_edges,
        clipped_features = report.clipped_features,
        clipped = report.clipped,
        "edge option applied"
    );
    token.check(BuildPhase::EdgeOption)?;
    Ok(report)
}

// =============================================================================
// PEELING
// =============================================================================

fn peel_once<F>(tin: &mut Tin, mut removable: F) -> Result<usize, CircularListError>
where
    F: FnMut(&Tin, usize, usize, usize) -> bool,
{
    let mut removed = 0;
    for (a, b) in tin.hull.edges() {
        if tin.hull.next(a) != Some(b) || tin.is_constrained(a, b) {
            continue;
        }
        let Some(apex) = tin.left_apex(a, b) else {
            continue;
        };
        if tin.hull.contains(apex) || !removable(tin, a, b, apex) {
            continue;
        }
        if tin.remove_hull_edge(a, b)?.is_some() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Removes hull edges whose interior apex lies within `pl_tol` of the edge.
pub(crate) fn remove_precision_slivers(tin: &mut Tin) -> Result<usize, CircularListError> {
    let tolerance = tin.tolerances.pl_tol;
    let mut total = 0;
    loop {
        let removed = peel_once(tin, |tin, a, b, c| {
            let (pa, pb, pc) = (tin.points[a], tin.points[b], tin.points[c]);
            let length = pa.distance_2d(&pb);
            distance_to_segment(&pa, &pb, &pc) <= tolerance
                && pa.distance_2d(&pc) < length
                && pb.distance_2d(&pc) < length
        })?;
        if removed == 0 {
            break;
        }
        total += removed;
    }
    if total > 0 {
        tracing::debug!(removed = total, "precision slivers removed");
    }
    Ok(total)
}

/// Removes hull triangles whose inner sides exceed the hull side by at most
/// `ratio` of its length, to a fixed point.
pub(crate) fn remove_slivers(tin: &mut Tin, ratio: f64) -> Result<usize, CircularListError> {
    let mut total = 0;
    loop {
        let removed = peel_once(tin, |tin, a, b, c| {
            let (pa, pb, pc) = (tin.points[a], tin.points[b], tin.points[c]);
            let long = pa.distance_2d(&pb);
            long > 0.0 && pa.distance_2d(&pc) + pc.distance_2d(&pb) <= long * (1.0 + ratio)
        })?;
        if removed == 0 {
            break;
        }
        total += removed;
    }
    Ok(total)
}

#[derive(Clone, Copy, Debug)]
struct LongEdge {
    length: f64,
    a: usize,
    b: usize,
}

impl PartialEq for LongEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LongEdge {}

impl PartialOrd for LongEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LongEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.length
            .total_cmp(&other.length)
            .then_with(|| (self.a, self.b).cmp(&(other.a, other.b)))
    }
}

/// Removes unprotected hull edges longer than `max_side`, longest first.
pub(crate) fn remove_long_edges(tin: &mut Tin, max_side: f64) -> Result<usize, CircularListError> {
    if max_side <= 0.0 {
        return Ok(0);
    }
    let long_edge = |tin: &Tin, a: usize, b: usize| {
        let length = tin.points[a].distance_2d(&tin.points[b]);
        (length > max_side && !tin.is_constrained(a, b)).then_some(LongEdge { length, a, b })
    };
    let mut heap: BinaryHeap<LongEdge> = tin
        .hull
        .edges()
        .into_iter()
        .filter_map(|(a, b)| long_edge(tin, a, b))
        .collect();
    let mut removed = 0;
    while let Some(LongEdge { a, b, .. }) = heap.pop() {
        if tin.hull.next(a) != Some(b) {
            continue;
        }
        let Some(apex) = tin.remove_hull_edge(a, b)? else {
            continue;
        };
        removed += 1;
        heap.extend(long_edge(tin, a, apex));
        heap.extend(long_edge(tin, apex, b));
    }
    tracing::debug!(removed, max_side, "long hull edges removed");
    Ok(removed)
}

// =============================================================================
// CLIPPING
// =============================================================================

fn ring_coordinates(tin: &Tin, ring: &[usize]) -> Vec<Point3> {
    ring.iter().map(|&p| tin.points[p]).collect()
}

/// Open counter-clockwise ring of a closed `Tin` chain.
fn chain_ring(tin: &Tin, f: usize) -> Option<Vec<usize>> {
    let mut chain = tin.feature_points(f);
    if chain.len() < 4 || chain.first() != chain.last() {
        return None;
    }
    chain.pop();
    if signed_area(&ring_coordinates(tin, &chain)) < 0.0 {
        chain.reverse();
    }
    Some(chain)
}

/// Deletes every edge that borders no triangle inside `ring` and makes `ring`
/// the hull.
pub(crate) fn clip_to_ring(
    tin: &mut Tin,
    ring: &[usize],
    mut rollback: Option<&mut RollbackStore>,
    report: &mut EdgeOptionReport,
) -> Result<(), CircularListError> {
    if ring.len() < 3 {
        return Ok(());
    }
    let polygon = ring_coordinates(tin, ring);
    let inside = |tin: &Tin, a: usize, b: usize, c: usize| {
        let (pa, pb, pc) = (tin.points[a], tin.points[b], tin.points[c]);
        contains(&polygon, (pa.x + pb.x + pc.x) / 3.0, (pa.y + pb.y + pc.y) / 3.0)
    };
    let kept = |tin: &Tin, a: usize, b: usize| {
        tin.left_apex(a, b).is_some_and(|c| inside(tin, a, b, c))
            || tin.left_apex(b, a).is_some_and(|c| inside(tin, b, a, c))
    };
    let doomed: Vec<(usize, usize)> = tin
        .edges()
        .into_iter()
        .filter(|&(a, b)| !kept(tin, a, b))
        .collect();
    let mut doomed_set: FastHashSet<(usize, usize)> = fast_hash_set_with_capacity(doomed.len());
    doomed_set.extend(doomed.iter().map(|&(a, b)| (a.min(b), a.max(b))));
    let survives = |a: usize, b: usize| !doomed_set.contains(&(a.min(b), a.max(b)));

    let affected: Vec<usize> = tin
        .features
        .iter()
        .filter(|(_, f)| f.is_tin())
        .map(|(i, _)| i)
        .filter(|&i| {
            let chain = tin.feature_points(i);
            if tin.features.get(i).is_some_and(|f| f.kind == FeatureKind::GroupSpots) {
                chain.iter().any(|&p| !tin.neighbors(p).iter().any(|&q| survives(p, q)))
            } else {
                chain.windows(2).any(|s| !survives(s[0], s[1]))
            }
        })
        .collect();
    for &f in &affected {
        snapshot_feature(tin, rollback.as_deref_mut(), f);
    }

    for &(a, b) in &doomed {
        tin.clist.delete_edge(a, b)?;
    }
    report.removed_edges += doomed.len();

    for &f in &affected {
        let Some(kind) = tin.features.get(f).map(|row| row.kind) else {
            continue;
        };
        report.clipped_features += 1;
        if kind == FeatureKind::GroupSpots {
            rechain_spots(tin, f);
        } else if kind.is_polygonal() {
            delete_feature(tin, f);
        } else {
            report.split += clip_feature_chain(tin, f, |tin, a, b| tin.has_edge(a, b));
        }
    }

    tin.hull.set_cycle(ring);
    tin.hull.set_convex(false);
    report.clipped = true;
    Ok(())
}

fn delete_feature(tin: &mut Tin, f: usize) {
    for p in tin.feature_points(f) {
        tin.flist.remove(p, f);
    }
    if let Some(row) = tin.features.get_mut(f) {
        row.state = FeatureState::Deleted;
        row.geometry = FeatureGeometry::Empty;
    }
}

fn rechain_spots(tin: &mut Tin, f: usize) {
    let chain = tin.feature_points(f);
    for &p in &chain {
        tin.flist.remove(p, f);
    }
    let spots: Vec<usize> = chain.into_iter().filter(|&p| tin.clist.has_ring(p)).collect();
    let Some(&first) = spots.first() else {
        if let Some(row) = tin.features.get_mut(f) {
            row.state = FeatureState::Deleted;
            row.geometry = FeatureGeometry::Empty;
        }
        return;
    };
    for (i, &p) in spots.iter().enumerate() {
        tin.flist.add(p, f, spots.get(i + 1).copied(), PointRole::Inserted);
    }
    if let Some(row) = tin.features.get_mut(f) {
        row.geometry = FeatureGeometry::Chain { first };
    }
}

fn clip_to_boundary_polygon(
    tin: &mut Tin,
    mut rollback: Option<&mut RollbackStore>,
    report: &mut EdgeOptionReport,
    token: &CancellationToken,
) -> Result<(), EdgeOptionError> {
    let mut inserter = FeatureInserter::new(tin, rollback.as_deref_mut());
    inserter.insert_kind(FeatureKind::Hull, token)?;
    report.insertion.absorb(inserter.finish());

    let boundary = tin
        .features
        .iter()
        .filter(|(_, f)| f.is_tin() && f.kind == FeatureKind::Hull)
        .filter_map(|(i, _)| chain_ring(tin, i))
        .max_by(|a, b| {
            signed_area(&ring_coordinates(tin, a)).total_cmp(&signed_area(&ring_coordinates(tin, b)))
        });
    let Some(ring) = boundary else {
        tracing::warn!("no boundary polygon in the triangulation; hull left unchanged");
        return Ok(());
    };
    clip_to_ring(tin, &ring, rollback, report)?;
    Ok(())
}

/// Joins chains sharing end points into one sequence. Returns `None` unless
/// every chain is used.
fn join_chains(mut chains: Vec<Vec<usize>>) -> Option<Vec<usize>> {
    let mut joined = chains.pop()?;
    while !chains.is_empty() {
        let end = *joined.last()?;
        let start = *joined.first()?;
        if let Some(i) = chains.iter().position(|c| c.first() == Some(&end)) {
            let next = chains.swap_remove(i);
            joined.extend_from_slice(&next[1..]);
        } else if let Some(i) = chains.iter().position(|c| c.last() == Some(&end)) {
            let mut next = chains.swap_remove(i);
            next.reverse();
            joined.extend_from_slice(&next[1..]);
        } else if let Some(i) = chains.iter().position(|c| c.last() == Some(&start)) {
            let mut next = chains.swap_remove(i);
            next.extend_from_slice(&joined[1..]);
            joined = next;
        } else if let Some(i) = chains.iter().position(|c| c.first() == Some(&start)) {
            let mut next = chains.swap_remove(i);
            next.reverse();
            next.extend_from_slice(&joined[1..]);
            joined = next;
        } else {
            return None;
        }
    }
    Some(joined)
}

fn clip_to_boundary_lines(
    tin: &mut Tin,
    mut rollback: Option<&mut RollbackStore>,
    report: &mut EdgeOptionReport,
    token: &CancellationToken,
) -> Result<(), EdgeOptionError> {
    let mut inserter = FeatureInserter::new(tin, rollback.as_deref_mut());
    inserter.insert_kind(FeatureKind::HullLine, token)?;
    let insertion = inserter.finish();
    let failed = insertion.failed;
    report.insertion.absorb(insertion);
    if failed > 0 {
        tracing::warn!(failed, "boundary lines did not insert; hull left unchanged");
        return Ok(());
    }

    let rows: Vec<usize> = tin
        .features
        .iter()
        .filter(|(_, f)| f.is_tin() && f.kind == FeatureKind::HullLine)
        .map(|(i, _)| i)
        .collect();
    let chains: Vec<Vec<usize>> = rows.iter().map(|&f| tin.feature_points(f)).collect();
    let Some(mut joined) = join_chains(chains) else {
        tracing::warn!(lines = rows.len(), "boundary lines do not join; hull left unchanged");
        return Ok(());
    };
    let (Some(&start), Some(&end)) = (joined.first(), joined.last()) else {
        return Ok(());
    };

    if start != end {
        let Some(template) = rows.first().and_then(|&f| tin.features.get(f)).cloned() else {
            return Ok(());
        };
        let id = tin.features.allocate_id();
        let closing = tin.features.push(Feature {
            state: FeatureState::OffsetsArray,
            id,
            geometry: FeatureGeometry::Offsets(vec![end, start]),
            failure: None,
            ..template
        });
        let mut inserter = FeatureInserter::new(tin, rollback.as_deref_mut());
        let closed = inserter.insert_feature(closing);
        report.insertion.absorb(inserter.finish());
        if !closed {
            tracing::warn!(from = end, to = start, "boundary lines could not be closed; hull left unchanged");
            return Ok(());
        }
        let closing_chain = tin.feature_points(closing);
        joined.extend_from_slice(&closing_chain[1..]);
    }

    joined.pop();
    if joined.len() < 3 {
        return Ok(());
    }
    if signed_area(&ring_coordinates(tin, &joined)) < 0.0 {
        joined.reverse();
    }
    clip_to_ring(tin, &joined, rollback, report)?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithms::divide_and_conquer::triangulate;
    use crate::core::feature::FeatureId;
    use crate::core::tin::Tolerances;

    #[allow(clippy::cast_precision_loss)]
    fn grid(n: usize) -> Tin {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let jitter = ((i * 3 + j * 7) % 10) as f64 * 1e-3;
                points.push(Point3::new(i as f64 + jitter, j as f64 - jitter, 0.0));
            }
        }
        let mut tin = Tin::new(points, Tolerances::default());
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        tin
    }

    fn triangulated(points: Vec<Point3>) -> Tin {
        let mut tin = Tin::new(points, Tolerances::default());
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        tin
    }

    fn push(tin: &mut Tin, kind: FeatureKind, offsets: Vec<usize>, id: u64) -> usize {
        tin.features.push(Feature {
            kind,
            state: FeatureState::OffsetsArray,
            user_tag: 0,
            id: FeatureId(id),
            drape: false,
            geometry: FeatureGeometry::Offsets(offsets),
            failure: None,
        })
    }

    fn params(max_side: f64) -> EdgeParameters {
        EdgeParameters {
            max_side,
            sliver_ratio: 0.025,
        }
    }

    #[test]
    fn flat_hull_triangle_is_a_sliver() {
        let mut tin = triangulated(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 0.1, 0.0),
            Point3::new(5.0, 5.0, 0.0),
        ]);
        assert_eq!(tin.hull_points().len(), 3);
        let removed = remove_slivers(&mut tin, 0.025).unwrap();
        assert_eq!(removed, 1);
        assert!(!tin.has_edge(0, 1));
        assert_eq!(tin.hull_points().len(), 4);
        assert_eq!(tin.num_triangles(), 2);
    }

    #[test]
    fn precision_sliver_within_tolerance() {
        let mut tin = triangulated(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(4.0, 0.00005, 0.0),
            Point3::new(5.0, 5.0, 0.0),
        ]);
        assert_eq!(remove_precision_slivers(&mut tin).unwrap(), 1);
        assert!(tin.is_hull_point(2));
    }

    #[test]
    fn long_edges_peeled_longest_first() {
        // A flat fan: the bottom hull edge of length 10 hides two triangles.
        let mut tin = triangulated(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 2.0, 0.0),
            Point3::new(5.0, 6.0, 0.0),
            Point3::new(2.0, 5.0, 0.0),
            Point3::new(8.0, 5.0, 0.0),
        ]);
        let removed = remove_long_edges(&mut tin, 6.0).unwrap();
        assert!(removed >= 1);
        for (a, b) in tin.hull.edges() {
            let long = tin.points[a].distance_2d(&tin.points[b]) > 6.0;
            let next_apex_on_hull = tin.left_apex(a, b).is_none_or(|c| tin.is_hull_point(c));
            assert!(!long || next_apex_on_hull);
        }
        assert!(!tin.has_edge(0, 1));
    }

    #[test]
    fn protected_edge_survives_max_side() {
        let mut tin = triangulated(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(12.0, 0.0, 0.0),
            Point3::new(6.0, 3.0, 0.0),
            Point3::new(6.0, 8.0, 0.0),
        ]);
        let line = push(&mut tin, FeatureKind::Breakline, vec![0, 1], 1);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        assert!(inserter.insert_feature(line));
        remove_long_edges(&mut tin, 5.0).unwrap();
        assert!(tin.has_edge(0, 1));
        assert!(tin.is_hull_edge(0, 1));
    }

    #[test]
    fn boundary_polygon_clips_outside() {
        let mut tin = grid(8);
        let idx = |i: usize, j: usize| j * 8 + i;
        let ring = vec![idx(1, 1), idx(6, 1), idx(6, 6), idx(1, 6), idx(1, 1)];
        push(&mut tin, FeatureKind::Hull, ring, 1);
        let line = push(&mut tin, FeatureKind::ContourLine, vec![idx(0, 3), idx(7, 3)], 2);
        let mut inserter = FeatureInserter::new(&mut tin, None);
        inserter.insert_kind(FeatureKind::ContourLine, &CancellationToken::new()).unwrap();
        let mut store = RollbackStore::new(Tolerances::default());
        let report = apply_edge_option(
            &mut tin,
            EdgeOption::BoundaryPolygon,
            params(0.0),
            Some(&mut store),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(report.clipped);
        assert_eq!(report.insertion.inserted, 1);
        assert!(!tin.clist.has_ring(idx(0, 0)));
        assert!(tin.clist.has_ring(idx(3, 3)));
        for t in tin.triangles() {
            for p in t {
                let q = tin.points[p];
                assert!(q.x > 0.9 && q.x < 6.1 && q.y > 0.9 && q.y < 6.1);
            }
        }
        let chain = tin.feature_points(line);
        assert!(chain.iter().all(|&p| tin.clist.has_ring(p)));
        assert!(store.contains(FeatureId(2)));
        let saved = store.points(FeatureId(2)).unwrap();
        assert!(saved.first().unwrap().bitwise_eq(&tin.points[idx(0, 3)]));
    }

    #[test]
    fn boundary_lines_are_joined_and_closed() {
        let mut tin = grid(8);
        let idx = |i: usize, j: usize| j * 8 + i;
        push(&mut tin, FeatureKind::HullLine, vec![idx(1, 1), idx(6, 1), idx(6, 6)], 1);
        push(&mut tin, FeatureKind::HullLine, vec![idx(1, 6), idx(6, 6)], 2);
        let report = apply_edge_option(
            &mut tin,
            EdgeOption::BoundaryLines,
            params(0.0),
            None,
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(report.clipped);
        assert_eq!(report.insertion.failed, 0);
        assert_eq!(report.insertion.inserted, 3);
        assert!(!tin.clist.has_ring(idx(7, 7)));
        assert!(tin.clist.has_ring(idx(3, 3)));
        assert!(tin.is_hull_edge(idx(1, 6), idx(1, 1)));
    }

    #[test]
    fn join_reverses_chains() {
        let joined = join_chains(vec![vec![1, 2, 3], vec![5, 4, 3], vec![5, 6]]).unwrap();
        assert_eq!(joined.len(), 6);
        assert!(join_chains(vec![vec![1, 2], vec![7, 8]]).is_none());
    }

    #[test]
    fn options_serialize() {
        let json = serde_json::to_string(&EdgeOption::DrapeBoundary).unwrap();
        assert_eq!(serde_json::from_str::<EdgeOption>(&json).unwrap(), EdgeOption::DrapeBoundary);
    }
}
