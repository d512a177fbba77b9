//! Void processing.
//!
//! Once every feature is threaded, the surface inside voids is hollowed out:
//!
//! - break, soft-break and contour lines lose their segments inside voids; the
//!   surviving runs become separate `Tin` rows sharing the feature id,
//! - points strictly inside a void that carry no feature are removed and their
//!   star re-triangulated.
//!
//! Triangles inside voids stay in the edge store so the boundary chains keep
//! their neighbours; [`Tin::surface_triangles`] leaves them out.
//!
//! A point is in a void when it is inside a hole, or inside a void, break void
//! or drape void and not inside an island.

#![forbid(unsafe_code)]

use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::circular_list::CircularListError;
use crate::core::feature::{Feature, FeatureGeometry, FeatureKind, FeatureState};
use crate::core::feature_list::PointRole;
use crate::core::rollback::RollbackStore;
use crate::core::tin::Tin;
use crate::geometry::point::Point3;
use crate::geometry::polygon::{PolygonSide, bounding_box, classify};
use thiserror::Error;

/// Failures of the void pass.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum VoidError {
    /// Re-triangulating a point star failed.
    #[error(transparent)]
    CircularList(#[from] CircularListError),
    /// The caller cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Counts from [`process_voids`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoidReport {
    /// Line rows that lost segments.
    pub clipped_features: usize,
    /// Rows appended for surviving runs.
    pub split: usize,
    /// Interior points removed.
    pub removed_points: usize,
}

struct Ring {
    kind: FeatureKind,
    points: Vec<Point3>,
    bbox: (f64, f64, f64, f64),
}

impl Ring {
    fn side(&self, p: &Point3, tolerance: f64) -> PolygonSide {
        let (min_x, min_y, max_x, max_y) = self.bbox;
        if p.x < min_x - tolerance || p.x > max_x + tolerance || p.y < min_y - tolerance || p.y > max_y + tolerance {
            return PolygonSide::Outside;
        }
        classify(&self.points, p, tolerance)
    }
}

/// Live void, hole and island polygons of a triangulation.
pub(crate) struct VoidIndex {
    rings: Vec<Ring>,
    tolerance: f64,
}

impl VoidIndex {
    pub(crate) fn new(tin: &Tin) -> Self {
        let rings = tin
            .features
            .iter()
            .filter(|(_, f)| f.is_tin() && (f.kind.is_void_like() || f.kind == FeatureKind::Island))
            .filter_map(|(i, f)| {
                let mut points = tin.feature_coordinates(i);
                points.pop();
                (points.len() >= 3).then(|| Ring {
                    kind: f.kind,
                    bbox: bounding_box(&points),
                    points,
                })
            })
            .collect();
        Self {
            rings,
            tolerance: tin.tolerances.pl_tol,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.rings.iter().any(|r| r.kind.is_void_like())
    }

    /// `true` if `p` is strictly inside the void area.
    pub(crate) fn contains(&self, p: &Point3) -> bool {
        let inside = |kind: FeatureKind| {
            self.rings
                .iter()
                .filter(|r| r.kind == kind)
                .any(|r| r.side(p, self.tolerance) == PolygonSide::Inside)
        };
        if inside(FeatureKind::Hole) {
            return true;
        }
        let in_void = [FeatureKind::Void, FeatureKind::BreakVoid, FeatureKind::DrapeVoid]
            .into_iter()
            .any(inside);
        in_void
            && !self
                .rings
                .iter()
                .filter(|r| r.kind == FeatureKind::Island)
                .any(|r| r.side(p, self.tolerance) != PolygonSide::Outside)
    }

    fn contains_triangle(&self, tin: &Tin, t: &[usize; 3]) -> bool {
        let [a, b, c] = t.map(|i| tin.points[i]);
        let centroid = Point3::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0, 0.0);
        self.contains(&centroid)
    }
}

impl Tin {
    /// Triangles outside every void.
    #[must_use]
    pub fn surface_triangles(&self) -> Vec<[usize; 3]> {
        let voids = VoidIndex::new(self);
        let triangles = self.triangles();
        if voids.is_empty() {
            return triangles;
        }
        triangles
            .into_iter()
            .filter(|t| !voids.contains_triangle(self, t))
            .collect()
    }

    /// Triangles inside voids.
    #[must_use]
    pub fn void_triangles(&self) -> Vec<[usize; 3]> {
        let voids = VoidIndex::new(self);
        if voids.is_empty() {
            return Vec::new();
        }
        self.triangles()
            .into_iter()
            .filter(|t| voids.contains_triangle(self, t))
            .collect()
    }
}

/// Snapshots row `f` into `rollback` with its current coordinates.
pub(crate) fn snapshot_feature(tin: &Tin, rollback: Option<&mut RollbackStore>, f: usize) {
    if let (Some(store), Some(row)) = (rollback, tin.features.get(f)) {
        store.snapshot(row, &tin.feature_coordinates(f));
    }
}

/// Rethreads the chain of line row `f` keeping only steps for which `keep`
/// holds. The first surviving run stays in `f`; later runs are appended as new
/// `Tin` rows sharing the id. A row with no surviving step becomes `Deleted`.
///
/// Returns the number of appended rows.
pub(crate) fn clip_feature_chain<F>(tin: &mut Tin, f: usize, keep: F) -> usize
where
    F: Fn(&Tin, usize, usize) -> bool,
{
    let Some(template) = tin.features.get(f).cloned() else {
        return 0;
    };
    let chain = tin.feature_points(f);
    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut current = Vec::new();
    for step in chain.windows(2) {
        if keep(tin, step[0], step[1]) {
            if current.is_empty() {
                current.push(step[0]);
            }
            current.push(step[1]);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    if runs.len() == 1 && runs[0].len() == chain.len() {
        return 0;
    }

    for &p in &chain {
        tin.flist.remove(p, f);
    }
    let mut runs = runs.into_iter();
    match runs.next() {
        Some(run) => {
            thread_run(tin, f, &run);
            if let Some(row) = tin.features.get_mut(f) {
                row.geometry = FeatureGeometry::Chain { first: run[0] };
            }
        }
        None => {
            if let Some(row) = tin.features.get_mut(f) {
                row.state = FeatureState::Deleted;
                row.geometry = FeatureGeometry::Empty;
            }
        }
    }
    let mut appended = 0;
    for run in runs {
        let g = tin.features.push(Feature {
            geometry: FeatureGeometry::Chain { first: run[0] },
            state: FeatureState::Tin,
            failure: None,
            ..template.clone()
        });
        thread_run(tin, g, &run);
        appended += 1;
    }
    appended
}

fn thread_run(tin: &mut Tin, f: usize, run: &[usize]) {
    for (i, &p) in run.iter().enumerate() {
        tin.flist.add(p, f, run.get(i + 1).copied(), PointRole::Inserted);
    }
}

/// Clips line features inside voids and removes featureless interior points.
///
/// # Errors
///
/// Fails on cancellation or an edge-store inconsistency.
pub(crate) fn process_voids(
    tin: &mut Tin,
    mut rollback: Option<&mut RollbackStore>,
    token: &CancellationToken,
) -> Result<VoidReport, VoidError> {
    token.check(BuildPhase::Voids)?;
    let voids = VoidIndex::new(tin);
    let mut report = VoidReport::default();
    if voids.is_empty() {
        return Ok(report);
    }

    let in_void = |tin: &Tin, a: usize, b: usize| {
        let (pa, pb) = (tin.points[a], tin.points[b]);
        voids.contains(&pa.lerp(&pb, 0.5))
    };
    let lines: Vec<usize> = tin
        .features
        .iter()
        .filter(|(_, f)| f.is_tin() && f.kind.is_clipped_by_voids())
        .map(|(i, _)| i)
        .collect();
    for f in lines {
        let chain = tin.feature_points(f);
        if !chain.windows(2).any(|s| in_void(&*tin, s[0], s[1])) {
            continue;
        }
        snapshot_feature(tin, rollback.as_deref_mut(), f);
        report.split += clip_feature_chain(tin, f, |tin, a, b| !in_void(tin, a, b));
        report.clipped_features += 1;
    }
    token.check(BuildPhase::Voids)?;

    let candidates: Vec<usize> = (0..tin.points.len())
        .filter(|&p| tin.clist.has_ring(p) && !tin.flist.has_features(p) && !tin.hull.contains(p))
        .filter(|&p| voids.contains(&tin.points[p]))
        .collect();
    for p in candidates {
        if tin.remove_interior_point(p)? {
            report.removed_points += 1;
        }
    }
    tracing::debug!(
        clipped = report.clipped_features,
        split = report.split,
        removed_points = report.removed_points,
        "void processing finished"
    );
    Ok(report)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithms::constraint_insertion::FeatureInserter;
    use crate::core::algorithms::divide_and_conquer::triangulate;
    use crate::core::feature::FeatureId;
    use crate::core::tin::Tolerances;

    #[allow(clippy::cast_precision_loss)]
    fn grid_with(n: usize, extra: &[Point3]) -> Tin {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let jitter = ((i * 3 + j * 7) % 10) as f64 * 1e-3;
                points.push(Point3::new(i as f64 + jitter, j as f64 - jitter, 0.0));
            }
        }
        points.extend_from_slice(extra);
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

    fn insert_all(tin: &mut Tin) {
        let mut inserter = FeatureInserter::new(tin, None);
        let token = CancellationToken::new();
        for kind in FeatureKind::ALL {
            inserter.insert_kind(kind, &token).unwrap();
        }
        assert_eq!(inserter.finish().failed, 0);
    }

    #[test]
    fn interior_points_are_removed_and_triangles_hidden() {
        // 10 x 10 grid; the void is the square from (2, 2) to (7, 7).
        let mut tin = grid_with(10, &[]);
        let idx = |i: usize, j: usize| j * 10 + i;
        let void = push(
            &mut tin,
            FeatureKind::Void,
            vec![idx(2, 2), idx(7, 2), idx(7, 7), idx(2, 7), idx(2, 2)],
            1,
        );
        insert_all(&mut tin);
        let hull = tin.hull_points();
        let before = tin.surface_triangles().len();
        let report = process_voids(&mut tin, None, &CancellationToken::new()).unwrap();
        assert!(report.removed_points >= 16);
        assert!(!tin.clist.has_ring(idx(4, 4)));
        assert!(tin.clist.has_ring(idx(2, 2)));
        assert!(tin.features.get(void).unwrap().is_tin());
        assert!(tin.void_triangles().iter().all(|t| {
            let c = t.map(|i| tin.points[i]);
            let (x, y) = ((c[0].x + c[1].x + c[2].x) / 3.0, (c[0].y + c[1].y + c[2].y) / 3.0);
            x > 1.9 && x < 7.1 && y > 1.9 && y < 7.1
        }));
        assert!(tin.surface_triangles().len() <= before);
        assert_eq!(tin.hull_points(), hull);
    }

    #[test]
    fn lines_inside_voids_are_clipped_with_rollback() {
        let extra = [Point3::new(0.5, 4.5, 1.0), Point3::new(8.5, 4.5, 1.0)];
        let mut tin = grid_with(10, &extra);
        let idx = |i: usize, j: usize| j * 10 + i;
        push(
            &mut tin,
            FeatureKind::Hole,
            vec![idx(3, 2), idx(6, 2), idx(6, 7), idx(3, 7), idx(3, 2)],
            1,
        );
        let line = push(&mut tin, FeatureKind::Breakline, vec![100, 101], 2);
        insert_all(&mut tin);
        let mut store = RollbackStore::new(Tolerances::default());
        let report = process_voids(&mut tin, Some(&mut store), &CancellationToken::new()).unwrap();
        assert_eq!(report.clipped_features, 1);
        assert_eq!(report.split, 1);
        let rows = tin.features_with_id(FeatureId(2));
        assert_eq!(rows, vec![line, tin.features.len() - 1]);
        let west = tin.feature_points(rows[0]);
        let east = tin.feature_points(rows[1]);
        assert_eq!(west.first(), Some(&100));
        assert!(tin.points[*west.last().unwrap()].x <= 3.01);
        assert_eq!(east.last(), Some(&101));
        assert!(tin.points[east[0]].x >= 5.99);
        let saved = store.points(FeatureId(2)).unwrap();
        assert!(saved.first().unwrap().bitwise_eq(&extra[0]));
        assert!(saved.last().unwrap().bitwise_eq(&extra[1]));
    }

    #[test]
    fn island_keeps_its_points() {
        let mut tin = grid_with(10, &[]);
        let idx = |i: usize, j: usize| j * 10 + i;
        push(
            &mut tin,
            FeatureKind::Void,
            vec![idx(1, 1), idx(8, 1), idx(8, 8), idx(1, 8), idx(1, 1)],
            1,
        );
        push(
            &mut tin,
            FeatureKind::Island,
            vec![idx(3, 3), idx(6, 3), idx(6, 6), idx(3, 6), idx(3, 3)],
            2,
        );
        insert_all(&mut tin);
        process_voids(&mut tin, None, &CancellationToken::new()).unwrap();
        assert!(tin.clist.has_ring(idx(4, 4)));
        assert!(!tin.clist.has_ring(idx(2, 5)));
    }
}
