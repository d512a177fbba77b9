//! Table compaction.
//!
//! Reclaims deleted slots and renumbers every cross-reference. The passes run
//! in dependency order, each reading references produced by the one before:
//!
//! 1. **Feature table**: drop `Deleted` rows; feature-list entries of dropped
//!    rows go with them and the rest are renumbered.
//! 2. **Feature list**: rebuild the entry arena densely.
//! 3. **Points**: drop points with an empty neighbour ring; the hull, feature
//!    chain heads, feature-list successors and edge rings are renumbered.
//! 4. **Circular list**: rebuild the edge arena densely.
//!
//! Renumbering is a stable prefix-sum shift: a survivor's new index is its old
//! index minus the number of removed slots before it.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::feature::{FeatureGeometry, FeatureState};
use crate::core::tin::Tin;
use crate::geometry::point::Point3;

/// Failures of [`compact`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompactionError {
    /// A live feature chain runs through a point with no edges.
    #[error("feature {feature} runs through isolated point {point}")]
    DanglingFeature {
        /// Row index.
        feature: usize,
        /// Isolated point.
        point: usize,
    },
    /// The caller cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Outcome of [`compact`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Feature rows dropped.
    pub features_removed: usize,
    /// Feature-list entries dropped with their rows.
    pub feature_entries_removed: usize,
    /// Points dropped.
    pub points_removed: usize,
    /// Feature-list arena slots reclaimed.
    pub feature_slots_reclaimed: usize,
    /// Edge arena slots reclaimed.
    pub edge_slots_reclaimed: usize,
    /// Old point index to new, `None` for removed points.
    pub point_remap: Vec<Option<usize>>,
}

/// Old-to-new index map keeping the slots for which `keep` is true.
pub(crate) fn shift_remap<I>(keep: I) -> (Vec<Option<usize>>, usize)
where
    I: IntoIterator<Item = bool>,
{
    let mut next = 0;
    let remap = keep
        .into_iter()
        .map(|kept| {
            kept.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    (remap, next)
}

/// Compacts every table of `tin`.
///
/// # Errors
///
/// Fails on cancellation, or if a `Tin` feature still references an isolated
/// point; nothing is modified in that case.
pub(crate) fn compact(tin: &mut Tin, token: &CancellationToken) -> Result<CompactionReport, CompactionError> {
    token.check(BuildPhase::Compaction)?;
    let keep_point: Vec<bool> = (0..tin.points.len()).map(|p| tin.clist.has_ring(p)).collect();
    for (f, row) in tin.features.iter() {
        if row.is_tin() {
            if let Some(&point) = tin.feature_points(f).iter().find(|&&p| !keep_point[p]) {
                return Err(CompactionError::DanglingFeature { feature: f, point });
            }
        }
    }

    let mut report = CompactionReport::default();

    let feature_remap = tin.features.retain_rows(|f| f.state != FeatureState::Deleted);
    report.features_removed = feature_remap.iter().filter(|r| r.is_none()).count();
    report.feature_entries_removed = tin.flist.remap_features(&feature_remap);

    report.feature_slots_reclaimed = tin.flist.compact();

    let (point_remap, new_len) = shift_remap(keep_point);
    report.points_removed = tin.points.len() - new_len;
    if report.points_removed > 0 {
        remap_feature_geometry(tin, &point_remap);
        let old_points = std::mem::take(&mut tin.points);
        tin.points = old_points
            .into_iter()
            .zip(&point_remap)
            .filter_map(|(p, r)| r.map(|_| p))
            .collect();
        tin.clist.remap_points(&point_remap, new_len);
        tin.flist.remap_points(&point_remap, new_len);
        tin.hull.remap_points(&point_remap, new_len);
    }
    report.point_remap = point_remap;

    report.edge_slots_reclaimed = tin.clist.compact();
    token.check(BuildPhase::Compaction)?;

    tracing::debug!(
        features_removed = report.features_removed,
        feature_entries_removed = report.feature_entries_removed,
        points_removed = report.points_removed,
        edge_slots_reclaimed = report.edge_slots_reclaimed,
        "tables compacted"
    );
    Ok(report)
}

/// Renumbers chain heads and offsets; offset rows that lose a point keep their
/// coordinates instead.
fn remap_feature_geometry(tin: &mut Tin, remap: &[Option<usize>]) {
    let points = &tin.points;
    for row in tin.features.rows_mut() {
        match &mut row.geometry {
            FeatureGeometry::Chain { first } => {
                if let Some(new) = remap.get(*first).copied().flatten() {
                    *first = new;
                }
            }
            FeatureGeometry::Offsets(offsets) => {
                let renumbered: Option<Vec<usize>> =
                    offsets.iter().map(|&o| remap.get(o).copied().flatten()).collect();
                match renumbered {
                    Some(renumbered) => *offsets = renumbered,
                    None => {
                        let coordinates: Vec<Point3> =
                            offsets.iter().filter_map(|&o| points.get(o).copied()).collect();
                        row.geometry = FeatureGeometry::Points(coordinates);
                        if row.state == FeatureState::OffsetsArray {
                            row.state = FeatureState::PointsArray;
                        }
                    }
                }
            }
            FeatureGeometry::Points(_) | FeatureGeometry::Empty => {}
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
