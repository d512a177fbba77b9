//! Input point deduplication.

#![forbid(unsafe_code)]

use crate::core::collections::spatial_hash_grid::HashGridIndex;
use crate::core::collections::{FastHashMap, fast_hash_map_with_capacity};
use crate::geometry::point::Point3;

/// Result of [`dedup_points`].
#[derive(Clone, Debug, PartialEq)]
pub struct DedupResult {
    /// Surviving points, in first-occurrence order.
    pub points: Vec<Point3>,
    /// For every input index, the index of its survivor in `points`.
    pub remap: Vec<usize>,
}

impl DedupResult {
    /// Number of input points merged into an earlier one.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.remap.len() - self.points.len()
    }
}

/// Merges points closer than `tolerance` in plan.
///
/// The first occurrence survives with its elevation. A zero tolerance merges
/// only identical plan positions, found through a hash map keyed on the
/// coordinate bits. Otherwise candidate pairs come from a spatial hash grid with
/// `tolerance`-sized cells; when the grid cannot key a point (huge coordinates)
/// the survivors are scanned linearly.
///
/// # Complexity
///
/// Expected O(n) with the exact map or the grid, O(n²) in the linear fallback.
///
/// # Examples
///
/// ```
/// use tin::core::util::deduplication::dedup_points;
/// use tin::geometry::point::Point3;
///
/// let input = [
///     Point3::new(0.0, 0.0, 1.0),
///     Point3::new(5.0, 0.0, 2.0),
///     Point3::new(0.00001, 0.0, 3.0),
/// ];
/// let result = dedup_points(&input, 1e-4);
/// assert_eq!(result.points.len(), 2);
/// assert_eq!(result.remap, vec![0, 1, 0]);
/// assert_eq!(result.points[0].z, 1.0);
/// ```
#[must_use]
pub fn dedup_points(input: &[Point3], tolerance: f64) -> DedupResult {
    let result = if tolerance > 0.0 {
        dedup_within(input, tolerance)
    } else {
        dedup_exact(input)
    };
    if result.merged() > 0 {
        tracing::debug!(merged = result.merged(), tolerance, "duplicate points merged");
    }
    result
}

/// Plan position as a hash key; both zeros map to the same key.
fn plan_key(p: &Point3) -> (u64, u64) {
    ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
}

fn dedup_exact(input: &[Point3]) -> DedupResult {
    let mut seen: FastHashMap<(u64, u64), usize> = fast_hash_map_with_capacity(input.len());
    let mut points: Vec<Point3> = Vec::with_capacity(input.len());
    let remap = input
        .iter()
        .map(|p| {
            *seen.entry(plan_key(p)).or_insert_with(|| {
                points.push(*p);
                points.len() - 1
            })
        })
        .collect();
    DedupResult { points, remap }
}

fn dedup_within(input: &[Point3], tolerance: f64) -> DedupResult {
    let mut grid = HashGridIndex::new(tolerance, input.len());
    let mut points: Vec<Point3> = Vec::with_capacity(input.len());
    let mut remap = Vec::with_capacity(input.len());
    let tolerance_sq = tolerance * tolerance;

    for p in input {
        let mut found = None;
        let served = grid.is_usable()
            && grid.for_each_candidate(p.x, p.y, |candidate| {
                if points[candidate].distance_squared_2d(p) <= tolerance_sq {
                    found = Some(candidate);
                    return false;
                }
                true
            });
        if !served {
            found = points
                .iter()
                .position(|q| q.distance_squared_2d(p) <= tolerance_sq);
        }
        match found {
            Some(survivor) => remap.push(survivor),
            None => {
                let index = points.len();
                points.push(*p);
                grid.insert_point(index, p.x, p.y);
                remap.push(index);
            }
        }
    }
    DedupResult { points, remap }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_duplicates_collapse() {
        let p = Point3::new(1.5, -2.0, 0.0);
        let result = dedup_points(&[p, p, Point3::new(3.0, 3.0, 0.0), p], 1e-4);
        assert_eq!(result.points.len(), 2);
        assert_eq!(result.remap, vec![0, 0, 1, 0]);
        assert_eq!(result.merged(), 2);
    }

    #[test]
    fn neighbours_across_cell_borders_merge() {
        let result = dedup_points(
            &[Point3::new(0.99999, 0.0, 0.0), Point3::new(1.00001, 0.0, 7.0)],
            1e-4,
        );
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].z, 0.0);
    }

    #[test]
    fn zero_tolerance_merges_only_identical_plan_positions() {
        let result = dedup_points(
            &[
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(0.0, 0.0, 2.0),
                Point3::new(0.0, 1e-12, 3.0),
            ],
            0.0,
        );
        assert_eq!(result.remap, vec![0, 0, 1]);
    }

    #[test]
    fn zero_tolerance_keys_on_plan_bits() {
        let n = 20_000_u32;
        let mut input: Vec<Point3> = (0..n)
            .map(|k| Point3::new(f64::from(k % 200), f64::from(k / 200), f64::from(k)))
            .collect();
        input.extend((0..n).step_by(7).map(|k| Point3::new(f64::from(k % 200), f64::from(k / 200), -1.0)));
        input.push(Point3::new(-0.0, 0.0, 5.0));
        let result = dedup_points(&input, 0.0);
        assert_eq!(result.points.len(), n as usize);
        assert!(result.points.iter().all(|p| p.z >= 0.0));
        let k = 7 * 3;
        assert_eq!(result.remap[n as usize + 3], k as usize);
        assert_eq!(result.remap.last(), Some(&0));
    }
}
