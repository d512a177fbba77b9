//! Plan-view spatial hash grid.
//!
//! Buckets point indices by `floor(x / cell_size), floor(y / cell_size)`. Used to
//! find near-coincident points during input deduplication without an O(n²)
//! scan. The grid is ephemeral: it lives only for the duration of one pass and
//! is never kept in sync with later mutations of the point table.

use super::{FastHashMap, SmallBuffer, fast_hash_map_with_capacity};

const BUCKET_INLINE_CAPACITY: usize = 8;

/// A simple spatial hash grid mapping plan cells to point indices.
#[derive(Clone, Debug)]
pub(crate) struct HashGridIndex {
    cell_size: f64,
    usable: bool,
    cells: FastHashMap<(i64, i64), SmallBuffer<usize, BUCKET_INLINE_CAPACITY>>,
}

impl HashGridIndex {
    /// Create a new grid index with the given cell size, sized for about
    /// `expected` points.
    pub(crate) fn new(cell_size: f64, expected: usize) -> Self {
        let usable = cell_size.is_finite() && cell_size > 0.0;
        Self {
            cell_size,
            usable,
            cells: fast_hash_map_with_capacity(if usable { expected } else { 0 }),
        }
    }

    pub(crate) const fn is_usable(&self) -> bool {
        self.usable
    }

    /// Insert a point into the appropriate grid cell.
    ///
    /// If the point cannot be keyed (non-finite, or too far from the origin for
    /// unit cell resolution) the index is disabled and callers fall back to a
    /// linear scan.
    pub(crate) fn insert_point(&mut self, index: usize, x: f64, y: f64) {
        if !self.usable {
            return;
        }
        let Some(key) = self.key_for_coords(x, y) else {
            self.usable = false;
            return;
        };
        self.cells.entry(key).or_default().push(index);
    }

    /// Visit every candidate index in the 3×3 neighbourhood around `(x, y)`.
    ///
    /// The visitor returns `false` to stop early. Returns `false` if the index
    /// could not serve the query.
    pub(crate) fn for_each_candidate<F>(&self, x: f64, y: f64, mut f: F) -> bool
    where
        F: FnMut(usize) -> bool,
    {
        if !self.usable {
            return false;
        }
        let Some((cx, cy)) = self.key_for_coords(x, y) else {
            return false;
        };
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    for &index in bucket {
                        if !f(index) {
                            return true;
                        }
                    }
                }
            }
        }
        true
    }

    #[expect(clippy::cast_possible_truncation)]
    fn key_for_coords(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        if !self.usable || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let cx = (x / self.cell_size).floor();
        let cy = (y / self.cell_size).floor();
        // Beyond 2^52 cells the neighbour offsets stop being representable.
        let limit = 4_503_599_627_370_496.0;
        if cx.abs() >= limit || cy.abs() >= limit {
            return None;
        }
        Some((cx as i64, cy as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections::FastHashSet;

    #[test]
    fn test_hash_grid_index_candidate_lookup() {
        let mut grid = HashGridIndex::new(1.0, 16);
        grid.insert_point(0, 0.2, 0.2);
        grid.insert_point(1, -0.2, 0.2);
        grid.insert_point(2, 5.0, 5.0);

        let mut found: FastHashSet<usize> = FastHashSet::default();
        let used = grid.for_each_candidate(0.9, 0.1, |i| {
            found.insert(i);
            true
        });

        assert!(used);
        assert!(found.contains(&0));
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
    }

    #[test]
    fn test_hash_grid_index_visits_full_neighbourhood() {
        let mut grid = HashGridIndex::new(1.0, 16);
        let mut next = 0;
        for x in [-1.0, 0.0, 1.0] {
            for y in [-1.0, 0.0, 1.0] {
                grid.insert_point(next, x + 0.25, y + 0.25);
                next += 1;
            }
        }
        let mut count = 0;
        assert!(grid.for_each_candidate(0.25, 0.25, |_| {
            count += 1;
            true
        }));
        assert_eq!(count, 9);
    }

    #[test]
    fn test_hash_grid_index_disables_on_bad_input() {
        let mut grid = HashGridIndex::new(1.0, 16);
        grid.insert_point(0, f64::NAN, 0.0);
        assert!(!grid.is_usable());
        assert!(!grid.for_each_candidate(0.0, 0.0, |_| true));
        assert!(!HashGridIndex::new(0.0, 16).is_usable());
    }
}
