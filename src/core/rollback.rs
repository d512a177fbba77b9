//! Rollback store.
//!
//! A satellite triangulation object that receives coordinate snapshots of
//! features about to be split or clipped, indexed by stable feature id. The
//! first snapshot of an id wins, so the store always holds the geometry as it
//! was before the first destructive operation. Nothing is ever merged back.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::core::feature::{Feature, FeatureGeometry, FeatureId, FeatureState, FeatureTable};
use crate::core::tin::{Tin, Tolerances};
use crate::geometry::point::Point3;

/// Snapshots of features removed or altered by destructive processing.
#[derive(Clone, Debug, Default)]
pub struct RollbackStore {
    tin: Tin,
    index: BTreeMap<FeatureId, usize>,
}

impl RollbackStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(tolerances: Tolerances) -> Self {
        Self {
            tin: Tin::new(Vec::new(), tolerances),
            index: BTreeMap::new(),
        }
    }

    /// Number of snapshotted features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing was snapshotted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if `id` already has a snapshot.
    #[must_use]
    pub fn contains(&self, id: FeatureId) -> bool {
        self.index.contains_key(&id)
    }

    /// Snapshotted ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.index.keys().copied()
    }

    /// Rows of the satellite feature table.
    #[must_use]
    pub const fn features(&self) -> &FeatureTable {
        &self.tin.features
    }

    /// Snapshot row for `id`.
    #[must_use]
    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.index.get(&id).and_then(|&row| self.tin.features.get(row))
    }

    /// Snapshotted coordinates of `id`.
    #[must_use]
    pub fn points(&self, id: FeatureId) -> Option<Vec<Point3>> {
        let row = *self.index.get(&id)?;
        let offsets = self.tin.features.get(row)?.offsets()?;
        Some(offsets.iter().map(|&o| self.tin.points[o]).collect())
    }

    /// Copies `feature` with the coordinates `points` into the store.
    ///
    /// Returns `false` without copying when `feature.id` is already present.
    pub fn snapshot(&mut self, feature: &Feature, points: &[Point3]) -> bool {
        if self.index.contains_key(&feature.id) {
            return false;
        }
        let offsets: Vec<usize> = points.iter().map(|&p| self.tin.add_point(p)).collect();
        let row = self.tin.features.push(Feature {
            kind: feature.kind,
            state: FeatureState::Rollback,
            user_tag: feature.user_tag,
            id: feature.id,
            drape: feature.drape,
            geometry: FeatureGeometry::Offsets(offsets),
            failure: None,
        });
        self.index.insert(feature.id, row);
        tracing::trace!(id = %feature.id, points = points.len(), "feature snapshotted for rollback");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::FeatureKind;

    fn feature(id: u64) -> Feature {
        Feature {
            kind: FeatureKind::Breakline,
            state: FeatureState::Tin,
            user_tag: 3,
            id: FeatureId(id),
            drape: false,
            geometry: FeatureGeometry::Empty,
            failure: None,
        }
    }

    #[test]
    fn first_snapshot_wins() {
        let mut store = RollbackStore::new(Tolerances::default());
        let original = [Point3::new(0.1, 0.2, 0.3), Point3::new(1.0 / 3.0, 2.0, -1.5)];
        assert!(store.snapshot(&feature(5), &original));
        assert!(!store.snapshot(&feature(5), &[Point3::new(9.0, 9.0, 9.0)]));
        let stored = store.points(FeatureId(5)).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().zip(&original).all(|(a, b)| a.bitwise_eq(b)));
        assert_eq!(store.feature(FeatureId(5)).map(|f| f.state), Some(FeatureState::Rollback));
        assert_eq!(store.feature(FeatureId(5)).map(|f| f.user_tag), Some(3));
    }

    #[test]
    fn ids_are_sorted() {
        let mut store = RollbackStore::new(Tolerances::default());
        for id in [9, 2, 4] {
            store.snapshot(&feature(id), &[Point3::default()]);
        }
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![FeatureId(2), FeatureId(4), FeatureId(9)]);
        assert_eq!(store.len(), 3);
        assert!(store.points(FeatureId(7)).is_none());
    }
}
