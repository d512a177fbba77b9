//! Per-point feature list.
//!
//! Each point heads a linked list of entries, one per feature the point belongs
//! to. An entry records the feature row and the next point along that feature's
//! chain, which makes "is `a b` a constrained edge" an O(degree) question and
//! lets a feature's chain be walked from its first point.

#![forbid(unsafe_code)]

use crate::core::collections::{SmallBuffer, StorageMap};
use slotmap::{SecondaryMap, new_key_type};

new_key_type! {
    /// Key of one feature-list entry.
    pub struct FeatureListKey;
}

/// How a point came to be on a feature chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointRole {
    /// One of the feature's own points.
    Inserted,
    /// Picked up along a segment: an existing vertex on the segment or a new
    /// crossing point.
    Intersected,
}

/// One feature membership of a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureListEntry {
    /// Feature-table row.
    pub feature: usize,
    /// Next point along the feature, `None` at the end of an open chain.
    pub next_point: Option<usize>,
    /// Next entry of the same point.
    pub next: Option<FeatureListKey>,
    /// Role of the point in the feature.
    pub role: PointRole,
}

/// Feature-list arena plus per-point heads.
#[derive(Clone, Debug, Default)]
pub struct FeatureList {
    entries: StorageMap<FeatureListKey, FeatureListEntry>,
    heads: Vec<Option<FeatureListKey>>,
}

impl FeatureList {
    /// Creates an empty list for `num_points` points.
    #[must_use]
    pub fn with_points(num_points: usize) -> Self {
        Self {
            entries: StorageMap::with_key(),
            heads: vec![None; num_points],
        }
    }

    /// Adds a head slot for a new point.
    pub fn push_point(&mut self) {
        self.heads.push(None);
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no point belongs to any feature.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of point slots.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.heads.len()
    }

    /// Iterates the entries of `point`.
    pub fn entries_at(&self, point: usize) -> impl Iterator<Item = (FeatureListKey, &FeatureListEntry)> + '_ {
        let mut current = self.heads.get(point).copied().flatten();
        std::iter::from_fn(move || {
            let key = current?;
            let entry = self.entries.get(key)?;
            current = entry.next;
            Some((key, entry))
        })
    }

    /// Returns `true` if `point` belongs to any feature.
    #[must_use]
    pub fn has_features(&self, point: usize) -> bool {
        self.heads.get(point).is_some_and(Option::is_some)
    }

    /// Feature rows at `point`.
    #[must_use]
    pub fn features_at(&self, point: usize) -> SmallBuffer<usize, 4> {
        self.entries_at(point).map(|(_, e)| e.feature).collect()
    }

    /// Entry of `feature` at `point`.
    #[must_use]
    pub fn find(&self, point: usize, feature: usize) -> Option<&FeatureListEntry> {
        self.entries_at(point)
            .find(|(_, e)| e.feature == feature)
            .map(|(_, e)| e)
    }

    fn find_key(&self, point: usize, feature: usize) -> Option<FeatureListKey> {
        self.entries_at(point)
            .find(|(_, e)| e.feature == feature)
            .map(|(k, _)| k)
    }

    /// Adds `point` to `feature` with the given successor.
    pub fn add(&mut self, point: usize, feature: usize, next_point: Option<usize>, role: PointRole) {
        if point >= self.heads.len() {
            self.heads.resize(point + 1, None);
        }
        let key = self.entries.insert(FeatureListEntry {
            feature,
            next_point,
            next: self.heads[point],
            role,
        });
        self.heads[point] = Some(key);
    }

    /// Updates the successor of `point` in `feature`. Returns `false` if the
    /// point is not on the feature.
    pub fn set_next_point(&mut self, point: usize, feature: usize, next_point: Option<usize>) -> bool {
        match self.find_key(point, feature) {
            Some(key) => {
                self.entries[key].next_point = next_point;
                true
            }
            None => false,
        }
    }

    /// Updates the role of `point` in `feature`.
    pub fn set_role(&mut self, point: usize, feature: usize, role: PointRole) -> bool {
        match self.find_key(point, feature) {
            Some(key) => {
                self.entries[key].role = role;
                true
            }
            None => false,
        }
    }

    /// Removes the entry of `feature` at `point`.
    pub fn remove(&mut self, point: usize, feature: usize) -> bool {
        let mut prev: Option<FeatureListKey> = None;
        let mut current = self.heads.get(point).copied().flatten();
        while let Some(key) = current {
            let Some(entry) = self.entries.get(key).copied() else {
                return false;
            };
            if entry.feature == feature {
                match prev {
                    Some(p) => self.entries[p].next = entry.next,
                    None => self.heads[point] = entry.next,
                }
                self.entries.remove(key);
                return true;
            }
            prev = Some(key);
            current = entry.next;
        }
        false
    }

    /// Features whose chain steps directly between `a` and `b`, in either
    /// direction.
    #[must_use]
    pub fn features_on_edge(&self, a: usize, b: usize) -> SmallBuffer<usize, 4> {
        let mut found: SmallBuffer<usize, 4> = self
            .entries_at(a)
            .filter(|(_, e)| e.next_point == Some(b))
            .map(|(_, e)| e.feature)
            .collect();
        for (_, e) in self.entries_at(b) {
            if e.next_point == Some(a) && !found.contains(&e.feature) {
                found.push(e.feature);
            }
        }
        found
    }

    /// Drops entries whose feature row was removed and renumbers the rest.
    ///
    /// Returns the number of entries dropped.
    pub fn remap_features(&mut self, remap: &[Option<usize>]) -> usize {
        let mut dropped = 0;
        for point in 0..self.heads.len() {
            let stale: SmallBuffer<usize, 4> = self
                .entries_at(point)
                .filter(|(_, e)| remap.get(e.feature).copied().flatten().is_none())
                .map(|(_, e)| e.feature)
                .collect();
            for feature in stale {
                if self.remove(point, feature) {
                    dropped += 1;
                }
            }
        }
        for (_, entry) in &mut self.entries {
            if let Some(new) = remap.get(entry.feature).copied().flatten() {
                entry.feature = new;
            }
        }
        dropped
    }

    /// Renumbers points after point compaction; entries of dropped points are
    /// discarded and successors pointing at dropped points are cleared.
    pub fn remap_points(&mut self, remap: &[Option<usize>], new_len: usize) {
        let mut heads = vec![None; new_len];
        for (old, head) in self.heads.iter().enumerate() {
            match remap.get(old).copied().flatten() {
                Some(new) => heads[new] = *head,
                None => {
                    let mut current = *head;
                    while let Some(key) = current {
                        current = self.entries.remove(key).and_then(|e| e.next);
                    }
                }
            }
        }
        for (_, entry) in &mut self.entries {
            entry.next_point = entry
                .next_point
                .and_then(|p| remap.get(p).copied().flatten());
        }
        self.heads = heads;
    }

    /// Rebuilds the arena densely in point order.
    ///
    /// Returns the number of arena slots reclaimed.
    pub fn compact(&mut self) -> usize {
        let capacity_before = self.entries.capacity();
        let mut rebuilt: StorageMap<FeatureListKey, FeatureListEntry> =
            StorageMap::with_capacity_and_key(self.entries.len());
        let mut remap: SecondaryMap<FeatureListKey, FeatureListKey> = SecondaryMap::new();
        for point in 0..self.heads.len() {
            let mut current = self.heads[point];
            while let Some(key) = current {
                let Some(entry) = self.entries.get(key).copied() else {
                    break;
                };
                remap.insert(key, rebuilt.insert(entry));
                current = entry.next;
            }
        }
        for (_, entry) in &mut rebuilt {
            entry.next = entry.next.and_then(|k| remap.get(k).copied());
        }
        for head in &mut self.heads {
            *head = head.and_then(|k| remap.get(k).copied());
        }
        self.entries = rebuilt;
        capacity_before.saturating_sub(self.entries.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_find_and_remove_entries() {
        let mut list = FeatureList::with_points(4);
        list.add(0, 7, Some(1), PointRole::Inserted);
        list.add(1, 7, Some(2), PointRole::Intersected);
        list.add(1, 9, None, PointRole::Inserted);
        assert_eq!(list.len(), 3);
        assert_eq!(list.find(1, 7).map(|e| e.next_point), Some(Some(2)));
        assert_eq!(list.features_at(1).len(), 2);
        assert!(list.set_role(1, 7, PointRole::Inserted));
        assert!(list.remove(1, 9));
        assert!(!list.remove(1, 9));
        assert_eq!(list.features_at(1).as_slice(), &[7]);
        assert!(!list.has_features(3));
    }

    #[test]
    fn edge_membership_in_both_directions() {
        let mut list = FeatureList::with_points(3);
        list.add(0, 1, Some(1), PointRole::Inserted);
        list.add(2, 4, Some(1), PointRole::Inserted);
        assert_eq!(list.features_on_edge(0, 1).as_slice(), &[1]);
        assert_eq!(list.features_on_edge(1, 0).as_slice(), &[1]);
        assert_eq!(list.features_on_edge(1, 2).as_slice(), &[4]);
        assert!(list.features_on_edge(0, 2).is_empty());
    }

    #[test]
    fn remap_features_and_points() {
        let mut list = FeatureList::with_points(3);
        list.add(0, 0, Some(2), PointRole::Inserted);
        list.add(2, 0, None, PointRole::Inserted);
        list.add(1, 1, None, PointRole::Inserted);
        assert_eq!(list.remap_features(&[Some(0), None]), 1);
        list.remap_points(&[Some(0), None, Some(1)], 2);
        list.compact();
        assert_eq!(list.find(0, 0).map(|e| e.next_point), Some(Some(1)));
        assert!(list.find(1, 0).is_some());
        assert_eq!(list.len(), 2);
    }
}
