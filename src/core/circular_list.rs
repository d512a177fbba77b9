//! Circular-list edge store.
//!
//! Every point owns a singly linked ring of entries, one per neighbour, kept in
//! counter-clockwise angular order. The rings collectively are the edge
//! structure of the triangulation: `p → q` is an edge when `q` appears in the
//! ring of `p`, and triangles are implicit as three mutually adjacent points
//! that follow each other in their rings.
//!
//! Ring navigation primitives:
//!
//! - [`CircularList::next_ccw`]`(p, q)` is the neighbour of `p` that follows `q`
//!   counter-clockwise. For a counter-clockwise triangle `(a, b, c)` this gives
//!   `next_ccw(a, b) == c`, `next_ccw(b, c) == a` and `next_ccw(c, a) == b`.
//! - [`CircularList::next_cw`]`(p, q)` is the neighbour preceding `q`.
//!
//! Entries live in a slot-map arena addressed by generational [`CycleKey`]s, so
//! a stale key can never silently alias a reused slot.

#![forbid(unsafe_code)]

use crate::core::collections::{NeighborBuffer, StorageMap};
use crate::geometry::point::Point3;
use slotmap::{SecondaryMap, new_key_type};
use thiserror::Error;

new_key_type! {
    /// Key of one circular-list entry.
    pub struct CycleKey;
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by edge-store mutations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CircularListError {
    /// The requested edge is not present.
    #[error("edge {from} -> {to} is not in the circular list")]
    MissingEdge {
        /// Ring owner.
        from: usize,
        /// Expected neighbour.
        to: usize,
    },
    /// The point index is outside the table.
    #[error("point {point} is outside the circular list ({len} points)")]
    PointOutOfRange {
        /// Offending index.
        point: usize,
        /// Number of points in the list.
        len: usize,
    },
    /// The edge already exists.
    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge {
        /// Ring owner.
        from: usize,
        /// Neighbour.
        to: usize,
    },
    /// A ring was expected to be empty.
    #[error("point {point} already has a neighbour ring")]
    RingNotEmpty {
        /// Ring owner.
        point: usize,
    },
}

// =============================================================================
// ENTRY AND LIST
// =============================================================================

/// One neighbour slot in a point's ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleEntry {
    /// Point whose ring this entry belongs to.
    pub owner: usize,
    /// Neighbouring point.
    pub point: usize,
    /// Next entry counter-clockwise in the same ring.
    pub next: CycleKey,
}

/// Per-point adjacency rings backed by a slot-map arena.
#[derive(Clone, Debug, Default)]
pub struct CircularList {
    entries: StorageMap<CycleKey, CycleEntry>,
    heads: Vec<Option<CycleKey>>,
}

/// Iterator over the neighbours of one point in counter-clockwise order.
pub struct RingIter<'a> {
    list: &'a CircularList,
    start: Option<CycleKey>,
    current: Option<CycleKey>,
}

impl Iterator for RingIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let key = self.current?;
        let entry = self.list.entries.get(key)?;
        self.current = if Some(entry.next) == self.start {
            None
        } else {
            Some(entry.next)
        };
        Some(entry.point)
    }
}

impl CircularList {
    /// Creates an empty list for `num_points` points.
    #[must_use]
    pub fn with_points(num_points: usize) -> Self {
        Self {
            entries: StorageMap::with_capacity_and_key(num_points * 6),
            heads: vec![None; num_points],
        }
    }

    /// Number of points the list has ring slots for.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.heads.len()
    }

    /// Number of live entries (twice the number of edges).
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.entries.len() / 2
    }

    /// Adds a ring slot for a new point and returns its index.
    pub fn push_point(&mut self) -> usize {
        self.heads.push(None);
        self.heads.len() - 1
    }

    /// Returns `true` if `p` has at least one neighbour.
    #[must_use]
    pub fn has_ring(&self, p: usize) -> bool {
        self.heads.get(p).is_some_and(Option::is_some)
    }

    /// Head entry of `p`'s ring.
    #[must_use]
    pub fn head(&self, p: usize) -> Option<CycleKey> {
        self.heads.get(p).copied().flatten()
    }

    /// Entry lookup by key.
    #[must_use]
    pub fn entry(&self, key: CycleKey) -> Option<&CycleEntry> {
        self.entries.get(key)
    }

    /// Neighbours of `p` in counter-clockwise order starting from the head.
    #[must_use]
    pub fn ring(&self, p: usize) -> RingIter<'_> {
        let start = self.head(p);
        RingIter {
            list: self,
            start,
            current: start,
        }
    }

    /// Neighbours of `p` collected into a stack buffer.
    #[must_use]
    pub fn neighbors(&self, p: usize) -> NeighborBuffer {
        self.ring(p).collect()
    }

    /// Number of neighbours of `p`.
    #[must_use]
    pub fn degree(&self, p: usize) -> usize {
        self.ring(p).count()
    }

    /// Entry of `q` in the ring of `p`.
    #[must_use]
    pub fn find_entry(&self, p: usize, q: usize) -> Option<CycleKey> {
        let start = self.head(p)?;
        let mut key = start;
        loop {
            let entry = self.entries.get(key)?;
            if entry.point == q {
                return Some(key);
            }
            key = entry.next;
            if key == start {
                return None;
            }
        }
    }

    /// Entry whose `next` is `target` within the ring of `p`.
    fn predecessor(&self, p: usize, target: CycleKey) -> Option<CycleKey> {
        let start = self.head(p)?;
        let mut key = start;
        loop {
            let entry = self.entries.get(key)?;
            if entry.next == target {
                return Some(key);
            }
            key = entry.next;
            if key == start {
                return None;
            }
        }
    }

    /// Returns `true` if `q` is in the ring of `p`.
    #[must_use]
    pub fn has_edge(&self, p: usize, q: usize) -> bool {
        self.find_entry(p, q).is_some()
    }

    /// Neighbour of `p` following `q` counter-clockwise.
    ///
    /// A ring with a single neighbour returns that neighbour.
    #[must_use]
    pub fn next_ccw(&self, p: usize, q: usize) -> Option<usize> {
        let key = self.find_entry(p, q)?;
        let next = self.entries.get(key)?.next;
        self.entries.get(next).map(|e| e.point)
    }

    /// Neighbour of `p` preceding `q` counter-clockwise (its clockwise successor).
    #[must_use]
    pub fn next_cw(&self, p: usize, q: usize) -> Option<usize> {
        let key = self.find_entry(p, q)?;
        let prev = self.predecessor(p, key)?;
        self.entries.get(prev).map(|e| e.point)
    }

    fn check_point(&self, p: usize) -> Result<(), CircularListError> {
        if p < self.heads.len() {
            Ok(())
        } else {
            Err(CircularListError::PointOutOfRange {
                point: p,
                len: self.heads.len(),
            })
        }
    }

    /// Starts the ring of `p` with a single neighbour.
    ///
    /// # Errors
    ///
    /// Fails if `p` is out of range or already has a ring.
    pub fn insert_first(&mut self, p: usize, q: usize) -> Result<CycleKey, CircularListError> {
        self.check_point(p)?;
        if self.heads[p].is_some() {
            return Err(CircularListError::RingNotEmpty { point: p });
        }
        let key = self.entries.insert_with_key(|key| CycleEntry {
            owner: p,
            point: q,
            next: key,
        });
        self.heads[p] = Some(key);
        Ok(key)
    }

    /// Inserts `new` into the ring of `p` immediately after `after`, so that
    /// `next_ccw(p, after) == new` afterwards. An empty ring simply receives
    /// `new`.
    ///
    /// # Errors
    ///
    /// Fails if `new` is already a neighbour or `after` is missing.
    pub fn insert_after(&mut self, p: usize, new: usize, after: usize) -> Result<(), CircularListError> {
        self.check_point(p)?;
        if self.heads[p].is_none() {
            self.insert_first(p, new)?;
            return Ok(());
        }
        if self.has_edge(p, new) {
            return Err(CircularListError::DuplicateEdge { from: p, to: new });
        }
        let after_key = self
            .find_entry(p, after)
            .ok_or(CircularListError::MissingEdge { from: p, to: after })?;
        let next = self.entries[after_key].next;
        let key = self.entries.insert(CycleEntry {
            owner: p,
            point: new,
            next,
        });
        self.entries[after_key].next = key;
        Ok(())
    }

    /// Inserts `new` into the ring of `p` immediately before `before`, so that
    /// `next_ccw(p, new) == before` afterwards.
    ///
    /// # Errors
    ///
    /// Fails if `new` is already a neighbour or `before` is missing.
    pub fn insert_before(&mut self, p: usize, new: usize, before: usize) -> Result<(), CircularListError> {
        self.check_point(p)?;
        if self.heads[p].is_none() {
            self.insert_first(p, new)?;
            return Ok(());
        }
        let before_key = self
            .find_entry(p, before)
            .ok_or(CircularListError::MissingEdge { from: p, to: before })?;
        let prev_key = self
            .predecessor(p, before_key)
            .ok_or(CircularListError::MissingEdge { from: p, to: before })?;
        let prev = self.entries[prev_key].point;
        self.insert_after(p, new, prev)
    }

    /// Inserts `new` into the ring of `p` at its angular position.
    ///
    /// # Errors
    ///
    /// Fails if `new` is already a neighbour.
    pub fn insert_sorted(&mut self, p: usize, new: usize, points: &[Point3]) -> Result<(), CircularListError> {
        self.check_point(p)?;
        let ring = self.neighbors(p);
        match ring.len() {
            0 => self.insert_first(p, new).map(|_| ()),
            1 => self.insert_after(p, new, ring[0]),
            _ => {
                let origin = points[p];
                let angle_from = |base: f64, q: usize| -> f64 {
                    let a = (points[q].y - origin.y).atan2(points[q].x - origin.x) - base;
                    a.rem_euclid(std::f64::consts::TAU)
                };
                let base = (points[ring[0]].y - origin.y).atan2(points[ring[0]].x - origin.x);
                let target = angle_from(base, new);
                let mut after = ring[ring.len() - 1];
                for pair in ring.windows(2) {
                    if angle_from(base, pair[1]) > target {
                        after = pair[0];
                        break;
                    }
                }
                self.insert_after(p, new, after)
            }
        }
    }

    /// Inserts the edge `p q` at its angular position in both rings.
    ///
    /// # Errors
    ///
    /// Fails if the edge already exists.
    pub fn add_edge(&mut self, p: usize, q: usize, points: &[Point3]) -> Result<(), CircularListError> {
        self.insert_sorted(p, q, points)?;
        self.insert_sorted(q, p, points)
    }

    /// Removes `q` from the ring of `p`. Returns `false` if it was absent.
    pub fn remove(&mut self, p: usize, q: usize) -> bool {
        match self.find_entry(p, q) {
            Some(key) => self.unlink(p, key),
            None => false,
        }
    }

    /// Unlinks the entry `key` from the ring of `p` and frees it.
    fn unlink(&mut self, p: usize, key: CycleKey) -> bool {
        let Some(prev) = self.predecessor(p, key) else {
            return false;
        };
        let next = self.entries[key].next;
        if prev == key {
            self.heads[p] = None;
        } else {
            self.entries[prev].next = next;
            if self.heads[p] == Some(key) {
                self.heads[p] = Some(next);
            }
        }
        self.entries.remove(key);
        true
    }

    /// Deletes the undirected edge `p q`.
    ///
    /// # Errors
    ///
    /// Fails if either direction is missing; the other direction is still
    /// removed so the structure stays symmetric.
    pub fn delete_edge(&mut self, p: usize, q: usize) -> Result<(), CircularListError> {
        let forward = self.remove(p, q);
        let backward = self.remove(q, p);
        if forward && backward {
            Ok(())
        } else {
            Err(CircularListError::MissingEdge { from: p, to: q })
        }
    }

    /// Replaces neighbour `old` by `new` in the ring of `p`, keeping its slot.
    ///
    /// # Errors
    ///
    /// Fails if `old` is not a neighbour.
    pub fn replace_neighbor(&mut self, p: usize, old: usize, new: usize) -> Result<(), CircularListError> {
        let key = self
            .find_entry(p, old)
            .ok_or(CircularListError::MissingEdge { from: p, to: old })?;
        self.entries[key].point = new;
        Ok(())
    }

    /// Drops every entry in the ring of `p` (one direction only).
    pub fn clear_ring(&mut self, p: usize) {
        let Some(start) = self.head(p) else {
            return;
        };
        let mut key = start;
        loop {
            let Some(entry) = self.entries.remove(key) else {
                break;
            };
            key = entry.next;
            if key == start {
                break;
            }
        }
        self.heads[p] = None;
    }

    /// Removes every edge incident to `p`, in both directions, returning the
    /// former neighbours in counter-clockwise order.
    pub fn isolate_point(&mut self, p: usize) -> NeighborBuffer {
        let ring = self.neighbors(p);
        for &q in &ring {
            self.remove(q, p);
        }
        self.clear_ring(p);
        ring
    }

    /// All undirected edges `(p, q)` with `p < q`.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::with_capacity(self.num_edges());
        for p in 0..self.heads.len() {
            edges.extend(self.ring(p).filter(|&q| p < q).map(|q| (p, q)));
        }
        edges
    }

    /// Moves every ring of a worker-local list into this list.
    ///
    /// `local_to_global[i]` is the global index of the worker's point `i`. The
    /// target rings must be empty.
    ///
    /// # Errors
    ///
    /// Fails if a target ring is already populated or an index is out of range.
    pub fn absorb(&mut self, local: &Self, local_to_global: &[usize]) -> Result<(), CircularListError> {
        for (local_point, &global_point) in local_to_global.iter().enumerate() {
            let ring: NeighborBuffer = local
                .ring(local_point)
                .map(|q| local_to_global[q])
                .collect();
            if ring.is_empty() {
                continue;
            }
            self.check_point(global_point)?;
            if self.heads[global_point].is_some() {
                return Err(CircularListError::RingNotEmpty { point: global_point });
            }
            let mut previous = ring[0];
            self.insert_first(global_point, previous)?;
            for &q in &ring[1..] {
                self.insert_after(global_point, q, previous)?;
                previous = q;
            }
        }
        Ok(())
    }

    /// Renumbers points after point compaction.
    ///
    /// `remap[old]` is the new index of a surviving point. Rings of dropped points
    /// must already be empty; entries referring to dropped points are removed.
    pub fn remap_points(&mut self, remap: &[Option<usize>], new_len: usize) {
        let mut heads = vec![None; new_len];
        for (old, head) in self.heads.iter().enumerate() {
            if let (Some(new), Some(key)) = (remap.get(old).copied().flatten(), head) {
                heads[new] = Some(*key);
            }
        }
        let mut stale = Vec::new();
        for (key, entry) in &mut self.entries {
            match (
                remap.get(entry.owner).copied().flatten(),
                remap.get(entry.point).copied().flatten(),
            ) {
                (Some(owner), Some(point)) => {
                    entry.owner = owner;
                    entry.point = point;
                }
                _ => stale.push(key),
            }
        }
        self.heads = heads;
        for key in stale {
            if let Some(entry) = self.entries.get(key).copied() {
                if let Some(owner) = remap.get(entry.owner).copied().flatten() {
                    self.unlink(owner, key);
                } else {
                    self.entries.remove(key);
                }
            }
        }
    }

    /// Rebuilds the arena densely in point order, preserving ring order.
    ///
    /// Returns the number of arena slots reclaimed.
    pub fn compact(&mut self) -> usize {
        let capacity_before = self.entries.capacity();
        let mut rebuilt: StorageMap<CycleKey, CycleEntry> =
            StorageMap::with_capacity_and_key(self.entries.len());
        let mut remap: SecondaryMap<CycleKey, CycleKey> = SecondaryMap::with_capacity(self.entries.len());

        for p in 0..self.heads.len() {
            let Some(start) = self.heads[p] else {
                continue;
            };
            let mut key = start;
            loop {
                let Some(entry) = self.entries.get(key).copied() else {
                    break;
                };
                let new_key = rebuilt.insert(entry);
                remap.insert(key, new_key);
                key = entry.next;
                if key == start {
                    break;
                }
            }
        }
        for (_, entry) in &mut rebuilt {
            if let Some(&next) = remap.get(entry.next) {
                entry.next = next;
            }
        }
        for head in &mut self.heads {
            *head = head.and_then(|key| remap.get(key).copied());
        }
        self.entries = rebuilt;
        capacity_before.saturating_sub(self.entries.capacity())
    }
}

// =============================================================================
// TESTS
// =============================================================================
