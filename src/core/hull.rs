//! Hull ring.
//!
//! The boundary of the triangulation as a single counter-clockwise cycle with
//! the surface on its left. Only hull points carry a successor.

#![forbid(unsafe_code)]

/// Counter-clockwise boundary cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HullRing {
    next: Vec<Option<usize>>,
    start: Option<usize>,
    convex: bool,
}

impl HullRing {
    /// Creates an empty ring for `num_points` points.
    #[must_use]
    pub fn with_points(num_points: usize) -> Self {
        Self {
            next: vec![None; num_points],
            start: None,
            convex: false,
        }
    }

    /// Adds a slot for a new point.
    pub fn push_point(&mut self) {
        self.next.push(None);
    }

    /// Any point on the ring.
    #[must_use]
    pub const fn start(&self) -> Option<usize> {
        self.start
    }

    /// Returns `true` while the ring is the untouched convex hull.
    #[must_use]
    pub const fn is_convex(&self) -> bool {
        self.convex
    }

    /// Records whether the ring is still the convex hull.
    pub const fn set_convex(&mut self, convex: bool) {
        self.convex = convex;
    }

    /// Counter-clockwise successor of `p`, if `p` is on the ring.
    #[must_use]
    pub fn next(&self, p: usize) -> Option<usize> {
        self.next.get(p).copied().flatten()
    }

    /// Returns `true` if `p` is on the ring.
    #[must_use]
    pub fn contains(&self, p: usize) -> bool {
        self.next(p).is_some()
    }

    /// Replaces the ring by the given counter-clockwise cycle.
    pub fn set_cycle(&mut self, cycle: &[usize]) {
        self.next.iter_mut().for_each(|n| *n = None);
        for (i, &p) in cycle.iter().enumerate() {
            if p >= self.next.len() {
                self.next.resize(p + 1, None);
            }
            self.next[p] = Some(cycle[(i + 1) % cycle.len()]);
        }
        self.start = cycle.first().copied();
    }

    /// Sets the successor of `p`.
    pub fn set_next(&mut self, p: usize, q: usize) {
        if p >= self.next.len() {
            self.next.resize(p + 1, None);
        }
        self.next[p] = Some(q);
        if self.start.is_none() {
            self.start = Some(p);
        }
    }

    /// Replaces hull edge `a → b` by `a → apex → b`.
    pub fn insert_between(&mut self, a: usize, apex: usize, b: usize) {
        self.set_next(a, apex);
        self.set_next(apex, b);
    }

    /// Walks the ring from its start, stopping after `limit` steps if the
    /// successors do not close.
    #[must_use]
    pub fn cycle(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(start) = self.start else {
            return out;
        };
        let mut p = start;
        let limit = self.next.len() + 1;
        while out.len() < limit {
            out.push(p);
            match self.next(p) {
                Some(q) if q != start => p = q,
                _ => break,
            }
        }
        out
    }

    /// Hull edges `(p, next(p))` in ring order.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.cycle()
            .into_iter()
            .filter_map(|p| self.next(p).map(|q| (p, q)))
            .collect()
    }

    /// Renumbers after point compaction.
    pub fn remap_points(&mut self, remap: &[Option<usize>], new_len: usize) {
        let mut next = vec![None; new_len];
        for (old, succ) in self.next.iter().enumerate() {
            if let (Some(new), Some(s)) = (remap.get(old).copied().flatten(), succ) {
                next[new] = remap.get(*s).copied().flatten();
            }
        }
        self.next = next;
        self.start = self.start.and_then(|s| remap.get(s).copied().flatten());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_roundtrip_and_edge_split() {
        let mut hull = HullRing::with_points(5);
        hull.set_cycle(&[0, 1, 2]);
        assert_eq!(hull.cycle(), vec![0, 1, 2]);
        assert!(hull.contains(2));
        assert!(!hull.contains(3));
        hull.insert_between(1, 3, 2);
        assert_eq!(hull.cycle(), vec![0, 1, 3, 2]);
        assert_eq!(hull.edges(), vec![(0, 1), (1, 3), (3, 2), (2, 0)]);
    }

    #[test]
    fn remap_drops_removed_points() {
        let mut hull = HullRing::with_points(4);
        hull.set_cycle(&[0, 2, 3]);
        hull.remap_points(&[Some(0), None, Some(1), Some(2)], 3);
        assert_eq!(hull.cycle(), vec![0, 1, 2]);
    }
}
