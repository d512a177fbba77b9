use super::{FastBuildHasher, FastHashMap, FastHashSet};

/// Empty `FastHashMap` with room for `capacity` entries.
///
/// Used where the entry count is known up front, such as one key per input
/// point during deduplication.
///
/// # Examples
///
/// ```rust
/// use tin::core::collections::fast_hash_map_with_capacity;
///
/// let mut by_position = fast_hash_map_with_capacity::<(u64, u64), usize>(3);
/// by_position.insert((1.0_f64.to_bits(), 2.0_f64.to_bits()), 0);
/// assert!(by_position.capacity() >= 3);
/// ```
#[inline]
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

/// Empty `FastHashSet` with room for `capacity` entries.
#[inline]
#[must_use]
pub fn fast_hash_set_with_capacity<T>(capacity: usize) -> FastHashSet<T> {
    FastHashSet::with_capacity_and_hasher(capacity, FastBuildHasher::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_set_holds_requested_capacity() {
        let mut edges = fast_hash_set_with_capacity::<(usize, usize)>(32);
        assert!(edges.capacity() >= 32);
        assert!(edges.insert((3, 7)));
        assert!(!edges.insert((3, 7)));
    }
}
