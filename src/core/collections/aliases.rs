use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[cfg(not(feature = "dense-slotmap"))]
use slotmap::SlotMap;

#[cfg(feature = "dense-slotmap")]
use slotmap::DenseSlotMap;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Arena backend for the circular list and the feature list.
///
/// Uses `DenseSlotMap` under the default `dense-slotmap` feature and `SlotMap`
/// otherwise. The concrete type is not exposed in public signatures; callers
/// address entries through opaque keys.
#[cfg(not(feature = "dense-slotmap"))]
pub type StorageMap<K, V> = SlotMap<K, V>;

/// Arena backend for the circular list and the feature list.
#[cfg(feature = "dense-slotmap")]
pub type StorageMap<K, V> = DenseSlotMap<K, V>;

// =============================================================================
// CORE OPTIMIZED TYPES
// =============================================================================

/// `HashMap` with the fast non-cryptographic `FxHasher`.
///
/// Only use with trusted keys; the hasher is not DoS-resistant.
///
/// # Examples
///
/// ```rust
/// use tin::core::collections::FastHashMap;
///
/// let mut map: FastHashMap<usize, usize> = FastHashMap::default();
/// map.insert(3, 7);
/// assert_eq!(map.get(&3), Some(&7));
/// ```
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// `HashSet` with the fast non-cryptographic `FxHasher`.
pub type FastHashSet<T> = FxHashSet<T>;

/// Build hasher used by the capacity helpers.
pub type FastBuildHasher = FxBuildHasher;

/// Small-optimized `Vec` that stays on the stack for up to `N` elements.
///
/// # Examples
///
/// ```rust
/// use tin::core::collections::SmallBuffer;
///
/// let mut buffer: SmallBuffer<usize, 8> = SmallBuffer::new();
/// buffer.extend([1, 2, 3]);
/// assert!(!buffer.spilled());
/// ```
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

// =============================================================================
// SEMANTIC SIZE CONSTANTS AND TYPE ALIASES
// =============================================================================

/// Inline capacity for a point's neighbour ring. Delaunay vertex degree averages
/// six, so sixteen covers nearly every ring without spilling.
pub const RING_INLINE_CAPACITY: usize = 16;

/// Scratch buffer holding one point's neighbours in ring order.
pub type NeighborBuffer = SmallBuffer<usize, RING_INLINE_CAPACITY>;
