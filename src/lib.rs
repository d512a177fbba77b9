//! # tin
//!
//! Incremental constrained Delaunay triangulation of terrain points into a
//! triangulated irregular network (TIN).
//!
//! # Features
//!
//! - Divide-and-conquer Delaunay triangulation, partitioned across threads with
//!   [rayon](https://docs.rs/rayon) for large inputs
//! - Typed constraint features: break lines, contours, voids, holes, islands,
//!   regions, spot groups and boundary polygons or lines
//! - Feature-local failure handling: a feature that cannot be inserted is
//!   recorded and skipped, and knotted lines are split and retried
//! - Boundary processing: sliver removal, maximum side length, clipping to a
//!   boundary polygon or to joined boundary lines
//! - Optional rollback snapshots of features altered by clipping
//! - Compaction of every table with consistent renumbering
//! - Serialization of build options with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! ```rust
//! use tin::prelude::*;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 10.0),
//!     Point3::new(100.0, 0.0, 12.0),
//!     Point3::new(100.0, 100.0, 14.0),
//!     Point3::new(0.0, 100.0, 12.0),
//!     Point3::new(40.0, 55.0, 20.0),
//!     Point3::new(65.0, 30.0, 18.0),
//! ];
//!
//! let build = TinBuilder::new(points)
//!     .feature(FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 2]).with_user_tag(7))
//!     .build()
//!     .unwrap();
//!
//! let tin = &build.tin;
//! assert_eq!(build.report.failed, 0);
//! assert!(tin.is_constrained(0, 2));
//! assert_eq!(tin.hull_points().len(), 4);
//! assert!(tin.interpolate_z(50.0, 50.0).is_some());
//! assert!(tin.validate().is_ok());
//! ```
//!
//! # Pipeline
//!
//! [`TinBuilder::build`](core::builder::TinBuilder::build) runs load,
//! triangulation, feature insertion, the edge option, void processing and
//! compaction in that order. Fatal conditions are returned as
//! [`TinBuildError`](core::builder::TinBuildError); per-feature failures are
//! listed in the [`BuildReport`](core::builder::BuildReport).

#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// The `core` module contains the triangulation structure, the constraint
/// feature model and the build pipeline.
pub mod core {
    /// Triangulation, insertion and post-processing algorithms
    pub mod algorithms {
        /// Table compaction
        pub mod compaction;
        /// Constraint feature insertion
        pub mod constraint_insertion;
        /// Divide-and-conquer Delaunay triangulation
        pub mod divide_and_conquer;
        /// Boundary and edge-option processing
        pub mod edge_options;
        /// Point location
        pub mod locate;
        /// Partitioned triangulation
        pub mod parallel;
        /// Void clipping and interior point removal
        pub mod voids;
    }
    pub mod builder;
    pub mod cancellation;
    pub mod circular_list;
    pub mod collections;
    pub mod feature;
    pub mod feature_list;
    pub mod hull;
    pub mod rollback;
    pub mod tin;
    pub mod util;
    pub mod validation;

    pub use builder::*;
    pub use cancellation::*;
    pub use feature::*;
    pub use tin::*;
}

/// Geometric types and predicates.
pub mod geometry {
    pub mod point;
    pub mod polygon;
    pub mod predicates;

    pub use point::*;
    pub use predicates::*;
}

/// A prelude module that re-exports commonly used types.
pub mod prelude {
    pub use crate::core::{
        algorithms::{edge_options::EdgeOption, locate::Location},
        builder::{BuildReport, TinBuild, TinBuildError, TinBuilder, TinOptions, TinOptionsBuilder},
        cancellation::{BuildPhase, CancellationToken},
        feature::{FeatureId, FeatureKind, FeatureSpec, FeatureState},
        rollback::RollbackStore,
        tin::{Tin, Tolerances},
    };

    // Collection types used by downstream code
    pub use crate::core::collections::{
        FastHashMap, FastHashSet, SmallBuffer, fast_hash_map_with_capacity,
        fast_hash_set_with_capacity,
    };

    pub use crate::geometry::point::Point3;
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{
        core::{builder::TinBuild, cancellation::CancellationToken, rollback::RollbackStore, tin::Tin},
        geometry::point::Point3,
        is_normal,
    };

    #[test]
    fn normal_types() {
        assert!(is_normal::<Point3>());
        assert!(is_normal::<Tin>());
        assert!(is_normal::<RollbackStore>());
        assert!(is_normal::<TinBuild>());
        assert!(is_normal::<CancellationToken>());
    }

    #[test]
    fn prelude_exports() {
        use crate::prelude::*;

        let mut map: FastHashMap<u64, usize> = fast_hash_map_with_capacity(4);
        map.insert(1, 2);
        assert_eq!(map.get(&1), Some(&2));

        let mut set: FastHashSet<usize> = fast_hash_set_with_capacity(4);
        set.insert(3);
        assert!(set.contains(&3));

        let mut buffer: SmallBuffer<usize, 4> = SmallBuffer::new();
        buffer.push(9);
        assert_eq!(buffer.len(), 1);

        let build = TinBuilder::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
        .build()
        .unwrap();
        assert_eq!(build.report.triangles, 1);
        assert_eq!(build.tin.tolerances(), &Tolerances::default());
        assert_eq!(TinOptions::default().edge_option, EdgeOption::None);
    }
}
