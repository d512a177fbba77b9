//! Typed constraint features and the feature table.
//!
//! A feature moves through a small state machine:
//!
//! ```text
//! Data ─▶ OffsetsArray ─┬─▶ Tin
//!      └▶ PointsArray  ─┴─▶ TinError │ Deleted │ Rollback
//! ```
//!
//! The `Data` stage is the caller's [`FeatureSpec`]; it never enters the
//! table. Loading resolves each spec into point
//! offsets (`OffsetsArray`) or, for features inserted after triangulation with
//! draped elevations, a coordinate list (`PointsArray`). Insertion threads the
//! feature through the triangulation (`Tin`) or records a diagnostic coordinate
//! snapshot (`TinError`).

#![forbid(unsafe_code)]

use crate::geometry::point::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// FEATURE KIND
// =============================================================================

/// Constraint type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Hard break line; swaps tin lines onto itself.
    Breakline,
    /// Soft break line; inserted like a break line but does not break slope.
    SoftBreakline,
    /// Contour line.
    ContourLine,
    /// Void polygon with draped boundary elevations.
    Void,
    /// Void polygon whose boundary elevations come from the polygon itself.
    BreakVoid,
    /// Void polygon inserted after boundary processing, draped on the surface.
    DrapeVoid,
    /// Hole inside an island.
    Hole,
    /// Island inside a void.
    Island,
    /// Region polygon; constrains edges without removing triangles.
    Region,
    /// Group of spot heights with no connectivity.
    GroupSpots,
    /// Boundary polygon.
    Hull,
    /// Open boundary line, joined with others into a boundary ring.
    HullLine,
}

/// How a feature segment is made into a triangulation edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertionMethod {
    /// Swap crossing tin lines until the segment exists; fall back to
    /// [`InsertionMethod::Intersect`] when a crossing line is constrained.
    Swap,
    /// Add a point at every crossing and thread through it.
    Intersect,
}

/// Where elevations of points added on a feature segment come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElevationRule {
    /// Interpolate along the feature segment.
    Break,
    /// Interpolate from the triangulated surface.
    Drape,
}

impl FeatureKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Breakline,
        Self::SoftBreakline,
        Self::ContourLine,
        Self::Void,
        Self::BreakVoid,
        Self::DrapeVoid,
        Self::Hole,
        Self::Island,
        Self::Region,
        Self::GroupSpots,
        Self::Hull,
        Self::HullLine,
    ];

    /// Closed polygon features.
    #[must_use]
    pub const fn is_polygonal(self) -> bool {
        matches!(
            self,
            Self::Void
                | Self::BreakVoid
                | Self::DrapeVoid
                | Self::Hole
                | Self::Island
                | Self::Region
                | Self::Hull
        )
    }

    /// Polygons whose interior is removed from the surface.
    #[must_use]
    pub const fn is_void_like(self) -> bool {
        matches!(self, Self::Void | Self::BreakVoid | Self::DrapeVoid | Self::Hole)
    }

    /// Polygons that may not cross each other once in the triangulation.
    #[must_use]
    pub const fn checks_polygon_intersection(self) -> bool {
        self.is_void_like() || matches!(self, Self::Island)
    }

    /// Features whose chain pointers are triangulation edges.
    #[must_use]
    pub const fn constrains_edges(self) -> bool {
        !matches!(self, Self::GroupSpots)
    }

    /// Line features clipped away inside voids after insertion.
    #[must_use]
    pub const fn is_clipped_by_voids(self) -> bool {
        matches!(self, Self::Breakline | Self::SoftBreakline | Self::ContourLine)
    }

    /// Segment insertion method.
    #[must_use]
    pub const fn insertion_method(self) -> InsertionMethod {
        match self {
            Self::Breakline | Self::SoftBreakline | Self::HullLine => InsertionMethod::Swap,
            _ => InsertionMethod::Intersect,
        }
    }

    /// Elevation rule for points added on this feature's segments.
    #[must_use]
    pub const fn elevation_rule(self) -> ElevationRule {
        match self {
            Self::Breakline | Self::SoftBreakline | Self::ContourLine | Self::BreakVoid => {
                ElevationRule::Break
            }
            _ => ElevationRule::Drape,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Breakline => "Breakline",
            Self::SoftBreakline => "SoftBreakline",
            Self::ContourLine => "ContourLine",
            Self::Void => "Void",
            Self::BreakVoid => "BreakVoid",
            Self::DrapeVoid => "DrapeVoid",
            Self::Hole => "Hole",
            Self::Island => "Island",
            Self::Region => "Region",
            Self::GroupSpots => "GroupSpots",
            Self::Hull => "Hull",
            Self::HullLine => "HullLine",
        };
        f.write_str(name)
    }
}

// =============================================================================
// STATE, IDS AND GEOMETRY
// =============================================================================

/// Lifecycle state of a feature-table row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureState {
    /// Resolved to point offsets, awaiting insertion.
    OffsetsArray,
    /// Standalone coordinate list.
    PointsArray,
    /// Threaded through the triangulation.
    Tin,
    /// Insertion failed; geometry kept as a coordinate snapshot.
    TinError,
    /// Marked for removal by the compactor.
    Deleted,
    /// Copy held in the rollback store.
    Rollback,
}

/// Stable feature identifier shared by every row split from one feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-defined tag carried through unchanged.
pub type UserTag = u64;

/// Geometry of a feature-table row, matching its state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureGeometry {
    /// Ordered point-table offsets.
    Offsets(Vec<usize>),
    /// Standalone coordinates.
    Points(Vec<Point3>),
    /// First point of the chain threaded through the feature list.
    Chain {
        /// First point of the chain.
        first: usize,
    },
    /// No geometry.
    Empty,
}

/// One row of the feature table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Constraint type.
    pub kind: FeatureKind,
    /// Lifecycle state.
    pub state: FeatureState,
    /// Caller tag.
    pub user_tag: UserTag,
    /// Stable id.
    pub id: FeatureId,
    /// Draped boundary (for [`FeatureKind::Hull`]).
    pub drape: bool,
    /// Geometry.
    pub geometry: FeatureGeometry,
    /// Reason for the last failed insertion, if any.
    pub failure: Option<String>,
}

impl Feature {
    /// Returns `true` for rows live in the triangulation.
    #[must_use]
    pub fn is_tin(&self) -> bool {
        self.state == FeatureState::Tin
    }

    /// Point offsets for rows in the `OffsetsArray` state.
    #[must_use]
    pub fn offsets(&self) -> Option<&[usize]> {
        match &self.geometry {
            FeatureGeometry::Offsets(offsets) => Some(offsets),
            _ => None,
        }
    }

    /// First chain point for rows in the `Tin` state.
    #[must_use]
    pub const fn first_point(&self) -> Option<usize> {
        match self.geometry {
            FeatureGeometry::Chain { first } => Some(first),
            _ => None,
        }
    }
}

// =============================================================================
// INPUT DESCRIPTORS
// =============================================================================

/// Feature geometry as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureInput {
    /// Indices into the input point array.
    Offsets(Vec<usize>),
    /// Explicit coordinates.
    Coordinates(Vec<Point3>),
}

/// Caller-side feature descriptor.
///
/// # Examples
///
/// ```
/// use tin::core::feature::{FeatureId, FeatureKind, FeatureSpec};
///
/// let spec = FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 4, 8])
///     .with_user_tag(7)
///     .with_id(FeatureId(42));
/// assert_eq!(spec.user_tag, 7);
/// assert_eq!(spec.id, Some(FeatureId(42)));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Constraint type.
    pub kind: FeatureKind,
    /// Caller tag.
    pub user_tag: UserTag,
    /// Stable id; assigned sequentially when absent.
    pub id: Option<FeatureId>,
    /// Geometry.
    pub input: FeatureInput,
    /// Drape flag.
    pub drape: bool,
}

impl FeatureSpec {
    /// Feature over input point indices.
    #[must_use]
    pub const fn offsets(kind: FeatureKind, offsets: Vec<usize>) -> Self {
        Self {
            kind,
            user_tag: 0,
            id: None,
            input: FeatureInput::Offsets(offsets),
            drape: false,
        }
    }

    /// Feature over explicit coordinates.
    #[must_use]
    pub const fn coordinates(kind: FeatureKind, points: Vec<Point3>) -> Self {
        Self {
            kind,
            user_tag: 0,
            id: None,
            input: FeatureInput::Coordinates(points),
            drape: false,
        }
    }

    /// Sets the user tag.
    #[must_use]
    pub const fn with_user_tag(mut self, user_tag: UserTag) -> Self {
        self.user_tag = user_tag;
        self
    }

    /// Sets the stable id.
    #[must_use]
    pub const fn with_id(mut self, id: FeatureId) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks the feature as draped.
    #[must_use]
    pub const fn draped(mut self) -> Self {
        self.drape = true;
        self
    }
}

// =============================================================================
// FEATURE TABLE
// =============================================================================

/// Ordered table of feature rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: Vec<Feature>,
    next_id: u64,
}

impl FeatureTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row lookup.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.rows.get(index)
    }

    /// Mutable row lookup.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Feature> {
        self.rows.get_mut(index)
    }

    /// Iterates rows with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Feature)> {
        self.rows.iter().enumerate()
    }

    /// Allocates a fresh id, never reused within this table.
    pub const fn allocate_id(&mut self) -> FeatureId {
        let id = FeatureId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends a row, returning its index. Keeps the id allocator ahead of
    /// explicit ids.
    pub fn push(&mut self, feature: Feature) -> usize {
        self.next_id = self.next_id.max(feature.id.0.saturating_add(1));
        self.rows.push(feature);
        self.rows.len() - 1
    }

    /// Indices of every row sharing `id`, in table order.
    #[must_use]
    pub fn indices_with_id(&self, id: FeatureId) -> Vec<usize> {
        self.iter()
            .filter(|(_, f)| f.id == id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of rows of `kind` in any of `states`, in table order.
    #[must_use]
    pub fn indices_of(&self, kind: FeatureKind, states: &[FeatureState]) -> Vec<usize> {
        self.iter()
            .filter(|(_, f)| f.kind == kind && states.contains(&f.state))
            .map(|(i, _)| i)
            .collect()
    }

    /// Removes rows for which `keep` is false, returning the old-to-new index map.
    pub(crate) fn retain_rows<F>(&mut self, mut keep: F) -> Vec<Option<usize>>
    where
        F: FnMut(&Feature) -> bool,
    {
        let mut remap = Vec::with_capacity(self.rows.len());
        let mut shift = 0;
        for (index, row) in self.rows.iter().enumerate() {
            if keep(row) {
                remap.push(Some(index - shift));
            } else {
                remap.push(None);
                shift += 1;
            }
        }
        let mut index = 0;
        self.rows.retain(|_| {
            let kept = remap[index].is_some();
            index += 1;
            kept
        });
        remap
    }

    /// Mutable access to all rows.
    pub(crate) fn rows_mut(&mut self) -> &mut [Feature] {
        &mut self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: FeatureKind, id: u64, state: FeatureState) -> Feature {
        Feature {
            kind,
            state,
            user_tag: 0,
            id: FeatureId(id),
            drape: false,
            geometry: FeatureGeometry::Empty,
            failure: None,
        }
    }

    #[test]
    fn kind_classification() {
        assert!(FeatureKind::Void.is_polygonal());
        assert!(FeatureKind::Hole.is_void_like());
        assert!(!FeatureKind::Island.is_void_like());
        assert!(FeatureKind::Island.checks_polygon_intersection());
        assert!(!FeatureKind::GroupSpots.constrains_edges());
        assert_eq!(FeatureKind::Breakline.insertion_method(), InsertionMethod::Swap);
        assert_eq!(FeatureKind::Void.insertion_method(), InsertionMethod::Intersect);
        assert_eq!(FeatureKind::ContourLine.elevation_rule(), ElevationRule::Break);
        assert_eq!(FeatureKind::Island.elevation_rule(), ElevationRule::Drape);
        assert_eq!(FeatureKind::ALL.len(), 12);
        assert_eq!(FeatureKind::DrapeVoid.to_string(), "DrapeVoid");
    }

    #[test]
    fn table_ids_and_retain() {
        let mut table = FeatureTable::new();
        table.push(row(FeatureKind::Breakline, 5, FeatureState::Tin));
        let fresh = table.allocate_id();
        assert_eq!(fresh, FeatureId(6));
        table.push(row(FeatureKind::Breakline, 5, FeatureState::Deleted));
        table.push(row(FeatureKind::Void, 6, FeatureState::Tin));
        assert_eq!(table.indices_with_id(FeatureId(5)), vec![0, 1]);
        assert_eq!(table.indices_of(FeatureKind::Void, &[FeatureState::Tin]), vec![2]);
        assert_eq!(
            table.indices_of(FeatureKind::Breakline, &[FeatureState::Tin, FeatureState::Deleted]),
            vec![0, 1]
        );

        let remap = table.retain_rows(|f| f.state != FeatureState::Deleted);
        assert_eq!(remap, vec![Some(0), None, Some(1)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).map(|f| f.kind), Some(FeatureKind::Void));
    }

    #[test]
    fn feature_spec_serde_roundtrip() {
        let spec = FeatureSpec::coordinates(
            FeatureKind::DrapeVoid,
            vec![Point3::new(1.0, 2.0, 3.0)],
        )
        .draped();
        let json = serde_json::to_string(&spec).unwrap();
        let back: FeatureSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
