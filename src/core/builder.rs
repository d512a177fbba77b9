//! Build options and the end-to-end TIN build pipeline.
//!
//! [`TinBuilder`] takes raw points and typed feature descriptors and runs every
//! phase in order:
//!
//! 1. **Load**: coordinates are checked, coordinate features are appended to
//!    the point table and near-coincident points are merged.
//! 2. **Triangulation**: divide and conquer, partitioned across threads for
//!    large inputs.
//! 3. **Feature insertion**: line features, a constrained re-legalisation,
//!    then polygon features and spot groups.
//! 4. **Edge option**: boundary features or the caller's peeling option.
//! 5. **Voids**: draped voids, then line clipping and interior point removal.
//! 6. **Compaction**.
//!
//! # Examples
//!
//! ```rust
//! use tin::prelude::*;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(10.0, 0.0, 2.0),
//!     Point3::new(10.0, 10.0, 3.0),
//!     Point3::new(0.0, 10.0, 4.0),
//!     Point3::new(4.0, 6.0, 5.0),
//! ];
//! let options = TinOptionsBuilder::default()
//!     .edge_option(EdgeOption::Sliver)
//!     .build()
//!     .unwrap();
//! let build = TinBuilder::new(points)
//!     .feature(FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 2]))
//!     .options(options)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(build.report.inserted, 1);
//! assert!(build.tin.is_constrained(0, 2));
//! assert!(build.tin.validate().is_ok());
//! ```

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::algorithms::compaction::{CompactionError, compact};
use crate::core::algorithms::constraint_insertion::{
    FeatureFailure, FeatureInsertReport, FeatureInserter, relegalize_all,
};
use crate::core::algorithms::divide_and_conquer::{TriangulationError, triangulate};
use crate::core::algorithms::edge_options::{
    EdgeOption, EdgeOptionError, EdgeParameters, apply_edge_option, remove_precision_slivers,
};
use crate::core::algorithms::parallel::triangulate_parallel;
use crate::core::algorithms::voids::{VoidError, process_voids};
use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::circular_list::CircularListError;
use crate::core::feature::{
    Feature, FeatureGeometry, FeatureId, FeatureInput, FeatureKind, FeatureSpec, FeatureState,
};
use crate::core::rollback::RollbackStore;
use crate::core::tin::{Tin, Tolerances};
use crate::core::util::deduplication::dedup_points;
use crate::geometry::point::Point3;

/// Line features, inserted before the re-legalisation pass.
const LINE_PASSES: [FeatureKind; 3] = [
    FeatureKind::ContourLine,
    FeatureKind::SoftBreakline,
    FeatureKind::Breakline,
];

/// Polygon features and spot groups, inserted after the re-legalisation pass.
const POLYGON_PASSES: [FeatureKind; 6] = [
    FeatureKind::Void,
    FeatureKind::BreakVoid,
    FeatureKind::Hole,
    FeatureKind::Island,
    FeatureKind::GroupSpots,
    FeatureKind::Region,
];

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Fatal build failures. No partial result is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TinBuildError {
    /// Fewer than two distinct points.
    #[error("at least two distinct points are required, got {count}")]
    InsufficientPoints {
        /// Distinct points after merging.
        count: usize,
    },
    /// Three or more points, all on one line.
    #[error("all {count} points are colinear")]
    AllColinear {
        /// Distinct points after merging.
        count: usize,
    },
    /// The caller cancelled.
    #[error("build cancelled during {phase}")]
    Cancelled {
        /// Phase that observed the request.
        phase: BuildPhase,
    },
    /// An input point has a non-finite coordinate.
    #[error("input point {index} has a non-finite coordinate")]
    InvalidCoordinate {
        /// Input point index.
        index: usize,
    },
    /// A feature descriptor cannot be resolved against the input.
    #[error("feature {index} is malformed: {reason}")]
    InvalidFeature {
        /// Position in the builder's feature list.
        index: usize,
        /// Detailed reason.
        reason: String,
    },
    /// The point table could not be allocated.
    #[error("cannot allocate a point table of {requested} points")]
    Allocation {
        /// Requested capacity.
        requested: usize,
    },
    /// A topological primitive left the structure inconsistent.
    #[error("topology failure during {phase}: {reason}")]
    Topology {
        /// Phase that failed.
        phase: BuildPhase,
        /// Detailed reason.
        reason: String,
    },
    /// The options are out of range.
    #[error("invalid options: {reason}")]
    Options {
        /// Detailed reason.
        reason: String,
    },
}

impl TinBuildError {
    fn topology(phase: BuildPhase, source: &impl std::fmt::Display) -> Self {
        Self::Topology {
            phase,
            reason: source.to_string(),
        }
    }
}

impl From<Cancelled> for TinBuildError {
    fn from(source: Cancelled) -> Self {
        Self::Cancelled { phase: source.phase }
    }
}

impl From<TriangulationError> for TinBuildError {
    fn from(source: TriangulationError) -> Self {
        match source {
            TriangulationError::InsufficientPoints { count } => Self::InsufficientPoints { count },
            TriangulationError::AllColinear { count } => Self::AllColinear { count },
            TriangulationError::Cancelled(cancelled) => cancelled.into(),
            other => Self::topology(BuildPhase::Triangulation, &other),
        }
    }
}

impl From<EdgeOptionError> for TinBuildError {
    fn from(source: EdgeOptionError) -> Self {
        match source {
            EdgeOptionError::Cancelled(cancelled) => cancelled.into(),
            other => Self::topology(BuildPhase::EdgeOption, &other),
        }
    }
}

impl From<VoidError> for TinBuildError {
    fn from(source: VoidError) -> Self {
        match source {
            VoidError::Cancelled(cancelled) => cancelled.into(),
            other => Self::topology(BuildPhase::Voids, &other),
        }
    }
}

impl From<CompactionError> for TinBuildError {
    fn from(source: CompactionError) -> Self {
        match source {
            CompactionError::Cancelled(cancelled) => cancelled.into(),
            other => Self::topology(BuildPhase::Compaction, &other),
        }
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Build settings.
///
/// Construct with [`TinOptionsBuilder`]; unset fields take the defaults of
/// [`TinOptions::default`]. Options serialise with `serde`, and missing fields
/// deserialise to their defaults.
///
/// # Examples
///
/// ```rust
/// use tin::core::builder::TinOptionsBuilder;
/// use tin::core::algorithms::edge_options::EdgeOption;
///
/// let options = TinOptionsBuilder::default()
///     .edge_option(EdgeOption::MaxSide)
///     .max_side(25.0)
///     .processors(1_usize)
///     .build()
///     .unwrap();
/// assert_eq!(options.sliver_ratio, 0.025);
/// assert!(TinOptionsBuilder::default().pp_tol(-1.0).build().is_err());
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct TinOptions {
    /// Points closer than this in plan are merged.
    pub pp_tol: f64,
    /// Points closer than this to a line lie on it.
    pub pl_tol: f64,
    /// In-circle determinants below this magnitude fall back to the max-min
    /// angle test.
    pub incircle_tolerance: f64,
    /// Boundary treatment when no boundary feature is supplied.
    pub edge_option: EdgeOption,
    /// Maximum hull edge length for [`EdgeOption::MaxSide`]; `0` disables.
    pub max_side: f64,
    /// Tolerated excess of the two short sides over the hull side for
    /// [`EdgeOption::Sliver`].
    pub sliver_ratio: f64,
    /// Worker threads for the triangulation; `0` uses every available core.
    #[builder(setter(into))]
    pub processors: usize,
    /// Point count from which the triangulation is partitioned.
    #[builder(setter(into))]
    pub parallel_threshold: usize,
    /// Snapshot features before destructive clipping.
    pub rollback: bool,
    /// Remove near-degenerate hull triangles right after triangulation.
    pub precision_sliver_removal: bool,
}

impl Default for TinOptions {
    fn default() -> Self {
        Self {
            pp_tol: 1e-4,
            pl_tol: 1e-4,
            incircle_tolerance: 1e-3,
            edge_option: EdgeOption::None,
            max_side: 0.0,
            sliver_ratio: 0.025,
            processors: 0,
            parallel_threshold: 1000,
            rollback: false,
            precision_sliver_removal: true,
        }
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be finite and non-negative, got {value}"))
    }
}

impl TinOptions {
    /// Tolerances handed to the triangulation.
    #[must_use]
    pub const fn to_tolerances(&self) -> Tolerances {
        Tolerances {
            pp_tol: self.pp_tol,
            pl_tol: self.pl_tol,
            incircle: self.incircle_tolerance,
        }
    }

    /// Checks numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TinBuildError::Options`] naming the first bad field.
    pub fn validate(&self) -> Result<(), TinBuildError> {
        [
            ("pp_tol", self.pp_tol),
            ("pl_tol", self.pl_tol),
            ("incircle_tolerance", self.incircle_tolerance),
            ("max_side", self.max_side),
            ("sliver_ratio", self.sliver_ratio),
        ]
        .into_iter()
        .try_for_each(|(name, value)| check_non_negative(name, value))
        .map_err(|reason| TinBuildError::Options { reason })
    }

    const fn edge_parameters(&self) -> EdgeParameters {
        EdgeParameters {
            max_side: self.max_side,
            sliver_ratio: self.sliver_ratio,
        }
    }
}

impl TinOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        [
            ("pp_tol", self.pp_tol),
            ("pl_tol", self.pl_tol),
            ("incircle_tolerance", self.incircle_tolerance),
            ("max_side", self.max_side),
            ("sliver_ratio", self.sliver_ratio),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .try_for_each(|(name, value)| check_non_negative(name, value))
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Statistics of a finished build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    /// Points in the final table.
    pub points: usize,
    /// Triangulation edges.
    pub lines: usize,
    /// Triangles, void triangles included.
    pub triangles: usize,
    /// Input points merged into an earlier one.
    pub duplicates: usize,
    /// Whether the triangulation degenerated to a single edge.
    pub colinear: bool,
    /// Whether the triangulation ran partitioned.
    pub parallel: bool,
    /// Edge option actually applied.
    pub edge_option: EdgeOption,
    /// Edges removed by the edge option.
    pub removed_edges: usize,
    /// Points dropped by compaction.
    pub removed_points: usize,
    /// Feature rows threaded through the triangulation.
    pub inserted: usize,
    /// Feature rows left in `TinError`.
    pub failed: usize,
    /// Rows appended by knot splitting and clipping.
    pub split: usize,
    /// Every feature failure, in processing order.
    pub failures: Vec<FeatureFailure>,
}

/// A finished build.
#[derive(Clone, Debug)]
pub struct TinBuild {
    /// The triangulation.
    pub tin: Tin,
    /// Snapshots of clipped features, when rollback was requested.
    pub rollback: Option<RollbackStore>,
    /// Statistics.
    pub report: BuildReport,
    /// For every input point, its index in `tin`; `None` if it was removed.
    pub point_map: Vec<Option<usize>>,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Fluent builder running the full pipeline.
#[derive(Clone, Debug)]
pub struct TinBuilder {
    points: Vec<Point3>,
    features: Vec<FeatureSpec>,
    options: TinOptions,
    token: CancellationToken,
}

struct Loaded {
    tin: Tin,
    point_map: Vec<usize>,
    duplicates: usize,
}

impl TinBuilder {
    /// Starts a build over `points` with default options.
    #[must_use]
    pub fn new(points: Vec<Point3>) -> Self {
        Self {
            points,
            features: Vec::new(),
            options: TinOptions::default(),
            token: CancellationToken::new(),
        }
    }

    /// Adds one feature.
    #[must_use]
    pub fn feature(mut self, spec: FeatureSpec) -> Self {
        self.features.push(spec);
        self
    }

    /// Adds several features.
    #[must_use]
    pub fn features<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = FeatureSpec>,
    {
        self.features.extend(specs);
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn options(mut self, options: TinOptions) -> Self {
        self.options = options;
        self
    }

    /// Polls `token` at every phase checkpoint.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Runs the pipeline.
    ///
    /// Feature-local failures do not abort the build: the row is left in
    /// `TinError` and listed in [`BuildReport::failures`].
    ///
    /// # Errors
    ///
    /// Returns [`TinBuildError`] for invalid options or input, fewer than two
    /// distinct points, all-colinear input, cancellation, or a topological
    /// inconsistency.
    pub fn build(self) -> Result<TinBuild, TinBuildError> {
        self.options.validate()?;
        let token = self.token.clone();
        let options = self.options.clone();
        tracing::debug!(points = self.points.len(), features = self.features.len(), "tin build started");

        let Loaded {
            mut tin,
            point_map,
            duplicates,
        } = self.load(&token)?;
        let mut rollback = options.rollback.then(|| RollbackStore::new(options.to_tolerances()));
        let mut report = BuildReport {
            duplicates,
            ..BuildReport::default()
        };

        let n = tin.num_points();
        report.parallel = options.processors != 1 && n >= options.parallel_threshold;
        if report.parallel {
            triangulate_parallel(&mut tin, options.processors, &token)?;
        } else {
            triangulate(&mut tin, &token)?;
        }
        report.colinear = n == 2;

        let has_boundary = tin
            .features
            .iter()
            .any(|(_, f)| f.kind == FeatureKind::Hull && is_pending(f));
        if options.precision_sliver_removal && !has_boundary {
            let removed = remove_precision_slivers(&mut tin)
                .map_err(|e| TinBuildError::topology(BuildPhase::Triangulation, &e))?;
            tracing::debug!(removed, "precision slivers removed");
        }

        let mut insertion = FeatureInsertReport::default();
        let mut inserter = FeatureInserter::new(&mut tin, rollback.as_mut());
        for kind in LINE_PASSES {
            inserter.insert_kind(kind, &token)?;
        }
        insertion.absorb(inserter.finish());
        relegalize_all(&mut tin).map_err(|e| insertion_failure(&e))?;

        let mut inserter = FeatureInserter::new(&mut tin, rollback.as_mut());
        for kind in POLYGON_PASSES {
            inserter.insert_kind(kind, &token)?;
        }
        insertion.absorb(inserter.finish());

        report.edge_option = resolve_edge_option(&tin, options.edge_option);
        let edges = apply_edge_option(
            &mut tin,
            report.edge_option,
            options.edge_parameters(),
            rollback.as_mut(),
            &token,
        )?;
        report.removed_edges = edges.removed_edges;
        report.split += edges.split;
        insertion.absorb(edges.insertion);

        let mut inserter = FeatureInserter::new(&mut tin, rollback.as_mut());
        inserter.insert_kind(FeatureKind::DrapeVoid, &token)?;
        insertion.absorb(inserter.finish());

        let voids = process_voids(&mut tin, rollback.as_mut(), &token)?;
        report.split += voids.split;

        let compaction = compact(&mut tin, &token)?;
        report.removed_points = compaction.points_removed;
        let point_map = point_map
            .into_iter()
            .map(|p| compaction.point_remap.get(p).copied().flatten())
            .collect();

        report.points = tin.num_points();
        report.lines = tin.num_lines();
        report.triangles = tin.num_triangles();
        report.inserted = insertion.inserted;
        report.failed = insertion.failed;
        report.split += insertion.split;
        report.failures = insertion.failures;
        tracing::debug!(
            points = report.points,
            lines = report.lines,
            triangles = report.triangles,
            inserted = report.inserted,
            failed = report.failed,
            "tin build finished"
        );
        Ok(TinBuild {
            tin,
            rollback,
            report,
            point_map,
        })
    }

    /// Resolves the input into a point table and pending feature rows.
    fn load(self, token: &CancellationToken) -> Result<Loaded, TinBuildError> {
        token.check(BuildPhase::Load)?;
        if let Some(index) = self.points.iter().position(|p| !p.is_finite()) {
            return Err(TinBuildError::InvalidCoordinate { index });
        }
        let input_len = self.points.len();
        let appended: usize = self
            .features
            .iter()
            .filter(|spec| !keeps_coordinates(spec))
            .map(|spec| match &spec.input {
                FeatureInput::Coordinates(c) => c.len(),
                FeatureInput::Offsets(_) => 0,
            })
            .sum();
        let requested = input_len.saturating_add(appended);
        let mut points = Vec::new();
        points
            .try_reserve_exact(requested)
            .map_err(|_| TinBuildError::Allocation { requested })?;
        points.extend_from_slice(&self.points);

        let mut next_id = self
            .features
            .iter()
            .filter_map(|spec| spec.id)
            .map(|id| id.0.saturating_add(1))
            .max()
            .unwrap_or(0);
        let mut rows = Vec::with_capacity(self.features.len());
        for (index, spec) in self.features.into_iter().enumerate() {
            let keep = keeps_coordinates(&spec);
            let id = spec.id.unwrap_or_else(|| {
                next_id += 1;
                FeatureId(next_id - 1)
            });
            let (state, geometry) = match spec.input {
                FeatureInput::Offsets(offsets) => {
                    if let Some(&bad) = offsets.iter().find(|&&o| o >= input_len) {
                        return Err(TinBuildError::InvalidFeature {
                            index,
                            reason: format!("offset {bad} is out of range for {input_len} points"),
                        });
                    }
                    (FeatureState::OffsetsArray, FeatureGeometry::Offsets(offsets))
                }
                FeatureInput::Coordinates(coordinates) => {
                    if coordinates.iter().any(|p| !p.is_finite()) {
                        return Err(TinBuildError::InvalidFeature {
                            index,
                            reason: "non-finite coordinate".to_owned(),
                        });
                    }
                    if keep {
                        (FeatureState::PointsArray, FeatureGeometry::Points(coordinates))
                    } else {
                        let start = points.len();
                        points.extend(coordinates);
                        (
                            FeatureState::OffsetsArray,
                            FeatureGeometry::Offsets((start..points.len()).collect()),
                        )
                    }
                }
            };
            rows.push(Feature {
                kind: spec.kind,
                state,
                user_tag: spec.user_tag,
                id,
                drape: spec.drape,
                geometry,
                failure: None,
            });
        }

        let dedup = dedup_points(&points, self.options.pp_tol);
        let duplicates = dedup.merged();
        let mut tin = Tin::new(dedup.points, self.options.to_tolerances());
        for mut row in rows {
            if let FeatureGeometry::Offsets(offsets) = &mut row.geometry {
                for o in offsets.iter_mut() {
                    *o = dedup.remap[*o];
                }
                offsets.dedup();
            }
            tin.features.push(row);
        }
        let mut point_map = dedup.remap;
        point_map.truncate(input_len);
        tracing::debug!(
            points = tin.num_points(),
            duplicates,
            features = tin.features.len(),
            "input loaded"
        );
        token.check(BuildPhase::Load)?;
        Ok(Loaded {
            tin,
            point_map,
            duplicates,
        })
    }
}

/// Draped voids and draped boundaries are inserted after triangulation with
/// surface elevations, so their coordinates stay out of the point table.
fn keeps_coordinates(spec: &FeatureSpec) -> bool {
    matches!(spec.input, FeatureInput::Coordinates(_))
        && (spec.kind == FeatureKind::DrapeVoid || (spec.kind == FeatureKind::Hull && spec.drape))
}

fn is_pending(f: &Feature) -> bool {
    matches!(f.state, FeatureState::OffsetsArray | FeatureState::PointsArray)
}

fn insertion_failure(source: &CircularListError) -> TinBuildError {
    TinBuildError::topology(BuildPhase::FeatureInsertion, source)
}

/// Boundary features take precedence over the caller's option.
fn resolve_edge_option(tin: &Tin, requested: EdgeOption) -> EdgeOption {
    let mut hard_hull = false;
    let mut drape_hull = false;
    let mut hull_lines = false;
    for (_, f) in tin.features.iter().filter(|(_, f)| is_pending(f)) {
        match f.kind {
            FeatureKind::Hull if f.drape || matches!(f.geometry, FeatureGeometry::Points(_)) => drape_hull = true,
            FeatureKind::Hull => hard_hull = true,
            FeatureKind::HullLine => hull_lines = true,
            _ => {}
        }
    }
    if hard_hull {
        EdgeOption::BoundaryPolygon
    } else if drape_hull {
        EdgeOption::DrapeBoundary
    } else if hull_lines {
        EdgeOption::BoundaryLines
    } else {
        requested
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize, spacing: f64) -> Vec<Point3> {
        let mut points = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let jitter = ((i * 7 + j * 13) % 10) as f64 * 1e-3;
                points.push(Point3::new(
                    i as f64 * spacing + jitter,
                    j as f64 * spacing - jitter,
                    (i + j) as f64,
                ));
            }
        }
        points
    }

    #[test]
    fn options_builder_fills_defaults() {
        let options = TinOptionsBuilder::default().rollback(true).build().unwrap();
        assert_eq!(
            options,
            TinOptions {
                rollback: true,
                ..TinOptions::default()
            }
        );
        assert_relative_eq!(options.to_tolerances().incircle, 1e-3);
    }

    #[test]
    fn options_builder_rejects_bad_ranges() {
        let err = TinOptionsBuilder::default().max_side(f64::NAN).build().unwrap_err();
        assert!(err.to_string().contains("max_side"));
        let options = TinOptions {
            sliver_ratio: -0.5,
            ..TinOptions::default()
        };
        assert!(matches!(
            TinBuilder::new(grid(3, 10.0)).options(options).build(),
            Err(TinBuildError::Options { reason }) if reason.contains("sliver_ratio")
        ));
    }

    #[test]
    fn non_finite_input_is_fatal() {
        let mut points = grid(3, 10.0);
        points[4].z = f64::INFINITY;
        assert_eq!(
            TinBuilder::new(points).build().unwrap_err(),
            TinBuildError::InvalidCoordinate { index: 4 }
        );
    }

    #[test]
    fn out_of_range_offsets_are_fatal() {
        let err = TinBuilder::new(grid(3, 10.0))
            .feature(FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 4]))
            .feature(FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 9]))
            .build()
            .unwrap_err();
        assert!(matches!(err, TinBuildError::InvalidFeature { index: 1, .. }));
    }

    #[test]
    fn duplicates_share_one_point() {
        let points = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 0.0, 1.0),
            Point3::new(0.0, 10.0, 1.0),
            Point3::new(0.000_01, 0.0, 9.0),
        ];
        let build = TinBuilder::new(points).build().unwrap();
        assert_eq!(build.report.duplicates, 1);
        assert_eq!(build.tin.num_points(), 3);
        assert_eq!(build.point_map[3], build.point_map[0]);
        assert_eq!(build.report.triangles, 1);
    }

    #[test]
    fn two_points_make_one_edge() {
        let build = TinBuilder::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)])
            .build()
            .unwrap();
        assert!(build.report.colinear);
        assert_eq!(build.report.lines, 1);
        assert_eq!(build.report.triangles, 0);
    }

    #[test]
    fn colinear_and_tiny_inputs_are_fatal() {
        let colinear: Vec<Point3> = (0..3).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        assert_eq!(
            TinBuilder::new(colinear).build().unwrap_err(),
            TinBuildError::AllColinear { count: 3 }
        );
        assert_eq!(
            TinBuilder::new(vec![Point3::new(1.0, 1.0, 1.0)]).build().unwrap_err(),
            TinBuildError::InsufficientPoints { count: 1 }
        );
    }

    #[test]
    fn cancelled_token_stops_at_load() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            TinBuilder::new(grid(3, 10.0)).cancellation(token).build().unwrap_err(),
            TinBuildError::Cancelled {
                phase: BuildPhase::Load
            }
        );
    }

    #[test]
    fn coordinate_features_are_appended_and_ids_allocated() {
        let line = vec![Point3::new(1.0, 15.0, 3.0), Point3::new(39.0, 25.0, 7.0)];
        let build = TinBuilder::new(grid(5, 10.0))
            .feature(FeatureSpec::coordinates(FeatureKind::Breakline, line).with_user_tag(11))
            .feature(FeatureSpec::offsets(FeatureKind::ContourLine, vec![5, 9]).with_id(FeatureId(4)))
            .build()
            .unwrap();
        assert_eq!(build.report.failed, 0, "{:?}", build.report.failures);
        assert_eq!(build.report.inserted, 2);
        let breakline = build.tin.features_with_id(FeatureId(5));
        assert_eq!(breakline.len(), 1);
        let row = build.tin.feature(breakline[0]).unwrap();
        assert_eq!(row.user_tag, 11);
        assert_eq!(row.state, FeatureState::Tin);
        let coordinates = build.tin.feature_coordinates(breakline[0]);
        assert!(coordinates.first().unwrap().bitwise_eq(&Point3::new(1.0, 15.0, 3.0)));
        assert!(coordinates.last().unwrap().bitwise_eq(&Point3::new(39.0, 25.0, 7.0)));
        assert_eq!(build.tin.validate(), Ok(()));
        assert_eq!(build.tin.validate_delaunay(), Ok(()));
    }

    #[test]
    fn failing_feature_does_not_abort_the_build() {
        let build = TinBuilder::new(grid(4, 10.0))
            .feature(FeatureSpec::offsets(FeatureKind::Void, vec![0, 1, 5]))
            .feature(FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 15]))
            .build()
            .unwrap();
        assert_eq!(build.report.failed, 1);
        assert_eq!(build.report.failures[0].kind, FeatureKind::Void);
        assert_eq!(build.report.inserted, 1);
        let failed = build.tin.features_with_id(FeatureId(0));
        assert_eq!(build.tin.feature(failed[0]).map(|f| f.state), Some(FeatureState::TinError));
    }

    #[test]
    fn boundary_features_override_the_requested_option() {
        let mut tin = Tin::new(grid(3, 10.0), Tolerances::default());
        assert_eq!(resolve_edge_option(&tin, EdgeOption::Sliver), EdgeOption::Sliver);
        tin.features.push(Feature {
            kind: FeatureKind::HullLine,
            state: FeatureState::OffsetsArray,
            user_tag: 0,
            id: FeatureId(0),
            drape: false,
            geometry: FeatureGeometry::Offsets(vec![0, 2]),
            failure: None,
        });
        assert_eq!(resolve_edge_option(&tin, EdgeOption::Sliver), EdgeOption::BoundaryLines);
        tin.features.push(Feature {
            kind: FeatureKind::Hull,
            state: FeatureState::PointsArray,
            user_tag: 0,
            id: FeatureId(1),
            drape: true,
            geometry: FeatureGeometry::Points(vec![Point3::default(); 4]),
            failure: None,
        });
        assert_eq!(resolve_edge_option(&tin, EdgeOption::None), EdgeOption::DrapeBoundary);
        tin.features.push(Feature {
            kind: FeatureKind::Hull,
            state: FeatureState::OffsetsArray,
            user_tag: 0,
            id: FeatureId(2),
            drape: false,
            geometry: FeatureGeometry::Offsets(vec![0, 2, 8, 6, 0]),
            failure: None,
        });
        assert_eq!(resolve_edge_option(&tin, EdgeOption::None), EdgeOption::BoundaryPolygon);
    }

    #[test]
    fn options_round_trip_through_json() {
        let options = TinOptionsBuilder::default()
            .edge_option(EdgeOption::BoundaryLines)
            .max_side(12.5)
            .processors(3_usize)
            .build()
            .unwrap();
        let json = serde_json::to_string(&options).unwrap();
        let back: TinOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
        let partial: TinOptions = serde_json::from_str(r#"{"max_side": 4.0}"#).unwrap();
        assert_eq!(partial.sliver_ratio, 0.025);
        assert_eq!(partial.max_side, 4.0);
    }
}
