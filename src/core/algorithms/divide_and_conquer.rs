//! Divide-and-conquer Delaunay triangulation over the circular-list edge store.
//!
//! # Algorithm
//!
//! The point set is split recursively into tiles, alternating the split axis
//! between levels: X levels sort by `(x, y)`, Y levels by `(y, -x)`. Tiles of
//! two or three points are triangulated directly; larger tiles are split at the
//! median, both halves are triangulated, and the halves are stitched together by
//! the Guibas–Stolfi merge:
//!
//! 1. Walk the lower common tangent of the two hulls
//! 2. Connect its endpoints with the base edge
//! 3. Repeatedly pick the left or right candidate that keeps the new triangle's
//!    circumcircle empty, deleting candidate edges that fail the in-circle test
//! 4. Stop when neither candidate lies strictly right of the base edge
//!
//! Every decision uses the exact orientation and in-circle signs. Candidates
//! are deleted or chosen only when a point lies strictly inside a circumcircle,
//! so cocircular grids keep whichever diagonal the merge reached first.
//!
//! Y levels merge in a frame rotated by 90°: the upper half plays the left
//! tile, its lowest point is the merge-rightmost one, and the lower half's
//! highest point is the merge-leftmost one. Orientation and in-circle tests
//! are rotation invariant, so the merge itself never transforms coordinates.
//!
//! Every sub-triangulation reports its four extreme points and whether it is
//! colinear; hull edges at the merge seam are recovered from the extreme
//! point's ring instead of being threaded through the recursion.
//!
//! # References
//!
//! - L. Guibas and J. Stolfi, "Primitives for the Manipulation of General
//!   Subdivisions and the Computation of Voronoi Diagrams", ACM Transactions
//!   on Graphics, 1985.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use crate::core::cancellation::{BuildPhase, CancellationToken, Cancelled};
use crate::core::circular_list::{CircularList, CircularListError};
use crate::core::tin::Tin;
use crate::geometry::point::Point3;
use crate::geometry::predicates::{Orientation, incircle_determinant, orientation};
use thiserror::Error;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failures of the triangulation phase.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TriangulationError {
    /// Fewer than two distinct points.
    #[error("at least two distinct points are required, got {count}")]
    InsufficientPoints {
        /// Number of distinct points.
        count: usize,
    },
    /// Three or more points, all on one line.
    #[error("all {count} points are colinear")]
    AllColinear {
        /// Number of points.
        count: usize,
    },
    /// No hull edge could be recovered at an extreme point.
    #[error("no hull edge found at point {point}")]
    MissingHullEdge {
        /// The extreme point.
        point: usize,
    },
    /// The merge exceeded its step bound.
    #[error("merge did not terminate after {steps} steps")]
    MergeStalled {
        /// Steps taken.
        steps: usize,
    },
    /// Edge-store inconsistency.
    #[error(transparent)]
    CircularList(#[from] CircularListError),
    /// Cancellation observed between merges.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

// =============================================================================
// SUB-TRIANGULATIONS
// =============================================================================

/// Split axis of one recursion level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
}

impl Axis {
    const fn at_level(level: usize) -> Self {
        if level % 2 == 0 { Self::X } else { Self::Y }
    }
}

/// Extreme points of a sub-triangulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Extremes {
    /// Minimum by `(x, y)`.
    pub left: usize,
    /// Maximum by `(x, y)`.
    pub right: usize,
    /// Minimum by `(y, -x)`.
    pub bottom: usize,
    /// Maximum by `(y, -x)`.
    pub top: usize,
}

/// Result of triangulating one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SubTriangulation {
    pub extremes: Extremes,
    pub colinear: bool,
}

impl SubTriangulation {
    /// Renumbers through a local-to-global table.
    pub(crate) fn remapped(self, local_to_global: &[usize]) -> Self {
        let e = self.extremes;
        Self {
            extremes: Extremes {
                left: local_to_global[e.left],
                right: local_to_global[e.right],
                bottom: local_to_global[e.bottom],
                top: local_to_global[e.top],
            },
            colinear: self.colinear,
        }
    }
}

pub(crate) fn cmp_x(a: &Point3, b: &Point3) -> Ordering {
    a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y))
}

pub(crate) fn cmp_y(a: &Point3, b: &Point3) -> Ordering {
    a.y.total_cmp(&b.y).then_with(|| b.x.total_cmp(&a.x))
}

/// Directed edge `(org, dest)`.
type DirectedEdge = (usize, usize);

/// Tiles at least this large poll the cancellation token after merging.
const CANCEL_CHECK_SIZE: usize = 1 << 14;

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Triangulates every point of `tin` and sets up its hull ring.
///
/// The points must be pairwise distinct.
///
/// # Errors
///
/// Fails on fewer than two points, on three or more colinear points, or when
/// `token` is cancelled.
pub(crate) fn triangulate(tin: &mut Tin, token: &CancellationToken) -> Result<(), TriangulationError> {
    let n = tin.points.len();
    if n < 2 {
        return Err(TriangulationError::InsufficientPoints { count: n });
    }
    token.check(BuildPhase::Triangulation)?;
    let mut ids: Vec<usize> = (0..n).collect();
    let sub = Context::new(&tin.points, &mut tin.clist, token).build(&mut ids, 0)?;
    install_hull(tin, sub)
}

/// Triangulates the points listed in `ids` into `clist`, which is indexed like
/// `points`.
pub(crate) fn triangulate_subset(
    points: &[Point3],
    clist: &mut CircularList,
    ids: &mut [usize],
    token: &CancellationToken,
) -> Result<SubTriangulation, TriangulationError> {
    Context::new(points, clist, token).build(ids, 0)
}

/// Merges two X-separated sub-triangulations already present in `clist`.
pub(crate) fn merge_x(
    points: &[Point3],
    clist: &mut CircularList,
    left: SubTriangulation,
    right: SubTriangulation,
    token: &CancellationToken,
) -> Result<SubTriangulation, TriangulationError> {
    Context::new(points, clist, token).merge(left, right, Axis::X)
}

/// Records the hull ring of a finished triangulation.
///
/// # Errors
///
/// Fails with [`TriangulationError::AllColinear`] for three or more colinear
/// points, or when the hull walk cannot close.
pub(crate) fn install_hull(tin: &mut Tin, sub: SubTriangulation) -> Result<(), TriangulationError> {
    let n = tin.points.len();
    if sub.colinear {
        if n > 2 {
            return Err(TriangulationError::AllColinear { count: n });
        }
        tin.hull.set_cycle(&[sub.extremes.left, sub.extremes.right]);
        tin.hull.set_convex(true);
        return Ok(());
    }
    let start = sub.extremes.left;
    let (_, mut next) = hull_neighbors(&tin.points, &tin.clist, start)
        .ok_or(TriangulationError::MissingHullEdge { point: start })?;
    let mut cycle = vec![start];
    let mut prev = start;
    while next != start {
        if cycle.len() > n {
            return Err(TriangulationError::MissingHullEdge { point: next });
        }
        cycle.push(next);
        let after = tin
            .clist
            .next_ccw(next, prev)
            .ok_or(TriangulationError::MissingHullEdge { point: next })?;
        prev = next;
        next = after;
    }
    tin.hull.set_cycle(&cycle);
    tin.hull.set_convex(true);
    tracing::debug!(hull = cycle.len(), "hull ring installed");
    Ok(())
}

/// Hull neighbours `(prev, next)` of the hull point `v`: the pair of
/// consecutive ring neighbours spanning the exterior.
fn hull_neighbors(points: &[Point3], clist: &CircularList, v: usize) -> Option<(usize, usize)> {
    let ring = clist.neighbors(v);
    match ring.len() {
        0 => None,
        1 => Some((ring[0], ring[0])),
        len => (0..len).find_map(|i| {
            let m = ring[i];
            let n = ring[(i + 1) % len];
            (orientation(&points[v], &points[m], &points[n]) != Orientation::POSITIVE).then_some((m, n))
        }),
    }
}

// =============================================================================
// RECURSION AND MERGE
// =============================================================================

struct Context<'a> {
    points: &'a [Point3],
    clist: &'a mut CircularList,
    token: &'a CancellationToken,
}

impl<'a> Context<'a> {
    fn new(points: &'a [Point3], clist: &'a mut CircularList, token: &'a CancellationToken) -> Self {
        Self { points, clist, token }
    }

    fn build(&mut self, ids: &mut [usize], level: usize) -> Result<SubTriangulation, TriangulationError> {
        let axis = Axis::at_level(level);
        let points = self.points;
        match axis {
            Axis::X => ids.sort_unstable_by(|&a, &b| cmp_x(&points[a], &points[b])),
            Axis::Y => ids.sort_unstable_by(|&a, &b| cmp_y(&points[a], &points[b])),
        }
        match *ids {
            [] | [_] => Err(TriangulationError::InsufficientPoints { count: ids.len() }),
            [a, b] => self.base_edge(a, b),
            [a, b, c] => self.base_triangle(a, b, c),
            _ => {
                let n = ids.len();
                let (low, high) = ids.split_at_mut(n / 2);
                let first = self.build(low, level + 1)?;
                let second = self.build(high, level + 1)?;
                let merged = match axis {
                    Axis::X => self.merge(first, second, Axis::X),
                    Axis::Y => self.merge(second, first, Axis::Y),
                }?;
                if n >= CANCEL_CHECK_SIZE {
                    self.token.check(BuildPhase::Triangulation)?;
                }
                Ok(merged)
            }
        }
    }

    fn extremes_of(&self, ids: &[usize]) -> Extremes {
        let p = self.points;
        let pick = |cmp: fn(&Point3, &Point3) -> Ordering, want: Ordering| {
            ids.iter()
                .copied()
                .reduce(|best, i| if cmp(&p[i], &p[best]) == want { i } else { best })
                .unwrap_or_default()
        };
        Extremes {
            left: pick(cmp_x, Ordering::Less),
            right: pick(cmp_x, Ordering::Greater),
            bottom: pick(cmp_y, Ordering::Less),
            top: pick(cmp_y, Ordering::Greater),
        }
    }

    fn base_edge(&mut self, a: usize, b: usize) -> Result<SubTriangulation, TriangulationError> {
        self.clist.insert_first(a, b)?;
        self.clist.insert_first(b, a)?;
        Ok(SubTriangulation {
            extremes: self.extremes_of(&[a, b]),
            colinear: true,
        })
    }

    fn base_triangle(&mut self, a: usize, b: usize, c: usize) -> Result<SubTriangulation, TriangulationError> {
        let p = self.points;
        let turn = orientation(&p[a], &p[b], &p[c]);
        if turn == Orientation::DEGENERATE {
            // Sorted along the line, so b sits between a and c.
            self.clist.insert_first(a, b)?;
            self.clist.insert_first(b, a)?;
            self.clist.insert_after(b, c, a)?;
            self.clist.insert_first(c, b)?;
        } else {
            for (v, q, r) in [(a, b, c), (b, c, a), (c, a, b)] {
                self.clist.insert_first(v, q)?;
                self.clist.insert_after(v, r, q)?;
            }
        }
        Ok(SubTriangulation {
            extremes: self.extremes_of(&[a, b, c]),
            colinear: turn == Orientation::DEGENERATE,
        })
    }

    fn turn(&self, a: usize, b: usize, c: usize) -> Orientation {
        orientation(&self.points[a], &self.points[b], &self.points[c])
    }

    fn left_of(&self, x: usize, e: DirectedEdge) -> bool {
        self.turn(e.0, e.1, x) == Orientation::POSITIVE
    }

    fn right_of(&self, x: usize, e: DirectedEdge) -> bool {
        self.turn(e.0, e.1, x) == Orientation::NEGATIVE
    }

    fn next_ccw(&self, p: usize, q: usize) -> Result<usize, CircularListError> {
        self.clist
            .next_ccw(p, q)
            .ok_or(CircularListError::MissingEdge { from: p, to: q })
    }

    fn next_cw(&self, p: usize, q: usize) -> Result<usize, CircularListError> {
        self.clist
            .next_cw(p, q)
            .ok_or(CircularListError::MissingEdge { from: p, to: q })
    }

    fn lnext(&self, e: DirectedEdge) -> Result<DirectedEdge, CircularListError> {
        Ok((e.1, self.next_cw(e.1, e.0)?))
    }

    fn rprev(&self, e: DirectedEdge) -> Result<DirectedEdge, CircularListError> {
        Ok((e.1, self.next_ccw(e.1, e.0)?))
    }

    /// Returns `true` if `d` lies strictly inside the circumcircle of the
    /// counter-clockwise triangle `a, b, c`.
    fn inside(&self, a: usize, b: usize, c: usize, d: usize) -> bool {
        let p = self.points;
        incircle_determinant(&p[a], &p[b], &p[c], &p[d]) > 0.0
    }

    /// Stitches `left` and `right`, which are separated in the merge frame of
    /// `axis`.
    fn merge(
        &mut self,
        left: SubTriangulation,
        right: SubTriangulation,
        axis: Axis,
    ) -> Result<SubTriangulation, TriangulationError> {
        let (l_end, r_start) = match axis {
            Axis::X => (left.extremes.right, right.extremes.left),
            Axis::Y => (left.extremes.bottom, right.extremes.top),
        };
        let (l_prev, _) = hull_neighbors(self.points, &*self.clist, l_end)
            .ok_or(TriangulationError::MissingHullEdge { point: l_end })?;
        let (_, r_next) = hull_neighbors(self.points, &*self.clist, r_start)
            .ok_or(TriangulationError::MissingHullEdge { point: r_start })?;
        let mut ldi: DirectedEdge = (l_end, l_prev);
        let mut rdi: DirectedEdge = (r_start, r_next);

        let limit = 4 * self.clist.num_points() + 16;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > limit {
                return Err(TriangulationError::MergeStalled { steps });
            }
            if self.left_of(rdi.0, ldi) {
                ldi = self.lnext(ldi)?;
            } else if self.right_of(ldi.0, rdi) {
                rdi = self.rprev(rdi)?;
            } else {
                break;
            }
        }

        // Base edge u → v, u in the right tile and v in the left tile.
        let (mut u, mut v) = (rdi.0, ldi.0);
        self.clist.insert_before(u, v, rdi.1)?;
        self.clist.insert_after(v, u, ldi.1)?;

        let limit = 8 * self.clist.num_points() + 16;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > limit {
                return Err(TriangulationError::MergeStalled { steps });
            }
            let valid = |ctx: &Self, x: usize| ctx.turn(u, v, x) == Orientation::NEGATIVE;

            let mut l = self.next_ccw(v, u)?;
            if valid(self, l) {
                loop {
                    let l2 = self.next_ccw(v, l)?;
                    if l2 == u || !self.inside(v, u, l, l2) {
                        break;
                    }
                    self.clist.delete_edge(v, l)?;
                    l = l2;
                }
            }

            let mut r = self.next_cw(u, v)?;
            if valid(self, r) {
                loop {
                    let r2 = self.next_cw(u, r)?;
                    if r2 == v || !self.inside(r, v, u, r2) {
                        break;
                    }
                    self.clist.delete_edge(u, r)?;
                    r = r2;
                }
            }

            let l_valid = valid(self, l);
            let r_valid = valid(self, r);
            if !l_valid && !r_valid {
                break;
            }
            if !l_valid || (r_valid && self.inside(l, v, u, r)) {
                self.clist.insert_before(r, v, u)?;
                self.clist.insert_after(v, r, u)?;
                u = r;
            } else {
                self.clist.insert_before(u, l, v)?;
                self.clist.insert_after(l, u, v)?;
                v = l;
            }
        }

        Ok(SubTriangulation {
            extremes: self.combine(&left.extremes, &right.extremes),
            colinear: left.colinear
                && right.colinear
                && self.turn(left.extremes.left, left.extremes.right, right.extremes.left) == Orientation::DEGENERATE
                && self.turn(left.extremes.left, left.extremes.right, right.extremes.right)
                    == Orientation::DEGENERATE,
        })
    }

    fn combine(&self, a: &Extremes, b: &Extremes) -> Extremes {
        let p = self.points;
        let min = |cmp: fn(&Point3, &Point3) -> Ordering, i: usize, j: usize| {
            if cmp(&p[j], &p[i]) == Ordering::Less { j } else { i }
        };
        let max = |cmp: fn(&Point3, &Point3) -> Ordering, i: usize, j: usize| {
            if cmp(&p[j], &p[i]) == Ordering::Greater { j } else { i }
        };
        Extremes {
            left: min(cmp_x, a.left, b.left),
            right: max(cmp_x, a.right, b.right),
            bottom: min(cmp_y, a.bottom, b.bottom),
            top: max(cmp_y, a.top, b.top),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
