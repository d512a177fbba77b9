//! Parallel triangulation coordinator.
//!
//! Points are sorted by `(x, y)` and cut into contiguous slices, one per
//! worker. Each worker copies its slice, triangulates it into a private
//! circular list indexed locally, and hands the list back. The coordinator
//! absorbs every local list into the global one through the slice's
//! local-to-global table and then merges the slices left to right.
//!
//! Slices are separated in `(x, y)` order, so every merge is an X merge and the
//! result is the same Delaunay triangulation the sequential path produces for
//! points in general position.

#![forbid(unsafe_code)]

use rayon::prelude::*;

use crate::core::algorithms::divide_and_conquer::{
    SubTriangulation, TriangulationError, cmp_x, install_hull, merge_x, triangulate,
    triangulate_subset,
};
use crate::core::cancellation::{BuildPhase, CancellationToken};
use crate::core::circular_list::CircularList;
use crate::core::tin::Tin;
use crate::geometry::point::Point3;

/// Smallest slice handed to a worker.
const MIN_POINTS_PER_WORKER: usize = 3;

/// Output of one worker.
struct LocalTriangulation {
    clist: CircularList,
    sub: SubTriangulation,
}

/// Number of slices for `n` points on `workers` threads.
fn slice_count(n: usize, workers: usize) -> usize {
    workers.min(n / MIN_POINTS_PER_WORKER).max(1)
}

/// Triangulates `tin` on up to `workers` threads; `0` means the rayon default.
///
/// Falls back to the sequential path for a single slice.
///
/// # Errors
///
/// Same failures as the sequential triangulation.
pub(crate) fn triangulate_parallel(
    tin: &mut Tin,
    workers: usize,
    token: &CancellationToken,
) -> Result<(), TriangulationError> {
    let workers = if workers == 0 {
        rayon::current_num_threads()
    } else {
        workers
    };
    let n = tin.points.len();
    let slices = slice_count(n, workers);
    if slices < 2 {
        return triangulate(tin, token);
    }
    token.check(BuildPhase::Triangulation)?;

    let mut order: Vec<usize> = (0..n).collect();
    {
        let points = &tin.points;
        order.par_sort_unstable_by(|&a, &b| cmp_x(&points[a], &points[b]));
    }
    let bounds: Vec<(usize, usize)> = (0..slices)
        .map(|i| (i * n / slices, (i + 1) * n / slices))
        .collect();

    let run = |points: &[Point3]| -> Result<Vec<LocalTriangulation>, TriangulationError> {
        bounds
            .par_iter()
            .map(|&(lo, hi)| {
                let local_points: Vec<Point3> = order[lo..hi].iter().map(|&g| points[g]).collect();
                let mut clist = CircularList::with_points(local_points.len());
                let mut ids: Vec<usize> = (0..local_points.len()).collect();
                let sub = triangulate_subset(&local_points, &mut clist, &mut ids, token)?;
                Ok(LocalTriangulation { clist, sub })
            })
            .collect()
    };
    let locals = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| run(&tin.points))?,
        Err(error) => {
            tracing::warn!(%error, "thread pool unavailable; using the global pool");
            run(&tin.points)?
        }
    };
    tracing::debug!(slices, points = n, "worker triangulations finished");

    let mut merged: Option<SubTriangulation> = None;
    for (&(lo, hi), local) in bounds.iter().zip(&locals) {
        token.check(BuildPhase::Triangulation)?;
        let local_to_global = &order[lo..hi];
        tin.clist.absorb(&local.clist, local_to_global)?;
        let sub = local.sub.remapped(local_to_global);
        merged = Some(match merged {
            None => sub,
            Some(left) => merge_x(&tin.points, &mut tin.clist, left, sub, token)?,
        });
    }
    let Some(sub) = merged else {
        return Err(TriangulationError::InsufficientPoints { count: n });
    };
    install_hull(tin, sub)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tin::Tolerances;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_tin(n: usize, seed: u64) -> Tin {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = (0..n)
            .map(|_| Point3::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0), 0.0))
            .collect();
        Tin::new(points, Tolerances::default())
    }

    fn sorted_triangles(tin: &Tin) -> Vec<[usize; 3]> {
        let mut triangles: Vec<[usize; 3]> = tin
            .triangles()
            .into_iter()
            .map(|mut t| {
                t.sort_unstable();
                t
            })
            .collect();
        triangles.sort_unstable();
        triangles
    }

    #[test]
    fn slice_count_respects_minimum_size() {
        assert_eq!(slice_count(5, 8), 1);
        assert_eq!(slice_count(9, 8), 3);
        assert_eq!(slice_count(1000, 4), 4);
    }

    #[test]
    fn parallel_matches_sequential() {
        let token = CancellationToken::new();
        for workers in [2, 3, 5] {
            let mut sequential = random_tin(500, 11);
            let mut parallel = sequential.clone();
            triangulate(&mut sequential, &token).unwrap();
            triangulate_parallel(&mut parallel, workers, &token).unwrap();
            assert_eq!(sorted_triangles(&parallel), sorted_triangles(&sequential));
            let mut hs = sequential.hull_points();
            let mut hp = parallel.hull_points();
            hs.sort_unstable();
            hp.sort_unstable();
            assert_eq!(hs, hp);
        }
    }

    #[test]
    fn cancellation_before_workers() {
        let mut tin = random_tin(100, 3);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            triangulate_parallel(&mut tin, 4, &token),
            Err(TriangulationError::Cancelled(_))
        ));
    }

    #[test]
    fn parallel_handles_rotated_grids() {
        let token = CancellationToken::new();
        for degrees in [1.0_f64, 30.0, 45.0, 89.0] {
            let (sin, cos) = degrees.to_radians().sin_cos();
            let points: Vec<Point3> = (0..12_u32)
                .flat_map(|j| (0..12_u32).map(move |i| (f64::from(i), f64::from(j))))
                .map(|(i, j)| Point3::new(i.mul_add(cos, -(j * sin)), i.mul_add(sin, j * cos), 0.0))
                .collect();
            for workers in [2, 3, 4] {
                let mut tin = Tin::new(points.clone(), Tolerances::default());
                triangulate_parallel(&mut tin, workers, &token).unwrap();
                let h = tin.hull_points().len();
                assert_eq!(tin.num_triangles(), 2 * 144 - 2 - h, "{degrees} degrees, {workers} workers");
                assert_eq!(tin.validate(), Ok(()), "{degrees} degrees, {workers} workers");
            }
        }
    }
}
