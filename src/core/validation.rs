//! Structural and Delaunay validation of a triangulation.
//!
//! [`Tin::validate`] checks the invariants every algorithm relies on:
//!
//! - every neighbour index is in range and every edge is stored in both rings,
//! - the hull is one closed cycle whose steps are edges, and a hull still
//!   flagged convex never turns clockwise,
//! - every edge side off the hull closes a counter-clockwise triangle, the
//!   triangle count obeys Euler's relation and the triangle areas sum to the
//!   hull area, so no two triangles overlap,
//! - every `Tin` feature chain is a walk of edges (group spots excepted), and
//!   polygon chains are closed.
//!
//! [`Tin::validate_delaunay`] checks the constrained Delaunay property: no
//! unconstrained interior edge would be swapped by the legalisation test.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::core::collections::fast_hash_set_with_capacity;
use crate::core::tin::Tin;
use crate::geometry::predicates::{Orientation, orientation, should_swap_diagonal, signed_area2};

/// Relative gap allowed between the summed triangle area and the hull area.
const AREA_TOLERANCE: f64 = 1e-9;

/// First invariant violation found.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A ring names a point outside the point table.
    #[error("point {point} has out-of-range neighbour {neighbor}")]
    NeighborOutOfRange {
        /// Ring owner.
        point: usize,
        /// Offending neighbour.
        neighbor: usize,
    },
    /// `from → to` is stored but `to → from` is not.
    #[error("edge {from}-{to} is not symmetric")]
    AsymmetricEdge {
        /// Ring owner.
        from: usize,
        /// Neighbour.
        to: usize,
    },
    /// The hull does not close into one cycle.
    #[error("hull ring is broken at point {point}")]
    BrokenHull {
        /// Last point reached.
        point: usize,
    },
    /// A hull step is not an edge.
    #[error("hull step {from}-{to} is not an edge")]
    MissingHullEdge {
        /// Hull point.
        from: usize,
        /// Its successor.
        to: usize,
    },
    /// A feature chain step is not an edge.
    #[error("feature {feature} steps along missing edge {from}-{to}")]
    BrokenFeatureChain {
        /// Row index.
        feature: usize,
        /// Chain point.
        from: usize,
        /// Its successor.
        to: usize,
    },
    /// A polygon chain does not return to its first point.
    #[error("polygon feature {feature} is not closed")]
    OpenPolygon {
        /// Row index.
        feature: usize,
    },
    /// A convex hull ring turns clockwise.
    #[error("convex hull turns clockwise at point {point}")]
    ReflexHull {
        /// Hull point.
        point: usize,
    },
    /// The face left of `from → to` is not a triangle.
    #[error("edge {from}-{to} does not close a triangle on its left")]
    OpenFace {
        /// Edge origin.
        from: usize,
        /// Edge destination.
        to: usize,
    },
    /// A face is clockwise or flat.
    #[error("triangle {a}-{b}-{c} is not counter-clockwise")]
    MisorientedTriangle {
        /// First corner.
        a: usize,
        /// Second corner.
        b: usize,
        /// Third corner.
        c: usize,
    },
    /// The triangle count breaks Euler's relation `2n - 2 - h`.
    #[error("expected {expected} triangles, found {found}")]
    TriangleCount {
        /// Count implied by the points and hull.
        expected: usize,
        /// Faces found.
        found: usize,
    },
    /// Triangle areas do not add up to the hull area.
    #[error("triangles do not tile the hull")]
    AreaMismatch,
    /// An unconstrained interior edge fails the Delaunay test.
    #[error("edge {a}-{b} is not locally Delaunay")]
    NotDelaunay {
        /// Edge endpoint.
        a: usize,
        /// Edge endpoint.
        b: usize,
    },
}

impl Tin {
    /// Checks the structural invariants of the triangulation.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let n = self.points.len();
        for p in 0..n {
            for q in self.neighbors(p) {
                if q >= n {
                    return Err(ValidationError::NeighborOutOfRange { point: p, neighbor: q });
                }
                if !self.clist.has_edge(q, p) {
                    return Err(ValidationError::AsymmetricEdge { from: p, to: q });
                }
            }
        }

        let cycle = self.hull.cycle();
        if let (Some(&first), Some(&last)) = (cycle.first(), cycle.last()) {
            if self.hull.next(last) != Some(first) {
                return Err(ValidationError::BrokenHull { point: last });
            }
            if cycle.len() > 1 {
                for (a, b) in self.hull.edges() {
                    if !self.clist.has_edge(a, b) {
                        return Err(ValidationError::MissingHullEdge { from: a, to: b });
                    }
                }
            }
        }
        if cycle.len() >= 3 {
            self.validate_faces(&cycle)?;
        }

        for (f, row) in self.features.iter() {
            if !row.is_tin() {
                continue;
            }
            let chain = self.feature_points(f);
            if row.kind.constrains_edges() {
                if let Some(step) = chain.windows(2).find(|s| !self.clist.has_edge(s[0], s[1])) {
                    return Err(ValidationError::BrokenFeatureChain {
                        feature: f,
                        from: step[0],
                        to: step[1],
                    });
                }
            }
            if row.kind.is_polygonal() && (chain.len() < 4 || chain.first() != chain.last()) {
                return Err(ValidationError::OpenPolygon { feature: f });
            }
        }
        Ok(())
    }

    /// Checks hull turns, triangle faces, the Euler count and the area cover.
    fn validate_faces(&self, cycle: &[usize]) -> Result<(), ValidationError> {
        let h = cycle.len();
        let p = &self.points;
        if self.hull.is_convex() {
            for i in 0..h {
                let (a, b, c) = (cycle[i], cycle[(i + 1) % h], cycle[(i + 2) % h]);
                if orientation(&p[a], &p[b], &p[c]) == Orientation::NEGATIVE {
                    return Err(ValidationError::ReflexHull { point: b });
                }
            }
        }

        let mut outside = fast_hash_set_with_capacity(h);
        outside.extend(cycle.iter().zip(cycle.iter().cycle().skip(1)).map(|(&a, &b)| (b, a)));
        let mut vertices: usize = 0;
        let mut sides = 0;
        let mut area2 = 0.0;
        for a in 0..p.len() {
            let ring = self.clist.neighbors(a);
            if !ring.is_empty() {
                vertices += 1;
            }
            for &b in &ring {
                if outside.contains(&(a, b)) {
                    continue;
                }
                let c = self
                    .clist
                    .next_ccw(a, b)
                    .filter(|&c| c != b && self.clist.has_edge(b, c) && self.clist.next_ccw(b, c) == Some(a))
                    .ok_or(ValidationError::OpenFace { from: a, to: b })?;
                if orientation(&p[a], &p[b], &p[c]) != Orientation::POSITIVE {
                    return Err(ValidationError::MisorientedTriangle { a, b, c });
                }
                sides += 1;
                area2 += signed_area2(&p[a], &p[b], &p[c]);
            }
        }

        let found = sides / 3;
        let expected = (2 * vertices).saturating_sub(2 + h);
        if found != expected {
            return Err(ValidationError::TriangleCount { expected, found });
        }

        let covered = area2 / 3.0;
        let hull = cycle
            .windows(2)
            .skip(1)
            .map(|w| signed_area2(&p[cycle[0]], &p[w[0]], &p[w[1]]))
            .sum::<f64>();
        if hull <= 0.0 || (covered - hull).abs() > AREA_TOLERANCE * hull {
            tracing::debug!(covered = covered / 2.0, hull = hull / 2.0, "triangle areas miss the hull area");
            return Err(ValidationError::AreaMismatch);
        }
        Ok(())
    }

    /// Checks that no unconstrained interior edge would be swapped.
    ///
    /// # Errors
    ///
    /// Returns the first offending edge.
    pub fn validate_delaunay(&self) -> Result<(), ValidationError> {
        let tolerance = self.tolerances.incircle;
        for (a, b) in self.edges() {
            if self.is_constrained(a, b) {
                continue;
            }
            let (Some(l), Some(r)) = (self.left_apex(a, b), self.left_apex(b, a)) else {
                continue;
            };
            let (pa, pb, pl, pr) = (self.points[a], self.points[b], self.points[l], self.points[r]);
            if should_swap_diagonal(&pb, &pl, &pa, &pr, tolerance) {
                return Err(ValidationError::NotDelaunay { a, b });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algorithms::divide_and_conquer::triangulate;
    use crate::core::cancellation::CancellationToken;
    use crate::core::tin::Tolerances;
    use crate::geometry::point::Point3;

    fn quad(apex_y: f64) -> Tin {
        Tin::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
                Point3::new(4.0, 1.0, 0.0),
                Point3::new(0.0, apex_y, 0.0),
            ],
            Tolerances::default(),
        )
    }

    #[test]
    fn triangulated_quad_is_valid() {
        let mut tin = quad(1.2);
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        assert_eq!(tin.validate(), Ok(()));
        assert_eq!(tin.validate_delaunay(), Ok(()));
    }

    #[test]
    fn asymmetric_edge_is_reported() {
        let mut tin = quad(1.2);
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        let q = tin.neighbors(0)[0];
        assert!(tin.clist.remove(q, 0));
        assert!(matches!(
            tin.validate(),
            Err(ValidationError::AsymmetricEdge { .. })
        ));
    }

    #[test]
    fn wrong_diagonal_is_not_delaunay() {
        // Hand-built: the long diagonal 0-2 of a thin quad.
        let mut tin = Tin::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, -0.2, 0.0),
                Point3::new(4.0, 0.0, 0.0),
                Point3::new(2.0, 0.2, 0.0),
            ],
            Tolerances::default(),
        );
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)] {
            tin.clist.add_edge(a, b, &tin.points).unwrap();
        }
        tin.hull.set_cycle(&[0, 1, 2, 3]);
        assert_eq!(tin.validate(), Ok(()));
        let err = tin.validate_delaunay().unwrap_err();
        assert!(matches!(err, ValidationError::NotDelaunay { a, b } if a.min(b) == 0 && a.max(b) == 2));
    }

    fn hand_built(coords: &[(f64, f64)], edges: &[(usize, usize)], hull: &[usize]) -> Tin {
        let points = coords.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        let mut tin = Tin::new(points, Tolerances::default());
        for &(a, b) in edges {
            tin.clist.add_edge(a, b, &tin.points).unwrap();
        }
        tin.hull.set_cycle(hull);
        tin
    }

    #[test]
    fn crossing_diagonals_are_reported() {
        let tin = hand_built(
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3)],
            &[0, 1, 2, 3],
        );
        assert!(matches!(tin.validate(), Err(ValidationError::OpenFace { .. })));
    }

    #[test]
    fn clockwise_hull_ring_exposes_a_clockwise_face() {
        let tin = hand_built(
            &[(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)],
            &[(0, 1), (1, 2), (2, 0)],
            &[0, 2, 1],
        );
        assert_eq!(
            tin.validate(),
            Err(ValidationError::MisorientedTriangle { a: 0, b: 2, c: 1 })
        );
    }

    #[test]
    fn dented_hull_is_valid_unless_flagged_convex() {
        let mut tin = hand_built(
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 1.0), (0.0, 4.0)],
            &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (0, 3), (1, 3)],
            &[0, 1, 2, 3, 4],
        );
        assert_eq!(tin.validate(), Ok(()));
        assert_eq!(tin.num_triangles(), 3);
        tin.hull.set_convex(true);
        assert_eq!(tin.validate(), Err(ValidationError::ReflexHull { point: 3 }));
    }

    #[test]
    fn reversed_hull_ring_is_reported() {
        let mut tin = quad(1.2);
        triangulate(&mut tin, &CancellationToken::new()).unwrap();
        let mut cycle = tin.hull_points();
        cycle.reverse();
        tin.hull.set_cycle(&cycle);
        assert!(matches!(tin.validate(), Err(ValidationError::ReflexHull { .. })));
        tin.hull.set_convex(false);
        assert!(matches!(tin.validate(), Err(ValidationError::OpenFace { .. })));
    }
}
