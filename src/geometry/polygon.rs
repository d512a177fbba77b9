//! Plan-view polygon utilities.
//!
//! Rings are passed as open point slices: the closing vertex is implied and
//! must not be repeated.

#![forbid(unsafe_code)]

use crate::geometry::point::Point3;
use crate::geometry::predicates::{distance_to_segment, segment_intersection, signed_area2};

/// Where a point falls relative to a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonSide {
    /// Strictly inside
    Inside,
    /// Within tolerance of the boundary
    Boundary,
    /// Strictly outside
    Outside,
}

/// Signed area of the ring; positive for counter-clockwise rings.
///
/// # Examples
///
/// ```
/// use tin::geometry::point::Point3;
/// use tin::geometry::polygon::signed_area;
///
/// let square = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(2.0, 0.0, 0.0),
///     Point3::new(2.0, 2.0, 0.0),
///     Point3::new(0.0, 2.0, 0.0),
/// ];
/// assert_eq!(signed_area(&square), 4.0);
/// ```
#[must_use]
pub fn signed_area(ring: &[Point3]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let origin = ring[0];
    ring.windows(2)
        .skip(1)
        .map(|w| signed_area2(&origin, &w[0], &w[1]))
        .sum::<f64>()
        * 0.5
}

/// Returns `true` for a clockwise ring.
#[must_use]
pub fn is_clockwise(ring: &[Point3]) -> bool {
    signed_area(ring) < 0.0
}

/// Crossing-number containment test; boundary points may go either way.
#[must_use]
pub fn contains(ring: &[Point3], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&ring[i], &ring[j]);
        if (pi.y > y) != (pj.y > y) {
            let x_cross = (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Classifies `p` against the ring, reporting [`PolygonSide::Boundary`] for
/// points within `tolerance` of any ring edge.
#[must_use]
pub fn classify(ring: &[Point3], p: &Point3, tolerance: f64) -> PolygonSide {
    let n = ring.len();
    for i in 0..n {
        if distance_to_segment(&ring[i], &ring[(i + 1) % n], p) <= tolerance {
            return PolygonSide::Boundary;
        }
    }
    if contains(ring, p.x, p.y) {
        PolygonSide::Inside
    } else {
        PolygonSide::Outside
    }
}

/// Axis-aligned plan bounding box `(min_x, min_y, max_x, max_y)`.
#[must_use]
pub fn bounding_box(ring: &[Point3]) -> (f64, f64, f64, f64) {
    ring.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    )
}

#[derive(Clone, Copy)]
enum RingNode {
    Vertex(Point3),
    Crossing(usize),
}

struct Crossing {
    point: Point3,
    entering: bool,
}

/// Builds the node list of one ring with its crossings spliced in, ordered by
/// the parameter along each edge.
fn splice_crossings(
    ring: &[Point3],
    per_edge: &[Vec<(f64, usize)>],
) -> (Vec<RingNode>, Vec<(usize, usize)>) {
    let mut nodes = Vec::with_capacity(ring.len() + per_edge.iter().map(Vec::len).sum::<usize>());
    let mut positions = Vec::new();
    for (i, vertex) in ring.iter().enumerate() {
        nodes.push(RingNode::Vertex(*vertex));
        let mut crossings = per_edge[i].clone();
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, id) in crossings {
            positions.push((id, nodes.len()));
            nodes.push(RingNode::Crossing(id));
        }
    }
    (nodes, positions)
}

/// Intersection of two simple counter-clockwise rings.
///
/// Uses Weiler-Atherton traversal: start at a crossing where the subject enters
/// the clip ring, follow the subject until it leaves, then follow the clip ring
/// until the subject re-enters. Each closed traversal is one output ring.
/// Vertices lying exactly on the other ring's edges are not treated as
/// crossings.
#[must_use]
pub fn intersect_rings(subject: &[Point3], clip: &[Point3]) -> Vec<Vec<Point3>> {
    if subject.len() < 3 || clip.len() < 3 {
        return Vec::new();
    }

    let mut crossings: Vec<Crossing> = Vec::new();
    let mut subject_edges: Vec<Vec<(f64, usize)>> = vec![Vec::new(); subject.len()];
    let mut clip_edges: Vec<Vec<(f64, usize)>> = vec![Vec::new(); clip.len()];

    for i in 0..subject.len() {
        let s0 = subject[i];
        let s1 = subject[(i + 1) % subject.len()];
        for j in 0..clip.len() {
            let c0 = clip[j];
            let c1 = clip[(j + 1) % clip.len()];
            if let Some((t, u)) = segment_intersection(&s0, &s1, &c0, &c1) {
                let id = crossings.len();
                crossings.push(Crossing {
                    point: s0.lerp(&s1, t),
                    entering: signed_area2(&c0, &c1, &s1) > 0.0,
                });
                subject_edges[i].push((t, id));
                clip_edges[j].push((u, id));
            }
        }
    }

    if crossings.is_empty() {
        if contains(clip, subject[0].x, subject[0].y) {
            return vec![subject.to_vec()];
        }
        if contains(subject, clip[0].x, clip[0].y) {
            return vec![clip.to_vec()];
        }
        return Vec::new();
    }

    let (subject_nodes, subject_positions) = splice_crossings(subject, &subject_edges);
    let (clip_nodes, clip_positions) = splice_crossings(clip, &clip_edges);
    let mut subject_pos = vec![0; crossings.len()];
    let mut clip_pos = vec![0; crossings.len()];
    for (id, pos) in subject_positions {
        subject_pos[id] = pos;
    }
    for (id, pos) in clip_positions {
        clip_pos[id] = pos;
    }

    let step_limit = 2 * (subject_nodes.len() + clip_nodes.len());
    let mut visited = vec![false; crossings.len()];
    let mut rings = Vec::new();

    for start in 0..crossings.len() {
        if visited[start] || !crossings[start].entering {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = start;
        let mut steps = 0;
        'trace: loop {
            visited[current] = true;
            ring.push(crossings[current].point);

            let mut idx = subject_pos[current];
            let exit = loop {
                idx = (idx + 1) % subject_nodes.len();
                steps += 1;
                match subject_nodes[idx] {
                    RingNode::Vertex(p) => ring.push(p),
                    RingNode::Crossing(id) => break id,
                }
                if steps > step_limit {
                    break 'trace;
                }
            };
            if exit == start {
                break;
            }
            visited[exit] = true;
            ring.push(crossings[exit].point);

            let mut idx = clip_pos[exit];
            let next = loop {
                idx = (idx + 1) % clip_nodes.len();
                steps += 1;
                match clip_nodes[idx] {
                    RingNode::Vertex(p) => ring.push(p),
                    RingNode::Crossing(id) => break id,
                }
                if steps > step_limit {
                    break 'trace;
                }
            };
            if next == start || steps > step_limit {
                break;
            }
            current = next;
        }
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }
    rings
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point3> {
        vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x0 + size, y0, 0.0),
            Point3::new(x0 + size, y0 + size, 0.0),
            Point3::new(x0, y0 + size, 0.0),
        ]
    }

    #[test]
    fn area_and_direction() {
        let mut ring = square(0.0, 0.0, 3.0);
        assert_relative_eq!(signed_area(&ring), 9.0);
        assert!(!is_clockwise(&ring));
        ring.reverse();
        assert!(is_clockwise(&ring));
    }

    #[test]
    fn containment_and_classification() {
        let ring = square(0.0, 0.0, 2.0);
        assert!(contains(&ring, 1.0, 1.0));
        assert!(!contains(&ring, 3.0, 1.0));
        assert_eq!(classify(&ring, &Point3::new(1.0, 1.0, 0.0), 1e-9), PolygonSide::Inside);
        assert_eq!(classify(&ring, &Point3::new(2.0, 1.0, 0.0), 1e-9), PolygonSide::Boundary);
        assert_eq!(classify(&ring, &Point3::new(5.0, 1.0, 0.0), 1e-9), PolygonSide::Outside);
        assert_eq!(bounding_box(&ring), (0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn overlapping_squares_intersect_to_unit_square() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let rings = intersect_rings(&a, &b);
        assert_eq!(rings.len(), 1);
        assert_relative_eq!(signed_area(&rings[0]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn nested_and_disjoint_rings() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(2.0, 2.0, 1.0);
        assert_eq!(intersect_rings(&inner, &outer), vec![inner.clone()]);
        assert_eq!(intersect_rings(&outer, &inner), vec![inner.clone()]);
        assert!(intersect_rings(&square(20.0, 20.0, 1.0), &outer).is_empty());
    }
}
