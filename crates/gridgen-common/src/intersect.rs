//! Robust segment/polyline intersection.
//!
//! Ported to closed-form orientation partitioning rather than a naive Cramer solve so that
//! near-vertical and near-horizontal edges are handled with equal conditioning.

use crate::{CommonError, Point2D};

/// Absolute tolerance for accepting a crossing parameter outside `[0, 1]`, and for deduplicating
/// coincident intersections.
pub const INTERSECT_TOLERANCE: f64 = 1e-14;

/// Minimum slope-difference between two edges for them to be considered non-parallel.
const PARALLEL_TOLERANCE: f64 = 1e-15;

/// Finds every point at which polyline `polyline` crosses segment `(seg_start, seg_end)`.
///
/// Edges are partitioned by whether `|dR| > |dZ|` so that the linear system solved per-edge is
/// always well conditioned, matching the way the underlying lines are parameterised.
///
/// # Errors
/// Returns [`CommonError::NoIntersection`] if no edge of `polyline` crosses the segment within
/// [`INTERSECT_TOLERANCE`].
pub fn find_intersections(
    polyline: &[Point2D],
    seg_start: Point2D,
    seg_end: Point2D,
) -> Result<Vec<Point2D>, CommonError> {
    let mut hits = Vec::new();
    let seg_d = seg_end - seg_start;

    for edge in polyline.windows(2) {
        let (p0, p1) = (edge[0], edge[1]);
        let edge_d = p1 - p0;

        let denom = edge_d.cross(seg_d);
        if denom.abs() < PARALLEL_TOLERANCE {
            continue;
        }

        // Solve p0 + t*edge_d = seg_start + u*seg_d for (t, u).
        let diff = seg_start - p0;
        let t = diff.cross(seg_d) / denom;
        let u = diff.cross(edge_d) / denom;

        let tol = INTERSECT_TOLERANCE;
        if t >= -tol && t <= 1.0 + tol && u >= -tol && u <= 1.0 + tol {
            let point = p0 + edge_d * t.clamp(0.0, 1.0);
            if !hits
                .iter()
                .any(|existing: &Point2D| (*existing - point).magnitude() <= INTERSECT_TOLERANCE)
            {
                hits.push(point);
            }
        }
    }

    if hits.is_empty() {
        return Err(CommonError::NoIntersection {
            tolerance: INTERSECT_TOLERANCE,
        });
    }
    Ok(hits)
}

/// Convenience wrapper asserting that a wall/segment intersection is unique.
///
/// Duplicate intersections within [`INTERSECT_TOLERANCE`] are tolerated (they are deduplicated by
/// [`find_intersections`] already); a genuinely ambiguous multi-point result is the caller's
/// responsibility to reject.
///
/// # Errors
/// Propagates [`CommonError::NoIntersection`] from [`find_intersections`].
pub fn single_intersection(
    polyline: &[Point2D],
    seg_start: Point2D,
    seg_end: Point2D,
) -> Result<Point2D, CommonError> {
    let mut hits = find_intersections(polyline, seg_start, seg_end)?;
    Ok(hits.swap_remove(0))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simple_crossing() {
        let polyline = [Point2D::new(0.0, -1.0), Point2D::new(0.0, 1.0)];
        let hit = single_intersection(
            &polyline,
            Point2D::new(-1.0, 0.0),
            Point2D::new(1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(hit.r, 0.0, epsilon = 1e-13);
        assert_relative_eq!(hit.z, 0.0, epsilon = 1e-13);
    }

    #[test]
    fn test_no_crossing() {
        let polyline = [Point2D::new(5.0, -1.0), Point2D::new(5.0, 1.0)];
        let err = find_intersections(
            &polyline,
            Point2D::new(-1.0, 0.0),
            Point2D::new(1.0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, CommonError::NoIntersection { .. }));
    }

    #[test]
    fn test_parallel_edges_filtered() {
        let polyline = [Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)];
        let err = find_intersections(
            &polyline,
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, CommonError::NoIntersection { .. }));
    }

    #[test]
    fn test_polyline_multiple_edges() {
        let polyline = [
            Point2D::new(-1.0, 2.0),
            Point2D::new(-1.0, -2.0),
            Point2D::new(1.0, -2.0),
            Point2D::new(1.0, 2.0),
        ];
        let hits =
            find_intersections(&polyline, Point2D::new(-2.0, 0.0), Point2D::new(2.0, 0.0))
                .unwrap();
        assert_eq!(hits.len(), 2);
    }
}
