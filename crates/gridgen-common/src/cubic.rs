//! Local cubic (Lagrange) extrapolation of a scalar function sampled at `>=4` nearby points.
//!
//! Used wherever a polyline end must be extended by a small arclength step without committing to
//! a full spline rebuild: `PsiContour::temporary_extend` and `FineContour`'s seed interpolant.

/// Evaluates the cubic polynomial interpolating `(xs, ys)` at `x`, via the four-point Lagrange
/// formula. `xs` and `ys` must have the same length and `xs.len() >= 2`; with fewer than four
/// points the interpolant degrades to whatever order `xs.len() - 1` points support (quadratic,
/// linear), which is exact for a straight or gently-curved local window.
///
/// `xs` need not be sorted, nor `x` within `[xs.min(), xs.max()]` — extrapolation past either end
/// is the intended use.
#[must_use]
pub fn lagrange_extrapolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert!(xs.len() >= 2);
    let mut total = 0.0;
    for i in 0..xs.len() {
        let mut term = ys[i];
        for j in 0..xs.len() {
            if j != i {
                term *= (x - xs[j]) / (xs[i] - xs[j]);
            }
        }
        total += term;
    }
    total
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reproduces_cubic_polynomial() {
        let f = |x: f64| 2.0 * x.powi(3) - x.powi(2) + 3.0 * x - 5.0;
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        for x in [-2.0, -0.5, 1.5, 4.0, 6.0] {
            assert_relative_eq!(lagrange_extrapolate(&xs, &ys, x), f(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reproduces_linear_with_two_points() {
        let xs = [0.0, 1.0];
        let ys = [2.0, 5.0];
        assert_relative_eq!(lagrange_extrapolate(&xs, &ys, 3.0), 11.0, epsilon = 1e-12);
        assert_relative_eq!(lagrange_extrapolate(&xs, &ys, -1.0), -1.0, epsilon = 1e-12);
    }
}
