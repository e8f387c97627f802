//! `combineSfuncs`: blends a lower-spacing function, an upper-spacing function, and a background
//! "orthogonal" function with radially-varying Gaussian weights.

use std::rc::Rc;

/// Parameters controlling [`combine_sfuncs`]'s Gaussian weighting.
#[derive(Debug, Clone, Copy)]
pub struct CombineParams {
    /// Total index range `N` of the region this spacing function covers.
    pub n: f64,
    /// Normalisation length `N_norm`.
    pub n_norm: f64,
    /// Influence range of the lower spacing function, in units of `n_norm`.
    pub range_lower: f64,
    /// Influence range of the upper spacing function, in units of `n_norm`.
    pub range_upper: f64,
}

/// Blends `s_low` (active near `i = 0`), `s_high` (active near `i = n`), and a background
/// `s_orth`, with weights `w_low(i) = exp(-(i / (n_norm*range_lower))^2)` and `w_high(i) =
/// exp(-(((n - i) / (n_norm*range_upper)))^2)`, clamped so `w_low + w_high <= 1` (both scaled down
/// equally when their sum would exceed 1).
///
/// When `s_orth` is `None`, it is replaced by the fixed-point substitution `(w_low*s_low +
/// w_high*s_high) / (w_low + w_high)`, so that repeated calls (e.g. regridding a contour against
/// its own previous spacing) converge to a stable point rather than compounding (round-trip
/// property R1).
#[must_use]
pub fn combine_sfuncs(
    params: CombineParams,
    s_low: Rc<dyn Fn(f64) -> f64>,
    s_high: Rc<dyn Fn(f64) -> f64>,
    s_orth: Option<Rc<dyn Fn(f64) -> f64>>,
) -> impl Fn(f64) -> f64 {
    move |i: f64| {
        let w_low_raw = (-(i / (params.n_norm * params.range_lower)).powi(2)).exp();
        let w_high_raw =
            (-(((params.n - i) / (params.n_norm * params.range_upper))).powi(2)).exp();

        let sum = w_low_raw + w_high_raw;
        let (w_low, w_high) = if sum > 1.0 {
            (w_low_raw / sum, w_high_raw / sum)
        } else {
            (w_low_raw, w_high_raw)
        };

        let low = s_low(i);
        let high = s_high(i);

        let orth = match &s_orth {
            Some(f) => f(i),
            None => {
                let denom = w_low + w_high;
                if denom <= f64::EPSILON {
                    0.0
                } else {
                    (w_low * low + w_high * high) / denom
                }
            }
        };

        w_low * low + w_high * high + (1.0 - w_low - w_high) * orth
    }
}

/// Radial blend weight for `nonorthogonal_*_spacing_range[_inner|_outer]`:
/// `xweight = (|ix| / (n_sep - 1))^power`.
#[must_use]
pub fn radial_xweight(ix: i64, n_sep: usize, power: f64) -> f64 {
    if n_sep <= 1 {
        return 0.0;
    }
    (ix.unsigned_abs() as f64 / (n_sep - 1) as f64).powf(power)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_combine_matches_low_near_origin() {
        let params = CombineParams {
            n: 32.0,
            n_norm: 32.0,
            range_lower: 0.1,
            range_upper: 0.1,
        };
        let low: Rc<dyn Fn(f64) -> f64> = Rc::new(|i: f64| i * 2.0);
        let high: Rc<dyn Fn(f64) -> f64> = Rc::new(|i: f64| i * 3.0);
        let orth: Rc<dyn Fn(f64) -> f64> = Rc::new(|i: f64| i);
        let s = combine_sfuncs(params, low, high, Some(orth));
        assert_relative_eq!(s(0.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_combine_fixed_point_without_orth() {
        let params = CombineParams {
            n: 32.0,
            n_norm: 32.0,
            range_lower: 0.2,
            range_upper: 0.2,
        };
        let low: Rc<dyn Fn(f64) -> f64> = Rc::new(|_i: f64| 1.0);
        let high: Rc<dyn Fn(f64) -> f64> = Rc::new(|_i: f64| 1.0);
        let s = combine_sfuncs(params, low, high, None);
        // Both sub-functions constant at 1.0: every blend must also be 1.0.
        assert_relative_eq!(s(16.0), 1.0, epsilon = 1e-9);
    }
}
