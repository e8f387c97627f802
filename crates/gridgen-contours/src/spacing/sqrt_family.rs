//! The sqrt-augmented spacing-law family, used for poloidal spacing near X-points where `ds/dpsi`
//! diverges like `1/sqrt(psi)`.

/// Builds `s(iN)` for the sqrt family:
///
/// `s(iN) = a*sqrt(iN) - b*sqrt(m - iN) + c + d*iN + e*iN^2 + f*iN^3`
///
/// with `iN = i / n_norm`, `m = n / n_norm`. Coefficients are solved in closed form from
/// `s(0) = 0`, `s(m) = length`, and the prescribed end-slope divergences `s'(iN) ->
/// a_lower/sqrt(iN) + b_lower` as `iN -> 0` and `s'(iN) -> a_upper/sqrt(m - iN) + b_upper` as
/// `iN -> m`.
///
/// `a_lower`/`a_upper` being `None` selects the "only-upper"/"only-lower" reduced sub-case (no
/// divergence at that end, i.e. `a = 0` or `b = 0` respectively) rather than the general "both"
/// case.
///
/// Outside `[0, m]`, `s(iN)` is linearly extended with slopes `b_lower`/`b_upper` (the finite part
/// of the end-slope, since the divergent part has no meaning past the domain) so guard-cell
/// indices are well defined.
#[must_use]
pub fn sqrt_sfunc(
    n: f64,
    n_norm: f64,
    length: f64,
    a_lower: Option<f64>,
    b_lower: f64,
    a_upper: Option<f64>,
    b_upper: f64,
) -> impl Fn(f64) -> f64 {
    let m = n / n_norm;
    let sqrt_m = m.sqrt();

    let a = a_lower.unwrap_or(0.0) * 2.0;
    let b = a_upper.unwrap_or(0.0) * 2.0;
    let c = b * sqrt_m;
    let d = b_lower - b / (2.0 * sqrt_m);

    let rhs_i = length - a * sqrt_m - c - d * m;
    let rhs_ii = b_upper - a / (2.0 * sqrt_m) - d;
    let f = (rhs_ii - 2.0 * rhs_i / m) / m.powi(2);
    let e = rhs_i / m.powi(2) - f * m;

    move |i: f64| {
        let i_n = i / n_norm;
        if i_n < 0.0 {
            return b_lower * i_n;
        }
        if i_n > m {
            return length + b_upper * (i_n - m);
        }
        a * i_n.max(0.0).sqrt() - b * (m - i_n).max(0.0).sqrt()
            + c
            + d * i_n
            + e * i_n.powi(2)
            + f * i_n.powi(3)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_boundary_values_both_ends_diverging() {
        let s = sqrt_sfunc(32.0, 32.0, 5.0, Some(0.2), 0.05, Some(0.3), 0.08);
        assert_relative_eq!(s(0.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(s(32.0), 5.0, epsilon = 1e-8);
    }

    #[test]
    fn test_only_lower_reduces_divergence_at_upper() {
        let s = sqrt_sfunc(32.0, 32.0, 5.0, Some(0.2), 0.05, None, 0.08);
        assert_relative_eq!(s(0.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(s(32.0), 5.0, epsilon = 1e-7);
    }
}
