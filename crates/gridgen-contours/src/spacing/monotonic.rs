//! The monotonic spacing-law family, used near straight (non-X-point) targets.

/// Builds `s(iN)` for the monotonic family: `s(0) = 0`, `s(m) = length`, `s'(0) = d_lower`,
/// `s'(m) = d_upper`, strictly increasing, where `m = n / n_norm` and `iN = i / n_norm`.
///
/// The convex branch (`length >= average-slope * m`) uses a quadratic `s'`, solved in closed form
/// from the two boundary slopes and the integral constraint. The concave branch (the target
/// length is shorter than a straight blend would give) adds a symmetric "dip" term
/// `k * iN * (m - iN)` to the same boundary-matched linear term, with `k` solved in closed form
/// from the same integral constraint — the dip vanishes at both ends by construction, so it never
/// disturbs the prescribed end-slopes.
///
/// Outside `[0, m]`, `s(iN)` is linearly extended with slopes `d_lower`/`d_upper` so guard-cell
/// indices are well defined.
///
/// # Panics
/// Never panics for finite, non-zero `n_norm`; degenerate zero-length domains are the caller's
/// responsibility to avoid.
#[must_use]
pub fn monotonic_sfunc(
    n: f64,
    n_norm: f64,
    length: f64,
    d_lower: f64,
    d_upper: f64,
) -> impl Fn(f64) -> f64 {
    let m = n / n_norm;
    let average_length = 0.5 * (d_lower + d_upper) * m;

    move |i: f64| {
        let i_n = i / n_norm;
        if i_n < 0.0 {
            return d_lower * i_n;
        }
        if i_n > m {
            return length + d_upper * (i_n - m);
        }

        if length >= average_length {
            // Convex branch: s'(x) = a*x^2 + b*x + d_lower.
            let a = 3.0 * (d_lower + d_upper) / m.powi(2) - 6.0 * length / m.powi(3);
            let b = (d_upper - d_lower - a * m.powi(2)) / m;
            a * i_n.powi(3) / 3.0 + b * i_n.powi(2) / 2.0 + d_lower * i_n
        } else {
            // Concave branch: s'(x) = l(x) + k*x*(m-x), l(x) the boundary-matched line.
            let k = 6.0 * (length - average_length) / m.powi(3);
            let linear_part = d_lower * i_n + 0.5 * (d_upper - d_lower) / m * i_n.powi(2);
            let dip_integral = k * (m * i_n.powi(2) / 2.0 - i_n.powi(3) / 3.0);
            linear_part + dip_integral
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_convex_boundary_values() {
        let s = monotonic_sfunc(16.0, 16.0, 10.0, 0.1, 2.0);
        assert_relative_eq!(s(0.0), 0.0, epsilon = 1e-10);
        assert_relative_eq!(s(16.0), 10.0, epsilon = 1e-8);

        let h = 1e-6;
        let slope_lower = (s(h) - s(0.0)) / h;
        let slope_upper = (s(16.0) - s(16.0 - h)) / h;
        assert_relative_eq!(slope_lower, 0.1, epsilon = 1e-3);
        assert_relative_eq!(slope_upper, 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_strictly_increasing_convex() {
        let s = monotonic_sfunc(16.0, 16.0, 10.0, 0.1, 2.0);
        let mut prev = s(0.0);
        for k in 1..=160 {
            let x = 16.0 * k as f64 / 160.0;
            let value = s(x);
            assert!(value > prev);
            prev = value;
        }
    }

    #[test]
    fn test_concave_boundary_values() {
        let s = monotonic_sfunc(16.0, 16.0, 1.0, 0.5, 0.5);
        assert_relative_eq!(s(0.0), 0.0, epsilon = 1e-10);
        assert_relative_eq!(s(16.0), 1.0, epsilon = 1e-6);
    }
}
