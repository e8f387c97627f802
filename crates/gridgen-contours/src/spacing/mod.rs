//! The poloidal point-distribution engine: analytically-integrable spacing laws `s(i)` mapping a
//! (possibly fractional) index to arclength, with prescribed end-slopes.

mod combine;
mod monotonic;
mod sqrt_family;

pub use combine::{combine_sfuncs, CombineParams};
pub use monotonic::monotonic_sfunc;
pub use sqrt_family::sqrt_sfunc;

use crate::error::ContourError;

/// `getSfuncFixedPerpSpacing`: combines a monotonic spacing law evaluated in the
/// perpendicular-distance coordinate `s_perp` with a contour's own `s(s_perp)` map (built by
/// [`crate::fine_contour::FineContour::interp_s_perp`]), achieving a fixed `d(s_perp)/di` near a
/// wall with a known tangent vector.
///
/// `perp_table` must be sorted by `s_perp` (ascending); linear interpolation/extrapolation is used
/// between samples.
#[must_use]
pub fn fixed_perp_spacing_sfunc(
    perp_sfunc: impl Fn(f64) -> f64,
    perp_table: Vec<(f64, f64)>,
) -> impl Fn(f64) -> f64 {
    move |i: f64| {
        let s_perp = perp_sfunc(i);
        interp_table(&perp_table, s_perp)
    }
}

/// Linear interpolation (with linear extrapolation past the ends) of a `(x, y)` table sorted by
/// `x`.
fn interp_table(table: &[(f64, f64)], x: f64) -> f64 {
    if table.len() < 2 {
        return table.first().map_or(0.0, |&(_, y)| y);
    }
    if x <= table[0].0 {
        let (x0, y0) = table[0];
        let (x1, y1) = table[1];
        return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
    }
    let n = table.len();
    if x >= table[n - 1].0 {
        let (x0, y0) = table[n - 2];
        let (x1, y1) = table[n - 1];
        return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
    }
    let idx = table.partition_point(|&(tx, _)| tx < x).max(1).min(n - 1);
    let (x0, y0) = table[idx - 1];
    let (x1, y1) = table[idx];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Asserts that `s` is strictly increasing when sampled at `n` equally spaced points across
/// `[lo, hi]`, including the guard-cell extensions (invariant P3).
///
/// # Errors
/// [`ContourError::Consistency`] naming the offending pair of samples if monotonicity fails.
pub fn assert_strictly_increasing(
    s: impl Fn(f64) -> f64,
    lo: f64,
    hi: f64,
    n: usize,
    checktol: f64,
) -> Result<(), ContourError> {
    let mut prev = s(lo);
    for k in 1..=n {
        let x = lo + (hi - lo) * k as f64 / n as f64;
        let value = s(x);
        if value <= prev - checktol {
            return Err(ContourError::Consistency(format!(
                "spacing function not strictly increasing at x={x}: s(x)={value} <= previous {prev}"
            )));
        }
        prev = value;
    }
    Ok(())
}
