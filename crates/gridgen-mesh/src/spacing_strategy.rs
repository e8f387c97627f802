//! Builds the per-contour spacing function used when sampling a [`crate::mesh_region::MeshRegion`]'s
//! poloidal contours: `distributePointsNonorthogonal`'s strategy selection, reduced to the two
//! families `gridgen_contours::spacing` actually implements.

use std::rc::Rc;

use gridgen_contours::spacing::{combine_sfuncs, monotonic_sfunc, sqrt_sfunc, CombineParams};
use gridgen_contours::{FineContourOptions, PsiContour, PsiInterpolator};

use crate::error::MeshError;
use crate::mesh_region::SegmentSpacing;

/// Which analytic family supplies the near-end divergence of a poloidal spacing law, named after
/// the `poloidal_spacing_method` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoloidalSpacingMethod {
    /// The sqrt-augmented family (used near X-points).
    Sqrt,
    /// The monotonic family (used near straight wall/core targets).
    Monotonic,
}

/// Whether a [`crate::mesh_region::MeshRegion`] samples its contours orthogonally (pure
/// `contourSfunc`, i.e. the contour's own natural arclength parametrisation) or blends in the
/// region's lower/upper end spacing laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// `contourSfunc` alone: the grid follows whatever spacing `followPerpendicular`ing the
    /// separatrix naturally produced.
    Orthogonal,
    /// `combineSfuncs` blending in lower/upper end spacing laws (the general non-orthogonal
    /// case; `fixed_poloidal`/`fixed_perp_*`/`combined` collapse onto this
    /// one strategy here — see `DESIGN.md`).
    Combined,
}

/// Precomputes `s(k)` at every half-index `k` in `[-guard_half, half_n + guard_half]` (offset so
/// index 0 of the returned `Vec` is `k = -guard_half`), for use as `get_regridded`'s `sfunc`.
///
/// `half_n` is the contour's poloidal range measured in half-index units (`2 * ny_noguards`);
/// `guard_half` is the guard-cell extension, also in half-index units.
///
/// # Errors
/// Propagates [`gridgen_contours::ContourError`] from evaluating the contour's own `contourSfunc`
/// (needed both directly, for [`SamplingStrategy::Orthogonal`], and as the `combineSfuncs`
/// background term for [`SamplingStrategy::Combined`]).
pub fn build_sfunc_table(
    contour: &PsiContour,
    psi_interp: &dyn PsiInterpolator,
    fc_opts: &FineContourOptions,
    strategy: SamplingStrategy,
    spacing: SegmentSpacing,
    half_n: usize,
    guard_half: usize,
) -> Result<Vec<f64>, MeshError> {
    let len = half_n + 2 * guard_half + 1;
    let mut orth = Vec::with_capacity(len);
    for k in 0..len {
        let logical = k as isize - guard_half as isize;
        let value = contour.contour_sfunc(logical as f64 / 2.0, psi_interp, fc_opts)?;
        orth.push(value);
    }

    if strategy == SamplingStrategy::Orthogonal {
        return Ok(orth);
    }

    let total_length = contour.total_distance(psi_interp, fc_opts)?;
    let n = half_n as f64;

    let (s_low, s_high): (Rc<dyn Fn(f64) -> f64>, Rc<dyn Fn(f64) -> f64>) = match spacing.method {
        PoloidalSpacingMethod::Sqrt => {
            let low = sqrt_sfunc(
                n,
                spacing.n_norm,
                total_length,
                spacing.sqrt_a_lower,
                spacing.sqrt_b_lower,
                None,
                spacing.sqrt_b_upper,
            );
            let high = sqrt_sfunc(
                n,
                spacing.n_norm,
                total_length,
                None,
                spacing.sqrt_b_lower,
                spacing.sqrt_a_upper,
                spacing.sqrt_b_upper,
            );
            (Rc::new(low), Rc::new(high))
        }
        PoloidalSpacingMethod::Monotonic => {
            let mono = monotonic_sfunc(
                n,
                spacing.n_norm,
                total_length,
                spacing.monotonic_d_lower,
                spacing.monotonic_d_upper,
            );
            let mono_rc: Rc<dyn Fn(f64) -> f64> = Rc::new(mono);
            (mono_rc.clone(), mono_rc)
        }
    };

    let s_orth: Rc<dyn Fn(f64) -> f64> = Rc::new(move |k: f64| {
        let idx = (k + guard_half as f64).round();
        let idx = idx.clamp(0.0, (len - 1) as f64) as usize;
        orth[idx]
    });

    let params = CombineParams {
        n,
        n_norm: spacing.n_norm,
        range_lower: spacing.range_lower,
        range_upper: spacing.range_upper,
    };
    let combined = combine_sfuncs(params, s_low, s_high, Some(s_orth));

    let mut out = Vec::with_capacity(len);
    for k in 0..len {
        let logical = (k as isize - guard_half as isize) as f64;
        out.push(combined(logical));
    }
    Ok(out)
}
