//! `refinePoint`: projects a seed point near an isoline exactly onto it.

use gridgen_common::{brent, integrate, Point2D};

use crate::error::ContourError;
use crate::psi::PsiInterpolator;

/// A single method `refinePoint` may try, in the order given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMethod {
    /// Newton iteration on `g(s) = psi(p + s*t) - psi0` with a forward-difference derivative.
    Newton,
    /// Bracket a sign change of `g` on `[-w, w]` and solve with Brent, halving `w` on failure.
    Line,
    /// Integrate `dR/dpsi, dZ/dpsi` from `psi(p)` to `psi0` with adaptive RK.
    Integrate,
    /// [`RefineMethod::Integrate`] followed by [`RefineMethod::Newton`].
    IntegrateNewton,
    /// Return `p` unchanged; a trailing fallback allowing callers to continue regardless.
    None,
}

/// Tolerances controlling [`refine_point`].
#[derive(Debug, Clone, Copy)]
pub struct RefineOptions {
    /// Absolute tolerance on `|psi(p') - psi0|`.
    pub atol: f64,
    /// Half-width of the initial bracket for [`RefineMethod::Line`].
    pub width: f64,
    /// Relative tolerance passed to the RK integrator.
    pub integrate_rtol: f64,
    /// Absolute tolerance passed to the RK integrator.
    pub integrate_atol: f64,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            atol: 1e-10,
            width: 1e-2,
            integrate_rtol: 1e-10,
            integrate_atol: 1e-12,
        }
    }
}

/// Refines seed point `p` (assumed near `psi = psi0`) onto the isoline, trying each of `methods`
/// in order and falling through to the next on [`ContourError::Solution`].
///
/// `tangent` is the local contour tangent direction; the perpendicular search direction is
/// derived from it.
///
/// # Errors
/// [`ContourError::Solution`] if every configured method fails.
pub fn refine_point(
    psi_interp: &dyn PsiInterpolator,
    p: Point2D,
    tangent: Point2D,
    psi0: f64,
    methods: &[RefineMethod],
    opts: RefineOptions,
) -> Result<Point2D, ContourError> {
    let normal = tangent.perp().normalised();

    let mut last_err: Option<ContourError> = None;
    for &method in methods {
        let attempt = match method {
            RefineMethod::Newton => newton(psi_interp, p, normal, psi0, opts),
            RefineMethod::Line => line(psi_interp, p, normal, psi0, opts),
            RefineMethod::Integrate => integrate_to_psi(psi_interp, p, psi0, opts),
            RefineMethod::IntegrateNewton => {
                integrate_to_psi(psi_interp, p, psi0, opts).and_then(|mid| {
                    // Re-estimate the local normal at the integrated point before Newton-polishing.
                    newton(psi_interp, mid, normal, psi0, opts)
                })
            }
            RefineMethod::None => Ok(p),
        };

        match attempt {
            Ok(refined) => return Ok(refined),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| ContourError::solution("refinePoint", "no methods configured")))
}

/// Newton iteration on `g(s) = psi(p + s*normal) - psi0`.
fn newton(
    psi_interp: &dyn PsiInterpolator,
    p: Point2D,
    normal: Point2D,
    psi0: f64,
    opts: RefineOptions,
) -> Result<Point2D, ContourError> {
    let h = 1e-6;
    let g = |s: f64| psi_interp.psi(p + normal * s) - psi0;

    let mut s = 0.0;
    let mut gs = g(s);
    for _ in 0..10 {
        if gs.abs() < opts.atol {
            return Ok(p + normal * s);
        }
        let deriv = (g(s + h) - gs) / h;
        if deriv.abs() < f64::EPSILON {
            return Err(ContourError::solution("refinePoint::newton", "zero derivative"));
        }
        let s_next = s - gs / deriv;
        let g_next = g(s_next);
        if g_next.abs() > gs.abs() * 10.0 {
            return Err(ContourError::solution("refinePoint::newton", "diverging"));
        }
        s = s_next;
        gs = g_next;
    }
    Err(ContourError::solution(
        "refinePoint::newton",
        "exceeded 10 iterations",
    ))
}

/// Brackets a sign change of `g` on `[-w, w]`, halving `w` on failure until it underflows `atol`.
fn line(
    psi_interp: &dyn PsiInterpolator,
    p: Point2D,
    normal: Point2D,
    psi0: f64,
    opts: RefineOptions,
) -> Result<Point2D, ContourError> {
    let g = |s: f64| psi_interp.psi(p + normal * s) - psi0;
    let mut w = opts.width;

    while w >= opts.atol {
        if let Ok(s) = brent(g, -w, w, opts.atol, 100) {
            return Ok(p + normal * s);
        }
        w /= 2.0;
    }
    Err(ContourError::solution(
        "refinePoint::line",
        "bracket shrank below atol without a sign change",
    ))
}

/// Integrates `dR/dpsi = f_R, dZ/dpsi = f_Z` from `psi(p)` to `psi0`.
fn integrate_to_psi(
    psi_interp: &dyn PsiInterpolator,
    p: Point2D,
    psi0: f64,
    opts: RefineOptions,
) -> Result<Point2D, ContourError> {
    let psi_start = psi_interp.psi(p);
    let y = integrate(
        |_psi, y| {
            let q = Point2D::new(y[0], y[1]);
            [psi_interp.f_r(q), psi_interp.f_z(q)]
        },
        psi_start,
        psi0,
        [p.r, p.z],
        opts.integrate_rtol,
        opts.integrate_atol,
    )
    .map_err(|err| ContourError::solution("refinePoint::integrate", err.to_string()))?;
    Ok(Point2D::new(y[0], y[1]))
}

#[cfg(test)]
mod test {
    use super::*;

    /// `psi = R^2 + Z^2`, circular isolines, closed form gradient.
    struct Circular;

    impl PsiInterpolator for Circular {
        fn psi(&self, p: Point2D) -> f64 {
            p.r * p.r + p.z * p.z
        }
        fn dpsi_dr(&self, p: Point2D) -> f64 {
            2.0 * p.r
        }
        fn dpsi_dz(&self, p: Point2D) -> f64 {
            2.0 * p.z
        }
        fn d2psi_dr2(&self, _p: Point2D) -> f64 {
            2.0
        }
        fn d2psi_dz2(&self, _p: Point2D) -> f64 {
            2.0
        }
        fn d2psi_drdz(&self, _p: Point2D) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_newton_refine() {
        let psi_interp = Circular;
        let p = Point2D::new(1.05, 0.0);
        let tangent = Point2D::new(0.0, 1.0);
        let refined = refine_point(
            &psi_interp,
            p,
            tangent,
            1.0,
            &[RefineMethod::Newton],
            RefineOptions::default(),
        )
        .unwrap();
        assert!((psi_interp.psi(refined) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_refine() {
        let psi_interp = Circular;
        let p = Point2D::new(1.2, 0.0);
        let tangent = Point2D::new(0.0, 1.0);
        let refined = refine_point(
            &psi_interp,
            p,
            tangent,
            1.0,
            &[RefineMethod::Line],
            RefineOptions::default(),
        )
        .unwrap();
        assert!((psi_interp.psi(refined) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_method_fallthrough() {
        let psi_interp = Circular;
        let p = Point2D::new(1.2, 0.0);
        let tangent = Point2D::new(0.0, 1.0);
        // "none" always succeeds, so a chain ending in it never errors.
        let refined = refine_point(
            &psi_interp,
            p,
            tangent,
            1.0,
            &[RefineMethod::None],
            RefineOptions::default(),
        )
        .unwrap();
        assert_eq!(refined, p);
    }
}
