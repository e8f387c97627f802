//! `followPerpendicular`: projects a point from one psi-surface to a sequence of others by
//! integrating the same `dR/dpsi, dZ/dpsi` ODE `refinePoint`'s "integrate" method uses.

use gridgen_common::{integrate, Point2D};

use crate::error::ContourError;
use crate::psi::PsiInterpolator;

/// Tolerances for [`follow_perpendicular`], named after the `follow_perpendicular_{rtol,atol}`
/// option keys.
#[derive(Debug, Clone, Copy)]
pub struct FollowPerpendicularOptions {
    /// Relative tolerance passed to the RK integrator.
    pub rtol: f64,
    /// Absolute tolerance passed to the RK integrator.
    pub atol: f64,
}

impl Default for FollowPerpendicularOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-12,
        }
    }
}

/// Integrates `dR/dpsi = f_R(R, Z)`, `dZ/dpsi = f_Z(R, Z)` from `(r0, z0)` at `psi0`, evaluating
/// the trajectory at every value in `psi_targets` (not required to be sorted; each call starts
/// fresh from `(r0, z0, psi0)` for robustness against non-monotonic target lists).
///
/// Used to propagate a poloidal-segment endpoint out to each radial psi-level of a region's
/// contours.
///
/// # Errors
/// [`ContourError::Solution`] if the underlying adaptive integrator fails to converge for any
/// requested target.
pub fn follow_perpendicular(
    psi_interp: &dyn PsiInterpolator,
    start: Point2D,
    psi0: f64,
    psi_targets: &[f64],
    opts: FollowPerpendicularOptions,
) -> Result<Vec<Point2D>, ContourError> {
    psi_targets
        .iter()
        .map(|&target| {
            let y = integrate(
                |_psi, y| {
                    let q = Point2D::new(y[0], y[1]);
                    [psi_interp.f_r(q), psi_interp.f_z(q)]
                },
                psi0,
                target,
                [start.r, start.z],
                opts.rtol,
                opts.atol,
            )
            .map_err(|err| ContourError::solution("followPerpendicular", err.to_string()))?;
            Ok(Point2D::new(y[0], y[1]))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    struct Circular;

    impl PsiInterpolator for Circular {
        fn psi(&self, p: Point2D) -> f64 {
            (p.r - 1.5).powi(2) + p.z.powi(2)
        }
        fn dpsi_dr(&self, p: Point2D) -> f64 {
            2.0 * (p.r - 1.5)
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
    fn test_follow_perpendicular_stays_radial() {
        let psi_interp = Circular;
        let start = Point2D::new(1.6, 0.0);
        let psi0 = psi_interp.psi(start);
        let targets = [0.02, 0.04];
        let points =
            follow_perpendicular(&psi_interp, start, psi0, &targets, FollowPerpendicularOptions::default())
                .unwrap();
        for (&target, &p) in targets.iter().zip(points.iter()) {
            assert!((psi_interp.psi(p) - target).abs() < 1e-6);
            assert!(p.z.abs() < 1e-6);
        }
    }
}
