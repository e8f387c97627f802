//! Analytic test equilibria, used across unit and integration tests in place of a fitted
//! G-EQDSK fixture.

use gridgen_common::Point2D;

use crate::psi::PsiInterpolator;

/// `psi = (R - r0)^2 / a^2 + (Z - z0)^2 / b^2`: elliptical (circular when `a == b`) flux
/// surfaces centred on `(r0, z0)`, with closed-form derivatives up to second order.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticPsi {
    /// Major-radius coordinate of the magnetic axis.
    pub r0: f64,
    /// Vertical coordinate of the magnetic axis.
    pub z0: f64,
    /// Radial elongation scale.
    pub a: f64,
    /// Vertical elongation scale.
    pub b: f64,
}

impl Default for AnalyticPsi {
    fn default() -> Self {
        Self {
            r0: 1.5,
            z0: 0.0,
            a: 1.0,
            b: 1.0,
        }
    }
}

impl PsiInterpolator for AnalyticPsi {
    fn psi(&self, p: Point2D) -> f64 {
        ((p.r - self.r0) / self.a).powi(2) + ((p.z - self.z0) / self.b).powi(2)
    }

    fn dpsi_dr(&self, p: Point2D) -> f64 {
        2.0 * (p.r - self.r0) / self.a.powi(2)
    }

    fn dpsi_dz(&self, p: Point2D) -> f64 {
        2.0 * (p.z - self.z0) / self.b.powi(2)
    }

    fn d2psi_dr2(&self, _p: Point2D) -> f64 {
        2.0 / self.a.powi(2)
    }

    fn d2psi_dz2(&self, _p: Point2D) -> f64 {
        2.0 / self.b.powi(2)
    }

    fn d2psi_drdz(&self, _p: Point2D) -> f64 {
        0.0
    }
}

/// A single-X-point saddle, `psi = (R - r0)^2 / a^2 - (Z - z0)^2 / b^2`, used to exercise
/// [`crate::equilibrium::Equilibrium::find_saddle_point`] in tests.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticSaddle {
    /// Major-radius coordinate of the saddle.
    pub r0: f64,
    /// Vertical coordinate of the saddle.
    pub z0: f64,
    /// Radial curvature scale.
    pub a: f64,
    /// Vertical curvature scale.
    pub b: f64,
}

impl PsiInterpolator for AnalyticSaddle {
    fn psi(&self, p: Point2D) -> f64 {
        ((p.r - self.r0) / self.a).powi(2) - ((p.z - self.z0) / self.b).powi(2)
    }

    fn dpsi_dr(&self, p: Point2D) -> f64 {
        2.0 * (p.r - self.r0) / self.a.powi(2)
    }

    fn dpsi_dz(&self, p: Point2D) -> f64 {
        -2.0 * (p.z - self.z0) / self.b.powi(2)
    }

    fn d2psi_dr2(&self, _p: Point2D) -> f64 {
        2.0 / self.a.powi(2)
    }

    fn d2psi_dz2(&self, _p: Point2D) -> f64 {
        -2.0 / self.b.powi(2)
    }

    fn d2psi_drdz(&self, _p: Point2D) -> f64 {
        0.0
    }
}
