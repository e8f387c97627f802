use gridgen_common::Point2D;

/// The fixed interface THE CORE consumes the 2D flux field through.
///
/// Implementations are free to use whatever representation they like internally (a fitted
/// bicubic patch over a G-EQDSK grid, a discrete-cosine-transform interpolant, an analytic
/// closed form for test fixtures); this crate only ever calls the methods below, always assuming
/// `psi` is smooth except at X-points.
pub trait PsiInterpolator {
    /// Evaluates `psi(R, Z)`.
    fn psi(&self, p: Point2D) -> f64;

    /// `d(psi)/dR`.
    fn dpsi_dr(&self, p: Point2D) -> f64;

    /// `d(psi)/dZ`.
    fn dpsi_dz(&self, p: Point2D) -> f64;

    /// `d2(psi)/dR2`.
    fn d2psi_dr2(&self, p: Point2D) -> f64;

    /// `d2(psi)/dZ2`.
    fn d2psi_dz2(&self, p: Point2D) -> f64;

    /// `d2(psi)/dR.dZ`.
    fn d2psi_drdz(&self, p: Point2D) -> f64;

    /// `|grad psi|^2 = (d psi/dR)^2 + (d psi/dZ)^2`.
    fn grad_psi_sq(&self, p: Point2D) -> f64 {
        self.dpsi_dr(p).powi(2) + self.dpsi_dz(p).powi(2)
    }

    /// `f_R = (d psi/dR) / |grad psi|^2`, the R-component of `ds/dpsi` along a perpendicular path.
    fn f_r(&self, p: Point2D) -> f64 {
        self.dpsi_dr(p) / self.grad_psi_sq(p)
    }

    /// `f_Z = (d psi/dZ) / |grad psi|^2`.
    fn f_z(&self, p: Point2D) -> f64 {
        self.dpsi_dz(p) / self.grad_psi_sq(p)
    }

    /// Poloidal field component `Bp_R = -(1/R) d(psi)/dZ`.
    fn bp_r(&self, p: Point2D) -> f64 {
        -self.dpsi_dz(p) / p.r
    }

    /// Poloidal field component `Bp_Z = (1/R) d(psi)/dR`.
    fn bp_z(&self, p: Point2D) -> f64 {
        self.dpsi_dr(p) / p.r
    }
}
