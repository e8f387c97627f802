//! A bicubic spline over a G-EQDSK `psirz` grid, the standalone-binary's default
//! [`gridgen_contours::PsiInterpolator`] implementation.

use std::cell::RefCell;

use gridgen_common::Point2D;
use gridgen_contours::PsiInterpolator;
use rsl_interpolation::{Accelerator, Cache, DynSpline2d, make_spline2d};

use crate::error::IoError;
use crate::geqdsk::GeqdskData;

/// Evaluates `psi(R, Z)` and its derivatives through a bicubic spline fitted over a G-EQDSK
/// rectangular grid.
///
/// `PsiInterpolator`'s methods take `&self`; the underlying spline's accelerators and cache are
/// mutable scratch state, so they live behind `RefCell`s the way a hand-rolled interior-mutable
/// cache would in any of this crate's collaborators.
pub struct GeqdskPsiInterpolator {
    spline: DynSpline2d<f64>,
    racc: RefCell<Accelerator>,
    zacc: RefCell<Accelerator>,
    cache: RefCell<Cache<f64>>,
}

impl GeqdskPsiInterpolator {
    /// Builds a spline of interpolation type `typ` (e.g. `"bicubic"`) over `data`'s `psirz` grid.
    ///
    /// # Errors
    /// [`IoError::Interpolation`] if `typ` is not a recognised interpolation type or the spline
    /// cannot be built over the supplied grid (non-increasing abscissae, too few points, etc).
    pub fn new(data: &GeqdskData, typ: &str) -> Result<Self, IoError> {
        let r = data.r_grid();
        let z = data.z_grid();
        // `DynSpline2d::za` is Fortran (column-major) order over `(r, z)`; `psirz` is already
        // stored varying Z fastest, matching the layout `parse_geqdsk` produced from the g-file.
        let order = ndarray::Order::ColumnMajor;
        let psirz_flat = data.psirz.flatten_with_order(order).to_owned();

        let spline = make_spline2d(
            typ,
            r.as_slice(),
            z.as_slice(),
            psirz_flat
                .as_slice()
                .ok_or_else(|| IoError::Interpolation("psirz grid is not contiguous".into()))?,
        )
        .map_err(|e| IoError::Interpolation(e.to_string()))?;

        Ok(Self {
            spline,
            racc: RefCell::new(Accelerator::new()),
            zacc: RefCell::new(Accelerator::new()),
            cache: RefCell::new(Cache::new()),
        })
    }
}

impl PsiInterpolator for GeqdskPsiInterpolator {
    fn psi(&self, p: Point2D) -> f64 {
        self.spline
            .eval(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }

    fn dpsi_dr(&self, p: Point2D) -> f64 {
        self.spline
            .eval_deriv_x(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }

    fn dpsi_dz(&self, p: Point2D) -> f64 {
        self.spline
            .eval_deriv_y(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }

    fn d2psi_dr2(&self, p: Point2D) -> f64 {
        self.spline
            .eval_deriv_xx(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }

    fn d2psi_dz2(&self, p: Point2D) -> f64 {
        self.spline
            .eval_deriv_yy(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }

    fn d2psi_drdz(&self, p: Point2D) -> f64 {
        self.spline
            .eval_deriv_xy(
                p.r,
                p.z,
                &mut self.racc.borrow_mut(),
                &mut self.zacc.borrow_mut(),
                &mut self.cache.borrow_mut(),
            )
            .unwrap_or(f64::NAN)
    }
}

impl std::fmt::Debug for GeqdskPsiInterpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeqdskPsiInterpolator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat_geqdsk() -> GeqdskData {
        GeqdskData {
            nw: 5,
            nh: 5,
            rdim: 1.0,
            zdim: 1.0,
            rleft: 1.0,
            zmid: 0.0,
            rmaxis: 1.5,
            zmaxis: 0.0,
            simag: 0.0,
            sibry: 1.0,
            bcentr: 1.0,
            current: 1e6,
            fpol: vec![2.0; 5],
            psirz: ndarray::Array2::from_shape_fn((5, 5), |(i, j)| {
                let r = 1.0 + i as f64 * 0.25;
                let z = -0.5 + j as f64 * 0.25;
                r * r + z * z
            }),
            boundary: vec![],
            wall: vec![],
        }
    }

    #[test]
    fn test_spline_reproduces_grid_values_at_nodes() {
        let data = flat_geqdsk();
        let interp =
            GeqdskPsiInterpolator::new(&data, "bicubic").expect("spline should build on a smooth grid");
        let p = Point2D { r: 1.5, z: 0.0 };
        let value = interp.psi(p);
        assert!((value - 2.25).abs() < 1e-6, "got {value}");
    }

    #[test]
    fn test_derivatives_are_finite_away_from_nodes() {
        let data = flat_geqdsk();
        let interp =
            GeqdskPsiInterpolator::new(&data, "bicubic").expect("spline should build on a smooth grid");
        let p = Point2D { r: 1.6, z: 0.1 };
        assert!(interp.dpsi_dr(p).is_finite());
        assert!(interp.dpsi_dz(p).is_finite());
        assert!(interp.d2psi_dr2(p).is_finite());
        assert!(interp.d2psi_dz2(p).is_finite());
        assert!(interp.d2psi_drdz(p).is_finite());
    }
}
