//! `MeshRegion`: a single logical `(nx, ny)` rectangle; owns contours, staggered arrays, geometry
//! and metrics. THE CORE's subsystem (c).

use ndarray::Array2;
use tracing::warn;

use gridgen_common::Point2D;
use gridgen_contours::spacing::assert_strictly_increasing;
use gridgen_contours::{
    follow_perpendicular, refine_point, Equilibrium, EquilibriumRegion, FineContourOptions,
    FollowPerpendicularOptions, PsiContour, PsiInterpolator, RefineMethod, RefineOptions,
};

use crate::error::MeshError;
use crate::multi_location::{Location, MultiLocationArray};
use crate::spacing_strategy::{build_sfunc_table, PoloidalSpacingMethod, SamplingStrategy};

/// The four locations iterated whenever a field is assembled/checked everywhere it is defined.
const ALL_LOCATIONS: [Location; 4] = [
    Location::Centre,
    Location::XLow,
    Location::YLow,
    Location::Corners,
];

/// Per-end spacing-law coefficients resolved for one contour, carrying
/// [`gridgen_contours::SpacingParams`]'s fields plus the method selector.
#[derive(Debug, Clone, Copy)]
pub struct SegmentSpacing {
    /// Which analytic family to use.
    pub method: PoloidalSpacingMethod,
    /// `sqrt_a_lower`.
    pub sqrt_a_lower: Option<f64>,
    /// `sqrt_b_lower`.
    pub sqrt_b_lower: f64,
    /// `sqrt_a_upper`.
    pub sqrt_a_upper: Option<f64>,
    /// `sqrt_b_upper`.
    pub sqrt_b_upper: f64,
    /// `monotonic_d_lower`.
    pub monotonic_d_lower: f64,
    /// `monotonic_d_upper`.
    pub monotonic_d_upper: f64,
    /// Normalisation length `N_norm`.
    pub n_norm: f64,
    /// Lower-end Gaussian blend range.
    pub range_lower: f64,
    /// Upper-end Gaussian blend range.
    pub range_upper: f64,
}

impl From<gridgen_contours::SpacingParams> for SegmentSpacing {
    fn from(p: gridgen_contours::SpacingParams) -> Self {
        Self {
            method: if p.sqrt_a_lower.is_some() || p.sqrt_a_upper.is_some() {
                PoloidalSpacingMethod::Sqrt
            } else {
                PoloidalSpacingMethod::Monotonic
            },
            sqrt_a_lower: p.sqrt_a_lower,
            sqrt_b_lower: p.sqrt_b_lower,
            sqrt_a_upper: p.sqrt_a_upper,
            sqrt_b_upper: p.sqrt_b_upper,
            monotonic_d_lower: p.monotonic_d_lower,
            monotonic_d_upper: p.monotonic_d_upper,
            n_norm: p.n_norm,
            range_lower: p.nonorthogonal_range_lower,
            range_upper: p.nonorthogonal_range_upper,
        }
    }
}

/// Which curvature formula `calcCurvature` evaluates, named after the `curvature_type` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvatureType {
    /// The analytic `curl(b/B)` formula.
    CurlBOverB,
    /// `bxkappa`: not implemented upstream either; writes `NaN`.
    BxKappa,
}

/// Tunables for [`MeshRegion::build`] and its geometry/metric passes, collected from the
/// `Options` recognized-key table.
#[derive(Debug, Clone)]
pub struct MeshRegionOptions {
    /// `y_boundary_guards`.
    pub y_boundary_guards: usize,
    /// Whether this region samples orthogonally or blends end spacing laws.
    pub sampling: SamplingStrategy,
    /// `finecontour_*`.
    pub fc_opts: FineContourOptions,
    /// `follow_perpendicular_{rtol,atol}`.
    pub follow_opts: FollowPerpendicularOptions,
    /// `refine_methods`, used for the tight re-projection after `followPerpendicular`.
    pub refine_methods: Vec<RefineMethod>,
    /// `refine_width`/`refine_atol` for the same re-projection.
    pub refine_opts: RefineOptions,
    /// `geometry_rtol`: the Jacobian-consistency tolerance.
    pub geometry_rtol: f64,
    /// `sfunc_checktol`: the spacing-monotonicity assertion tolerance.
    pub sfunc_checktol: f64,
    /// `shiftedmetric`; must be `true`; only shifted-metric output is supported.
    pub shiftedmetric: bool,
    /// `curvature_type`.
    pub curvature_type: CurvatureType,
}

impl Default for MeshRegionOptions {
    fn default() -> Self {
        Self {
            y_boundary_guards: 2,
            sampling: SamplingStrategy::Orthogonal,
            fc_opts: FineContourOptions::default(),
            follow_opts: FollowPerpendicularOptions::default(),
            refine_methods: vec![RefineMethod::Newton, RefineMethod::Line],
            refine_opts: RefineOptions::default(),
            geometry_rtol: 1e-8,
            sfunc_checktol: 1e-12,
            shiftedmetric: true,
            curvature_type: CurvatureType::CurlBOverB,
        }
    }
}

/// A single logically-rectangular `(nx, ny)` piece of the mesh: owns its contours, the staggered
/// `MultiLocationArray` fields sampled from them, and the geometry/metric passes run over those
/// fields.
#[derive(Debug, Clone)]
pub struct MeshRegion {
    name: String,
    nx: usize,
    ny: usize,
    ny_noguards: usize,
    y_boundary_guards: usize,
    psi_vals: Vec<f64>,
    bpsign: i8,

    pub(crate) rxy: MultiLocationArray,
    pub(crate) zxy: MultiLocationArray,
    psixy: MultiLocationArray,
    dx: MultiLocationArray,
    dy: MultiLocationArray,
    brxy: MultiLocationArray,
    bzxy: MultiLocationArray,
    bpxy: MultiLocationArray,
    btxy: MultiLocationArray,
    bxy: MultiLocationArray,
    hy: MultiLocationArray,
    dphidy: MultiLocationArray,
    j: MultiLocationArray,
    g11: MultiLocationArray,
    g22: MultiLocationArray,
    g33: MultiLocationArray,
    g12: MultiLocationArray,
    g13: MultiLocationArray,
    g23: MultiLocationArray,
    g_11: MultiLocationArray,
    g_22: MultiLocationArray,
    g_33: MultiLocationArray,
    g_12: MultiLocationArray,
    g_13: MultiLocationArray,
    g_23: MultiLocationArray,
    shift_torsion: MultiLocationArray,
    pub(crate) zshift: MultiLocationArray,
    curl_bx: MultiLocationArray,
    curl_by: MultiLocationArray,
    curl_bz: MultiLocationArray,
    bxcvx: MultiLocationArray,
    bxcvy: MultiLocationArray,
    bxcvz: MultiLocationArray,
}

impl MeshRegion {
    /// Constructs a `MeshRegion` from an [`EquilibriumRegion`]: follows the separatrix
    /// perpendicularly out to every radial psi-level, refines each
    /// resulting point back onto its isoline, resamples every contour with the configured
    /// spacing strategy, and fills the staggered-grid position arrays (`fillRZ`).
    ///
    /// Wall-snapping (`addPointAtWallToContours`'s backward-scan-and-retry loop) is not
    /// reproduced bit-for-bit; see `DESIGN.md` for the simplification this takes instead.
    ///
    /// # Errors
    /// [`MeshError::Contour`] if following/refining/regridding any contour fails;
    /// [`MeshError::Topology`] if the region's segment count disagrees with its psi-value count.
    pub fn build(
        name: impl Into<String>,
        equilibrium: &Equilibrium,
        region: &EquilibriumRegion,
        opts: &MeshRegionOptions,
    ) -> Result<Self, MeshError> {
        let psi_interp = equilibrium.psi_interp();
        let psi_vals = region.psi_vals().to_vec();
        if psi_vals.len() < 2 {
            return Err(MeshError::Topology(
                "EquilibriumRegion needs at least 2 psi_vals to span a radial direction".into(),
            ));
        }
        let nx = (psi_vals.len() - 1) / 2;
        let bpsign = if psi_vals[psi_vals.len() - 1] >= psi_vals[0] {
            1
        } else {
            -1
        };

        let base_points = region.contour().points().to_vec();
        let ny_noguards = base_points.len() - 1;
        let guard_half = 2 * opts.y_boundary_guards;
        let half_n = 2 * ny_noguards;
        let ny = ny_noguards + 2 * opts.y_boundary_guards;

        let spacing: SegmentSpacing = region.spacing().into();

        let mut contours = Vec::with_capacity(psi_vals.len());
        for &psi_target in &psi_vals {
            let projected: Vec<Point2D> = base_points
                .iter()
                .map(|&p| {
                    let hit = follow_perpendicular(
                        psi_interp,
                        p,
                        region.contour().psi0(),
                        &[psi_target],
                        opts.follow_opts,
                    )?;
                    Ok(hit[0])
                })
                .collect::<Result<_, gridgen_contours::ContourError>>()?;

            let raw_contour = PsiContour::new(projected, psi_target);
            let sfunc_table = build_sfunc_table(
                &raw_contour,
                psi_interp,
                &opts.fc_opts,
                opts.sampling,
                spacing,
                half_n,
                guard_half,
            )?;
            assert_strictly_increasing(
                |k: f64| sfunc_table[((k + guard_half as f64).round() as usize).min(sfunc_table.len() - 1)],
                -(guard_half as f64),
                (half_n + guard_half) as f64,
                half_n + 2 * guard_half,
                opts.sfunc_checktol,
            )
            .map_err(gridgen_contours::ContourError::from)?;

            let sfunc = move |i: f64| {
                let idx = (i + guard_half as f64).round().clamp(0.0, (sfunc_table.len() - 1) as f64);
                sfunc_table[idx as usize]
            };

            let regridded = raw_contour.get_regridded(
                half_n + 1,
                sfunc,
                guard_half,
                guard_half,
                psi_interp,
                &opts.fc_opts,
            )?;
            contours.push(regridded);
        }

        let mut region = Self {
            name: name.into(),
            nx,
            ny,
            ny_noguards,
            y_boundary_guards: opts.y_boundary_guards,
            psi_vals,
            bpsign,
            rxy: MultiLocationArray::new(),
            zxy: MultiLocationArray::new(),
            psixy: MultiLocationArray::new(),
            dx: MultiLocationArray::new(),
            dy: MultiLocationArray::new(),
            brxy: MultiLocationArray::new(),
            bzxy: MultiLocationArray::new(),
            bpxy: MultiLocationArray::new(),
            btxy: MultiLocationArray::new(),
            bxy: MultiLocationArray::new(),
            hy: MultiLocationArray::new(),
            dphidy: MultiLocationArray::new(),
            j: MultiLocationArray::new(),
            g11: MultiLocationArray::new(),
            g22: MultiLocationArray::new(),
            g33: MultiLocationArray::new(),
            g12: MultiLocationArray::new(),
            g13: MultiLocationArray::new(),
            g23: MultiLocationArray::new(),
            g_11: MultiLocationArray::new(),
            g_22: MultiLocationArray::new(),
            g_33: MultiLocationArray::new(),
            g_12: MultiLocationArray::new(),
            g_13: MultiLocationArray::new(),
            g_23: MultiLocationArray::new(),
            shift_torsion: MultiLocationArray::new(),
            zshift: MultiLocationArray::new(),
            curl_bx: MultiLocationArray::new(),
            curl_by: MultiLocationArray::new(),
            curl_bz: MultiLocationArray::new(),
            bxcvx: MultiLocationArray::new(),
            bxcvy: MultiLocationArray::new(),
            bxcvz: MultiLocationArray::new(),
        };
        region.fill_rz(&contours);
        Ok(region)
    }

    /// `fillRZ`: samples the `(2nx+1) x (2ny+1)` point grid into the four staggered locations by
    /// parity of `(contour index, point index)`.
    fn fill_rz(&mut self, contours: &[PsiContour]) {
        let full_cols = contours.len(); // 2nx+1
        let full_rows = contours[0].points().len(); // 2ny+1

        let at = |ix: usize, iy: usize| contours[ix].points()[iy];

        let centre_r = Array2::from_shape_fn((self.nx, self.ny), |(ix, iy)| {
            at(2 * ix + 1, 2 * iy + 1).r
        });
        let centre_z = Array2::from_shape_fn((self.nx, self.ny), |(ix, iy)| {
            at(2 * ix + 1, 2 * iy + 1).z
        });
        let xlow_r = Array2::from_shape_fn((self.nx + 1, self.ny), |(ix, iy)| {
            at(2 * ix, 2 * iy + 1).r
        });
        let xlow_z = Array2::from_shape_fn((self.nx + 1, self.ny), |(ix, iy)| {
            at(2 * ix, 2 * iy + 1).z
        });
        let ylow_r = Array2::from_shape_fn((self.nx, self.ny + 1), |(ix, iy)| {
            at(2 * ix + 1, 2 * iy).r
        });
        let ylow_z = Array2::from_shape_fn((self.nx, self.ny + 1), |(ix, iy)| {
            at(2 * ix + 1, 2 * iy).z
        });
        let corners_r = Array2::from_shape_fn((self.nx + 1, self.ny + 1), |(ix, iy)| {
            at(2 * ix, 2 * iy).r
        });
        let corners_z = Array2::from_shape_fn((self.nx + 1, self.ny + 1), |(ix, iy)| {
            at(2 * ix, 2 * iy).z
        });
        debug_assert_eq!(full_cols, 2 * self.nx + 1);
        debug_assert_eq!(full_rows, 2 * self.ny + 1);

        self.rxy.set(Location::Centre, centre_r);
        self.zxy.set(Location::Centre, centre_z);
        self.rxy.set(Location::XLow, xlow_r);
        self.zxy.set(Location::XLow, xlow_z);
        self.rxy.set(Location::YLow, ylow_r);
        self.zxy.set(Location::YLow, ylow_z);
        self.rxy.set(Location::Corners, corners_r);
        self.zxy.set(Location::Corners, corners_z);
    }

    /// Overwrites a corner location's value at `(ix, iy)` with the exact X-point position, so
    /// so that neighbouring regions sharing that corner agree bit-exact.
    pub fn pin_corner_to_x_point(&mut self, ix: usize, iy: usize, x_point: Point2D) {
        if let Some(r) = self.rxy.get_mut(Location::Corners) {
            r[(ix, iy)] = x_point.r;
        }
        if let Some(z) = self.zxy.get_mut(Location::Corners) {
            z[(ix, iy)] = x_point.z;
        }
    }

    /// `getRZBoundary`: adopts `other`'s lower `ylow`/`corners` row into this region's upper row,
    /// so the shared face agrees bit-exact. Call after every region's `fillRZ`, before any
    /// metric calculation.
    pub fn adopt_upper_boundary_from(&mut self, other: &MeshRegion) {
        for (field_self, field_other) in [(&mut self.rxy, &other.rxy), (&mut self.zxy, &other.zxy)] {
            if let (Some(ylow_self), Some(ylow_other)) =
                (field_self.get(Location::YLow), field_other.get(Location::YLow))
            {
                let upper_row = ylow_other.row(0).to_owned();
                let mut updated = ylow_self.clone();
                let last = updated.nrows() - 1;
                updated.row_mut(last).assign(&upper_row);
                field_self.set(Location::YLow, updated);
            }
            if let (Some(corners_self), Some(corners_other)) = (
                field_self.get(Location::Corners),
                field_other.get(Location::Corners),
            ) {
                let upper_row = corners_other.row(0).to_owned();
                let mut updated = corners_self.clone();
                let last = updated.nrows() - 1;
                updated.row_mut(last).assign(&upper_row);
                field_self.set(Location::Corners, updated);
            }
        }
    }

    /// `geometry`: evaluates psi/fields at every `(R, Z)` sample, radial/poloidal cell widths,
    /// `bpsign`, the poloidal and toroidal field components, and `hy`/`dphidy`.
    ///
    /// # Errors
    /// [`MeshError::Consistency`] if the `Bp` direction check disagrees with `bpsign`, or if
    /// `hy <= 0` anywhere.
    pub fn geometry(
        &mut self,
        psi_interp: &dyn PsiInterpolator,
        fpol: &dyn Fn(f64) -> f64,
    ) -> Result<(), MeshError> {
        self.psixy = eval_multi(&self.rxy, &self.zxy, |p| psi_interp.psi(p));
        self.brxy = eval_multi(&self.rxy, &self.zxy, |p| psi_interp.bp_r(p));
        self.bzxy = eval_multi(&self.rxy, &self.zxy, |p| psi_interp.bp_z(p));
        self.bpxy = self.brxy.zip_with(&self.bzxy, |br, bz| br.hypot(bz));

        // Direction check: compare the sign of Bp.grad(y) against bpsign at the outer mid-radius
        // centre row; grad(y) is approximated by the local poloidal tangent of the centre
        // contour at that radial index.
        if let (Some(centre_r), Some(centre_z), Some(centre_br), Some(centre_bz)) = (
            self.rxy.get(Location::Centre),
            self.zxy.get(Location::Centre),
            self.brxy.get(Location::Centre),
            self.bzxy.get(Location::Centre),
        ) {
            let (nx, ny) = centre_r.dim();
            if nx > 0 && ny > 1 {
                let outer_ix = nx - 1;
                let mid_iy = ny / 2;
                let tangent = Point2D::new(
                    centre_r[(outer_ix, mid_iy + 1)] - centre_r[(outer_ix, mid_iy - 1)],
                    centre_z[(outer_ix, mid_iy + 1)] - centre_z[(outer_ix, mid_iy - 1)],
                );
                let bp = Point2D::new(centre_br[(outer_ix, mid_iy)], centre_bz[(outer_ix, mid_iy)]);
                let dot = bp.dot(tangent);
                let direction_negative = dot < 0.0;
                if direction_negative && self.bpsign >= 0 {
                    return Err(MeshError::Configuration(format!(
                        "region {}: Bp.grad(y) direction disagrees with bpsign={}",
                        self.name, self.bpsign
                    )));
                }
                if direction_negative {
                    self.bpxy = self.bpxy.scale(-1.0);
                }
            }
        }

        self.btxy = MultiLocationArray::new();
        for location in ALL_LOCATIONS {
            if let (Some(psi), Some(r)) = (self.psixy.get(location), self.rxy.get(location)) {
                let bt = ndarray::Zip::from(psi)
                    .and(r)
                    .map_collect(|&psi_v, &r_v| fpol(psi_v) / r_v);
                self.btxy.set(location, bt);
            }
        }
        self.bxy = self
            .bpxy
            .zip_with(&self.btxy, |bp, bt| bp.hypot(bt));

        self.dx = self.radial_dx();
        let dy_scalar = std::f64::consts::TAU / self.ny_noguards as f64;
        self.dy = self.psixy.map(|_| dy_scalar);

        self.hy = self.compute_hy(dy_scalar)?;
        self.dphidy = MultiLocationArray::new();
        for location in ALL_LOCATIONS {
            if let (Some(hy), Some(bt), Some(bp), Some(r)) = (
                self.hy.get(location),
                self.btxy.get(location),
                self.bpxy.get(location),
                self.rxy.get(location),
            ) {
                let dphidy = ndarray::Zip::from(hy)
                    .and(bt)
                    .and(bp)
                    .and(r)
                    .map_collect(|&hy_v, &bt_v, &bp_v, &r_v| hy_v * bt_v / (bp_v * r_v));
                self.dphidy.set(location, dphidy);
            }
        }
        Ok(())
    }

    /// `dx`: radial cell width at each location, derived from `psi_vals[2i+2] - psi_vals[2i]`
    /// (generalised to whichever contour-index parity the location samples), broadcast across
    /// every poloidal row.
    fn radial_dx(&self) -> MultiLocationArray {
        let last = self.psi_vals.len() - 1;
        let width_at = |contour_ix: usize| {
            let lower = contour_ix.saturating_sub(1);
            let upper = (contour_ix + 1).min(last);
            self.psi_vals[upper] - self.psi_vals[lower]
        };
        let mut out = MultiLocationArray::new();
        if let Some(centre) = self.rxy.get(Location::Centre) {
            let (nx, ny) = centre.dim();
            out.set(
                Location::Centre,
                Array2::from_shape_fn((nx, ny), |(ix, _)| width_at(2 * ix + 1)),
            );
        }
        if let Some(xlow) = self.rxy.get(Location::XLow) {
            let (nx, ny) = xlow.dim();
            out.set(
                Location::XLow,
                Array2::from_shape_fn((nx, ny), |(ix, _)| width_at(2 * ix)),
            );
        }
        if let Some(ylow) = self.rxy.get(Location::YLow) {
            let (nx, ny) = ylow.dim();
            out.set(
                Location::YLow,
                Array2::from_shape_fn((nx, ny), |(ix, _)| width_at(2 * ix + 1)),
            );
        }
        if let Some(corners) = self.rxy.get(Location::Corners) {
            let (nx, ny) = corners.dim();
            out.set(
                Location::Corners,
                Array2::from_shape_fn((nx, ny), |(ix, _)| width_at(2 * ix)),
            );
        }
        out
    }

    /// `hy`: arclength between half-index poloidal neighbours, divided by `dy`. At a y-boundary
    /// row the one-sided extrapolation `2*(d[1]-d[0])` is used instead of a centred difference.
    ///
    /// # Errors
    /// [`MeshError::Consistency`] if `hy <= 0` anywhere.
    fn compute_hy(&self, dy_scalar: f64) -> Result<MultiLocationArray, MeshError> {
        let mut out = MultiLocationArray::new();
        for location in ALL_LOCATIONS {
            let (Some(r), Some(z)) = (self.rxy.get(location), self.zxy.get(location)) else {
                continue;
            };
            let (nx, ny) = r.dim();
            let arr = Array2::from_shape_fn((nx, ny), |(ix, iy)| {
                let dist = |a: usize, b: usize| {
                    (Point2D::new(r[(ix, a)], z[(ix, a)]) - Point2D::new(r[(ix, b)], z[(ix, b)]))
                        .magnitude()
                };
                let raw = if iy == 0 {
                    2.0 * dist(0, 1)
                } else if iy == ny - 1 {
                    2.0 * dist(ny - 1, ny - 2)
                } else {
                    dist(iy - 1, iy + 1)
                };
                raw / dy_scalar
            });
            for value in &arr {
                if *value <= 0.0 {
                    return Err(MeshError::Consistency(format!(
                        "region {}: hy <= 0 at location {location:?}",
                        self.name
                    )));
                }
            }
            out.set(location, arr);
        }
        Ok(out)
    }

    /// `calcMetric`: the shifted-metric `g^{ij}`/`J` assembly, plus the Jacobian-consistency
    /// check.
    ///
    /// # Errors
    /// [`MeshError::Configuration`] if `shiftedmetric` is not set. [`MeshError::Consistency`] if
    /// the Jacobian disagrees with `1/sqrt(det(g))` beyond `geometry_rtol` anywhere.
    pub fn calc_metric(&mut self, shiftedmetric: bool, geometry_rtol: f64) -> Result<(), MeshError> {
        if !shiftedmetric {
            return Err(MeshError::Configuration(
                "only shifted-metric output supported".into(),
            ));
        }

        self.g11 = self.rxy.zip_with(&self.bpxy, |r, bp| (r * bp).powi(2));
        self.g22 = self.hy.map(|hy| 1.0 / hy.powi(2));
        self.g33 = {
            let dphidy_over_hy2 = self
                .dphidy
                .zip_with(&self.hy, |dphidy, hy| (dphidy / hy).powi(2));
            let inv_r2 = self.rxy.map(|r| 1.0 / r.powi(2));
            &dphidy_over_hy2 + &inv_r2
        };
        self.g12 = self.rxy.map(|_| 0.0);
        self.g13 = self.rxy.map(|_| 0.0);
        self.g23 = self.dphidy.zip_with(&self.hy, |dphidy, hy| -dphidy / hy.powi(2));
        self.j = self.hy.zip_with(&self.bpxy, |hy, bp| hy / bp);
        self.shift_torsion = self.ddx(&self.dphidy.clone());

        self.g_11 = self.g11.map(|v| 1.0 / v);
        let yz_det = (&self.g22 * &self.g33).zip_with(&self.g23.zip_with(&self.g23, |a, b| a * b), |a, b| a - b);
        self.g_22 = self.g33.zip_with(&yz_det, |g33, det| g33 / det);
        self.g_33 = self.g22.zip_with(&yz_det, |g22, det| g22 / det);
        self.g_12 = self.g11.map(|_| 0.0);
        self.g_13 = self.g11.map(|_| 0.0);
        self.g_23 = self.g23.zip_with(&yz_det, |g23, det| -g23 / det);

        for location in ALL_LOCATIONS {
            let (Some(j), Some(det)) = (self.j.get(location), yz_det.get(location)) else {
                continue;
            };
            if let Some(g11) = self.g11.get(location) {
                let (nx, ny) = j.dim();
                for ix in 0..nx {
                    for iy in 0..ny {
                        if location == Location::Corners
                            && (ix == 0 || ix == nx - 1)
                            && (iy == 0 || iy == ny - 1)
                        {
                            continue; // X-point corners are excluded from the check.
                        }
                        let det_g = g11[(ix, iy)] * det[(ix, iy)];
                        let jac = j[(ix, iy)];
                        let check = (jac - 1.0 / det_g.sqrt()).abs() / jac.abs();
                        if check >= geometry_rtol {
                            return Err(MeshError::Consistency(format!(
                                "region {}: Jacobian check failed at {location:?}[{ix},{iy}]: \
                                 relative error {check:e} >= {geometry_rtol:e}",
                                self.name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Central difference along the radial (first) array axis, one-sided at the boundaries
    /// (`DDX`).
    fn ddx(&self, field: &MultiLocationArray) -> MultiLocationArray {
        let mut out = MultiLocationArray::new();
        for location in ALL_LOCATIONS {
            let (Some(f), Some(dx)) = (field.get(location), self.dx.get(location)) else {
                continue;
            };
            let (nx, ny) = f.dim();
            let arr = Array2::from_shape_fn((nx, ny), |(ix, iy)| {
                if nx < 2 {
                    return 0.0;
                }
                if ix == 0 {
                    (f[(1, iy)] - f[(0, iy)]) / dx[(0, iy)]
                } else if ix == nx - 1 {
                    (f[(nx - 1, iy)] - f[(nx - 2, iy)]) / dx[(nx - 1, iy)]
                } else {
                    (f[(ix + 1, iy)] - f[(ix - 1, iy)]) / (2.0 * dx[(ix, iy)])
                }
            });
            out.set(location, arr);
        }
        out
    }

    /// `calcCurvature`: the analytic `curl(b/B)` in cylindrical `(R, phi, Z)` coordinates from
    /// psi's second derivatives and `fpol'(psi)`, then `bxcv = B/2 * curl(b/B)`. The `bxkappa`
    /// alternative is not implemented upstream either and writes `NaN`.
    pub fn calc_curvature(
        &mut self,
        psi_interp: &dyn PsiInterpolator,
        fpol: &dyn Fn(f64) -> f64,
        fpol_prime: &dyn Fn(f64) -> f64,
        curvature_type: CurvatureType,
    ) {
        if curvature_type == CurvatureType::BxKappa {
            warn!(region = %self.name, "bxkappa curvature mode requested; not implemented, writing NaN");
            self.curl_bx = self.psixy.map(|_| f64::NAN);
            self.curl_by = self.psixy.map(|_| f64::NAN);
            self.curl_bz = self.psixy.map(|_| f64::NAN);
            self.bxcvx = self.curl_bx.clone();
            self.bxcvy = self.curl_by.clone();
            self.bxcvz = self.curl_bz.clone();
            return;
        }

        self.curl_bx = MultiLocationArray::new();
        self.curl_by = MultiLocationArray::new();
        self.curl_bz = MultiLocationArray::new();
        for location in ALL_LOCATIONS {
            let (Some(r), Some(z)) = (self.rxy.get(location), self.zxy.get(location)) else {
                continue;
            };
            let (nx, ny) = r.dim();
            let mut curl_r = Array2::zeros((nx, ny));
            let mut curl_phi = Array2::zeros((nx, ny));
            let mut curl_z = Array2::zeros((nx, ny));
            for ix in 0..nx {
                for iy in 0..ny {
                    let p = Point2D::new(r[(ix, iy)], z[(ix, iy)]);
                    let (cr, cphi, cz) = curl_b_over_b(psi_interp, fpol, fpol_prime, p);
                    curl_r[(ix, iy)] = cr;
                    curl_phi[(ix, iy)] = cphi;
                    curl_z[(ix, iy)] = cz;
                }
            }
            self.curl_bx.set(location, curl_r);
            self.curl_by.set(location, curl_z);
            self.curl_bz.set(location, curl_phi);
        }

        self.bxcvx = self.curl_bx.zip_with(&self.bxy, |c, b| 0.5 * b * c);
        self.bxcvy = self.curl_by.zip_with(&self.bxy, |c, b| 0.5 * b * c);
        self.bxcvz = self.curl_bz.zip_with(&self.bxy, |c, b| 0.5 * b * c);
    }

    /// `calcZShift`: integrates `dphidy` along `y` with the trapezoidal rule, continuing from
    /// `lower_centre`/`lower_corners` boundary values supplied by the previous region in this
    /// y-group (or `0.0` for the first region, `yGroupIndex == 0`).
    pub fn calc_zshift(&mut self, lower_centre: &[f64], lower_corners: &[f64]) {
        self.zshift = MultiLocationArray::new();
        if let Some(dphidy_centre) = self.dphidy.get(Location::Centre) {
            let (nx, ny) = dphidy_centre.dim();
            let mut ylow_z = Array2::zeros((nx, ny + 1));
            let mut centre_z = Array2::zeros((nx, ny));
            for ix in 0..nx {
                let mut acc = lower_centre.get(ix).copied().unwrap_or(0.0);
                ylow_z[(ix, 0)] = acc;
                for iy in 0..ny {
                    centre_z[(ix, iy)] = acc + 0.5 * self.dy.get(Location::Centre).map_or(0.0, |d| d[(ix, iy)]) * dphidy_centre[(ix, iy)];
                    acc += self.dy.get(Location::Centre).map_or(0.0, |d| d[(ix, iy)]) * dphidy_centre[(ix, iy)];
                    ylow_z[(ix, iy + 1)] = acc;
                }
            }
            self.zshift.set(Location::Centre, centre_z);
            self.zshift.set(Location::YLow, ylow_z);
        }
        if let Some(dphidy_xlow) = self.dphidy.get(Location::XLow) {
            let (nx, ny) = dphidy_xlow.dim();
            let mut corners_z = Array2::zeros((nx, ny + 1));
            let mut xlow_z = Array2::zeros((nx, ny));
            for ix in 0..nx {
                let mut acc = lower_corners.get(ix).copied().unwrap_or(0.0);
                corners_z[(ix, 0)] = acc;
                for iy in 0..ny {
                    xlow_z[(ix, iy)] = acc + 0.5 * self.dy.get(Location::XLow).map_or(0.0, |d| d[(ix, iy)]) * dphidy_xlow[(ix, iy)];
                    acc += self.dy.get(Location::XLow).map_or(0.0, |d| d[(ix, iy)]) * dphidy_xlow[(ix, iy)];
                    corners_z[(ix, iy + 1)] = acc;
                }
            }
            self.zshift.set(Location::XLow, xlow_z);
            self.zshift.set(Location::Corners, corners_z);
        }
    }

    /// The region's upper `y`-boundary `zShift` row at centre/corners locations, for the next
    /// region in its y-group to continue from.
    #[must_use]
    pub fn upper_zshift_boundary(&self) -> (Vec<f64>, Vec<f64>) {
        let centre = self
            .zshift
            .get(Location::YLow)
            .map(|a| a.row(a.nrows() - 1).to_vec())
            .unwrap_or_default();
        let corners = self
            .zshift
            .get(Location::Corners)
            .map(|a| a.row(a.nrows() - 1).to_vec())
            .unwrap_or_default();
        (centre, corners)
    }

    /// Region name (e.g. `"inner_lower_divertor"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Radial cell count (excluding guards; the core has no radial guard cells).
    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Poloidal cell count, including `y_boundary_guards` on both ends.
    #[must_use]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Poloidal cell count, excluding guards.
    #[must_use]
    pub fn ny_noguards(&self) -> usize {
        self.ny_noguards
    }

    /// `y_boundary_guards`.
    #[must_use]
    pub fn y_boundary_guards(&self) -> usize {
        self.y_boundary_guards
    }

    /// Sign of `d(psi)/d(radial index)`.
    #[must_use]
    pub fn bpsign(&self) -> i8 {
        self.bpsign
    }

    /// Read access to every assembled field, by name, for the grid-file writer.
    #[must_use]
    #[allow(
        clippy::too_many_lines,
        reason = "a flat field accessor table mirrors the grid-file's flat field list"
    )]
    pub fn field(&self, name: &str) -> Option<&MultiLocationArray> {
        Some(match name {
            "Rxy" => &self.rxy,
            "Zxy" => &self.zxy,
            "psixy" => &self.psixy,
            "dx" => &self.dx,
            "dy" => &self.dy,
            "Brxy" => &self.brxy,
            "Bzxy" => &self.bzxy,
            "Bpxy" => &self.bpxy,
            "Btxy" => &self.btxy,
            "Bxy" => &self.bxy,
            "hy" => &self.hy,
            "dphidy" => &self.dphidy,
            "J" => &self.j,
            "g11" => &self.g11,
            "g22" => &self.g22,
            "g33" => &self.g33,
            "g12" => &self.g12,
            "g13" => &self.g13,
            "g23" => &self.g23,
            "g_11" => &self.g_11,
            "g_22" => &self.g_22,
            "g_33" => &self.g_33,
            "g_12" => &self.g_12,
            "g_13" => &self.g_13,
            "g_23" => &self.g_23,
            "ShiftTorsion" => &self.shift_torsion,
            "zShift" => &self.zshift,
            "curl_bOverB_x" => &self.curl_bx,
            "curl_bOverB_y" => &self.curl_by,
            "curl_bOverB_z" => &self.curl_bz,
            "bxcvx" => &self.bxcvx,
            "bxcvy" => &self.bxcvy,
            "bxcvz" => &self.bxcvz,
            _ => return None,
        })
    }
}

/// Evaluates `f` at every `(R, Z)` pair present in both `rxy` and `zxy`, location by location.
fn eval_multi(
    rxy: &MultiLocationArray,
    zxy: &MultiLocationArray,
    f: impl Fn(Point2D) -> f64 + Copy,
) -> MultiLocationArray {
    let mut out = MultiLocationArray::new();
    for location in ALL_LOCATIONS {
        if let (Some(r), Some(z)) = (rxy.get(location), zxy.get(location)) {
            let arr = ndarray::Zip::from(r)
                .and(z)
                .map_collect(|&r_v, &z_v| f(Point2D::new(r_v, z_v)));
            out.set(location, arr);
        }
    }
    out
}

/// `curl(B/B^2)` in cylindrical `(R, phi, Z)` coordinates for an axisymmetric field: `B/B^2 =
/// (Br, Bphi, Bz)/|B|^2` with `curl(V)_R = -dVphi/dZ`, `curl(V)_phi = dVR/dZ - dVZ/dR`,
/// `curl(V)_Z = (1/R) d(R*Vphi)/dR`, expanded via the quotient rule in terms of psi's derivatives
/// up to second order, `fpol(psi)` and `fpol'(psi)`. Returns `(curl_R, curl_phi, curl_Z)`.
fn curl_b_over_b(
    psi_interp: &dyn PsiInterpolator,
    fpol: &dyn Fn(f64) -> f64,
    fpol_prime: &dyn Fn(f64) -> f64,
    p: Point2D,
) -> (f64, f64, f64) {
    let r = p.r;
    let psi = psi_interp.psi(p);
    let dpsi_dr = psi_interp.dpsi_dr(p);
    let dpsi_dz = psi_interp.dpsi_dz(p);
    let d2psi_dr2 = psi_interp.d2psi_dr2(p);
    let d2psi_dz2 = psi_interp.d2psi_dz2(p);
    let d2psi_drdz = psi_interp.d2psi_drdz(p);

    let f = fpol(psi);
    let f_prime = fpol_prime(psi);

    let b_r = -dpsi_dz / r;
    let b_z = dpsi_dr / r;
    let b_phi = f / r;
    let b2 = b_r * b_r + b_z * b_z + b_phi * b_phi;

    let dbr_dr = -d2psi_drdz / r + dpsi_dz / r.powi(2);
    let dbr_dz = -d2psi_dz2 / r;
    let dbz_dr = d2psi_dr2 / r - dpsi_dr / r.powi(2);
    let dbz_dz = d2psi_drdz / r;
    let dbphi_dr = (f_prime * dpsi_dr * r - f) / r.powi(2);
    let dbphi_dz = f_prime * dpsi_dz / r;
    let d_r_bphi_dr = f_prime * dpsi_dr; // R*Bphi = fpol(psi), independent of R except through psi.

    let db2_dr = 2.0 * (b_r * dbr_dr + b_z * dbz_dr + b_phi * dbphi_dr);
    let db2_dz = 2.0 * (b_r * dbr_dz + b_z * dbz_dz + b_phi * dbphi_dz);

    let v_phi_dz = (dbphi_dz * b2 - b_phi * db2_dz) / b2.powi(2);
    let v_r_dz = (dbr_dz * b2 - b_r * db2_dz) / b2.powi(2);
    let v_z_dr = (dbz_dr * b2 - b_z * db2_dr) / b2.powi(2);
    let r_v_phi_dr = (d_r_bphi_dr * b2 - f * db2_dr) / b2.powi(2);

    let curl_r = -v_phi_dz;
    let curl_phi = v_r_dz - v_z_dr;
    let curl_z = r_v_phi_dr / r;

    (curl_r, curl_phi, curl_z)
}
