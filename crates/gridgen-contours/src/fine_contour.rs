//! Dense, uniformly arclength-spaced, high-accuracy polyline on a single psi-isoline.

use gridgen_common::{lagrange_extrapolate, Point2D};
use rsl_interpolation::{make_interp_type, Accelerator, DynInterpolation};

use crate::error::ContourError;
use crate::psi::PsiInterpolator;
use crate::refine::{refine_point, RefineMethod, RefineOptions};

/// Tunables controlling [`FineContour`] construction and equalisation, named after the
/// `finecontour_*` option keys.
#[derive(Debug, Clone, Copy)]
pub struct FineContourOptions {
    /// Target point count ("finecontour_Nfine").
    pub n_fine: usize,
    /// Arclength-uniformity tolerance ("finecontour_atol"): I2.
    pub atol: f64,
    /// Equalisation iteration budget ("finecontour_maxits").
    pub maxits: usize,
    /// Refine tolerances/method chain used while equalising.
    pub refine: RefineOptions,
    /// Ordered method chain tried by `refinePoint`.
    pub refine_methods: Vec<RefineMethod>,
}

impl Default for FineContourOptions {
    fn default() -> Self {
        Self {
            n_fine: 100,
            atol: 1e-8,
            maxits: 30,
            refine: RefineOptions::default(),
            refine_methods: vec![RefineMethod::Newton, RefineMethod::Line],
        }
    }
}

/// A dense, equal-arclength-spaced polyline lying on `psi = psi0`, to within [`FineContourOptions`].
///
/// Invariants (I1-I4 of the data model): every position satisfies `psi(p) == psi0` within
/// `refine_atol` (I1); consecutive arclength spacing is uniform within `atol` (I2); `start_ind <=
/// end_ind` with guard extensions strictly outside that range (I3); `distance[start_ind]` is the
/// zero reference used by every interpolation built from this contour (I4).
#[derive(Debug, Clone)]
pub struct FineContour {
    positions: Vec<Point2D>,
    distance: Vec<f64>,
    start_ind: usize,
    end_ind: usize,
    extend_lower_fine: usize,
    extend_upper_fine: usize,
}

impl FineContour {
    /// Builds a `FineContour` by seeding `opts.n_fine` points evenly in estimated arclength along
    /// `coarse` and equalising them onto the isoline.
    ///
    /// `coarse` must already be ordered start-to-end; `extend_lower`/`extend_upper` are the
    /// parent's coarse guard-point counts, doubled here for extrapolation stability as the
    /// component design prescribes.
    ///
    /// # Errors
    /// [`ContourError::Solution`] if equalisation cannot reach `opts.atol` within `opts.maxits`
    /// rounds (a warning is logged and the last iterate kept per the component design, so this
    /// only returns an error if a single `refinePoint` call itself fails every configured
    /// method).
    pub fn build(
        coarse: &[Point2D],
        psi0: f64,
        psi_interp: &dyn PsiInterpolator,
        extend_lower: usize,
        extend_upper: usize,
        opts: &FineContourOptions,
    ) -> Result<Self, ContourError> {
        let extend_lower_fine = extend_lower * 2;
        let extend_upper_fine = extend_upper * 2;
        let n_total = opts.n_fine + extend_lower_fine + extend_upper_fine;

        let coarse_distance = cumulative_distance(coarse);
        let total = *coarse_distance
            .last()
            .ok_or_else(|| ContourError::solution("FineContour::build", "empty coarse contour"))?;

        let r_coarse: Vec<f64> = coarse.iter().map(|p| p.r).collect();
        let z_coarse: Vec<f64> = coarse.iter().map(|p| p.z).collect();

        let mut acc_r = Accelerator::new();
        let mut acc_z = Accelerator::new();
        let seed_r = make_interp_type("cubic")
            .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?
            .build(&coarse_distance, &r_coarse)
            .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?;
        let seed_z = make_interp_type("cubic")
            .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?
            .build(&coarse_distance, &z_coarse)
            .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?;

        let ds_seed = total / (opts.n_fine.saturating_sub(1).max(1)) as f64;
        let mut positions = Vec::with_capacity(n_total);
        for i in 0..n_total {
            let idx = i as isize - extend_lower_fine as isize;
            let s = idx as f64 * ds_seed;
            let point = if (0.0..=total).contains(&s) {
                let r = seed_r
                    .eval(&coarse_distance, &r_coarse, s, &mut acc_r)
                    .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?;
                let z = seed_z
                    .eval(&coarse_distance, &z_coarse, s, &mut acc_z)
                    .map_err(|e| ContourError::solution("FineContour::build", e.to_string()))?;
                Point2D::new(r, z)
            } else {
                // Guard-cell seeds fall outside the coarse contour's own arclength range; per the
                // component design these are extrapolated (not clamped onto an endpoint) via a
                // local cubic fit of the nearest coarse points, matching the in-range seed's own
                // cubic interpolant.
                seed_extrapolate(&coarse_distance, &r_coarse, &z_coarse, s)
            };
            positions.push(point);
        }

        let mut contour = Self {
            positions,
            distance: vec![0.0; n_total],
            start_ind: extend_lower_fine,
            end_ind: extend_lower_fine + opts.n_fine - 1,
            extend_lower_fine,
            extend_upper_fine,
        };
        contour.equalise(psi0, psi_interp, opts)?;
        Ok(contour)
    }

    /// Repeatedly projects every point onto the isoline and resamples to uniform arclength until
    /// `opts.atol` is met or `opts.maxits` rounds elapse.
    fn equalise(
        &mut self,
        psi0: f64,
        psi_interp: &dyn PsiInterpolator,
        opts: &FineContourOptions,
    ) -> Result<(), ContourError> {
        for _round in 0..opts.maxits {
            for i in 0..self.positions.len() {
                let tangent = self.local_tangent(i);
                let refined = refine_point(
                    psi_interp,
                    self.positions[i],
                    tangent,
                    psi0,
                    &opts.refine_methods,
                    opts.refine,
                )?;
                self.positions[i] = refined;
            }
            self.recompute_distance();

            let n = self.distance.len();
            if n < 2 {
                return Ok(());
            }
            let mean_ds = self.distance[n - 1] / (n - 1) as f64;
            let ds_error = self
                .distance
                .windows(2)
                .map(|w| (w[1] - w[0] - mean_ds).abs())
                .fold(0.0_f64, f64::max);

            if ds_error <= opts.atol {
                return Ok(());
            }
            self.resample_uniform();
        }

        tracing::warn!(
            maxits = opts.maxits,
            "FineContour equalisation did not reach requested atol; keeping last iterate"
        );
        Ok(())
    }

    /// Central-difference tangent estimate at index `i`, falling back to a one-sided difference
    /// at the array ends.
    fn local_tangent(&self, i: usize) -> Point2D {
        let n = self.positions.len();
        if n < 2 {
            return Point2D::new(1.0, 0.0);
        }
        if i == 0 {
            self.positions[1] - self.positions[0]
        } else if i == n - 1 {
            self.positions[n - 1] - self.positions[n - 2]
        } else {
            self.positions[i + 1] - self.positions[i - 1]
        }
    }

    /// Recomputes `distance` as cumulative Euclidean arclength from `positions[0]`, then shifts
    /// so `distance[start_ind] == 0` (I4).
    fn recompute_distance(&mut self) {
        self.distance = cumulative_distance(&self.positions);
        let zero = self.distance[self.start_ind];
        for d in &mut self.distance {
            *d -= zero;
        }
    }

    /// Resamples `positions` at uniform arclength using a cubic interpolant of the current
    /// iterate.
    fn resample_uniform(&mut self) {
        let n = self.positions.len();
        let r: Vec<f64> = self.positions.iter().map(|p| p.r).collect();
        let z: Vec<f64> = self.positions.iter().map(|p| p.z).collect();
        // distance must be strictly increasing for the spline build; recompute_distance()
        // guarantees that for a non-degenerate contour.
        let total = self.distance[n - 1] - self.distance[0];

        let Ok(r_interp) = make_interp_type("cubic").and_then(|t| t.build(&self.distance, &r))
        else {
            return;
        };
        let Ok(z_interp) = make_interp_type("cubic").and_then(|t| t.build(&self.distance, &z))
        else {
            return;
        };

        let mut acc = Accelerator::new();
        let mut new_positions = Vec::with_capacity(n);
        for i in 0..n {
            let s = self.distance[0] + total * i as f64 / (n - 1) as f64;
            let rv = r_interp.eval(&self.distance, &r, s, &mut acc).unwrap_or(r[i]);
            let zv = z_interp.eval(&self.distance, &z, s, &mut acc).unwrap_or(z[i]);
            new_positions.push(Point2D::new(rv, zv));
        }
        self.positions = new_positions;
    }

    /// `distance[end_ind] - distance[start_ind]`.
    #[must_use]
    pub fn total_distance(&self) -> f64 {
        self.distance[self.end_ind] - self.distance[self.start_ind]
    }

    /// Estimates the arclength of `p` by linear interpolation between its two nearest fine
    /// points.
    #[must_use]
    pub fn get_distance(&self, p: Point2D) -> f64 {
        let mut best = (f64::INFINITY, 0usize);
        for (i, &q) in self.positions.iter().enumerate() {
            let d = (q - p).magnitude();
            if d < best.0 {
                best = (d, i);
            }
        }
        let i = best.1;
        if i == 0 {
            return self.distance[0];
        }
        if i == self.positions.len() - 1 {
            return self.distance[i];
        }
        let (prev, next) = (self.positions[i - 1], self.positions[i + 1]);
        let to_prev = (p - self.positions[i]).dot((prev - self.positions[i]).normalised());
        let to_next = (p - self.positions[i]).dot((next - self.positions[i]).normalised());
        if to_prev.abs() < to_next.abs() {
            self.distance[i] - to_prev.abs().min((self.distance[i] - self.distance[i - 1]).abs())
        } else {
            self.distance[i] + to_next.abs().min((self.distance[i + 1] - self.distance[i]).abs())
        }
    }

    /// Builds `s(s_perp)`: a function of signed perpendicular distance (projected onto `v`'s
    /// perpendicular) returning this contour's own arclength `s`.
    ///
    /// The true `s_perp` is only monotonic near the reference end (`start_ind`); any locally
    /// decreasing span far from it is reflected so the returned map stays usable as an
    /// interpolation table, per the component design.
    #[must_use]
    pub fn interp_s_perp(&self, v: Point2D) -> Vec<(f64, f64)> {
        let normal = v.perp().normalised();
        let reference = self.positions[self.start_ind];

        let mut raw: Vec<f64> = self
            .positions
            .iter()
            .map(|&p| (p - reference).dot(normal))
            .collect();

        let mut running_max = f64::NEG_INFINITY;
        for value in &mut raw {
            if *value < running_max {
                *value = 2.0 * running_max - *value;
            } else {
                running_max = *value;
            }
        }

        raw.into_iter().zip(self.distance.iter().copied()).collect()
    }

    /// Reverses `positions` in place and recomputes `distance` as `total - distance[::-1]`
    /// (round-trip property R2: reversing twice restores both bit-exact).
    pub fn reverse(&mut self) {
        self.positions.reverse();
        let total = self.distance[self.distance.len() - 1];
        self.distance = self.distance.iter().rev().map(|d| total - d).collect();
        let n = self.positions.len();
        let (new_start, new_end) = (n - 1 - self.end_ind, n - 1 - self.start_ind);
        self.start_ind = new_start;
        self.end_ind = new_end;
        std::mem::swap(&mut self.extend_lower_fine, &mut self.extend_upper_fine);
    }

    /// The underlying positions, including guard-cell extensions.
    #[must_use]
    pub fn positions(&self) -> &[Point2D] {
        &self.positions
    }

    /// The arclength (relative to `distance[start_ind]`) of every position.
    #[must_use]
    pub fn distance(&self) -> &[f64] {
        &self.distance
    }

    /// Index of the logical first point (guard extensions lie below this index).
    #[must_use]
    pub fn start_ind(&self) -> usize {
        self.start_ind
    }

    /// Index of the logical last point (guard extensions lie above this index).
    #[must_use]
    pub fn end_ind(&self) -> usize {
        self.end_ind
    }
}

/// Number of nearby coarse points the guard-cell seed extrapolation fits, per spec §4.2 ("cubic
/// extrapolation of the coarse polyline").
const SEED_FIT_POINTS: usize = 4;

/// Extrapolates a seed position at arclength `s` (known to lie outside `[0, total]`) from a local
/// cubic fit of the nearest [`SEED_FIT_POINTS`] coarse points to whichever end `s` is past.
fn seed_extrapolate(coarse_distance: &[f64], r_coarse: &[f64], z_coarse: &[f64], s: f64) -> Point2D {
    let n = coarse_distance.len();
    let window_len = SEED_FIT_POINTS.min(n);
    let (xs, rs, zs) = if s < coarse_distance[0] {
        (
            &coarse_distance[..window_len],
            &r_coarse[..window_len],
            &z_coarse[..window_len],
        )
    } else {
        (
            &coarse_distance[n - window_len..],
            &r_coarse[n - window_len..],
            &z_coarse[n - window_len..],
        )
    };
    Point2D::new(
        lagrange_extrapolate(xs, rs, s),
        lagrange_extrapolate(xs, zs, s),
    )
}

/// Cumulative Euclidean arclength, starting at `0.0` for the first point.
fn cumulative_distance(points: &[Point2D]) -> Vec<f64> {
    let mut distance = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    distance.push(0.0);
    for w in points.windows(2) {
        acc += (w[1] - w[0]).magnitude();
        distance.push(acc);
    }
    distance
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

    fn circle_coarse(n: usize, radius: f64) -> Vec<Point2D> {
        (0..=n)
            .map(|i| {
                let theta = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                Point2D::new(1.5 + radius * theta.cos(), radius * theta.sin())
            })
            .collect()
    }

    #[test]
    fn test_build_satisfies_psi_tolerance() {
        let psi_interp = Circular;
        let coarse = circle_coarse(16, 0.1);
        let opts = FineContourOptions {
            n_fine: 64,
            atol: 1e-9,
            ..FineContourOptions::default()
        };
        let fc = FineContour::build(&coarse, 0.01, &psi_interp, 0, 0, &opts).unwrap();
        for &p in fc.positions() {
            assert!((psi_interp.psi(p) - 0.01).abs() < 1e-6);
        }
    }

    #[test]
    fn test_seed_extrapolate_reproduces_cubic() {
        let f = |s: f64| 1.0 - 0.5 * s + 0.25 * s.powi(2) - 0.1 * s.powi(3);
        let distance = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let values: Vec<f64> = distance.iter().map(|&s| f(s)).collect();
        let below = seed_extrapolate(&distance, &values, &values, -1.0);
        let above = seed_extrapolate(&distance, &values, &values, 6.5);
        assert!((below.r - f(-1.0)).abs() < 1e-9);
        assert!((above.r - f(6.5)).abs() < 1e-9);
    }

    #[test]
    fn test_build_extends_guard_seeds_distinctly() {
        // A closed circular coarse contour with guard extensions on both ends: if the guard
        // seeds collapsed onto the start/end point (clamped rather than extrapolated), the very
        // first equalisation round would see a zero-length local tangent there and either fail or
        // produce a degenerate fine contour.
        let psi_interp = Circular;
        let coarse = circle_coarse(16, 0.1);
        let opts = FineContourOptions {
            n_fine: 32,
            atol: 1e-8,
            ..FineContourOptions::default()
        };
        let fc = FineContour::build(&coarse, 0.01, &psi_interp, 2, 2, &opts).unwrap();
        for &p in fc.positions() {
            assert!(p.r.is_finite() && p.z.is_finite());
        }
        for w in fc.distance().windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_reverse_is_involutive() {
        let psi_interp = Circular;
        let coarse = circle_coarse(16, 0.1);
        let opts = FineContourOptions {
            n_fine: 32,
            ..FineContourOptions::default()
        };
        let original = FineContour::build(&coarse, 0.01, &psi_interp, 0, 0, &opts).unwrap();
        let mut twice = original.clone();
        twice.reverse();
        twice.reverse();
        for (a, b) in original.positions().iter().zip(twice.positions()) {
            assert_eq!(a.r, b.r);
            assert_eq!(a.z, b.z);
        }
    }
}
