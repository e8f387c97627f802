//! Coarse polyline on a psi-isoline with index-based navigation and a lazily computed
//! [`FineContour`].

use std::cell::RefCell;

use gridgen_common::{lagrange_extrapolate, Point2D};

use crate::error::ContourError;
use crate::fine_contour::{FineContour, FineContourOptions};
use crate::psi::PsiInterpolator;
use crate::refine::{refine_point, RefineMethod, RefineOptions};

/// A coarse polyline lying on a single `psi = psi0` isoline.
///
/// Any mutation that changes `start_ind`/`end_ind`, prepends/appends a point, or changes the
/// extension counts invalidates the cached [`FineContour`] (the "lazy cache with invalidation"
/// design note): callers never observe a stale fine contour after a mutating call.
#[derive(Debug, Clone)]
pub struct PsiContour {
    positions: Vec<Point2D>,
    start_ind: usize,
    end_ind: usize,
    extend_lower: usize,
    extend_upper: usize,
    psi0: f64,
    fine: RefCell<Option<FineContour>>,
}

impl PsiContour {
    /// Creates a new contour from already-traced `positions`, all assumed to lie on `psi0`.
    #[must_use]
    pub fn new(positions: Vec<Point2D>, psi0: f64) -> Self {
        let end_ind = positions.len().saturating_sub(1);
        Self {
            positions,
            start_ind: 0,
            end_ind,
            extend_lower: 0,
            extend_upper: 0,
            psi0,
            fine: RefCell::new(None),
        }
    }

    /// Clears the cached [`FineContour`]; called by every mutator.
    fn invalidate(&self) {
        *self.fine.borrow_mut() = None;
    }

    /// The contour's fixed isoline value.
    #[must_use]
    pub fn psi0(&self) -> f64 {
        self.psi0
    }

    /// Logical points, excluding guard-cell extensions.
    #[must_use]
    pub fn points(&self) -> &[Point2D] {
        &self.positions[self.start_ind..=self.end_ind]
    }

    /// All stored points, including guard-cell extensions.
    #[must_use]
    pub fn raw_points(&self) -> &[Point2D] {
        &self.positions
    }

    /// Index of the logical first point.
    #[must_use]
    pub fn start_ind(&self) -> usize {
        self.start_ind
    }

    /// Index of the logical last point.
    #[must_use]
    pub fn end_ind(&self) -> usize {
        self.end_ind
    }

    /// Number of guard points below `start_ind`.
    #[must_use]
    pub fn extend_lower(&self) -> usize {
        self.extend_lower
    }

    /// Number of guard points above `end_ind`.
    #[must_use]
    pub fn extend_upper(&self) -> usize {
        self.extend_upper
    }

    /// Appends a point past `end_ind`, extending both the logical range and the point array.
    pub fn append(&mut self, p: Point2D) {
        self.positions.push(p);
        self.end_ind = self.positions.len() - 1;
        self.invalidate();
    }

    /// Prepends a point before `start_ind`, shifting every stored index.
    pub fn prepend(&mut self, p: Point2D) {
        self.positions.insert(0, p);
        self.start_ind = 0;
        self.end_ind += 1;
        self.invalidate();
    }

    /// Sets the guard-cell extension counts used by [`FineContour`] construction.
    pub fn set_extensions(&mut self, lower: usize, upper: usize) {
        self.extend_lower = lower;
        self.extend_upper = upper;
        self.invalidate();
    }

    /// Locates the nearest existing point to `p`. If it lies within `atol`, returns its index
    /// without inserting; otherwise inserts `p` so the polyline remains monotonically traversed
    /// and returns its new index.
    ///
    /// Used when splicing the exact wall-intersection point into a contour (`addPointAtWallToContours`).
    pub fn insert_find_position(&mut self, p: Point2D, atol: f64) -> usize {
        let (nearest_idx, nearest_dist) = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &q)| (i, (q - p).magnitude()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, f64::INFINITY));

        if nearest_dist <= atol {
            return nearest_idx;
        }

        // Insert on whichever side of the nearest point keeps monotone arclength ordering: the
        // side whose neighbour is farther from `p` than the nearest point is, is the far side of
        // the segment `p` actually falls on.
        let insert_at = if nearest_idx == 0 {
            1
        } else if nearest_idx == self.positions.len() - 1 {
            nearest_idx
        } else {
            let prev_dist = (self.positions[nearest_idx - 1] - p).magnitude();
            let next_dist = (self.positions[nearest_idx + 1] - p).magnitude();
            if prev_dist < next_dist {
                nearest_idx
            } else {
                nearest_idx + 1
            }
        };

        self.positions.insert(insert_at, p);
        if insert_at <= self.start_ind {
            self.start_ind += 1;
        }
        if insert_at <= self.end_ind {
            self.end_ind += 1;
        }
        self.invalidate();
        insert_at
    }

    /// Piecewise arclength function of (possibly fractional) index `i`, relative to
    /// `distance[start_ind]`: clamped to `0` below `start_ind`, to [`PsiContour::total_distance`]
    /// above `end_ind`, cubic in between (delegated to the cached [`FineContour`]).
    ///
    /// # Errors
    /// Propagates failures from lazily building the [`FineContour`].
    pub fn contour_sfunc(
        &self,
        i: f64,
        psi_interp: &dyn PsiInterpolator,
        fc_opts: &FineContourOptions,
    ) -> Result<f64, ContourError> {
        self.ensure_fine(psi_interp, fc_opts)?;
        let fine = self.fine.borrow();
        let fc = fine.as_ref().expect("ensure_fine just populated the cache");

        let n = (self.end_ind - self.start_ind) as f64;
        if i <= 0.0 {
            return Ok(0.0);
        }
        if i >= n {
            return Ok(fc.total_distance());
        }
        // Map fractional logical index to fractional fine index and linearly interpolate
        // `distance`, which is the uniform-arclength spacing FineContour maintains.
        let fine_len = (fc.end_ind() - fc.start_ind()) as f64;
        let fine_pos = fc.start_ind() as f64 + i / n * fine_len;
        let lo = fine_pos.floor().max(0.0) as usize;
        let hi = (lo + 1).min(fc.distance().len() - 1);
        let frac = fine_pos - lo as f64;
        Ok(fc.distance()[lo] * (1.0 - frac) + fc.distance()[hi] * frac)
    }

    /// Total arclength of the logical range `[start_ind, end_ind]`.
    ///
    /// # Errors
    /// Propagates failures from lazily building the [`FineContour`].
    pub fn total_distance(
        &self,
        psi_interp: &dyn PsiInterpolator,
        fc_opts: &FineContourOptions,
    ) -> Result<f64, ContourError> {
        self.ensure_fine(psi_interp, fc_opts)?;
        Ok(self
            .fine
            .borrow()
            .as_ref()
            .expect("ensure_fine just populated the cache")
            .total_distance())
    }

    /// Builds (and caches) the [`FineContour`] if absent.
    fn ensure_fine(
        &self,
        psi_interp: &dyn PsiInterpolator,
        fc_opts: &FineContourOptions,
    ) -> Result<(), ContourError> {
        if self.fine.borrow().is_some() {
            return Ok(());
        }
        let fc = FineContour::build(
            &self.positions,
            self.psi0,
            psi_interp,
            self.extend_lower,
            self.extend_upper,
            fc_opts,
        )?;
        *self.fine.borrow_mut() = Some(fc);
        Ok(())
    }

    /// Iteratively extrapolates a new endpoint from a local cubic fit of at least four nearby
    /// points, then projects it onto the isoline; used to grow the contour without committing to
    /// a permanent extension.
    ///
    /// # Errors
    /// [`ContourError::Solution`] if the projection back onto the isoline fails.
    pub fn temporary_extend(
        &self,
        extend_lower: usize,
        extend_upper: usize,
        ds_lower: f64,
        ds_upper: f64,
        psi_interp: &dyn PsiInterpolator,
        refine_methods: &[RefineMethod],
        refine_opts: RefineOptions,
    ) -> Result<Vec<Point2D>, ContourError> {
        let mut extended = self.positions.clone();

        for _ in 0..extend_lower {
            let fit = local_cubic_extrapolate(&extended, true, ds_lower)?;
            let tangent = extended[0] - fit;
            let refined = refine_point(
                psi_interp,
                fit,
                tangent,
                self.psi0,
                refine_methods,
                refine_opts,
            )?;
            extended.insert(0, refined);
        }
        for _ in 0..extend_upper {
            let fit = local_cubic_extrapolate(&extended, false, ds_upper)?;
            let last = extended.len() - 1;
            let tangent = fit - extended[last];
            let refined = refine_point(
                psi_interp,
                fit,
                tangent,
                self.psi0,
                refine_methods,
                refine_opts,
            )?;
            extended.push(refined);
        }
        Ok(extended)
    }

    /// Ensures the cached [`FineContour`] covers `[−extend_lower, npoints−1+extend_upper]` in
    /// arclength, resamples `(R, Z)` at `s = sfunc(i)` for each requested logical index, and
    /// re-projects each sample onto the isoline with a tight refine width.
    ///
    /// # Errors
    /// [`ContourError::Solution`] if the fine contour cannot be (re-)built, or if any resampled
    /// point fails to refine back onto the isoline.
    pub fn get_regridded(
        &self,
        npoints: usize,
        sfunc: impl Fn(f64) -> f64,
        extend_lower: usize,
        extend_upper: usize,
        psi_interp: &dyn PsiInterpolator,
        fc_opts: &FineContourOptions,
    ) -> Result<PsiContour, ContourError> {
        self.ensure_fine(psi_interp, fc_opts)?;
        let fine = self.fine.borrow();
        let fc = fine.as_ref().expect("ensure_fine just populated the cache");

        let mut new_positions = Vec::with_capacity(npoints + extend_lower + extend_upper);
        let tight = RefineOptions {
            width: fc_opts.refine.width * 0.1,
            ..fc_opts.refine
        };

        for i in 0..(npoints + extend_lower + extend_upper) {
            let logical_i = i as isize - extend_lower as isize;
            let s = sfunc(logical_i as f64);
            let p = sample_fine_at_s(fc, s);
            let tangent = estimate_tangent_at_s(fc, s);
            let refined = refine_point(
                psi_interp,
                p,
                tangent,
                self.psi0,
                &fc_opts.refine_methods,
                tight,
            )?;
            new_positions.push(refined);
        }

        let mut out = PsiContour::new(new_positions, self.psi0);
        out.start_ind = extend_lower;
        out.end_ind = out.positions.len() - 1 - extend_upper;
        out.extend_lower = extend_lower;
        out.extend_upper = extend_upper;
        Ok(out)
    }
}

/// Samples `(R, Z)` at arclength `s` by linear interpolation within the fine contour's stored
/// distance array, extrapolating linearly past either end.
fn sample_fine_at_s(fc: &FineContour, s: f64) -> Point2D {
    let distance = fc.distance();
    let positions = fc.positions();
    if s <= distance[0] {
        return extrapolate_linear(positions[0], positions[1], distance[0], distance[1], s);
    }
    let n = distance.len();
    if s >= distance[n - 1] {
        return extrapolate_linear(
            positions[n - 2],
            positions[n - 1],
            distance[n - 2],
            distance[n - 1],
            s,
        );
    }
    let idx = distance.partition_point(|&d| d < s).max(1).min(n - 1);
    let (d0, d1) = (distance[idx - 1], distance[idx]);
    let t = if (d1 - d0).abs() > f64::EPSILON {
        (s - d0) / (d1 - d0)
    } else {
        0.0
    };
    positions[idx - 1].lerp(positions[idx], t)
}

/// Local tangent of the fine contour near arclength `s`, via finite difference of
/// [`sample_fine_at_s`].
fn estimate_tangent_at_s(fc: &FineContour, s: f64) -> Point2D {
    let h = fc.total_distance() * 1e-4 + 1e-9;
    sample_fine_at_s(fc, s + h) - sample_fine_at_s(fc, s - h)
}

/// Linear extrapolation of the segment `(p0, p1)` at parameters `(s0, s1)` to arclength `s`.
fn extrapolate_linear(p0: Point2D, p1: Point2D, s0: f64, s1: f64, s: f64) -> Point2D {
    let t = if (s1 - s0).abs() > f64::EPSILON {
        (s - s0) / (s1 - s0)
    } else {
        0.0
    };
    p0.lerp(p1, t)
}

/// Number of nearby points the local cubic fit uses, per spec §4.3 ("a local cubic fit of at
/// least four nearby points").
const LOCAL_FIT_POINTS: usize = 4;

/// Cubic (>= 4 point) extrapolation of a new endpoint a further arclength `ds` beyond whichever
/// end of `points` is requested.
///
/// Fits `R(t)`, `Z(t)` independently as cubics (via [`lagrange_extrapolate`]) over the local
/// arclength parameter `t` of the nearest [`LOCAL_FIT_POINTS`] points to that end, then evaluates
/// each at `t` extended by `ds` beyond the endpoint. With fewer than four points available the
/// fit degrades to whatever order the available points support (see
/// [`lagrange_extrapolate`]'s own doc).
fn local_cubic_extrapolate(
    points: &[Point2D],
    lower: bool,
    ds: f64,
) -> Result<Point2D, ContourError> {
    if points.len() < 2 {
        return Err(ContourError::solution(
            "temporaryExtend",
            "not enough points to extrapolate",
        ));
    }
    let window_len = LOCAL_FIT_POINTS.min(points.len());

    // `window` is ordered from farthest to nearest the extrapolated end, so `t` increases toward
    // (and then past) the endpoint regardless of which end is being extended.
    let window: Vec<Point2D> = if lower {
        points[..window_len].iter().rev().copied().collect()
    } else {
        points[points.len() - window_len..].to_vec()
    };

    let mut t = vec![0.0; window_len];
    for i in 1..window_len {
        t[i] = t[i - 1] + (window[i] - window[i - 1]).magnitude();
    }
    let target_t = t[window_len - 1] + ds;

    let rs: Vec<f64> = window.iter().map(|p| p.r).collect();
    let zs: Vec<f64> = window.iter().map(|p| p.z).collect();
    Ok(Point2D::new(
        lagrange_extrapolate(&t, &rs, target_t),
        lagrange_extrapolate(&t, &zs, target_t),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_find_position_snaps_within_tolerance() {
        let mut contour = PsiContour::new(
            vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(1.0, 0.0),
                Point2D::new(2.0, 0.0),
            ],
            0.0,
        );
        let idx = contour.insert_find_position(Point2D::new(1.0 + 1e-12, 0.0), 1e-9);
        assert_eq!(idx, 1);
        assert_eq!(contour.raw_points().len(), 3);
    }

    #[test]
    fn test_insert_find_position_inserts_between() {
        let mut contour = PsiContour::new(
            vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(1.0, 0.0),
                Point2D::new(2.0, 0.0),
            ],
            0.0,
        );
        let idx = contour.insert_find_position(Point2D::new(1.5, 0.0), 1e-9);
        assert_eq!(idx, 2);
        assert_eq!(contour.raw_points().len(), 4);
    }

    #[test]
    fn test_local_cubic_extrapolate_reproduces_a_straight_line() {
        // Points collinear on z = 2r: an affine reparametrisation of a line is still a line, so
        // the cubic fit (exact for degree <= 3) must continue it exactly at either end.
        let points: Vec<Point2D> = (0..6)
            .map(|i| {
                let x = f64::from(i);
                Point2D::new(x, 2.0 * x)
            })
            .collect();

        let upper = local_cubic_extrapolate(&points, false, 1.0).unwrap();
        assert!((upper.z - 2.0 * upper.r).abs() < 1e-9);
        assert!(upper.r > points[5].r);

        let lower = local_cubic_extrapolate(&points, true, 1.0).unwrap();
        assert!((lower.z - 2.0 * lower.r).abs() < 1e-9);
        assert!(lower.r < points[0].r);
    }

    #[test]
    fn test_local_cubic_extrapolate_tracks_curvature_unlike_two_point_tangent() {
        // Points sampled from a parabola: a naive 2-point linear tangent extension ignores
        // curvature, while the >=4-point local fit should visibly depart from it.
        let points: Vec<Point2D> = (0..6)
            .map(|i| {
                let x = f64::from(i);
                Point2D::new(x, x * x)
            })
            .collect();

        let extrapolated = local_cubic_extrapolate(&points, false, 1.0).unwrap();
        let linear_tangent_guess = points[5] + (points[5] - points[4]);
        assert!((extrapolated.z - linear_tangent_guess.z).abs() > 1.0);
    }
}
