//! `Equilibrium`: owns psi, X-points, separatrices, wall; orchestrates saddle-point and root
//! searches; parent of [`crate::region::EquilibriumRegion`]s.

use std::collections::BTreeMap;

use gridgen_common::{find_intersections, find_maximum_1d, find_minimum_1d, Point2D};

use crate::error::ContourError;
use crate::psi::PsiInterpolator;
use crate::psi_contour::PsiContour;
use crate::refine::{refine_point, RefineMethod, RefineOptions};
use crate::region::{Connections, EquilibriumRegion, Segment, SpacingParams};

/// A closed, counter-clockwise first-wall polygon. Closure between the last and first vertex is
/// implicit.
#[derive(Debug, Clone)]
pub struct WallPolygon {
    vertices: Vec<Point2D>,
}

impl WallPolygon {
    /// Builds a [`WallPolygon`] from `points`, validating non-degeneracy and normalising
    /// orientation to counter-clockwise (the core's required convention) rather than trusting
    /// the caller.
    ///
    /// # Errors
    /// [`ContourError::Configuration`] if fewer than 3 distinct vertices are given.
    pub fn from_points(mut points: Vec<Point2D>) -> Result<Self, ContourError> {
        if points.len() < 3 {
            return Err(ContourError::Configuration(
                "wall polygon needs at least 3 vertices".into(),
            ));
        }
        if signed_area(&points) < 0.0 {
            points.reverse();
        }
        Ok(Self { vertices: points })
    }

    /// The polygon vertices, in counter-clockwise order.
    #[must_use]
    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    /// Edges of the (implicitly closed) polygon as `(start, end)` pairs.
    fn edges(&self) -> impl Iterator<Item = (Point2D, Point2D)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// Shoelace signed area; positive for counter-clockwise polygons.
fn signed_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let (p, q) = (points[i], points[(i + 1) % n]);
        area += p.cross(q);
    }
    area / 2.0
}

/// The radial psi grid shared by every poloidal region an equilibrium builds: BOUT-style
/// meshes are logically rectangular, so `nx` (and hence `psi_vals`) is common to all of them.
#[derive(Debug, Clone)]
pub struct RadialGrid {
    /// Ordered psi-values defining the radial grid lines.
    pub psi_vals: Vec<f64>,
    /// Spacing-law coefficients applied to every generated region.
    pub spacing: SpacingParams,
    /// Index into `psi_vals` dividing inside-separatrix from outside-separatrix cells.
    pub separatrix_radial_index: usize,
}

/// Tolerances controlling [`Equilibrium::identify_single_null_regions`]'s branch tracing.
#[derive(Debug, Clone)]
pub struct RegionDiscoveryOptions {
    /// Poloidal arclength advanced per predictor-corrector step.
    pub trace_step: f64,
    /// Iteration budget for each traced branch.
    pub max_trace_steps: usize,
    /// [`refine_point`] method chain used to re-project each step onto the separatrix.
    pub refine_methods: Vec<RefineMethod>,
    /// [`refine_point`] tolerances.
    pub refine: RefineOptions,
}

impl Default for RegionDiscoveryOptions {
    fn default() -> Self {
        Self {
            trace_step: 1e-2,
            max_trace_steps: 2000,
            refine_methods: vec![RefineMethod::Newton, RefineMethod::Line],
            refine: RefineOptions::default(),
        }
    }
}

/// Tolerances used by [`Equilibrium`]'s searches, named after their option keys.
#[derive(Debug, Clone, Copy)]
pub struct EquilibriumOptions {
    /// Absolute tolerance for [`Equilibrium::find_saddle_point`]'s convergence check.
    pub saddle_atol: f64,
    /// Iteration budget for the alternating extremum search.
    pub saddle_maxits: usize,
}

impl Default for EquilibriumOptions {
    fn default() -> Self {
        Self {
            saddle_atol: 1e-12,
            saddle_maxits: 50,
        }
    }
}

/// Owns the flux field, critical points, wall, and the set of poloidal
/// [`EquilibriumRegion`]s derived from them.
pub struct Equilibrium {
    psi_interp: Box<dyn PsiInterpolator>,
    x_points: Vec<Point2D>,
    magnetic_axis: Point2D,
    psi_axis: f64,
    wall: WallPolygon,
    bounding_box: (f64, f64, f64, f64),
    fpol: Box<dyn Fn(f64) -> f64>,
    fpol_prime: Box<dyn Fn(f64) -> f64>,
    bt_axis: f64,
    regions: BTreeMap<String, EquilibriumRegion>,
    opts: EquilibriumOptions,
}

impl Equilibrium {
    /// Constructs an `Equilibrium` from the external contract named in the interface spec:
    /// a psi interpolator, an ordered (primary-first) list of X-points, a closed CCW wall, the
    /// bounding box, and `fpol(psi)`.
    #[must_use]
    pub fn new(
        psi_interp: Box<dyn PsiInterpolator>,
        x_points: Vec<Point2D>,
        psi_axis_point: Point2D,
        wall: WallPolygon,
        bounding_box: (f64, f64, f64, f64),
        fpol: Box<dyn Fn(f64) -> f64>,
        fpol_prime: Box<dyn Fn(f64) -> f64>,
        bt_axis: f64,
        opts: EquilibriumOptions,
    ) -> Self {
        let psi_axis = psi_interp.psi(psi_axis_point);
        Self {
            psi_interp,
            x_points,
            magnetic_axis: psi_axis_point,
            psi_axis,
            wall,
            bounding_box,
            fpol,
            fpol_prime,
            bt_axis,
            regions: BTreeMap::new(),
            opts,
        }
    }

    /// The psi interpolator supplied at construction.
    #[must_use]
    pub fn psi_interp(&self) -> &dyn PsiInterpolator {
        self.psi_interp.as_ref()
    }

    /// The ordered (primary-first) X-point list.
    #[must_use]
    pub fn x_points(&self) -> &[Point2D] {
        &self.x_points
    }

    /// The primary X-point, i.e. the one through which the separatrix that bounds the core
    /// passes.
    #[must_use]
    pub fn primary_x_point(&self) -> Option<Point2D> {
        self.x_points.first().copied()
    }

    /// psi evaluated at the magnetic axis (O-point), used by [`Equilibrium::psi_normalised`].
    #[must_use]
    pub fn psi_axis(&self) -> f64 {
        self.psi_axis
    }

    /// The magnetic axis (O-point) location, used by [`Equilibrium::identify_single_null_regions`]
    /// to classify separatrix branches as core-ward or leg-ward.
    #[must_use]
    pub fn magnetic_axis(&self) -> Point2D {
        self.magnetic_axis
    }

    /// `fpol(psi)`, the poloidal current function (`Bt = fpol(psi) / R`).
    #[must_use]
    pub fn fpol(&self, psi: f64) -> f64 {
        (self.fpol)(psi)
    }

    /// `d(fpol)/d(psi)`.
    #[must_use]
    pub fn fpol_prime(&self, psi: f64) -> f64 {
        (self.fpol_prime)(psi)
    }

    /// Vacuum toroidal field scale (`Bt_axis`).
    #[must_use]
    pub fn bt_axis(&self) -> f64 {
        self.bt_axis
    }

    /// `(Rmin, Rmax, Zmin, Zmax)` bounding box of the equilibrium's valid domain.
    #[must_use]
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        self.bounding_box
    }

    /// The first-wall polygon.
    #[must_use]
    pub fn wall(&self) -> &WallPolygon {
        &self.wall
    }

    /// psi normalised to `[0, 1]` between the magnetic axis and a given boundary value; an
    /// internal convenience used by the sqrt-family spacing law's X-point handling, not part of
    /// the public contour data model.
    #[must_use]
    pub fn psi_normalised(&self, psi: f64, psi_boundary: f64) -> f64 {
        (psi - self.psi_axis) / (psi_boundary - self.psi_axis)
    }

    /// Named [`EquilibriumRegion`]s, keyed by connection name (e.g. `"inner_lower_divertor"`).
    #[must_use]
    pub fn regions(&self) -> &BTreeMap<String, EquilibriumRegion> {
        &self.regions
    }

    /// Inserts (or replaces) a named region.
    pub fn insert_region(&mut self, name: impl Into<String>, region: EquilibriumRegion) {
        self.regions.insert(name.into(), region);
    }

    /// `wallIntersection(p1, p2)`: delegates to segment intersection against every wall edge and
    /// asserts at most one distinct geometric intersection (duplicate intersections within
    /// tolerance are tolerated by [`find_intersections`]'s own deduplication).
    ///
    /// # Errors
    /// - [`ContourError::Common`] (wrapping [`gridgen_common::CommonError::NoIntersection`]) if
    ///   the segment does not cross the wall.
    /// - [`ContourError::Consistency`] if more than one distinct intersection point is found.
    pub fn wall_intersection(&self, p1: Point2D, p2: Point2D) -> Result<Point2D, ContourError> {
        let mut hits = Vec::new();
        for (edge_start, edge_end) in self.wall.edges() {
            if let Ok(mut edge_hits) = find_intersections(&[edge_start, edge_end], p1, p2) {
                hits.append(&mut edge_hits);
            }
        }
        if hits.is_empty() {
            return Err(gridgen_common::CommonError::NoIntersection {
                tolerance: gridgen_common::INTERSECT_TOLERANCE,
            }
            .into());
        }
        if hits.len() > 1 {
            return Err(ContourError::Consistency(format!(
                "segment crosses the wall at {} distinct points, expected at most one",
                hits.len()
            )));
        }
        Ok(hits[0])
    }

    /// `findSaddlePoint(p1, p2)`: on the square spanned by `p1`/`p2`, alternately
    /// 1D-maximises/minimises psi along a vertical then a horizontal line through the current
    /// estimate until the two extremum lines cross within [`EquilibriumOptions::saddle_atol`].
    ///
    /// `maximise_vertical` selects whether psi is maximised along the vertical search direction
    /// (and minimised along the horizontal) or vice versa, matching the saddle's orientation.
    ///
    /// # Errors
    /// [`ContourError::Solution`] if convergence is not reached within
    /// [`EquilibriumOptions::saddle_maxits`] alternations.
    pub fn find_saddle_point(
        &self,
        p1: Point2D,
        p2: Point2D,
        maximise_vertical: bool,
    ) -> Result<Point2D, ContourError> {
        let (rmin, rmax) = (p1.r.min(p2.r), p1.r.max(p2.r));
        let (zmin, zmax) = (p1.z.min(p2.z), p1.z.max(p2.z));

        let mut estimate = Point2D::new((rmin + rmax) / 2.0, (zmin + zmax) / 2.0);

        for _ in 0..self.opts.saddle_maxits {
            let prev = estimate;

            let vertical = |z: f64| self.psi_interp.psi(Point2D::new(estimate.r, z));
            let new_z = if maximise_vertical {
                find_maximum_1d(vertical, zmin, zmax, self.opts.saddle_atol, 200)
            } else {
                find_minimum_1d(vertical, zmin, zmax, self.opts.saddle_atol, 200)
            }
            .map_err(|e| ContourError::solution("findSaddlePoint", e.to_string()))?;
            estimate.z = new_z;

            let horizontal = |r: f64| self.psi_interp.psi(Point2D::new(r, estimate.z));
            let new_r = if maximise_vertical {
                find_minimum_1d(horizontal, rmin, rmax, self.opts.saddle_atol, 200)
            } else {
                find_maximum_1d(horizontal, rmin, rmax, self.opts.saddle_atol, 200)
            }
            .map_err(|e| ContourError::solution("findSaddlePoint", e.to_string()))?;
            estimate.r = new_r;

            if (estimate - prev).magnitude() <= self.opts.saddle_atol {
                return Ok(estimate);
            }
        }

        Err(ContourError::solution(
            "findSaddlePoint",
            format!(
                "did not converge within {} alternations",
                self.opts.saddle_maxits
            ),
        ))
    }

    /// `identifyRegions`, scoped to the single-X-point (single-null) case: discovers the
    /// poloidal region structure from nothing but the stored psi field, primary X-point and
    /// wall, and inserts `"inner_lower_divertor"`, `"inner_core"` and `"outer_lower_divertor"`.
    ///
    /// The four local separatrix branch directions at the X-point are found from the
    /// zero-level set of the psi Hessian's quadratic form, classified as core-ward or leg-ward
    /// by which side of the X-point the magnetic axis lies, then each branch is traced along the
    /// separatrix with a predictor-corrector step re-projected onto the isoline by
    /// [`refine_point`] every step, until the core branch closes back onto the X-point and each
    /// leg branch crosses the wall.
    ///
    /// Topologies with more than one X-point (double-null, disconnected double-null) are out of
    /// scope for this auto-discovery; build those regions by hand with
    /// [`Equilibrium::insert_region`] instead.
    ///
    /// # Errors
    /// - [`ContourError::Configuration`] if there is no primary X-point.
    /// - [`ContourError::Consistency`] if the Hessian at the X-point does not split into exactly
    ///   two core-ward and two leg-ward branches.
    /// - [`ContourError::Solution`] if a branch fails to close onto the X-point or reach the
    ///   wall within `discovery.max_trace_steps`.
    pub fn identify_single_null_regions(
        &mut self,
        grid: &RadialGrid,
        discovery: &RegionDiscoveryOptions,
    ) -> Result<(), ContourError> {
        let x0 = self.primary_x_point().ok_or_else(|| {
            ContourError::Configuration("identifyRegions needs a primary X-point".into())
        })?;
        let psi0 = self.psi_interp.psi(x0);

        let axis_dir = (self.magnetic_axis - x0).normalised();
        let (mut core_dirs, mut leg_dirs) = (Vec::new(), Vec::new());
        for direction in self.separatrix_directions(x0) {
            if direction.dot(axis_dir) > 0.0 {
                core_dirs.push(direction);
            } else {
                leg_dirs.push(direction);
            }
        }
        if core_dirs.len() != 2 || leg_dirs.len() != 2 {
            return Err(ContourError::Consistency(format!(
                "expected 2 core-ward and 2 leg-ward separatrix branches at the X-point, found \
                 {} core-ward and {} leg-ward",
                core_dirs.len(),
                leg_dirs.len()
            )));
        }

        let core_points = self.trace_core_loop(x0, core_dirs[0], psi0, discovery)?;
        let (leg_a_points, tangent_a) = self.trace_leg(x0, leg_dirs[0], psi0, discovery)?;
        let (leg_b_points, tangent_b) = self.trace_leg(x0, leg_dirs[1], psi0, discovery)?;

        let mut inner_points = leg_a_points;
        inner_points.reverse();
        let inner_contour = PsiContour::new(inner_points, psi0);
        let inner_ny = inner_contour.points().len() - 1;
        self.insert_region(
            "inner_lower_divertor",
            EquilibriumRegion::new(
                inner_contour,
                vec![Segment {
                    ny: inner_ny,
                    connections: Connections {
                        inner: None,
                        outer: None,
                        lower: None,
                        upper: Some("inner_core".into()),
                    },
                    x_point_start: None,
                    x_point_end: Some(x0),
                    wall_tangent_start: Some(tangent_a),
                    wall_tangent_end: None,
                }],
                grid.psi_vals.clone(),
                grid.spacing,
                grid.separatrix_radial_index,
            ),
        );

        let core_contour = PsiContour::new(core_points, psi0);
        let core_ny = core_contour.points().len() - 1;
        self.insert_region(
            "inner_core",
            EquilibriumRegion::new(
                core_contour,
                vec![Segment {
                    ny: core_ny,
                    connections: Connections {
                        inner: None,
                        outer: None,
                        lower: Some("inner_lower_divertor".into()),
                        upper: Some("outer_lower_divertor".into()),
                    },
                    x_point_start: Some(x0),
                    x_point_end: Some(x0),
                    wall_tangent_start: None,
                    wall_tangent_end: None,
                }],
                grid.psi_vals.clone(),
                grid.spacing,
                grid.separatrix_radial_index,
            ),
        );

        let outer_contour = PsiContour::new(leg_b_points, psi0);
        let outer_ny = outer_contour.points().len() - 1;
        self.insert_region(
            "outer_lower_divertor",
            EquilibriumRegion::new(
                outer_contour,
                vec![Segment {
                    ny: outer_ny,
                    connections: Connections {
                        inner: None,
                        outer: None,
                        lower: Some("inner_core".into()),
                        upper: None,
                    },
                    x_point_start: Some(x0),
                    x_point_end: None,
                    wall_tangent_start: None,
                    wall_tangent_end: Some(tangent_b),
                }],
                grid.psi_vals.clone(),
                grid.spacing,
                grid.separatrix_radial_index,
            ),
        );

        Ok(())
    }

    /// The four local separatrix branch directions at X-point `x0`: the zero-level set of the
    /// Hessian's quadratic form `a*dr^2 + 2*c*dr*dz + b*dz^2 = 0`, solved for slope `m = dz/dr`
    /// and returned as `[d1, -d1, d2, -d2]` for the two slope roots.
    fn separatrix_directions(&self, x0: Point2D) -> [Point2D; 4] {
        let a = self.psi_interp.d2psi_dr2(x0);
        let b = self.psi_interp.d2psi_dz2(x0);
        let c = self.psi_interp.d2psi_drdz(x0);

        let (d1, d2) = if b.abs() > 1e-12 {
            let disc = (c * c - a * b).max(0.0).sqrt();
            (
                Point2D::new(1.0, (-c + disc) / b),
                Point2D::new(1.0, (-c - disc) / b),
            )
        } else if c.abs() > 1e-12 {
            (Point2D::new(1.0, -a / (2.0 * c)), Point2D::new(0.0, 1.0))
        } else {
            (Point2D::new(1.0, 0.0), Point2D::new(0.0, 1.0))
        };
        [
            d1.normalised(),
            (d1 * -1.0).normalised(),
            d2.normalised(),
            (d2 * -1.0).normalised(),
        ]
    }

    /// One predictor-corrector step of length `step` along the `psi = psi0` isoline from
    /// `current`, returning the refined point and its updated tangent.
    fn trace_step(
        &self,
        current: Point2D,
        tangent: Point2D,
        psi0: f64,
        step: f64,
        discovery: &RegionDiscoveryOptions,
    ) -> Result<(Point2D, Point2D), ContourError> {
        let predicted = current + tangent * step;
        let refined = refine_point(
            self.psi_interp.as_ref(),
            predicted,
            tangent,
            psi0,
            &discovery.refine_methods,
            discovery.refine,
        )?;
        let new_tangent = (refined - current).normalised();
        Ok((refined, new_tangent))
    }

    /// Traces the closed core loop starting at X-point `x0` along `direction`, stepping until
    /// the path returns within `2 * discovery.trace_step` of `x0` (requiring at least
    /// `MIN_CLOSURE_STEPS` steps first, so the starting point never counts as closure).
    fn trace_core_loop(
        &self,
        x0: Point2D,
        direction: Point2D,
        psi0: f64,
        discovery: &RegionDiscoveryOptions,
    ) -> Result<Vec<Point2D>, ContourError> {
        const MIN_CLOSURE_STEPS: usize = 10;

        let mut points = vec![x0];
        let mut current = x0;
        let mut tangent = direction;
        for step_idx in 0..discovery.max_trace_steps {
            let (next, next_tangent) =
                self.trace_step(current, tangent, psi0, discovery.trace_step, discovery)?;
            current = next;
            tangent = next_tangent;
            points.push(current);
            if step_idx >= MIN_CLOSURE_STEPS
                && (current - x0).magnitude() < discovery.trace_step * 2.0
            {
                return Ok(points);
            }
        }
        Err(ContourError::solution(
            "identifyRegions::core",
            "core loop did not close back onto the X-point",
        ))
    }

    /// Traces a divertor leg starting at X-point `x0` along `direction`, stepping until the
    /// segment between consecutive points crosses the wall; the exact wall-crossing point
    /// replaces the final step, and its approach tangent is returned for the region's
    /// wall-tangent marker.
    fn trace_leg(
        &self,
        x0: Point2D,
        direction: Point2D,
        psi0: f64,
        discovery: &RegionDiscoveryOptions,
    ) -> Result<(Vec<Point2D>, Point2D), ContourError> {
        let mut points = vec![x0];
        let mut current = x0;
        let mut tangent = direction;
        for _ in 0..discovery.max_trace_steps {
            let (next, next_tangent) =
                self.trace_step(current, tangent, psi0, discovery.trace_step, discovery)?;
            if let Ok(hit) = self.wall_intersection(current, next) {
                points.push(hit);
                return Ok((points, next_tangent));
            }
            current = next;
            tangent = next_tangent;
            points.push(current);
        }
        Err(ContourError::solution(
            "identifyRegions::leg",
            "leg did not reach the wall",
        ))
    }
}

impl std::fmt::Debug for Equilibrium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equilibrium")
            .field("x_points", &self.x_points)
            .field("psi_axis", &format!("{:.7}", self.psi_axis))
            .field("bt_axis", &format!("{:.7}", self.bt_axis))
            .field("regions", &self.regions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Saddle;

    impl PsiInterpolator for Saddle {
        fn psi(&self, p: Point2D) -> f64 {
            p.r.powi(2) - p.z.powi(2)
        }
        fn dpsi_dr(&self, p: Point2D) -> f64 {
            2.0 * p.r
        }
        fn dpsi_dz(&self, p: Point2D) -> f64 {
            -2.0 * p.z
        }
        fn d2psi_dr2(&self, _p: Point2D) -> f64 {
            2.0
        }
        fn d2psi_dz2(&self, _p: Point2D) -> f64 {
            -2.0
        }
        fn d2psi_drdz(&self, _p: Point2D) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_wall_polygon_normalises_orientation() {
        let cw = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, 0.0),
        ];
        let wall = WallPolygon::from_points(cw).unwrap();
        assert!(signed_area(wall.vertices()) > 0.0);
    }

    #[test]
    fn test_wall_intersection_straight_segment() {
        let wall = WallPolygon::from_points(vec![
            Point2D::new(-1.0, -1.0),
            Point2D::new(-1.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, -1.0),
        ])
        .unwrap();
        let eq = Equilibrium::new(
            Box::new(Saddle),
            vec![Point2D::new(0.0, 0.0)],
            Point2D::new(0.0, 0.0),
            wall,
            (-1.0, 1.0, -1.0, 1.0),
            Box::new(|_psi| 1.0),
            Box::new(|_psi| 0.0),
            1.0,
            EquilibriumOptions::default(),
        );
        let hit = eq
            .wall_intersection(Point2D::new(0.0, 0.0), Point2D::new(2.0, 0.0))
            .unwrap();
        assert!((hit.r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_separatrix_directions_on_saddle() {
        let wall = WallPolygon::from_points(vec![
            Point2D::new(-1.0, -1.0),
            Point2D::new(-1.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, -1.0),
        ])
        .unwrap();
        let eq = Equilibrium::new(
            Box::new(Saddle),
            vec![Point2D::new(0.0, 0.0)],
            Point2D::new(0.5, 0.5),
            wall,
            (-1.0, 1.0, -1.0, 1.0),
            Box::new(|_psi| 1.0),
            Box::new(|_psi| 0.0),
            1.0,
            EquilibriumOptions::default(),
        );
        let directions = eq.separatrix_directions(Point2D::new(0.0, 0.0));
        let diag = std::f64::consts::FRAC_1_SQRT_2;
        let expect_one_of = |d: Point2D| {
            let candidates = [
                Point2D::new(diag, diag),
                Point2D::new(diag, -diag),
                Point2D::new(-diag, diag),
                Point2D::new(-diag, -diag),
            ];
            assert!(
                candidates.iter().any(|&c| (c - d).magnitude() < 1e-9),
                "direction {d:?} is not a 45-degree diagonal"
            );
        };
        for d in directions {
            expect_one_of(d);
        }
    }

    #[test]
    fn test_trace_leg_reaches_wall() {
        struct LinearZ;
        impl PsiInterpolator for LinearZ {
            fn psi(&self, p: Point2D) -> f64 {
                p.z
            }
            fn dpsi_dr(&self, _p: Point2D) -> f64 {
                0.0
            }
            fn dpsi_dz(&self, _p: Point2D) -> f64 {
                1.0
            }
            fn d2psi_dr2(&self, _p: Point2D) -> f64 {
                0.0
            }
            fn d2psi_dz2(&self, _p: Point2D) -> f64 {
                0.0
            }
            fn d2psi_drdz(&self, _p: Point2D) -> f64 {
                0.0
            }
        }

        let wall = WallPolygon::from_points(vec![
            Point2D::new(-1.0, -1.0),
            Point2D::new(-1.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, -1.0),
        ])
        .unwrap();
        let eq = Equilibrium::new(
            Box::new(LinearZ),
            vec![Point2D::new(0.0, 0.0)],
            Point2D::new(0.0, 0.0),
            wall,
            (-1.0, 1.0, -1.0, 1.0),
            Box::new(|_psi| 1.0),
            Box::new(|_psi| 0.0),
            1.0,
            EquilibriumOptions::default(),
        );
        let discovery = RegionDiscoveryOptions {
            trace_step: 0.07,
            max_trace_steps: 100,
            ..RegionDiscoveryOptions::default()
        };
        let (points, _tangent) = eq
            .trace_leg(Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0), 0.0, &discovery)
            .unwrap();
        let last = *points.last().expect("trace_leg returns at least one point");
        assert!((last.r - 1.0).abs() < 1e-6, "expected to stop at R=1, got {last:?}");
        assert!(last.z.abs() < 1e-9);
    }

    #[test]
    fn test_trace_core_loop_closes_on_circle() {
        let wall = WallPolygon::from_points(vec![
            Point2D::new(-10.0, -10.0),
            Point2D::new(-10.0, 10.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, -10.0),
        ])
        .unwrap();
        let eq = Equilibrium::new(
            Box::new(crate::testing::AnalyticPsi::default()),
            vec![Point2D::new(2.5, 0.0)],
            Point2D::new(1.5, 0.0),
            wall,
            (-10.0, 10.0, -10.0, 10.0),
            Box::new(|_psi| 1.0),
            Box::new(|_psi| 0.0),
            1.0,
            EquilibriumOptions::default(),
        );
        let discovery = RegionDiscoveryOptions {
            trace_step: 0.2,
            max_trace_steps: 200,
            ..RegionDiscoveryOptions::default()
        };
        let x0 = Point2D::new(2.5, 0.0);
        let points = eq
            .trace_core_loop(x0, Point2D::new(0.0, 1.0), 1.0, &discovery)
            .unwrap();
        assert!(points.len() > 20);
        let last = *points.last().expect("trace_core_loop returns at least one point");
        assert!((last - x0).magnitude() < discovery.trace_step * 2.0);
    }

    #[test]
    fn test_find_saddle_point() {
        let wall = WallPolygon::from_points(vec![
            Point2D::new(-1.0, -1.0),
            Point2D::new(-1.0, 1.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(1.0, -1.0),
        ])
        .unwrap();
        let eq = Equilibrium::new(
            Box::new(Saddle),
            vec![Point2D::new(0.0, 0.0)],
            Point2D::new(0.5, 0.5),
            wall,
            (-1.0, 1.0, -1.0, 1.0),
            Box::new(|_psi| 1.0),
            Box::new(|_psi| 0.0),
            1.0,
            EquilibriumOptions::default(),
        );
        let saddle = eq
            .find_saddle_point(Point2D::new(-0.5, -0.5), Point2D::new(0.5, 0.5), true)
            .unwrap();
        assert!(saddle.magnitude() < 1e-6);
    }
}
