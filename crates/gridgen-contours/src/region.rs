//! `EquilibriumRegion`: a poloidal segment of the separatrix/boundary; owns spacing laws and
//! connection metadata.

use gridgen_common::Point2D;

use crate::psi_contour::PsiContour;

/// The four connection slots a radial sub-region of an [`EquilibriumRegion`] may have.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    /// Name of the region connected on the inner (lower-index) radial side, if any.
    pub inner: Option<String>,
    /// Name of the region connected on the outer (higher-index) radial side, if any.
    pub outer: Option<String>,
    /// Name of the region connected on the lower (start) poloidal side, if any.
    pub lower: Option<String>,
    /// Name of the region connected on the upper (end) poloidal side, if any.
    pub upper: Option<String>,
}

/// Per-radial-segment metadata: cell count, the psi-values bounding it, connections, and
/// X-point/wall-tangent markers at its poloidal ends.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Number of poloidal cells in this segment.
    pub ny: usize,
    /// Connections to neighbouring regions/segments.
    pub connections: Connections,
    /// X-point at the segment's poloidal start, if the segment begins on one.
    pub x_point_start: Option<Point2D>,
    /// X-point at the segment's poloidal end, if the segment ends on one.
    pub x_point_end: Option<Point2D>,
    /// Wall-surface tangent vector at the segment's poloidal start, if a wall is there.
    pub wall_tangent_start: Option<Point2D>,
    /// Wall-surface tangent vector at the segment's poloidal end, if a wall is there.
    pub wall_tangent_end: Option<Point2D>,
}

/// Spacing-law coefficients carried per poloidal end of the region, named after their option
/// keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacingParams {
    /// `sqrt_a_lower`: lower-end sqrt-divergence coefficient (`None` selects the reduced
    /// "only-upper" sub-case).
    pub sqrt_a_lower: Option<f64>,
    /// `sqrt_b_lower`: lower-end finite slope term.
    pub sqrt_b_lower: f64,
    /// `sqrt_a_upper`: upper-end sqrt-divergence coefficient.
    pub sqrt_a_upper: Option<f64>,
    /// `sqrt_b_upper`: upper-end finite slope term.
    pub sqrt_b_upper: f64,
    /// `monotonic_d_lower`: lower-end slope for the monotonic family.
    pub monotonic_d_lower: f64,
    /// `monotonic_d_upper`: upper-end slope for the monotonic family.
    pub monotonic_d_upper: f64,
    /// `nonorthogonal_range_lower[_inner|_outer]`.
    pub nonorthogonal_range_lower: f64,
    /// `nonorthogonal_range_upper[_inner|_outer]`.
    pub nonorthogonal_range_upper: f64,
    /// Normalisation length `N_norm` used by both spacing families.
    pub n_norm: f64,
}

/// A poloidal segment of the separatrix/boundary, extending [`PsiContour`] with the radial
/// sub-region structure and spacing-law configuration needed to build a [`crate::psi_contour`]
/// regridding for each psi-level.
pub struct EquilibriumRegion {
    contour: PsiContour,
    segments: Vec<Segment>,
    psi_vals: Vec<f64>,
    spacing: SpacingParams,
    /// Index into `psi_vals` dividing inside-separatrix radial cells from outside-separatrix
    /// ones.
    separatrix_radial_index: usize,
}

impl EquilibriumRegion {
    /// Builds an `EquilibriumRegion` from its base separatrix contour, per-radial-segment
    /// metadata, the ordered list of radial psi-values, and spacing-law configuration.
    #[must_use]
    pub fn new(
        contour: PsiContour,
        segments: Vec<Segment>,
        psi_vals: Vec<f64>,
        spacing: SpacingParams,
        separatrix_radial_index: usize,
    ) -> Self {
        Self {
            contour,
            segments,
            psi_vals,
            spacing,
            separatrix_radial_index,
        }
    }

    /// The region's base poloidal contour (on the separatrix).
    #[must_use]
    pub fn contour(&self) -> &PsiContour {
        &self.contour
    }

    /// Per-radial-segment metadata.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Ordered radial psi-values defining the region's grid lines.
    #[must_use]
    pub fn psi_vals(&self) -> &[f64] {
        &self.psi_vals
    }

    /// Spacing-law coefficients.
    #[must_use]
    pub fn spacing(&self) -> SpacingParams {
        self.spacing
    }

    /// Index into [`EquilibriumRegion::psi_vals`] dividing inside-separatrix from
    /// outside-separatrix radial cells.
    #[must_use]
    pub fn separatrix_radial_index(&self) -> usize {
        self.separatrix_radial_index
    }

    /// Total poloidal cell count across all segments.
    #[must_use]
    pub fn total_ny(&self) -> usize {
        self.segments.iter().map(|s| s.ny).sum()
    }
}

impl std::fmt::Debug for EquilibriumRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquilibriumRegion")
            .field("n_segments", &self.segments.len())
            .field("total_ny", &self.total_ny())
            .field("psi_vals_len", &self.psi_vals.len())
            .field("separatrix_radial_index", &self.separatrix_radial_index)
            .finish()
    }
}
