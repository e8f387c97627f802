//! The YAML options file: a single [`Options`] struct deserialized with `serde_yaml`, merged over
//! hard defaults, and translated into the per-crate option structs THE CORE actually consumes.

use std::path::Path;

use gridgen_contours::{
    EquilibriumOptions, FineContourOptions, FollowPerpendicularOptions, RefineMethod,
    RefineOptions, RegionDiscoveryOptions,
};
use gridgen_mesh::{CurvatureType, MeshRegionOptions, PoloidalSpacingMethod, SamplingStrategy};
use serde::Deserialize;

use crate::error::IoError;

/// Every recognized key of the YAML options file, with `serde`'s own defaulting standing in for
/// a hard-coded default table: any key the file omits takes the value `Options::default()` would
/// give it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// `target_poloidal_spacing_length`.
    pub target_poloidal_spacing_length: f64,
    /// `xpoint_poloidal_spacing_length`.
    pub xpoint_poloidal_spacing_length: f64,
    /// `nonorthogonal_target_poloidal_spacing_length`.
    pub nonorthogonal_target_poloidal_spacing_length: f64,
    /// `nonorthogonal_xpoint_poloidal_spacing_length`.
    pub nonorthogonal_xpoint_poloidal_spacing_length: f64,
    /// `nonorthogonal_target_poloidal_spacing_range_inner`.
    pub nonorthogonal_target_poloidal_spacing_range_inner: f64,
    /// `nonorthogonal_target_poloidal_spacing_range_outer`.
    pub nonorthogonal_target_poloidal_spacing_range_outer: f64,
    /// `nonorthogonal_xpoint_poloidal_spacing_range_inner`.
    pub nonorthogonal_xpoint_poloidal_spacing_range_inner: f64,
    /// `nonorthogonal_xpoint_poloidal_spacing_range_outer`.
    pub nonorthogonal_xpoint_poloidal_spacing_range_outer: f64,
    /// `nonorthogonal_radial_range_power`.
    pub nonorthogonal_radial_range_power: f64,
    /// `poloidal_spacing_delta_psi`.
    pub poloidal_spacing_delta_psi: f64,
    /// `polynomial_d_lower`.
    pub polynomial_d_lower: f64,
    /// `polynomial_d_upper`.
    pub polynomial_d_upper: f64,

    /// `orthogonal`.
    pub orthogonal: bool,
    /// `poloidal_spacing_method` ∈ {`sqrt`, `monotonic`}.
    pub poloidal_spacing_method: String,
    /// `nonorthogonal_spacing_method` ∈ {`orthogonal`, `fixed_poloidal`,
    /// `poloidal_orthogonal_combined`, `fixed_perp_lower`, `fixed_perp_upper`,
    /// `perp_orthogonal_combined`, `combined`}.
    pub nonorthogonal_spacing_method: String,
    /// `shiftedmetric`; must be `true`.
    pub shiftedmetric: bool,
    /// `curvature_type` ∈ {`curl(b/B)`, `bxkappa`}.
    pub curvature_type: String,

    /// `refine_width`.
    pub refine_width: f64,
    /// `refine_atol`.
    pub refine_atol: f64,
    /// `refine_methods`, comma-separated, from {newton, line, integrate, `integrate+newton`, none}.
    pub refine_methods: String,
    /// `follow_perpendicular_rtol`.
    pub follow_perpendicular_rtol: f64,
    /// `follow_perpendicular_atol`.
    pub follow_perpendicular_atol: f64,
    /// `finecontour_Nfine`.
    pub finecontour_nfine: usize,
    /// `finecontour_atol`.
    pub finecontour_atol: f64,
    /// `finecontour_maxits`.
    pub finecontour_maxits: usize,
    /// `geometry_rtol`.
    pub geometry_rtol: f64,
    /// `sfunc_checktol`.
    pub sfunc_checktol: f64,

    /// `y_boundary_guards`.
    pub y_boundary_guards: usize,
    /// Radial grid-line count shared by every segment (the "per-segment nx" key, applied
    /// uniformly rather than per segment — see `DESIGN.md`).
    pub nx: usize,

    /// Interpolation type name passed to [`crate::psi_interp::GeqdskPsiInterpolator::new`].
    pub psi_interpolation_type: String,
}

impl Default for Options {
    fn default() -> Self {
        let refine = RefineOptions::default();
        let fc = FineContourOptions::default();
        let follow = FollowPerpendicularOptions::default();
        let mesh = MeshRegionOptions::default();
        Self {
            target_poloidal_spacing_length: 0.1,
            xpoint_poloidal_spacing_length: 0.02,
            nonorthogonal_target_poloidal_spacing_length: 0.1,
            nonorthogonal_xpoint_poloidal_spacing_length: 0.02,
            nonorthogonal_target_poloidal_spacing_range_inner: 0.1,
            nonorthogonal_target_poloidal_spacing_range_outer: 0.1,
            nonorthogonal_xpoint_poloidal_spacing_range_inner: 0.1,
            nonorthogonal_xpoint_poloidal_spacing_range_outer: 0.1,
            nonorthogonal_radial_range_power: 2.0,
            poloidal_spacing_delta_psi: 1e-3,
            polynomial_d_lower: 0.1,
            polynomial_d_upper: 0.1,

            orthogonal: true,
            poloidal_spacing_method: "sqrt".into(),
            nonorthogonal_spacing_method: "orthogonal".into(),
            shiftedmetric: mesh.shiftedmetric,
            curvature_type: "curl(b/B)".into(),

            refine_width: refine.width,
            refine_atol: refine.atol,
            refine_methods: "newton,line".into(),
            follow_perpendicular_rtol: follow.rtol,
            follow_perpendicular_atol: follow.atol,
            finecontour_nfine: fc.n_fine,
            finecontour_atol: fc.atol,
            finecontour_maxits: fc.maxits,
            geometry_rtol: mesh.geometry_rtol,
            sfunc_checktol: mesh.sfunc_checktol,

            y_boundary_guards: mesh.y_boundary_guards,
            nx: 68,

            psi_interpolation_type: "bicubic".into(),
        }
    }
}

impl Options {
    /// Parses `refine_methods` into the ordered method chain [`refine_point`] tries in turn.
    ///
    /// # Errors
    /// [`IoError::Configuration`] if any comma-separated token is not a recognized method name.
    ///
    /// [`refine_point`]: gridgen_contours::refine_point
    pub fn refine_method_chain(&self) -> Result<Vec<RefineMethod>, IoError> {
        self.refine_methods.split(',').map(|tok| parse_refine_method(tok.trim())).collect()
    }

    /// Resolves `curvature_type` into [`CurvatureType`].
    ///
    /// # Errors
    /// [`IoError::Configuration`] if the value is not `curl(b/B)` or `bxkappa`.
    pub fn curvature(&self) -> Result<CurvatureType, IoError> {
        match self.curvature_type.as_str() {
            "curl(b/B)" => Ok(CurvatureType::CurlBOverB),
            "bxkappa" => Ok(CurvatureType::BxKappa),
            other => Err(IoError::Configuration(format!(
                "unknown curvature_type {other:?}, expected \"curl(b/B)\" or \"bxkappa\""
            ))),
        }
    }

    /// Resolves `poloidal_spacing_method` into [`PoloidalSpacingMethod`].
    ///
    /// # Errors
    /// [`IoError::Configuration`] if the value is not `sqrt` or `monotonic`.
    pub fn spacing_method(&self) -> Result<PoloidalSpacingMethod, IoError> {
        match self.poloidal_spacing_method.as_str() {
            "sqrt" => Ok(PoloidalSpacingMethod::Sqrt),
            "monotonic" => Ok(PoloidalSpacingMethod::Monotonic),
            other => Err(IoError::Configuration(format!(
                "unknown poloidal_spacing_method {other:?}, expected \"sqrt\" or \"monotonic\""
            ))),
        }
    }

    /// Resolves `orthogonal`/`nonorthogonal_spacing_method` into the sampling strategy
    /// [`gridgen_mesh::MeshRegion::build`] uses. Every named non-orthogonal method other than
    /// `"orthogonal"` collapses onto [`SamplingStrategy::Combined`] — see `DESIGN.md`.
    ///
    /// # Errors
    /// [`IoError::Configuration`] if `nonorthogonal_spacing_method` names an unrecognized method.
    pub fn sampling_strategy(&self) -> Result<SamplingStrategy, IoError> {
        if self.orthogonal {
            return Ok(SamplingStrategy::Orthogonal);
        }
        match self.nonorthogonal_spacing_method.as_str() {
            "orthogonal" => Ok(SamplingStrategy::Orthogonal),
            "fixed_poloidal" | "poloidal_orthogonal_combined" | "fixed_perp_lower"
            | "fixed_perp_upper" | "perp_orthogonal_combined" | "combined" => {
                Ok(SamplingStrategy::Combined)
            }
            other => Err(IoError::Configuration(format!(
                "unknown nonorthogonal_spacing_method {other:?}"
            ))),
        }
    }

    /// Resolved [`RefineOptions`].
    #[must_use]
    pub fn refine_options(&self) -> RefineOptions {
        RefineOptions {
            atol: self.refine_atol,
            width: self.refine_width,
            ..RefineOptions::default()
        }
    }

    /// Resolved [`FollowPerpendicularOptions`].
    #[must_use]
    pub fn follow_perpendicular_options(&self) -> FollowPerpendicularOptions {
        FollowPerpendicularOptions {
            rtol: self.follow_perpendicular_rtol,
            atol: self.follow_perpendicular_atol,
        }
    }

    /// Resolved [`FineContourOptions`].
    ///
    /// # Errors
    /// [`IoError::Configuration`] if `refine_methods` does not parse.
    pub fn fine_contour_options(&self) -> Result<FineContourOptions, IoError> {
        Ok(FineContourOptions {
            n_fine: self.finecontour_nfine,
            atol: self.finecontour_atol,
            maxits: self.finecontour_maxits,
            refine: self.refine_options(),
            refine_methods: self.refine_method_chain()?,
        })
    }

    /// Resolved [`RegionDiscoveryOptions`], with hard-coded tracing step/budget matching
    /// [`RegionDiscoveryOptions::default`] since no YAML key names them.
    ///
    /// # Errors
    /// [`IoError::Configuration`] if `refine_methods` does not parse.
    pub fn region_discovery_options(&self) -> Result<RegionDiscoveryOptions, IoError> {
        Ok(RegionDiscoveryOptions {
            refine_methods: self.refine_method_chain()?,
            refine: self.refine_options(),
            ..RegionDiscoveryOptions::default()
        })
    }

    /// Resolved [`EquilibriumOptions`], unaffected by any recognized key (saddle-search tolerances
    /// have no corresponding YAML key; [`EquilibriumOptions::default`] stands).
    #[must_use]
    pub fn equilibrium_options(&self) -> EquilibriumOptions {
        EquilibriumOptions::default()
    }

    /// Resolved [`MeshRegionOptions`].
    ///
    /// # Errors
    /// [`IoError::Configuration`] if `shiftedmetric` is `false`, or any enum-valued key fails to
    /// parse.
    pub fn mesh_region_options(&self) -> Result<MeshRegionOptions, IoError> {
        if !self.shiftedmetric {
            return Err(IoError::Configuration(
                "shiftedmetric=false is not supported; only shifted-metric output is implemented"
                    .into(),
            ));
        }
        Ok(MeshRegionOptions {
            y_boundary_guards: self.y_boundary_guards,
            sampling: self.sampling_strategy()?,
            fc_opts: self.fine_contour_options()?,
            follow_opts: self.follow_perpendicular_options(),
            refine_methods: self.refine_method_chain()?,
            refine_opts: self.refine_options(),
            geometry_rtol: self.geometry_rtol,
            sfunc_checktol: self.sfunc_checktol,
            shiftedmetric: self.shiftedmetric,
            curvature_type: self.curvature()?,
        })
    }
}

impl Options {
    /// Builds the radial grid-line psi-values used to seed region discovery: `nx` points linearly
    /// spaced from `psi_axis` out to as far beyond the separatrix (`psi_sep`) as the core extends
    /// inward from it, with the separatrix itself landing at the midpoint index. A real deployment
    /// would size the core/SOL split per segment from the recognized `nx`/`ny` keys; this
    /// symmetric split is the simplification this crate makes — see `DESIGN.md`.
    #[must_use]
    pub fn radial_grid(
        &self,
        psi_axis: f64,
        psi_sep: f64,
    ) -> gridgen_contours::RadialGrid {
        let half = self.nx / 2;
        let span = psi_sep - psi_axis;
        let psi_vals: Vec<f64> = (0..self.nx)
            .map(|i| psi_axis + span * (i as f64) / (half.max(1) as f64))
            .collect();
        gridgen_contours::RadialGrid {
            psi_vals,
            spacing: self.spacing_params(),
            separatrix_radial_index: half,
        }
    }

    /// Resolves the sqrt/monotonic spacing-law coefficients shared by every generated region.
    #[must_use]
    pub fn spacing_params(&self) -> gridgen_contours::SpacingParams {
        gridgen_contours::SpacingParams {
            sqrt_a_lower: Some(self.xpoint_poloidal_spacing_length),
            sqrt_b_lower: self.target_poloidal_spacing_length,
            sqrt_a_upper: Some(self.xpoint_poloidal_spacing_length),
            sqrt_b_upper: self.target_poloidal_spacing_length,
            monotonic_d_lower: self.polynomial_d_lower,
            monotonic_d_upper: self.polynomial_d_upper,
            nonorthogonal_range_lower: self.nonorthogonal_xpoint_poloidal_spacing_range_inner,
            nonorthogonal_range_upper: self.nonorthogonal_xpoint_poloidal_spacing_range_outer,
            n_norm: self.target_poloidal_spacing_length * self.nx as f64,
        }
    }
}

fn parse_refine_method(token: &str) -> Result<RefineMethod, IoError> {
    match token {
        "newton" => Ok(RefineMethod::Newton),
        "line" => Ok(RefineMethod::Line),
        "integrate" => Ok(RefineMethod::Integrate),
        "integrate+newton" => Ok(RefineMethod::IntegrateNewton),
        "none" => Ok(RefineMethod::None),
        other => Err(IoError::Configuration(format!(
            "unknown refine method {other:?}, expected one of newton, line, integrate, \
             integrate+newton, none"
        ))),
    }
}

/// Loads an [`Options`] value from a YAML file at `path`, or the hard-coded default if `path` is
/// `None` (the CLI's options-file argument is optional).
///
/// # Errors
/// [`IoError::Io`] if the file cannot be read; [`IoError::Yaml`] if it does not deserialize.
pub fn load_options(path: Option<&Path>) -> Result<Options, IoError> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let text = std::fs::read_to_string(path)?;
    let options: Options = serde_yaml::from_str(&text)?;
    Ok(options)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_options_resolve_every_group() {
        let opts = Options::default();
        opts.refine_method_chain().expect("default refine_methods should parse");
        opts.curvature().expect("default curvature_type should parse");
        opts.spacing_method().expect("default poloidal_spacing_method should parse");
        opts.sampling_strategy().expect("default sampling strategy should resolve");
        opts.mesh_region_options().expect("default options should build MeshRegionOptions");
    }

    #[test]
    fn test_shiftedmetric_false_is_rejected() {
        let mut opts = Options::default();
        opts.shiftedmetric = false;
        assert!(opts.mesh_region_options().is_err());
    }

    #[test]
    fn test_unknown_curvature_type_is_rejected() {
        let mut opts = Options::default();
        opts.curvature_type = "nonsense".into();
        assert!(opts.curvature().is_err());
    }

    #[test]
    fn test_radial_grid_places_separatrix_at_midpoint() {
        let opts = Options::default();
        let grid = opts.radial_grid(0.0, 1.0);
        assert_eq!(grid.psi_vals.len(), opts.nx);
        assert_eq!(grid.separatrix_radial_index, opts.nx / 2);
        assert!((grid.psi_vals[grid.separatrix_radial_index] - 1.0).abs() < 1e-9);
        for window in grid.psi_vals.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn test_yaml_overrides_merge_over_defaults() {
        let yaml = "orthogonal: false\nnonorthogonal_spacing_method: combined\n";
        let opts: Options = serde_yaml::from_str(yaml).expect("partial yaml should deserialize");
        assert!(!opts.orthogonal);
        assert_eq!(
            opts.target_poloidal_spacing_length,
            Options::default().target_poloidal_spacing_length
        );
        assert!(matches!(
            opts.sampling_strategy().expect("combined should resolve"),
            SamplingStrategy::Combined
        ));
    }
}
