//! Flux-surface contour tracing and refinement, and the poloidal point-distribution engine:
//! THE CORE's subsystems (a) and (b).

mod equilibrium;
mod error;
mod fine_contour;
mod perp;
mod psi;
mod psi_contour;
mod refine;
mod region;
pub mod spacing;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use equilibrium::{
    Equilibrium, EquilibriumOptions, RadialGrid, RegionDiscoveryOptions, WallPolygon,
};
pub use error::{ContourError, Result};
pub use fine_contour::{FineContour, FineContourOptions};
pub use perp::{follow_perpendicular, FollowPerpendicularOptions};
pub use psi::PsiInterpolator;
pub use psi_contour::PsiContour;
pub use refine::{refine_point, RefineMethod, RefineOptions};
pub use region::{Connections, EquilibriumRegion, Segment, SpacingParams};
