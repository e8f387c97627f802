//! Multi-location staggered-grid metric assembly and mesh topology composition: THE CORE's
//! subsystem (c).

mod error;
mod mesh;
mod mesh_region;
mod multi_location;
mod spacing_strategy;

pub use error::MeshError;
pub use mesh::{Mesh, TopologyIndices, BOUT_REGION_ORDER};
pub use mesh_region::{CurvatureType, MeshRegion, MeshRegionOptions, SegmentSpacing};
pub use multi_location::{Location, MultiLocationArray};
pub use spacing_strategy::{build_sfunc_table, PoloidalSpacingMethod, SamplingStrategy};

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, MeshError>;
