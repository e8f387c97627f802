/// Errors raised while assembling staggered-grid metrics and mesh topology.
#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    /// From [`gridgen_contours::ContourError`].
    #[error("{0}")]
    Contour(#[from] gridgen_contours::ContourError),

    /// An option value is invalid or unsupported (e.g. `shiftedmetric = false`).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal invariant was violated (bpsign mismatch, Jacobian/metric-determinant
    /// disagreement, `hy <= 0`).
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Regions could not be composed into a single logically-rectangular topology (incompatible
    /// x-sizing, unsupported y-region count, more than two separatrices).
    #[error("topology error: {0}")]
    Topology(String),

    /// ndarray's `ShapeError`, surfaced from array construction/reshaping.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, MeshError>;
