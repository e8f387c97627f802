/// Errors raised while tracing and regridding flux-surface contours.
///
/// Variants are grouped along the four error kinds named in the external interface contract:
/// [`ContourError::Solution`] (numerical non-convergence, recoverable by
/// [`crate::psi_contour::RefineMethod`] fallback), [`ContourError::Configuration`] (bad option
/// value), [`ContourError::Consistency`] (internal invariant violated) and
/// [`ContourError::Topology`] (irreconcilable region structure).
#[derive(thiserror::Error, Debug)]
pub enum ContourError {
    /// A numerical method failed to converge. May be caught by `refinePoint`'s method-chain
    /// fallback; otherwise surfaced to the caller.
    #[error("solution error in {context}: {message}")]
    Solution {
        /// Name of the contour/region/routine where the failure occurred.
        context: String,
        /// Human-readable detail.
        message: String,
    },

    /// An option value is invalid or unsupported.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal invariant was violated (non-monotonic spacing function, more than one wall
    /// intersection where at most one is expected, etc).
    #[error("consistency error: {0}")]
    Consistency(String),

    /// From [`gridgen_common::CommonError`] (root-finding / intersection / ODE failures), wrapped
    /// as a solution error since that is how this crate's callers recover from them.
    #[error("{0}")]
    Common(#[from] gridgen_common::CommonError),
}

impl ContourError {
    /// Builds a [`ContourError::Solution`] naming `context`.
    pub fn solution(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Solution {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, ContourError>;
