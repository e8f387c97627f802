/// Errors shared by every numerical routine in this crate.
#[derive(thiserror::Error, Debug)]
pub enum CommonError {
    /// [`crate::intersect::find_intersections`] found no crossing between the polyline and the
    /// probe segment.
    #[error("no intersection found within tolerance {tolerance:e}")]
    NoIntersection {
        /// Tolerance used for the orientation/crossing test.
        tolerance: f64,
    },

    /// A bracketed 1D rootfinder (Brent) was not handed a sign change.
    #[error("root search on [{xmin}, {xmax}] has no sign change: f(xmin)={f_xmin}, f(xmax)={f_xmax}")]
    NoSignChange {
        /// Lower bracket bound.
        xmin: f64,
        /// Upper bracket bound.
        xmax: f64,
        /// `f(xmin)`.
        f_xmin: f64,
        /// `f(xmax)`.
        f_xmax: f64,
    },

    /// A bracketed rootfinder or extremum search exceeded its iteration budget.
    #[error("{method} failed to converge after {iterations} iterations (tolerance {tolerance:e})")]
    NotConverged {
        /// Name of the failing method, for diagnostics.
        method: &'static str,
        /// Iterations actually performed.
        iterations: usize,
        /// Requested tolerance.
        tolerance: f64,
    },
}
