//! Vector arithmetic, segment intersection and bracketed scalar numerics shared by every other
//! `gridgen` crate.

mod cubic;
mod error;
mod extremum;
mod find_roots;
mod intersect;
mod ode;
mod point;
mod roots;

pub use cubic::lagrange_extrapolate;
pub use error::CommonError;
pub use extremum::{find_extremum_1d, find_maximum_1d, find_minimum_1d, ExtremumKind};
pub use find_roots::find_roots_1d;
pub use intersect::{find_intersections, single_intersection, INTERSECT_TOLERANCE};
pub use ode::{integrate, Vec2};
pub use point::Point2D;
pub use roots::{brent, DEFAULT_ATOL};

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CommonError>;
