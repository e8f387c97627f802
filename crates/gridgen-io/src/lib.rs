//! The G-EQDSK reader, the bicubic `psi` interpolator, the YAML options loader, and the netCDF
//! grid-file writer: THE CORE's external collaborators.

mod error;
mod geqdsk;
mod options;
mod psi_interp;
mod writer;

pub use error::{IoError, Result};
pub use geqdsk::{parse_geqdsk, read_geqdsk, GeqdskData};
pub use options::{load_options, Options};
pub use psi_interp::GeqdskPsiInterpolator;
pub use writer::{write_grid_file, write_run_scalars};
