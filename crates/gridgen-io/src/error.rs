/// Errors raised by the G-EQDSK reader, the YAML options loader, and the netCDF grid-file writer.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Filesystem failure reading the g-file, the options file, or writing the grid file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The g-file's fixed-format header or data blocks did not parse as expected.
    #[error("g-eqdsk parse error: {0}")]
    GeqdskParse(String),

    /// `serde_yaml` failed to deserialize the options file.
    #[error("options file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An option value is invalid or unsupported (mirrors `ContourError`/`MeshError`'s
    /// `Configuration` variant for errors that originate in this crate).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// From [`rsl_interpolation`]'s spline construction/evaluation.
    #[error("interpolation error: {0}")]
    Interpolation(String),

    /// From the `netcdf` crate, writing the grid file.
    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    /// From [`gridgen_mesh::MeshError`], surfaced while assembling the fields to write.
    #[error("{0}")]
    Mesh(#[from] gridgen_mesh::MeshError),
}

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, IoError>;
