//! The netCDF grid-file writer: BOUT++ grid files are themselves netCDF, so this module is a
//! direct reuse of the `netcdf` crate rather than a new format to invent.

use gridgen_mesh::{Location, Mesh, MeshError, MultiLocationArray};

use crate::error::IoError;

/// Every 2D field name the grid file carries, at cell centre (shape `(nx, ny)`).
const CENTRE_FIELDS: &[&str] = &[
    "Rxy",
    "Zxy",
    "psixy",
    "dx",
    "dy",
    "Brxy",
    "Bzxy",
    "Bpxy",
    "Btxy",
    "Bxy",
    "hy",
    "dphidy",
    "ShiftTorsion",
    "zShift",
    "g11",
    "g22",
    "g33",
    "g12",
    "g13",
    "g23",
    "J",
    "g_11",
    "g_22",
    "g_33",
    "g_12",
    "g_13",
    "g_23",
    "curl_bOverB_x",
    "curl_bOverB_y",
    "curl_bOverB_z",
    "bxcvx",
    "bxcvy",
    "bxcvz",
];

/// Writes a [`Mesh`]'s assembled fields and topology scalars to a netCDF grid file at `path`.
///
/// Per field, the cell-centre array (shape `(nx, ny)`) is always written; the `ylow` array (shape
/// `(nx, ny+1)`) is written alongside it whenever that location was materialised.
///
/// # Errors
/// [`IoError::Mesh`] if a field named in [`CENTRE_FIELDS`] was not assembled by `mesh` (an
/// internal inconsistency, since [`Mesh::build`] computes every field before returning);
/// [`IoError::Netcdf`] on any netCDF library failure.
pub fn write_grid_file(mesh: &Mesh, path: &std::path::Path) -> Result<(), IoError> {
    let mut file = netcdf::create(path)?;

    let nx = mesh.nx();
    let ny = mesh.ny_noguards();
    file.add_dimension("x", nx)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("y_ylow", ny + 1)?;

    for &name in CENTRE_FIELDS {
        let assembled = mesh.assemble_field(name).ok_or_else(|| {
            IoError::Mesh(MeshError::Consistency(format!(
                "field {name:?} was not assembled; Mesh::build should have computed it"
            )))
        })?;
        write_located_field(&mut file, name, &assembled)?;
    }

    write_scalar(&mut file, "nx", nx as f64)?;
    write_scalar(&mut file, "ny", ny as f64)?;
    write_scalar(&mut file, "y_boundary_guards", mesh.y_boundary_guards() as f64)?;

    let topology = mesh.topology();
    write_scalar(&mut file, "ixseps1", topology.ixseps1 as f64)?;
    write_scalar(&mut file, "ixseps2", topology.ixseps2 as f64)?;
    write_scalar(&mut file, "jyseps1_1", topology.jyseps1_1 as f64)?;
    write_scalar(&mut file, "jyseps2_1", topology.jyseps2_1 as f64)?;
    write_scalar(&mut file, "ny_inner", topology.ny_inner as f64)?;
    write_scalar(&mut file, "jyseps1_2", topology.jyseps1_2 as f64)?;
    write_scalar(&mut file, "jyseps2_2", topology.jyseps2_2 as f64)?;

    Ok(())
}

/// Writes `curvature_type`, `Bt_axis`, and `parallel_transform`, the remaining scalars of the
/// output table that are not derived from [`Mesh`] alone.
///
/// # Errors
/// [`IoError::Netcdf`] on any netCDF library failure.
pub fn write_run_scalars(
    file: &mut netcdf::FileMut,
    curvature_type: &str,
    bt_axis: f64,
    shiftedmetric: bool,
) -> Result<(), IoError> {
    write_text_scalar(file, "curvature_type", curvature_type)?;
    write_scalar(file, "Bt_axis", bt_axis)?;
    let parallel_transform = if shiftedmetric { "shiftedmetric" } else { "identity" };
    write_text_scalar(file, "parallel_transform", parallel_transform)?;
    Ok(())
}

/// Writes one [`MultiLocationArray`] field's centre array, and its `ylow` array if present, as
/// `{name}` and `{name}_ylow` netCDF variables.
fn write_located_field(
    file: &mut netcdf::FileMut,
    name: &str,
    field: &MultiLocationArray,
) -> Result<(), IoError> {
    if let Some(centre) = field.get(Location::Centre) {
        let mut var = file.add_variable::<f64>(name, &["x", "y"])?;
        var.put_values(
            centre
                .as_slice()
                .ok_or_else(|| IoError::Configuration(format!("{name}: centre array not contiguous")))?,
            ..,
        )?;
    }
    if let Some(ylow) = field.get(Location::YLow) {
        let ylow_name = format!("{name}_ylow");
        let mut var = file.add_variable::<f64>(&ylow_name, &["x", "y_ylow"])?;
        var.put_values(
            ylow.as_slice()
                .ok_or_else(|| IoError::Configuration(format!("{name}: ylow array not contiguous")))?,
            ..,
        )?;
    }
    Ok(())
}

/// Writes a single `f64` scalar variable with no dimensions.
fn write_scalar(file: &mut netcdf::FileMut, name: &str, value: f64) -> Result<(), IoError> {
    let mut var = file.add_variable::<f64>(name, &[])?;
    var.put_value(value, ())?;
    Ok(())
}

/// Writes a single fixed-length text attribute, since the netCDF classic data model has no
/// first-class scalar string variable type suited to short enum-like tags.
fn write_text_scalar(file: &mut netcdf::FileMut, name: &str, value: &str) -> Result<(), IoError> {
    file.add_attribute(name, value)?;
    Ok(())
}
