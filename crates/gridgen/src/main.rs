//! `gridgen <geqdsk-file> [<options.yaml>]`: reads a tokamak equilibrium, builds a
//! flux-surface-aligned mesh, and writes a BOUT++ grid file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gridgen_common::{find_maximum_1d, find_minimum_1d, Point2D};
use gridgen_contours::{Equilibrium, PsiInterpolator, WallPolygon};
use gridgen_io::GeqdskPsiInterpolator;
use gridgen_mesh::Mesh;
use tracing::info;

/// Command-line arguments: a required G-EQDSK file and an optional YAML options file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the G-EQDSK equilibrium file.
    geqdsk_file: PathBuf,

    /// Path to an optional YAML options file; recognized keys fall back to hard defaults.
    options_file: Option<PathBuf>,

    /// Where to write the grid file.
    #[arg(short, long, default_value = "bout.grd.nc")]
    output: PathBuf,

    /// Overwrite `--output` if it already exists.
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    if cli.output.exists() && !cli.force {
        anyhow::bail!(
            "refusing to overwrite existing grid file {} (pass --force to overwrite)",
            cli.output.display()
        );
    }

    info!(path = %cli.geqdsk_file.display(), "reading g-eqdsk file");
    let geqdsk = gridgen_io::read_geqdsk(&cli.geqdsk_file)
        .with_context(|| format!("reading g-eqdsk file {}", cli.geqdsk_file.display()))?;

    let options =
        gridgen_io::load_options(cli.options_file.as_deref()).context("loading options file")?;

    let equilibrium = build_equilibrium(&geqdsk, &options).context("constructing equilibrium")?;

    info!(regions = equilibrium.regions().len(), "building mesh");
    let mesh = build_mesh(&equilibrium, &options).context("building mesh")?;

    gridgen_io::write_grid_file(&mesh, &cli.output)
        .with_context(|| format!("writing grid file {}", cli.output.display()))?;

    let mut file = netcdf::append(&cli.output).with_context(|| {
        format!(
            "reopening grid file {} for scalar metadata",
            cli.output.display()
        )
    })?;
    gridgen_io::write_run_scalars(
        &mut file,
        &options.curvature_type,
        equilibrium.bt_axis(),
        options.shiftedmetric,
    )
    .context("writing run scalars")?;

    info!(path = %cli.output.display(), "wrote grid file");
    Ok(())
}

/// Builds an [`Equilibrium`] from the g-file, locating the single primary X-point by a coarse
/// grid search for the minimum of `|grad psi|^2` in the lower half-plane (below the magnetic
/// axis), refined by the same alternating extremum search
/// [`Equilibrium::find_saddle_point`] performs internally, then discovers the single-null
/// poloidal regions.
///
/// Scoped to lower single-null equilibria; double-null X-point search is not implemented — see
/// `DESIGN.md`.
fn build_equilibrium(
    geqdsk: &gridgen_io::GeqdskData,
    options: &gridgen_io::Options,
) -> Result<Equilibrium> {
    let psi_interp = GeqdskPsiInterpolator::new(geqdsk, &options.psi_interpolation_type)
        .context("building bicubic psi interpolator")?;

    let magnetic_axis = Point2D::new(geqdsk.rmaxis, geqdsk.zmaxis);
    let bounding_box = geqdsk.bounding_box();

    let wall_points: Vec<Point2D> = if geqdsk.wall.is_empty() {
        geqdsk
            .boundary
            .iter()
            .map(|&(r, z)| Point2D::new(r, z))
            .collect()
    } else {
        geqdsk.wall.iter().map(|&(r, z)| Point2D::new(r, z)).collect()
    };
    let wall = WallPolygon::from_points(wall_points).context("validating wall polygon")?;

    let coarse_guess = coarse_x_point_guess(&psi_interp, bounding_box, magnetic_axis);
    let x_point = refine_x_point(&psi_interp, coarse_guess, bounding_box, magnetic_axis)
        .context("refining primary X-point")?;

    let psi_grid = geqdsk.psi_grid();
    let fpol_values = geqdsk.fpol.clone();
    let fpol = move |psi: f64| lookup_fpol(&psi_grid, &fpol_values, psi);
    let psi_grid_prime = geqdsk.psi_grid();
    let fpol_values_prime = geqdsk.fpol.clone();
    let fpol_prime = move |psi: f64| lookup_fpol_prime(&psi_grid_prime, &fpol_values_prime, psi);

    let psi_axis_val = psi_interp.psi(magnetic_axis);
    let psi_sep = psi_interp.psi(x_point);

    let mut equilibrium = Equilibrium::new(
        Box::new(psi_interp),
        vec![x_point],
        magnetic_axis,
        wall,
        bounding_box,
        Box::new(fpol),
        Box::new(fpol_prime),
        geqdsk.bcentr * geqdsk.rmaxis,
        options.equilibrium_options(),
    );

    let grid = options.radial_grid(psi_axis_val, psi_sep);
    equilibrium
        .identify_single_null_regions(&grid, &options.region_discovery_options()?)
        .context("discovering poloidal regions from the separatrix")?;

    Ok(equilibrium)
}

/// A coarse scan over a handful of points in the lower half-plane for the location of smallest
/// `|grad psi|^2`, seeding [`refine_x_point`]'s bracket.
fn coarse_x_point_guess(
    psi_interp: &GeqdskPsiInterpolator,
    bounding_box: (f64, f64, f64, f64),
    magnetic_axis: Point2D,
) -> Point2D {
    let (rmin, rmax, zmin, _zmax) = bounding_box;
    const SAMPLES: usize = 40;
    let mut best = Point2D::new(magnetic_axis.r, zmin);
    let mut best_grad_sq = f64::INFINITY;
    for i in 0..SAMPLES {
        for j in 0..SAMPLES {
            let r = rmin + (rmax - rmin) * (i as f64 + 0.5) / SAMPLES as f64;
            let z = zmin + (magnetic_axis.z - zmin) * (j as f64 + 0.5) / SAMPLES as f64;
            let p = Point2D::new(r, z);
            let grad_sq = psi_interp.grad_psi_sq(p);
            if grad_sq < best_grad_sq {
                best_grad_sq = grad_sq;
                best = p;
            }
        }
    }
    best
}

/// Refines a coarse X-point guess by the same alternating vertical/horizontal extremum search
/// [`Equilibrium::find_saddle_point`] performs, run here directly against the interpolator since
/// no `Equilibrium` exists yet to find the X-point through.
fn refine_x_point(
    psi_interp: &GeqdskPsiInterpolator,
    guess: Point2D,
    bounding_box: (f64, f64, f64, f64),
    magnetic_axis: Point2D,
) -> Result<Point2D> {
    let half_width = (bounding_box.1 - bounding_box.0) / 8.0;
    let half_height = (magnetic_axis.z - bounding_box.2).abs() / 4.0;
    let (rmin, rmax) = (guess.r - half_width, guess.r + half_width);
    let (zmin, zmax) = (guess.z - half_height, guess.z + half_height);

    let atol = 1e-10;
    let mut estimate = guess;
    for _ in 0..200 {
        let prev = estimate;
        let vertical = |z: f64| psi_interp.psi(Point2D::new(estimate.r, z));
        estimate.z = find_maximum_1d(vertical, zmin, zmax, atol, 200)
            .map_err(|e| anyhow::anyhow!("vertical saddle search: {e}"))?;
        let horizontal = |r: f64| psi_interp.psi(Point2D::new(r, estimate.z));
        estimate.r = find_minimum_1d(horizontal, rmin, rmax, atol, 200)
            .map_err(|e| anyhow::anyhow!("horizontal saddle search: {e}"))?;
        if (estimate - prev).magnitude() <= atol {
            return Ok(estimate);
        }
    }
    anyhow::bail!("X-point search did not converge within 200 alternations")
}

/// Linearly interpolates `fpol`, tabulated on `psi_grid`, clamping at the table's ends.
fn lookup_fpol(psi_grid: &[f64], fpol: &[f64], psi: f64) -> f64 {
    let last = psi_grid.len() - 1;
    if psi <= psi_grid[0] {
        return fpol[0];
    }
    if psi >= psi_grid[last] {
        return fpol[last];
    }
    let pos = (psi - psi_grid[0]) / (psi_grid[last] - psi_grid[0]) * last as f64;
    let lo = pos.floor().clamp(0.0, (last - 1) as f64) as usize;
    let frac = pos - lo as f64;
    fpol[lo] * (1.0 - frac) + fpol[lo + 1] * frac
}

/// Central-difference derivative of [`lookup_fpol`].
fn lookup_fpol_prime(psi_grid: &[f64], fpol: &[f64], psi: f64) -> f64 {
    let dpsi = (psi_grid[1] - psi_grid[0]).abs().max(1e-12);
    (lookup_fpol(psi_grid, fpol, psi + dpsi) - lookup_fpol(psi_grid, fpol, psi - dpsi))
        / (2.0 * dpsi)
}

/// Builds the mesh from a fully region-populated equilibrium.
fn build_mesh(equilibrium: &Equilibrium, options: &gridgen_io::Options) -> Result<Mesh> {
    let mesh_opts = options.mesh_region_options()?;
    let fpol = |psi: f64| equilibrium.fpol(psi);
    let fpol_prime = |psi: f64| equilibrium.fpol_prime(psi);
    let mesh = Mesh::build(equilibrium, &fpol, &fpol_prime, &mesh_opts)?;
    Ok(mesh)
}
