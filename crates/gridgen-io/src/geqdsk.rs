//! A G-EQDSK (`EFIT`-style) equilibrium file reader: the "g-file parser" spec.md treats as an
//! external collaborator, specified only by the data it must hand to [`crate::psi_interp`].
//!
//! The format packs five 16-character fixed-width floating-point fields per line with no
//! separator guaranteed between them, so fields are read by splitting the line stream into
//! 16-character chunks rather than by whitespace. The one exception is the boundary/limiter
//! vertex-count line, which in practice is always whitespace-separated and is read that way.

use ndarray::Array2;

use crate::error::IoError;

/// Every array and scalar a G-EQDSK file carries that this crate's [`crate::psi_interp`] and
/// [`gridgen_contours::Equilibrium`] construction need.
#[derive(Debug, Clone)]
pub struct GeqdskData {
    /// Number of grid points in the R direction.
    pub nw: usize,
    /// Number of grid points in the Z direction.
    pub nh: usize,
    /// Horizontal dimension of the computational domain, in metres.
    pub rdim: f64,
    /// Vertical dimension of the computational domain, in metres.
    pub zdim: f64,
    /// Minimum R of the rectangular grid.
    pub rleft: f64,
    /// Z midpoint of the rectangular grid.
    pub zmid: f64,
    /// R of the magnetic axis.
    pub rmaxis: f64,
    /// Z of the magnetic axis.
    pub zmaxis: f64,
    /// Poloidal flux at the magnetic axis.
    pub simag: f64,
    /// Poloidal flux at the plasma boundary.
    pub sibry: f64,
    /// Vacuum toroidal field at `rcentr`.
    pub bcentr: f64,
    /// Plasma current.
    pub current: f64,
    /// `fpol(psi)`, tabulated on `nw` uniformly-spaced psi values from `simag` to `sibry`.
    pub fpol: Vec<f64>,
    /// Poloidal flux `psi(R, Z)` on the `(nw, nh)` rectangular grid, row-major in `(ir, iz)`.
    pub psirz: Array2<f64>,
    /// Plasma boundary polygon (the LCFS trace, distinct from the first-wall polygon).
    pub boundary: Vec<(f64, f64)>,
    /// First-wall (limiter) polygon.
    pub wall: Vec<(f64, f64)>,
}

impl GeqdskData {
    /// R-coordinates of the rectangular `psirz` grid.
    #[must_use]
    pub fn r_grid(&self) -> Vec<f64> {
        let dr = self.rdim / (self.nw - 1) as f64;
        (0..self.nw).map(|i| self.rleft + i as f64 * dr).collect()
    }

    /// Z-coordinates of the rectangular `psirz` grid.
    #[must_use]
    pub fn z_grid(&self) -> Vec<f64> {
        let dz = self.zdim / (self.nh - 1) as f64;
        let zbottom = self.zmid - self.zdim / 2.0;
        (0..self.nh).map(|i| zbottom + i as f64 * dz).collect()
    }

    /// `psi` uniformly tabulated from `simag` to `sibry`, matching `fpol`'s abscissa.
    #[must_use]
    pub fn psi_grid(&self) -> Vec<f64> {
        let dpsi = (self.sibry - self.simag) / (self.nw - 1) as f64;
        (0..self.nw).map(|i| self.simag + i as f64 * dpsi).collect()
    }

    /// The domain bounding box `(Rmin, Rmax, Zmin, Zmax)`.
    #[must_use]
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let r = self.r_grid();
        let z = self.z_grid();
        (r[0], r[r.len() - 1], z[0], z[z.len() - 1])
    }
}

/// Parses a G-EQDSK file at `path` into [`GeqdskData`].
///
/// # Errors
/// [`IoError::Io`] if the file cannot be read; [`IoError::GeqdskParse`] if the header or a fixed
/// data block does not have the expected shape.
pub fn read_geqdsk(path: &std::path::Path) -> Result<GeqdskData, IoError> {
    let contents = std::fs::read_to_string(path)?;
    parse_geqdsk(&contents)
}

/// Parses G-EQDSK file contents already read into memory, separated out from [`read_geqdsk`] so
/// tests can exercise it on an in-memory fixture.
///
/// # Errors
/// [`IoError::GeqdskParse`] if the header or a fixed data block does not have the expected shape.
pub fn parse_geqdsk(contents: &str) -> Result<GeqdskData, IoError> {
    let lines: Vec<&str> = contents.lines().collect();
    if lines.is_empty() {
        return Err(IoError::GeqdskParse("empty g-file".into()));
    }

    let header = lines[0];
    if header.len() < 48 + 3 * 4 {
        return Err(IoError::GeqdskParse(format!(
            "header line too short: {header:?}"
        )));
    }
    let tail = &header[48..];
    let ints: Vec<i64> = tail
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| IoError::GeqdskParse(format!("header integer fields: {e}")))?;
    let [_idum, nw, nh]: [i64; 3] = ints
        .get(..3)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| IoError::GeqdskParse("expected idum, nw, nh in header".into()))?;
    let (nw, nh) = (nw as usize, nh as usize);

    let mut cursor = FieldCursor::new(&lines[1..]);

    let scalars = cursor.take(20)?;
    let [rdim, zdim, _rcentr, rleft, zmid, rmaxis, zmaxis, simag, sibry, bcentr, current, ..] =
        scalars[..].try_into().unwrap_or([0.0; 20]);

    let fpol = cursor.take(nw)?;
    let _pres = cursor.take(nw)?;
    let _ffprim = cursor.take(nw)?;
    let _pprime = cursor.take(nw)?;
    let psirz_flat = cursor.take(nw * nh)?;
    let _qpsi = cursor.take(nw)?;

    let counts_line = cursor
        .next_raw_line()
        .ok_or_else(|| IoError::GeqdskParse("missing boundary/limiter vertex counts line".into()))?;
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|e| IoError::GeqdskParse(format!("boundary/limiter counts: {e}")))?;
    let &[nbbbs, limitr] = counts
        .get(..2)
        .and_then(|s| <&[usize; 2]>::try_from(s).ok())
        .ok_or_else(|| IoError::GeqdskParse("expected nbbbs, limitr".into()))?;

    let boundary_flat = cursor.take(2 * nbbbs)?;
    let wall_flat = cursor.take(2 * limitr)?;

    // `psirz` is written varying Z fastest (Fortran column-major over (R, Z)): the flat stream is
    // [psi(R0,Z0), psi(R0,Z1), ..., psi(R0,Znh-1), psi(R1,Z0), ...].
    let psirz = Array2::from_shape_vec((nw, nh), psirz_flat)
        .map_err(|e| IoError::GeqdskParse(format!("psirz shape: {e}")))?;

    Ok(GeqdskData {
        nw,
        nh,
        rdim,
        zdim,
        rleft,
        zmid,
        rmaxis,
        zmaxis,
        simag,
        sibry,
        bcentr,
        current,
        fpol,
        psirz,
        boundary: pairwise(&boundary_flat),
        wall: pairwise(&wall_flat),
    })
}

/// Groups a flat `[r0, z0, r1, z1, ...]` stream into `(r, z)` pairs.
fn pairwise(flat: &[f64]) -> Vec<(f64, f64)> {
    flat.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Reads fixed-width (16-character) floating point fields out of a stream of lines, five fields
/// per line, consuming whole lines as needed and tracking position for [`FieldCursor::next_raw_line`]
/// to resume on an unconsumed line boundary.
struct FieldCursor<'a> {
    lines: &'a [&'a str],
    line_ix: usize,
    field_buffer: String,
}

impl<'a> FieldCursor<'a> {
    fn new(lines: &'a [&'a str]) -> Self {
        Self {
            lines,
            line_ix: 0,
            field_buffer: String::new(),
        }
    }

    /// Reads exactly `n` 16-character floating point fields, pulling in whole lines as needed.
    fn take(&mut self, n: usize) -> Result<Vec<f64>, IoError> {
        let needed_chars = n * 16;
        while self.field_buffer.len() < needed_chars {
            let Some(line) = self.lines.get(self.line_ix) else {
                return Err(IoError::GeqdskParse(format!(
                    "ran out of input while reading {n} fixed-width fields"
                )));
            };
            self.field_buffer.push_str(line);
            self.line_ix += 1;
        }
        let mut out = Vec::with_capacity(n);
        let bytes = self.field_buffer.as_bytes();
        for i in 0..n {
            let chunk = std::str::from_utf8(&bytes[i * 16..(i + 1) * 16])
                .map_err(|e| IoError::GeqdskParse(format!("invalid utf8 field: {e}")))?;
            let value: f64 = chunk.trim().parse().map_err(|e| {
                IoError::GeqdskParse(format!("field {i} ({chunk:?}) did not parse as f64: {e}"))
            })?;
            out.push(value);
        }
        self.field_buffer = self.field_buffer[needed_chars..].to_string();
        Ok(out)
    }

    /// Returns the next whole, un-chunked line (used for the `nbbbs`/`limitr` vertex-count line,
    /// which breaks the 16-character fixed-width convention). Requires the fixed-width buffer to
    /// be empty, i.e. called only on a block boundary.
    fn next_raw_line(&mut self) -> Option<&'a str> {
        debug_assert!(
            self.field_buffer.is_empty(),
            "next_raw_line called mid fixed-width block"
        );
        let line = self.lines.get(self.line_ix).copied();
        self.line_ix += 1;
        line
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Builds a minimal synthetic g-file with a flat `psi` field, for exercising the parser's
    /// shape bookkeeping without needing a real EFIT reconstruction on disk.
    fn synthetic_geqdsk(nw: usize, nh: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:<48}{:>4}{:>4}{:>4}\n", "synthetic", 0, nw, nh));

        let field = |v: f64| format!("{v:16.9E}");
        let mut push_block = |values: &[f64]| {
            for chunk in values.chunks(5) {
                let line: String = chunk.iter().map(|v| field(*v)).collect();
                out.push_str(&line);
                out.push('\n');
            }
        };

        push_block(&[1.0, 2.0, 1.7, 0.5, 0.0, 1.7, 0.0, -1.0, 1.0, 2.0, 1e6, -1.0, 0.0, 1.7, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let fpol = vec![2.0; nw];
        push_block(&fpol); // fpol
        push_block(&vec![0.0; nw]); // pres
        push_block(&vec![0.0; nw]); // ffprim
        push_block(&vec![0.0; nw]); // pprime
        push_block(&vec![0.0; nw * nh]); // psirz
        push_block(&vec![1.0; nw]); // qpsi

        out.push_str(&format!("{nbbbs:>5}{limitr:>5}\n", nbbbs = 4, limitr = 4));
        push_block(&[1.0, 0.0, 2.0, 0.0, 2.0, 1.0, 1.0, 1.0]); // boundary
        push_block(&[0.5, -1.0, 2.5, -1.0, 2.5, 1.0, 0.5, 1.0]); // wall

        out
    }

    #[test]
    fn test_parses_synthetic_geqdsk_shapes() {
        let text = synthetic_geqdsk(5, 4);
        let data = parse_geqdsk(&text).expect("synthetic g-file should parse");
        assert_eq!(data.nw, 5);
        assert_eq!(data.nh, 4);
        assert_eq!(data.psirz.dim(), (5, 4));
        assert_eq!(data.fpol.len(), 5);
        assert_eq!(data.boundary.len(), 4);
        assert_eq!(data.wall.len(), 4);
    }

    #[test]
    fn test_r_grid_and_z_grid_span_the_declared_extent() {
        let text = synthetic_geqdsk(3, 3);
        let data = parse_geqdsk(&text).expect("synthetic g-file should parse");
        let r = data.r_grid();
        assert!((r[0] - data.rleft).abs() < 1e-9);
        assert!((r[r.len() - 1] - (data.rleft + data.rdim)).abs() < 1e-9);
    }
}
