//! Binary parameter files.
//!
//! Layout (native endianness, no header):
//!
//! ```text
//! u64 transitions
//! repeat transitions times:
//!     u64 rows, u64 cols
//!     f64 * rows * cols   weight matrix, row-major, (in_width, out_width)
//!     f64 * cols          bias vector
//! ```
//!
//! Reading validates the whole file into a [`Parameters`] before returning, so callers
//! never observe a partially decoded model.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::{Error, Matrix, Parameters, Result};

/// Upper bound on a single weight matrix, to reject corrupted headers before allocating.
const MAX_ELEMENTS: u64 = 1 << 32;

pub fn write_parameters<W: Write>(w: &mut W, params: &Parameters) -> Result<()> {
    write_u64(w, params.transitions() as u64)?;
    for (weights, biases) in params.weights().iter().zip(params.biases()) {
        write_u64(w, weights.rows() as u64)?;
        write_u64(w, weights.cols() as u64)?;
        for &v in weights.as_slice() {
            write_f64(w, v)?;
        }
        for &v in biases {
            write_f64(w, v)?;
        }
    }
    Ok(())
}

pub fn read_parameters<R: Read>(r: &mut R) -> Result<Parameters> {
    let transitions = read_u64(r, "transition count")?;
    if transitions == 0 {
        return Err(Error::Io("parameter file declares zero transitions".to_owned()));
    }

    let mut weights = Vec::new();
    let mut biases = Vec::new();
    for t in 0..transitions {
        let rows = read_u64(r, "rows")?;
        let cols = read_u64(r, "cols")?;
        let len = rows
            .checked_mul(cols)
            .filter(|&n| n > 0 && n <= MAX_ELEMENTS)
            .ok_or_else(|| {
                Error::Io(format!("transition {t}: implausible weight shape {rows}x{cols}"))
            })?;

        let data = read_f64s(r, len as usize, "weights")?;
        let bias = read_f64s(r, cols as usize, "biases")?;
        weights.push(Matrix::from_vec(rows as usize, cols as usize, data)?);
        biases.push(bias);
    }

    Parameters::new(weights, biases)
        .map_err(|e| Error::Io(format!("inconsistent parameter file: {e}")))
}

pub fn save<P: AsRef<Path>>(path: P, params: &Parameters) -> Result<()> {
    let p = path.as_ref();
    let file =
        File::create(p).map_err(|e| Error::io(&format!("failed to create {}", p.display()), e))?;
    let mut w = BufWriter::new(file);
    write_parameters(&mut w, params)?;
    w.flush()
        .map_err(|e| Error::io(&format!("failed to write {}", p.display()), e))
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Parameters> {
    let p = path.as_ref();
    let file = File::open(p).map_err(|e| Error::io(&format!("failed to open {}", p.display()), e))?;
    read_parameters(&mut BufReader::new(file))
}

fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_ne_bytes())
        .map_err(|e| Error::io("failed to write parameters", e))
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_ne_bytes())
        .map_err(|e| Error::io("failed to write parameters", e))
}

fn read_word<R: Read>(r: &mut R, what: &str) -> Result<[u8; 8]> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Io(format!("parameter file truncated while reading {what}")),
        _ => Error::io(&format!("failed to read {what}"), e),
    })?;
    Ok(buf)
}

fn read_u64<R: Read>(r: &mut R, what: &str) -> Result<u64> {
    read_word(r, what).map(u64::from_ne_bytes)
}

fn read_f64s<R: Read>(r: &mut R, n: usize, what: &str) -> Result<Vec<f64>> {
    // Grow as data arrives so a lying header cannot force a huge allocation.
    let mut out = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        out.push(f64::from_ne_bytes(read_word(r, what)?));
    }
    Ok(out)
}
