//! Reader and writer for the NumPy `.npy` array format, restricted to 2-D
//! float matrices.
//!
//! Files are written as format version 1.0 with dtype `<f4` in C order,
//! which is what `numpy.save` produces for a `float32` array, so an index
//! directory can be inspected with `numpy.load("vectors.npy")`.
//!
//! Reading additionally accepts versions 2.0/3.0, big-endian data,
//! `float64` data (narrowed to `f32`), and Fortran order.
//!
//! # Layout
//!
//! ```text
//! \x93NUMPY <major> <minor> <header_len: u16 LE (v1) | u32 LE (v2+)>
//! {'descr': '<f4', 'fortran_order': False, 'shape': (N, D), }   <- space padded, '\n' terminated
//! N × D little-endian f32 values, row-major
//! ```

use crate::error::{Result, StoreError};
use crate::matrix::Matrix;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Total preamble + header length is padded to a multiple of this.
const HEADER_ALIGN: usize = 64;

/// Encode a matrix as `.npy` v1.0 bytes.
pub fn encode(matrix: &Matrix) -> Vec<u8> {
    let (rows, cols) = matrix.shape();
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );

    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding + matrix.as_slice().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    // The dict for a 2-D shape is far below u16::MAX.
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for &v in matrix.as_slice() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F4 { little: bool },
    F8 { little: bool },
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self> {
        match descr {
            "<f4" => Ok(Dtype::F4 { little: true }),
            ">f4" => Ok(Dtype::F4 { little: false }),
            "<f8" => Ok(Dtype::F8 { little: true }),
            ">f8" => Ok(Dtype::F8 { little: false }),
            other => Err(corrupt(format!("unsupported matrix dtype '{}'", other))),
        }
    }

    fn item_size(self) -> usize {
        match self {
            Dtype::F4 { .. } => 4,
            Dtype::F8 { .. } => 8,
        }
    }

    fn read(self, bytes: &[u8]) -> f32 {
        match self {
            Dtype::F4 { little } => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                if little {
                    f32::from_le_bytes(b)
                } else {
                    f32::from_be_bytes(b)
                }
            }
            Dtype::F8 { little } => {
                let b = [
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ];
                let v = if little {
                    f64::from_le_bytes(b)
                } else {
                    f64::from_be_bytes(b)
                };
                v as f32
            }
        }
    }
}

/// Decode `.npy` bytes holding a 2-D float matrix.
pub fn decode(bytes: &[u8]) -> Result<Matrix> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(corrupt("matrix file is not in .npy format"));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(corrupt("truncated .npy preamble"));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
            (len, 12)
        }
        other => return Err(corrupt(format!("unsupported .npy version {}", other))),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(corrupt("truncated .npy header"));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| corrupt("non-UTF-8 .npy header"))?;

    let dtype = Dtype::parse(&parse_quoted(dict_value(header, "descr")?)?)?;
    let fortran_order = parse_bool(dict_value(header, "fortran_order")?)?;
    let shape = parse_shape(dict_value(header, "shape")?)?;
    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        _ => {
            return Err(corrupt(format!(
                "expected a 2-D matrix, found shape {:?}",
                shape
            )))
        }
    };

    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| corrupt("matrix shape overflows"))?;
    let needed = count
        .checked_mul(dtype.item_size())
        .ok_or_else(|| corrupt("matrix shape overflows"))?;
    let payload = &bytes[data_start..];
    if payload.len() != needed {
        return Err(corrupt(format!(
            "matrix data holds {} bytes but shape ({}, {}) needs {}",
            payload.len(),
            rows,
            cols,
            needed
        )));
    }

    let values: Vec<f32> = payload
        .chunks_exact(dtype.item_size())
        .map(|b| dtype.read(b))
        .collect();

    let data = if fortran_order {
        // Column-major on disk: element (r, c) sits at c * rows + r.
        let mut row_major = vec![0.0f32; count];
        for r in 0..rows {
            for c in 0..cols {
                row_major[r * cols + c] = values[c * rows + r];
            }
        }
        row_major
    } else {
        values
    };

    Matrix::new(rows, cols, data)
}

fn corrupt(msg: impl Into<String>) -> StoreError {
    StoreError::Corrupt(msg.into())
}

/// Text following `'key':` in the header dict.
fn dict_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    for quote in ['\'', '"'] {
        let needle = format!("{quote}{key}{quote}");
        if let Some(pos) = header.find(&needle) {
            let rest = header[pos + needle.len()..].trim_start();
            if let Some(rest) = rest.strip_prefix(':') {
                return Ok(rest.trim_start());
            }
        }
    }
    Err(corrupt(format!(".npy header is missing '{}'", key)))
}

fn parse_quoted(value: &str) -> Result<String> {
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| corrupt("malformed .npy descr"))?;
    let inner = &value[1..];
    let end = inner
        .find(quote)
        .ok_or_else(|| corrupt("malformed .npy descr"))?;
    Ok(inner[..end].to_string())
}

fn parse_bool(value: &str) -> Result<bool> {
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(corrupt("malformed .npy fortran_order"))
    }
}

fn parse_shape(value: &str) -> Result<Vec<usize>> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.find(')').map(|end| &v[..end]))
        .ok_or_else(|| corrupt("malformed .npy shape"))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // NumPy may write long integers as `3L` on old versions.
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| corrupt(format!("malformed .npy shape entry '{}'", s)))
        })
        .collect()
}
