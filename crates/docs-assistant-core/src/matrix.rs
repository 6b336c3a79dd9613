//! Dense row-major `f32` matrix and the vector math used for retrieval.
//!
//! Row `i` of an index matrix is the embedding of chunk `i`. The shape is
//! fixed once built; every row has the same number of columns.

use std::cmp::Ordering;

use crate::error::{Result, StoreError};

/// Added to every L2 norm before dividing, so zero vectors normalize to zero
/// instead of NaN.
pub const NORM_EPSILON: f32 = 1e-8;

/// A dense `(rows, cols)` matrix of `f32` stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Wrap a row-major buffer. Fails if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            StoreError::Validation(format!("matrix shape ({rows}, {cols}) overflows"))
        })?;
        if data.len() != expected {
            return Err(StoreError::Validation(format!(
                "matrix shape ({rows}, {cols}) needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from one `Vec` per row. All rows must share a length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len();
        let mut data = Vec::with_capacity(n * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(StoreError::Validation(format!(
                    "ragged embeddings: row 0 has {cols} values but row {i} has {}",
                    row.len()
                )));
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n,
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row `i` as a slice. Panics if `i >= rows`, like slice indexing.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact(0) panics, and a zero-width matrix has nothing to yield anyway.
        let width = self.cols.max(1);
        self.data
            .chunks_exact(width)
            .take(if self.cols == 0 { 0 } else { self.rows })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append the rows of `other`. Column counts must match unless `self` is empty.
    pub fn append(&mut self, other: Matrix) -> Result<()> {
        if self.rows == 0 {
            *self = other;
            return Ok(());
        }
        if other.rows == 0 {
            return Ok(());
        }
        if other.cols != self.cols {
            return Err(StoreError::Validation(format!(
                "cannot append rows of width {} to a matrix of width {}",
                other.cols, self.cols
            )));
        }
        self.rows += other.rows;
        self.data.extend(other.data);
        Ok(())
    }

    /// Cosine similarity of `query` against every row.
    ///
    /// Each row and the query are divided by `‖v‖ + NORM_EPSILON` before the
    /// dot product. The caller is responsible for `query.len() == cols`.
    pub fn cosine_scores(&self, query: &[f32]) -> Vec<f32> {
        let q = normalize(query);
        self.iter_rows()
            .map(|row| {
                let denom = l2_norm(row) + NORM_EPSILON;
                dot(row, &q) / denom
            })
            .collect()
    }
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// `v / (‖v‖ + NORM_EPSILON)`.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let denom = l2_norm(v) + NORM_EPSILON;
    v.iter().map(|x| x / denom).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity with the epsilon-guarded normalization used by the store.
///
/// Returns `0.0` for vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    dot(&normalize(a), &normalize(b))
}

/// Indices of the `k` highest scores, descending.
///
/// Equal scores keep their original relative order. NaN scores rank last.
/// `k` larger than `scores.len()` returns every index.
pub fn top_k_by_score(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores
        .iter()
        .map(|&s| if s.is_nan() { f32::NEG_INFINITY } else { s })
        .enumerate()
        .collect();
    // `sort_by` is stable, which is what keeps ties in row order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(k);
    ranked
}
