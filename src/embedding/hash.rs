//! Offline feature-hashing embedder.
//!
//! Each lowercased alphanumeric token is hashed (FNV-1a, 64-bit) into one of
//! `dims` buckets; one hash bit picks the sign. The result is a bag-of-words
//! vector that needs no network and no model download, and is identical
//! across runs and platforms. Texts that share words score higher under
//! cosine similarity, which is enough for tests and air-gapped setups.

use anyhow::Result;
use docs_assistant_core::{Embedder, Matrix};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

pub struct HashEmbedder {
    dims: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hash-{}", dims),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        if texts.is_empty() {
            return Ok(Matrix::new(0, self.dims, Vec::new())?);
        }
        let rows = texts.iter().map(|t| self.vector(t)).collect();
        Ok(Matrix::from_rows(rows)?)
    }
}
