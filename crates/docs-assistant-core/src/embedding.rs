//! The embedding collaborator interface.
//!
//! Concrete providers (Gemini, OpenAI, Ollama, the offline hashing embedder)
//! live in the `docs-assistant` app crate and implement [`Embedder`]. The
//! store only depends on this trait.

use anyhow::Result;

use crate::error::StoreError;
use crate::matrix::Matrix;

/// Turns text into dense vectors.
///
/// Contract: `embed(texts)` returns a matrix with exactly `texts.len()` rows,
/// row `i` being the embedding of `texts[i]`. All rows share one width `D`.
/// The store validates the row count at its boundary; see [`embed_checked`].
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, for logs and summaries.
    fn model_name(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Matrix>;

    /// Embed a single text (e.g. a question) and return its vector.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let matrix = self.embed(&[text.to_string()])?;
        if matrix.rows() != 1 {
            anyhow::bail!(
                "embedder '{}' returned {} rows for a single input",
                self.model_name(),
                matrix.rows()
            );
        }
        Ok(matrix.row(0).to_vec())
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        (**self).embed(texts)
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        (**self).embed(texts)
    }
}

/// Call `embedder` and enforce its contract: one non-empty row per input.
pub fn embed_checked<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
) -> Result<Matrix, StoreError> {
    let matrix = embedder.embed(texts).map_err(StoreError::Embedding)?;
    if matrix.rows() != texts.len() {
        return Err(StoreError::Validation(format!(
            "embedder '{}' returned {} rows for {} texts",
            embedder.model_name(),
            matrix.rows(),
            texts.len()
        )));
    }
    if matrix.rows() > 0 && matrix.cols() == 0 {
        return Err(StoreError::Validation(format!(
            "embedder '{}' returned zero-length vectors",
            embedder.model_name()
        )));
    }
    Ok(matrix)
}
