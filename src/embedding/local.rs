//! Local sentence-embedding models via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached. After
//! that, embedding runs fully offline.

use anyhow::{anyhow, bail, Result};
use std::sync::Mutex;

use docs_assistant_core::{Embedder, Matrix};

use crate::config::EmbeddingConfig;

pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    batch_size: usize,
    // Loaded on first embed so construction never blocks on a download.
    runtime: Mutex<Option<fastembed::TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config.model_name();
        let model = to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            model,
            batch_size: config.batch_size,
            runtime: Mutex::new(None),
        })
    }
}

fn to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    }
}

impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        let mut guard = self
            .runtime
            .lock()
            .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
        if guard.is_none() {
            tracing::info!(model = %self.model_name, "loading local embedding model");
            let model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(self.model.clone()).with_show_download_progress(true),
            )
            .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
            *guard = Some(model);
        }
        let model = guard
            .as_mut()
            .ok_or_else(|| anyhow!("local embedding model not loaded"))?;

        let rows = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
        Ok(Matrix::from_rows(rows)?)
    }
}
