//! Embedding providers.
//!
//! Every provider implements the core [`Embedder`] trait, so the vector store
//! can call it directly. The trait is synchronous: HTTP providers use
//! `reqwest::blocking` and must be driven from a blocking thread
//! (`tokio::task::spawn_blocking`), never from inside an async task.
//!
//! | `embedding.provider` | Implementation |
//! |----------------------|----------------|
//! | `"gemini"` | [`GeminiEmbedder`] (`batchEmbedContents`, needs `GOOGLE_API_KEY`) |
//! | `"openai"` | [`OpenAIEmbedder`] (`/v1/embeddings`, needs `OPENAI_API_KEY`) |
//! | `"ollama"` | [`OllamaEmbedder`] (`/api/embed`) |
//! | `"hash"` | [`HashEmbedder`] (offline feature hashing) |
//! | `"local"` | `LocalEmbedder` (fastembed, behind `local-embeddings-fastembed`) |
//! | `"disabled"` | [`DisabledEmbedder`] |
//!
//! Use [`create_embedder`] to pick one from configuration, and wrap it in
//! [`Batched`] to split large inputs into API-sized requests.

mod hash;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use std::time::Duration;

use docs_assistant_core::{Embedder, Matrix};

use crate::config::{require_env, EmbeddingConfig};
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::retry::{send_json_blocking, RetryPolicy};

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Gemini model ids are addressed as `models/<name>`.
pub(crate) fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn blocking_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn rows_to_matrix(rows: Vec<Vec<f32>>) -> Result<Matrix> {
    Ok(Matrix::from_rows(rows)?)
}

fn json_floats(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid {} response: non-numeric embedding value", what))
        })
        .collect()
}

// ============ Disabled ============

/// Always fails. Selected with `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn embed(&self, _texts: &[String]) -> Result<Matrix> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini ============

/// Google Generative Language API embeddings.
///
/// Sends one `batchEmbedContents` request per call with every input text.
pub struct GeminiEmbedder {
    model: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl GeminiEmbedder {
    /// Reads `GOOGLE_API_KEY` from the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_env("GOOGLE_API_KEY")?;
        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Self {
        Self {
            model: gemini_model_path(&config.model_name()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: api_key.into(),
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        if texts.is_empty() {
            return rows_to_matrix(Vec::new());
        }
        let client = blocking_client(self.timeout_secs)?;
        let url = format!(
            "{}/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let json = send_json_blocking(&self.retry, "Gemini", || {
            client
                .post(&url)
                .header("x-goog-api-key", self.api_key.as_str())
                .json(&body)
        })?;
        rows_to_matrix(parse_gemini_response(&json)?)
    }
}

/// Extract `embeddings[].values` in order.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            let values = item
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            json_floats(values, "Gemini")
        })
        .collect()
}

// ============ OpenAI ============

/// OpenAI embeddings API (`POST /v1/embeddings`).
pub struct OpenAIEmbedder {
    model: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_env("OPENAI_API_KEY")?;
        Ok(Self {
            model: config.model_name(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        if texts.is_empty() {
            return rows_to_matrix(Vec::new());
        }
        let client = blocking_client(self.timeout_secs)?;
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = send_json_blocking(&self.retry, "OpenAI", || {
            client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })?;
        rows_to_matrix(parse_openai_response(&json)?)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, json_floats(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embeddings from a local Ollama instance (`POST /api/embed`).
///
/// Requires Ollama running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    base_url: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model_name(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        if texts.is_empty() {
            return rows_to_matrix(Vec::new());
        }
        let client = blocking_client(self.timeout_secs)?;
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = send_json_blocking(&self.retry, "Ollama", || client.post(&url).json(&body))
            .map_err(|e| {
                e.context(format!("is Ollama running at {}?", self.base_url))
            })?;
        rows_to_matrix(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_floats(e, "Ollama"))
        .collect()
}

// ============ Batching ============

/// Splits input into `batch_size` requests against `inner` and reports
/// progress after each batch.
pub struct Batched<E: ?Sized> {
    inner: Arc<E>,
    batch_size: usize,
    progress: Arc<dyn BuildProgressReporter>,
}

impl<E: Embedder + ?Sized> Batched<E> {
    pub fn new(
        inner: Arc<E>,
        batch_size: usize,
        progress: Arc<dyn BuildProgressReporter>,
    ) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            progress,
        }
    }
}

impl<E: Embedder + ?Sized> Embedder for Batched<E> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn embed(&self, texts: &[String]) -> Result<Matrix> {
        let total = texts.len() as u64;
        let mut out = Matrix::from_rows(Vec::new())?;
        let mut done = 0u64;

        for batch in texts.chunks(self.batch_size) {
            let part = self.inner.embed(batch)?;
            if part.rows() != batch.len() {
                bail!(
                    "embedder '{}' returned {} rows for a batch of {}",
                    self.inner.model_name(),
                    part.rows(),
                    batch.len()
                );
            }
            out.append(part)?;
            done += batch.len() as u64;
            tracing::debug!(done, total, "embedded batch");
            self.progress
                .report(BuildProgressEvent::Embedding { n: done, total });
        }
        Ok(out)
    }
}

// ============ Factory ============

/// Create the embedder named by `config.provider`.
///
/// # Errors
///
/// Unknown provider names, a missing API key
/// ([`ConfigError::MissingCredential`](crate::config::ConfigError)), or a
/// missing cargo feature for `local`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config))),
        "hash" => {
            let dims = config
                .dims
                .filter(|d| *d > 0)
                .ok_or_else(|| anyhow!("embedding.dims required for hash provider"))?;
            Ok(Arc::new(HashEmbedder::new(dims)))
        }
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
