//! Configuration parsing, environment overrides, and validation.
//!
//! Settings come from a TOML file (default `./config/docs.toml`). Every
//! section is optional; a missing section takes its defaults. After parsing,
//! a few environment variables override the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `INDEX_ROOT` | `index.root` |
//! | `EMBED_MODEL` | `embedding.model` |
//! | `GEN_MODEL` | `generation.model` |
//!
//! API keys are never read from the file. They come from `GOOGLE_API_KEY`
//! (gemini) and `OPENAI_API_KEY` (openai), typically via a `.env` file.
//!
//! ```toml
//! [index]
//! root = ".index"
//! namespace = "default"
//!
//! [chunking]
//! max_chars = 1000
//! overlap = 200
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "gemini"
//! model = "models/text-embedding-004"
//!
//! [generation]
//! provider = "gemini"
//! model = "models/gemini-1.5-flash"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Path used when `--config` is not given. A missing file here is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docs.toml";

/// Configuration problems that a caller may want to tell apart from I/O
/// or provider failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} not set. Set it in your environment or .env file.")]
    MissingCredential { var: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding one subdirectory per namespace.
    pub root: PathBuf,
    pub namespace: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".index"),
            namespace: "default".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Longest hit text, in characters, placed into the prompt context.
    pub snippet_chars: usize,
    /// Earlier chat turns repeated in the prompt. `0` disables history.
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            snippet_chars: 1200,
            history_turns: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: Option<String>,
    /// Base URL override for the provider's HTTP API.
    pub url: Option<String>,
    /// Vector width. Required by `hash`; other providers report their own.
    pub dims: Option<usize>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Configured model, or the provider's usual default.
    pub fn model_name(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "openai" => "text-embedding-3-small",
            "ollama" => "nomic-embed-text",
            "local" => "all-minilm-l6-v2",
            "hash" => "hash",
            "disabled" => "disabled",
            _ => "models/text-embedding-004",
        }
        .to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: Option<String>,
    pub url: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            max_retries: 5,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    pub fn model_name(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "openai" => "gpt-4o-mini",
            "ollama" => "llama3.1",
            "disabled" => "disabled",
            _ => "models/gemini-1.5-flash",
        }
        .to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// File extensions to read, without the leading dot. Matched case-insensitively.
    pub extensions: Vec<String>,
    /// Extra globs to skip, relative to the folder being walked.
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: ["txt", "md", "pdf", "docx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

const EMBEDDING_PROVIDERS: &[&str] = &["gemini", "openai", "ollama", "hash", "local", "disabled"];
const GENERATION_PROVIDERS: &[&str] = &["gemini", "openai", "ollama", "disabled"];

impl Config {
    /// Parse TOML text. Does not apply environment overrides or validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config file")
    }

    /// Directory of the configured namespace, `<index.root>/<index.namespace>`.
    pub fn namespace_dir(&self) -> PathBuf {
        self.index.root.join(&self.index.namespace)
    }

    /// Apply `INDEX_ROOT`, `EMBED_MODEL` and `GEN_MODEL` through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        if let Some(root) = non_empty("INDEX_ROOT") {
            self.index.root = PathBuf::from(root);
        }
        if let Some(model) = non_empty("EMBED_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Some(model) = non_empty("GEN_MODEL") {
            self.generation.model = Some(model);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.max_chars == 0 {
            return Err(invalid("chunking.max_chars must be > 0"));
        }
        if self.retrieval.top_k < 1 {
            return Err(invalid("retrieval.top_k must be >= 1"));
        }
        if self.embedding.batch_size < 1 {
            return Err(invalid("embedding.batch_size must be >= 1"));
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(invalid(format!(
                "Unknown embedding provider: '{}'. Must be one of: {}.",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }
        if !GENERATION_PROVIDERS.contains(&self.generation.provider.as_str()) {
            return Err(invalid(format!(
                "Unknown generation provider: '{}'. Must be one of: {}.",
                self.generation.provider,
                GENERATION_PROVIDERS.join(", ")
            )));
        }
        if self.embedding.provider == "hash" && self.embedding.dims.unwrap_or(0) == 0 {
            return Err(invalid(
                "embedding.dims must be > 0 when provider is 'hash'",
            ));
        }

        validate_namespace(&self.index.namespace)?;
        Ok(())
    }
}

/// A namespace maps to exactly one directory under the index root.
fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(namespace).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if namespace.trim().is_empty()
        || !single_normal
        || namespace.contains('/')
        || namespace.contains('\\')
    {
        return Err(invalid(format!(
            "index.namespace '{}' must be a single directory name",
            namespace
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

/// Read an API key from the environment.
pub fn require_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingCredential {
            var: var.to_string(),
        })
}

/// Load the configuration used by the CLI.
///
/// With `path = None` the default path is tried and built-in defaults are
/// used if it does not exist. An explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                tracing::debug!("no config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Config::default()
            }
        }
    };

    config.apply_env_overrides(|var| std::env::var(var).ok());
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml_str(&content)
}
