//! Error type for vector store operations.

use std::path::PathBuf;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Neither index file exists for the namespace.
    #[error("No index found in {}. Build it first.", .dir.display())]
    NotFound { dir: PathBuf },

    /// One of the two index files exists without the other.
    #[error(
        "Incomplete index: {} exists but {} is missing. Rebuild the index.",
        .present.display(),
        .missing.display()
    )]
    Incomplete { present: PathBuf, missing: PathBuf },

    /// Both files exist but disagree or cannot be decoded.
    #[error("Corrupt index: {0}")]
    Corrupt(String),

    /// Caller-supplied input violates a store invariant.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The embedding collaborator failed.
    #[error("Embedding error: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the namespace simply has no index yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
