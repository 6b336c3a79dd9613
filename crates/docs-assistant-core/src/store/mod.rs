//! Per-namespace vector store.
//!
//! A [`VectorStore`] owns one namespace directory holding an `(N, D)` float32
//! embedding matrix and `N` chunk records. Row `i` of the matrix is always the
//! embedding of record `i`; every operation that produces in-memory state
//! checks that alignment before accepting it.
//!
//! # States
//!
//! | State | Meaning |
//! |-------|---------|
//! | [`StoreState::Uninitialized`] | Opened; nothing read from disk yet |
//! | [`StoreState::Loaded`] | Matrix and records in memory and consistent |
//! | [`StoreState::Empty`] | Cleared; no files, no in-memory data |
//!
//! [`build`](VectorStore::build) replaces the whole index. There is no
//! incremental append and no locking: concurrent builds against the same
//! directory race and the last writer wins.
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use docs_assistant_core::{Chunk, Embedder, Matrix, VectorStore};
//!
//! struct Axis;
//!
//! impl Embedder for Axis {
//!     fn model_name(&self) -> &str { "axis" }
//!     fn embed(&self, texts: &[String]) -> Result<Matrix> {
//!         let rows = texts
//!             .iter()
//!             .map(|t| if t == "alpha" { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
//!             .collect();
//!         Ok(Matrix::from_rows(rows)?)
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = VectorStore::open(dir.path()).unwrap();
//! store
//!     .build(vec![Chunk::new("alpha", "a.md"), Chunk::new("beta", "b.md")], &Axis)
//!     .unwrap();
//!
//! let hits = store.search(&[1.0, 0.0], 2).unwrap();
//! assert_eq!(hits[0].chunk.text, "alpha");
//! ```

mod files;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::embedding::{embed_checked, Embedder};
use crate::error::{Result, StoreError};
use crate::matrix::{top_k_by_score, Matrix};
use crate::npy;

pub use files::{META_FILE, VECTORS_FILE};
use files::{remove_if_exists, write_atomic, IndexFiles};

/// Lifecycle state of a [`VectorStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Loaded,
    Empty,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Cosine similarity to the query, nominally in `[-1, 1]`.
    pub score: f32,
    pub chunk: Chunk,
}

/// Accessor for the index files of a single namespace directory.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    files: IndexFiles,
    embeddings: Option<Matrix>,
    meta: Vec<Chunk>,
    state: StoreState,
}

impl VectorStore {
    /// Open the namespace at `dir`, creating the directory if needed.
    ///
    /// Nothing is read until [`load`](Self::load) or [`search`](Self::search).
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let files = IndexFiles::new(&dir);
        Ok(Self {
            dir,
            files,
            embeddings: None,
            meta: Vec::new(),
            state: StoreState::Uninitialized,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Number of indexed chunks held in memory.
    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Embedding width of the loaded index.
    pub fn dims(&self) -> Option<usize> {
        self.embeddings.as_ref().map(Matrix::cols)
    }

    /// Chunk records in row order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.meta
    }

    pub fn embeddings(&self) -> Option<&Matrix> {
        self.embeddings.as_ref()
    }

    /// True when both index files are present on disk.
    pub fn exists_on_disk(&self) -> bool {
        self.files.vectors.exists() && self.files.meta.exists()
    }

    /// Embed `chunks` and replace the namespace's index with them.
    ///
    /// Fails with [`StoreError::Validation`] when `chunks` is empty or the
    /// embedder returns a row count different from `chunks.len()`. On any
    /// failure before the files are written, the previous index is untouched.
    pub fn build<E: Embedder + ?Sized>(&mut self, chunks: Vec<Chunk>, embedder: &E) -> Result<()> {
        if chunks.is_empty() {
            return Err(StoreError::Validation(
                "cannot build an index from zero chunks".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_checked(embedder, &texts)?;

        write_index(&self.files, &embeddings, &chunks)?;
        info!(
            dir = %self.dir.display(),
            rows = embeddings.rows(),
            dims = embeddings.cols(),
            model = embedder.model_name(),
            "index built"
        );

        self.embeddings = Some(embeddings);
        self.meta = chunks;
        self.state = StoreState::Loaded;
        Ok(())
    }

    /// Persist the in-memory matrix and records.
    ///
    /// Fails with [`StoreError::Validation`] if nothing is loaded.
    pub fn save(&self) -> Result<()> {
        let embeddings = self
            .embeddings
            .as_ref()
            .ok_or_else(|| StoreError::Validation("No embeddings to save.".to_string()))?;
        write_index(&self.files, embeddings, &self.meta)
    }

    /// Read both files into memory.
    ///
    /// Neither file present is [`StoreError::NotFound`]; only one present is
    /// [`StoreError::Incomplete`]; a row count that disagrees with the number
    /// of records is [`StoreError::Corrupt`].
    pub fn load(&mut self) -> Result<()> {
        let has_vectors = self.files.vectors.exists();
        let has_meta = self.files.meta.exists();
        match (has_vectors, has_meta) {
            (false, false) => {
                return Err(StoreError::NotFound {
                    dir: self.dir.clone(),
                })
            }
            (true, false) => {
                return Err(StoreError::Incomplete {
                    present: self.files.vectors.clone(),
                    missing: self.files.meta.clone(),
                })
            }
            (false, true) => {
                return Err(StoreError::Incomplete {
                    present: self.files.meta.clone(),
                    missing: self.files.vectors.clone(),
                })
            }
            (true, true) => {}
        }

        let embeddings = npy::decode(&std::fs::read(&self.files.vectors)?)?;
        let meta_text = std::fs::read_to_string(&self.files.meta)?;
        let meta: Vec<Chunk> = serde_json::from_str(&meta_text)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", META_FILE, e)))?;

        if embeddings.rows() != meta.len() {
            return Err(StoreError::Corrupt(format!(
                "{} has {} rows but {} has {} records",
                VECTORS_FILE,
                embeddings.rows(),
                META_FILE,
                meta.len()
            )));
        }
        if embeddings.rows() > 0 && embeddings.cols() == 0 {
            return Err(StoreError::Corrupt(format!(
                "{} holds zero-length vectors",
                VECTORS_FILE
            )));
        }

        debug!(
            dir = %self.dir.display(),
            rows = embeddings.rows(),
            dims = embeddings.cols(),
            "index loaded"
        );
        self.embeddings = Some(embeddings);
        self.meta = meta;
        self.state = StoreState::Loaded;
        Ok(())
    }

    /// Delete both files and drop in-memory data. Calling it again is a no-op.
    pub fn clear(&mut self) -> Result<()> {
        let removed_vectors = remove_if_exists(&self.files.vectors)?;
        let removed_meta = remove_if_exists(&self.files.meta)?;
        if removed_vectors || removed_meta {
            info!(dir = %self.dir.display(), "index cleared");
        }
        self.embeddings = None;
        self.meta.clear();
        self.state = StoreState::Empty;
        Ok(())
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    ///
    /// Loads from disk first if nothing is in memory. Equal scores keep row
    /// order. `top_k` above the number of rows returns every row.
    pub fn search(&mut self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if self.embeddings.is_none() {
            self.load()?;
        }
        let embeddings = self
            .embeddings
            .as_ref()
            .ok_or_else(|| StoreError::NotFound {
                dir: self.dir.clone(),
            })?;

        if query.len() != embeddings.cols() {
            return Err(StoreError::Validation(format!(
                "query vector has {} dimensions but the index has {}",
                query.len(),
                embeddings.cols()
            )));
        }

        let scores = embeddings.cosine_scores(query);
        let hits = top_k_by_score(&scores, top_k)
            .into_iter()
            .map(|(i, score)| SearchHit {
                score,
                chunk: self.meta[i].clone(),
            })
            .collect::<Vec<_>>();

        debug!(
            dir = %self.dir.display(),
            candidates = scores.len(),
            returned = hits.len(),
            "search complete"
        );
        Ok(hits)
    }
}

/// Matrix first, then records; each via temp file + rename.
fn write_index(files: &IndexFiles, embeddings: &Matrix, meta: &[Chunk]) -> Result<()> {
    if embeddings.rows() != meta.len() {
        return Err(StoreError::Validation(format!(
            "{} embedding rows for {} chunk records",
            embeddings.rows(),
            meta.len()
        )));
    }
    let meta_json = serde_json::to_vec_pretty(meta)?;
    write_atomic(&files.vectors, &npy::encode(embeddings))?;
    write_atomic(&files.meta, &meta_json)?;
    Ok(())
}
