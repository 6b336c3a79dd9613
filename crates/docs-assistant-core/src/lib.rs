//! # Docs Assistant Core
//!
//! Synchronous, network-free logic for the docs assistant: the fixed-window
//! chunker, a dense row-major `f32` matrix, the `.npy` codec used to persist
//! it, the [`Embedder`](embedding::Embedder) interface, and the per-namespace
//! [`VectorStore`](store::VectorStore).
//!
//! This crate contains no tokio, HTTP clients, or configuration loading.
//! Embedding and generation providers live in the `docs-assistant` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod matrix;
pub mod npy;
pub mod store;

pub use chunk::{make_chunks, split, Chunk, ChunkMetadata};
pub use embedding::Embedder;
pub use error::StoreError;
pub use matrix::Matrix;
pub use store::{SearchHit, StoreState, VectorStore};
