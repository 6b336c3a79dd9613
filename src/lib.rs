//! # Docs Assistant
//!
//! Ask questions about a folder of documents. Files are split into
//! overlapping character chunks, embedded, and stored as a dense matrix on
//! disk; questions are answered by a generative model from the best-matching
//! chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │   ingest    │──▶│ chunk+embed  │──▶│ <root>/<ns>/      │
//! │ txt/md/pdf/ │   │  (Batched)   │   │   vectors.npy     │
//! │ docx        │   └──────────────┘   │   meta.json       │
//! └─────────────┘                      └─────────┬─────────┘
//!                                                │ search
//!                      ┌─────────────────────────┤
//!                      ▼                         ▼
//!                 ┌──────────┐             ┌───────────┐
//!                 │  search  │             │ ask/chat  │──▶ Generator
//!                 └──────────┘             └───────────┘
//! ```
//!
//! The chunker, matrix math, `.npy` codec and vector store live in the
//! `docs-assistant-core` crate. This crate adds configuration, ingestion,
//! the HTTP providers, the question-answering flow, and the `docs` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! docs build ./handbook           # index a folder
//! docs sources                    # what got indexed
//! docs search "on-call rotation"  # retrieval only
//! docs ask "Who approves deploys?"
//! docs chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, env overrides, validation |
//! | [`ingest`] | Folder walk and chunking |
//! | [`extract`] | Text extraction per file type |
//! | [`embedding`] | Embedding providers |
//! | [`generate`] | Answer generation providers |
//! | [`qa`] | Context assembly and question answering |
//! | [`progress`] | Build progress reporting |

pub mod ask;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index_cmd;
pub mod ingest;
pub mod progress;
pub mod qa;
pub mod retry;
pub mod search;
pub mod sources;
