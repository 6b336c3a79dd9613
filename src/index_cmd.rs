//! `docs build` and `docs clear`.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use docs_assistant_core::{Chunk, Embedder, VectorStore};

use crate::config::Config;
use crate::embedding::{create_embedder, Batched};
use crate::ingest::{chunk_documents, load_paths, IngestReport};
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Outcome of a successful build.
#[derive(Debug)]
pub struct BuildSummary {
    pub files_found: usize,
    pub files_skipped: usize,
    pub chunks: usize,
    pub index_dir: PathBuf,
}

/// Read and chunk every input. Fails with "No content to index" when the
/// inputs produce zero chunks.
pub fn collect_chunks(
    config: &Config,
    paths: &[PathBuf],
    progress: &dyn BuildProgressReporter,
) -> Result<(IngestReport, Vec<Chunk>)> {
    let report = load_paths(paths, &config.ingest, progress)?;
    let chunks = chunk_documents(
        &report.documents,
        config.chunking.max_chars,
        config.chunking.overlap,
    );
    progress.report(BuildProgressEvent::Chunked {
        files: report.documents.len() as u64,
        chunks: chunks.len() as u64,
    });

    if chunks.is_empty() {
        bail!("No content to index. Check folder path and file types.");
    }
    Ok((report, chunks))
}

/// Embed `chunks` in batches and replace the index at `dir`.
pub fn write_index(
    dir: &Path,
    chunks: Vec<Chunk>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    progress: Arc<dyn BuildProgressReporter>,
) -> Result<()> {
    let batched = Batched::new(embedder, batch_size, progress);
    let mut store = VectorStore::open(dir)?;
    store.build(chunks, &batched)?;
    Ok(())
}

/// Ingest `paths`, embed, and rebuild the configured namespace.
pub fn build_index(
    config: &Config,
    paths: &[PathBuf],
    progress: Arc<dyn BuildProgressReporter>,
) -> Result<BuildSummary> {
    let (report, chunks) = collect_chunks(config, paths, progress.as_ref())?;
    let files_found = report.documents.len();
    let files_skipped = report.skipped.len();
    let chunk_count = chunks.len();

    let embedder = create_embedder(&config.embedding)?;
    let dir = config.namespace_dir();
    info!(
        dir = %dir.display(),
        files = files_found,
        chunks = chunk_count,
        model = embedder.model_name(),
        "building index"
    );
    write_index(&dir, chunks, embedder, config.embedding.batch_size, progress)?;

    Ok(BuildSummary {
        files_found,
        files_skipped,
        chunks: chunk_count,
        index_dir: dir,
    })
}

pub async fn run_build(
    config: &Config,
    paths: Vec<PathBuf>,
    progress: Arc<dyn BuildProgressReporter>,
) -> Result<()> {
    let config = config.clone();
    let summary =
        tokio::task::spawn_blocking(move || build_index(&config, &paths, progress)).await??;

    println!("build {}", summary.index_dir.display());
    println!("  files found: {}", summary.files_found);
    println!("  files skipped: {}", summary.files_skipped);
    println!("  total chunks: {}", summary.chunks);
    println!("ok");
    Ok(())
}

pub fn run_clear(config: &Config) -> Result<()> {
    let dir = config.namespace_dir();
    let mut store = VectorStore::open(&dir)?;
    store.clear()?;
    println!("Index cleared: {}", dir.display());
    Ok(())
}
