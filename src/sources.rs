use anyhow::Result;

use docs_assistant_core::VectorStore;

use crate::config::Config;

/// Print the chunk count and the source of the first `limit` chunks.
pub fn list_sources(config: &Config, limit: usize) -> Result<()> {
    let mut store = VectorStore::open(config.namespace_dir())?;
    store.load()?;

    println!("Indexed chunks: {}", store.len());
    for (i, chunk) in store.chunks().iter().take(limit).enumerate() {
        println!("{}. {}", i + 1, chunk.source());
    }
    if store.len() > limit {
        println!("...and {} more", store.len() - limit);
    }
    Ok(())
}
