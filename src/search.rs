//! `docs search`: retrieval without generation.

use anyhow::Result;

use docs_assistant_core::SearchHit;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::qa::retrieve;

/// One-line excerpt of a hit for terminal output.
fn excerpt(hit: &SearchHit, max_chars: usize) -> String {
    let flat = hit.chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
    crate::qa::truncate_chars(&flat, max_chars)
}

pub async fn run_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let hits = retrieve(
        config.namespace_dir(),
        embedder,
        query,
        config.retrieval.top_k,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.chunk.source());
        println!("    excerpt: \"{}\"", excerpt(hit, 160));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docs_assistant_core::Chunk;

    #[test]
    fn excerpt_flattens_whitespace() {
        let hit = SearchHit {
            score: 0.5,
            chunk: Chunk::new("line one\n\n  line   two", "a.md"),
        };
        assert_eq!(excerpt(&hit, 160), "line one line two");
        assert_eq!(excerpt(&hit, 4), "line...");
    }
}
