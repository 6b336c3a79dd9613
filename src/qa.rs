//! Question answering over an indexed namespace.
//!
//! ```text
//! question ─▶ embed ─▶ VectorStore::search ─▶ format_context ─▶ build_prompt ─▶ Generator
//! ```
//!
//! Chat history is owned by the caller as a [`Conversation`] and passed in
//! per call. The store never sees it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use docs_assistant_core::{Embedder, SearchHit, VectorStore};

use crate::config::Config;
use crate::generate::Generator;

pub const SYSTEM_PROMPT: &str = "You are an internal documentation assistant. Answer using ONLY the provided CONTEXT. \
If the answer is not in the context, say you don't see it in the docs and suggest where it might be. \
Be concise and include citations like [1], [2] that refer to the sources in CONTEXT.";

/// Retrieval and prompt settings for one question.
#[derive(Debug, Clone, Copy)]
pub struct QaOptions {
    pub top_k: usize,
    pub snippet_chars: usize,
    pub history_turns: usize,
}

impl QaOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            snippet_chars: config.retrieval.snippet_chars,
            history_turns: config.retrieval.history_turns,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    /// Sources of the hits used for the answer, in rank order.
    pub sources: Vec<String>,
    pub asked_at: DateTime<Utc>,
}

/// Caller-held chat state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub hits: Vec<SearchHit>,
}

/// First `max_chars` characters of `text`, with `...` appended if anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Number the hits `[1]`, `[2]`, … in rank order, one block per hit:
///
/// ```text
/// [1] Source: docs/deploy.md
/// <trimmed text, at most snippet_chars characters, then "..." if cut>
/// ```
///
/// Blocks are separated by a blank line.
pub fn format_context(hits: &[SearchHit], snippet_chars: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let text = truncate_chars(hit.chunk.text.trim(), snippet_chars);
            format!("[{}] Source: {}\n{}", i + 1, hit.chunk.source(), text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full generation prompt.
///
/// Without history this is exactly
/// `"{SYSTEM_PROMPT}\n\nQUESTION: {question}\n\nCONTEXT:\n{context}"`.
pub fn build_prompt(question: &str, context: &str, history: &[Turn]) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);
    if !history.is_empty() {
        prompt.push_str("\n\nPREVIOUS CONVERSATION:");
        for turn in history {
            prompt.push_str(&format!("\nQ: {}\nA: {}", turn.question, turn.answer.trim()));
        }
    }
    prompt.push_str(&format!("\n\nQUESTION: {}\n\nCONTEXT:\n{}", question, context));
    prompt
}

/// Embed `question` and return the `top_k` best hits from the namespace at `dir`.
///
/// Fails with [`StoreError::NotFound`](docs_assistant_core::StoreError) when
/// nothing has been built there yet.
pub async fn retrieve(
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    question: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    let question = question.to_string();
    tokio::task::spawn_blocking(move || -> Result<Vec<SearchHit>> {
        let mut store = VectorStore::open(&dir)?;
        store.load()?;
        let query = embedder
            .embed_one(&question)
            .map_err(docs_assistant_core::StoreError::Embedding)?;
        let hits = store.search(&query, top_k)?;
        debug!(hits = hits.len(), top_k, "retrieved");
        Ok(hits)
    })
    .await?
}

/// Retrieve context for `question`, ask the generator, and record the turn
/// in `conversation`.
pub async fn answer_question(
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    generator: &dyn Generator,
    question: &str,
    options: QaOptions,
    conversation: &mut Conversation,
) -> Result<Answer> {
    let hits = retrieve(dir, embedder, question, options.top_k).await?;
    let context = format_context(&hits, options.snippet_chars);
    let history = conversation.recent(options.history_turns);
    let prompt = build_prompt(question, &context, history);
    debug!(
        prompt_chars = prompt.chars().count(),
        model = generator.model_name(),
        "generating answer"
    );

    let answer = generator.generate(&prompt).await?;

    conversation.push(Turn {
        question: question.to_string(),
        answer: answer.clone(),
        sources: hits.iter().map(|h| h.chunk.source().to_string()).collect(),
        asked_at: Utc::now(),
    });
    Ok(Answer { answer, hits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use async_trait::async_trait;
    use docs_assistant_core::Chunk;
    use std::sync::Mutex;

    fn hit(text: &str, source: &str, score: f32) -> SearchHit {
        SearchHit {
            score,
            chunk: Chunk::new(text, source),
        }
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn context_blocks_numbered_in_rank_order() {
        let hits = vec![
            hit("  First chunk.\n", "docs/a.md", 0.9),
            hit("Second chunk.", "", 0.5),
        ];
        assert_eq!(
            format_context(&hits, 1200),
            "[1] Source: docs/a.md\nFirst chunk.\n\n[2] Source: unknown\nSecond chunk."
        );
    }

    #[test]
    fn context_truncates_long_hits() {
        let long = "x".repeat(1300);
        let ctx = format_context(&[hit(&long, "big.txt", 1.0)], 1200);
        let body = ctx.lines().nth(1).unwrap();
        assert_eq!(body.chars().count(), 1203);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn prompt_without_history() {
        let prompt = build_prompt("How do I deploy?", "[1] Source: a\ntext", &[]);
        assert_eq!(
            prompt,
            format!(
                "{}\n\nQUESTION: How do I deploy?\n\nCONTEXT:\n[1] Source: a\ntext",
                SYSTEM_PROMPT
            )
        );
    }

    #[test]
    fn prompt_with_history() {
        let turn = Turn {
            question: "What is X?".to_string(),
            answer: "X is a service [1].\n".to_string(),
            sources: vec!["x.md".to_string()],
            asked_at: Utc::now(),
        };
        let prompt = build_prompt("Who owns it?", "ctx", &[turn]);
        assert!(prompt.contains(
            "\n\nPREVIOUS CONVERSATION:\nQ: What is X?\nA: X is a service [1].\n\nQUESTION: Who owns it?"
        ));
    }

    #[test]
    fn conversation_recent() {
        let mut conv = Conversation::new();
        for i in 0..3 {
            conv.push(Turn {
                question: format!("q{i}"),
                answer: format!("a{i}"),
                sources: Vec::new(),
                asked_at: Utc::now(),
            });
        }
        assert_eq!(conv.recent(0).len(), 0);
        let last_two: Vec<&str> = conv.recent(2).iter().map(|t| t.question.as_str()).collect();
        assert_eq!(last_two, vec!["q1", "q2"]);
        assert_eq!(conv.recent(10).len(), 3);
    }

    /// Echoes the prompt back so tests can inspect it.
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("answer [1]".to_string())
        }
    }

    #[tokio::test]
    async fn answer_uses_retrieved_context_and_records_turn() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("default");
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(128));
        {
            let mut store = VectorStore::open(&dir).unwrap();
            store
                .build(
                    vec![
                        Chunk::new("Deployments run every night via the release pipeline.", "deploy.md"),
                        Chunk::new("The cafeteria serves soup on Fridays.", "food.md"),
                    ],
                    embedder.as_ref(),
                )
                .unwrap();
        }

        let generator = EchoGenerator {
            prompts: Mutex::new(Vec::new()),
        };
        let mut conv = Conversation::new();
        let options = QaOptions {
            top_k: 1,
            snippet_chars: 1200,
            history_turns: 0,
        };
        let answer = answer_question(
            dir.clone(),
            embedder.clone(),
            &generator,
            "when do deployments run",
            options,
            &mut conv,
        )
        .await
        .unwrap();

        assert_eq!(answer.answer, "answer [1]");
        assert_eq!(answer.hits.len(), 1);
        assert_eq!(answer.hits[0].chunk.source(), "deploy.md");
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("[1] Source: deploy.md\nDeployments run every night"));
        assert!(!prompt.contains("PREVIOUS CONVERSATION"));
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.turns()[0].sources, vec!["deploy.md"]);
    }

    #[tokio::test]
    async fn retrieve_without_index_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = retrieve(
            tmp.path().join("empty"),
            Arc::new(HashEmbedder::new(8)),
            "anything",
            3,
        )
        .await
        .unwrap_err();
        let store_err = err
            .downcast_ref::<docs_assistant_core::StoreError>()
            .expect("store error");
        assert!(store_err.is_not_found());
    }
}
