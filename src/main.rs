//! # Docs Assistant CLI (`docs`)
//!
//! ## Usage
//!
//! ```bash
//! docs --config ./config/docs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docs build <PATH>...` | Index folders or files, replacing the namespace's index |
//! | `docs clear` | Delete the namespace's index |
//! | `docs sources` | Show how many chunks are indexed and where they came from |
//! | `docs search "<query>"` | Rank chunks by similarity to the query |
//! | `docs ask "<question>"` | Answer a question from the indexed documents |
//! | `docs chat` | Interactive question answering with conversation history |
//!
//! ## Examples
//!
//! ```bash
//! # Index the handbook into the "eng" namespace with smaller chunks
//! docs build ./handbook --namespace eng --max-chars 600 --overlap 100
//!
//! # Retrieval only, as JSON
//! docs search "incident severity levels" --namespace eng --json
//!
//! # Ask with more context
//! docs ask "How do I request production access?" --top-k 8
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docs_assistant::config::{self, Config};
use docs_assistant::progress::ProgressMode;
use docs_assistant::{ask, index_cmd, search, sources};

/// Docs Assistant: ask questions about a folder of documents.
///
/// Settings are read from `./config/docs.toml` when present (or the file
/// given with `--config`), then from the environment (`INDEX_ROOT`,
/// `EMBED_MODEL`, `GEN_MODEL`, and API keys, optionally from `.env`).
#[derive(Parser)]
#[command(
    name = "docs",
    about = "Docs Assistant: index documents and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docs.toml`; built-in defaults apply if that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Namespace (workspace) to operate on. Overrides `index.namespace`.
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Directory holding all namespaces. Overrides `index.root` and `INDEX_ROOT`.
    #[arg(long, global = true)]
    index_root: Option<PathBuf>,

    /// Build progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents.
    ///
    /// Walks each path recursively (a single file is also accepted), reads
    /// .txt, .md, .pdf and .docx files, splits them into overlapping chunks,
    /// embeds them, and replaces the namespace's index. Unreadable files are
    /// skipped and counted.
    Build {
        /// Folders or files to index.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Chunk size in characters.
        #[arg(long)]
        max_chars: Option<usize>,

        /// Characters shared by consecutive chunks.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Delete the namespace's index files. Safe to run when nothing is indexed.
    Clear,

    /// Show the number of indexed chunks and their sources.
    Sources {
        /// Number of sources to list.
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },

    /// Rank indexed chunks by cosine similarity to a query.
    Search {
        query: String,

        /// Number of results.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question using the indexed documents as context.
    Ask {
        question: String,

        /// Number of chunks given to the model.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer and hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask questions interactively, one per line.
    Chat {
        /// Number of chunks given to the model.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Apply command-line overrides and re-validate.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = config::load_config(cli.config.as_deref())?;

    if let Some(ns) = &cli.namespace {
        cfg.index.namespace = ns.clone();
    }
    if let Some(root) = &cli.index_root {
        cfg.index.root = root.clone();
    }
    match &cli.command {
        Commands::Build {
            max_chars, overlap, ..
        } => {
            if let Some(n) = max_chars {
                cfg.chunking.max_chars = *n;
            }
            if let Some(n) = overlap {
                cfg.chunking.overlap = *n;
            }
        }
        Commands::Search { top_k, .. }
        | Commands::Ask { top_k, .. }
        | Commands::Chat { top_k } => {
            if let Some(k) = top_k {
                cfg.retrieval.top_k = *k;
            }
        }
        Commands::Clear | Commands::Sources { .. } => {}
    }

    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = resolve_config(&cli)?;
    tracing::debug!(namespace = %cfg.index.namespace, dir = %cfg.namespace_dir().display(), "config resolved");

    match cli.command {
        Commands::Build { paths, .. } => {
            let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = Arc::from(mode.reporter());
            index_cmd::run_build(&cfg, paths, reporter).await?;
        }
        Commands::Clear => {
            index_cmd::run_clear(&cfg)?;
        }
        Commands::Sources { limit } => {
            sources::list_sources(&cfg, limit)?;
        }
        Commands::Search { query, json, .. } => {
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Ask { question, json, .. } => {
            ask::run_ask(&cfg, &question, json).await?;
        }
        Commands::Chat { .. } => {
            ask::run_chat(&cfg).await?;
        }
    }

    Ok(())
}
