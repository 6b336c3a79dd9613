//! Build progress reporting.
//!
//! `docs build` can take a while: extraction of large PDFs, then one
//! embedding request per batch. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// A single progress event during `docs build`.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildProgressEvent {
    /// Walking an input path. Total unknown.
    Discovering { path: String },
    /// Chunking finished: `chunks` produced from `files` documents.
    Chunked { files: u64, chunks: u64 },
    /// `n` of `total` chunks embedded.
    Embedding { n: u64, total: u64 },
}

/// Receives build progress events. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "build  embedding  1,024 / 5,000 chunks".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Discovering { path } => {
                format!("build {}  discovering...\n", path)
            }
            BuildProgressEvent::Chunked { files, chunks } => format!(
                "build  chunked  {} files into {} chunks\n",
                format_number(*files),
                format_number(*chunks)
            ),
            BuildProgressEvent::Embedding { n, total } => format!(
                "build  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &BuildProgressEvent) -> serde_json::Value {
        match event {
            BuildProgressEvent::Discovering { path } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "path": path
            }),
            BuildProgressEvent::Chunked { files, chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "files": files,
                "chunks": chunks
            }),
            BuildProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
        }
    }
}

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
