//! Document ingestion: walk input paths, extract text, chunk.
//!
//! Walks each input recursively (`walkdir`), keeps files whose extension is
//! listed in `[ingest].extensions`, drops paths matching the exclude globs
//! (`**/.git/**`, `**/target/**`, `**/node_modules/**` plus any configured),
//! and extracts text with [`crate::extract`].
//!
//! A file that cannot be read or extracted, or that yields only whitespace,
//! is skipped. Skips never abort the walk. Each one is logged at `warn` and
//! returned in [`IngestReport::skipped`].

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use docs_assistant_core::{make_chunks, Chunk};

use crate::config::IngestConfig;
use crate::extract::{extract_file, DocumentKind};
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Text extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub text: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: Vec<SourceDocument>,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(path = %path.display(), %reason, "skipping file");
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn extend(&mut self, other: IngestReport) {
        self.documents.extend(other.documents);
        self.skipped.extend(other.skipped);
    }
}

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn exclude_set(config: &IngestConfig) -> Result<GlobSet> {
    let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    patterns.extend(config.exclude_globs.iter().cloned());
    build_globset(&patterns)
}

fn wanted_extension(path: &Path, config: &IngestConfig) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    config
        .extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Read every supported document under `root`, or `root` itself if it is a file.
///
/// Documents are returned sorted by path.
pub fn load_folder(root: &Path, config: &IngestConfig) -> Result<IngestReport> {
    if !root.exists() {
        bail!("Path does not exist: {}", root.display());
    }

    let mut report = IngestReport::default();

    if root.is_file() {
        if DocumentKind::from_path(root).is_none() {
            report.skip(root, "unsupported file type");
        } else if !wanted_extension(root, config) {
            report.skip(root, "extension not in ingest.extensions");
        } else {
            read_one(root, &mut report);
        }
        return Ok(report);
    }

    let excludes = exclude_set(config)?;
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                report.skip(&path, e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if excludes.is_match(relative) {
            debug!(path = %path.display(), "excluded");
            continue;
        }
        if !wanted_extension(path, config) {
            continue;
        }
        if DocumentKind::from_path(path).is_none() {
            report.skip(path, "unsupported file type");
            continue;
        }

        read_one(path, &mut report);
    }

    report.documents.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(report)
}

fn read_one(path: &Path, report: &mut IngestReport) {
    match extract_file(path) {
        Ok(text) if text.trim().is_empty() => report.skip(path, "no text content"),
        Ok(text) => report.documents.push(SourceDocument {
            text,
            path: path.to_path_buf(),
        }),
        Err(e) => report.skip(path, e.to_string()),
    }
}

/// [`load_folder`] over several inputs, concatenated in argument order.
pub fn load_paths(
    paths: &[PathBuf],
    config: &IngestConfig,
    progress: &dyn BuildProgressReporter,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for path in paths {
        progress.report(BuildProgressEvent::Discovering {
            path: path.display().to_string(),
        });
        report.extend(load_folder(path, config)?);
    }
    Ok(report)
}

/// Chunk every document, tagging chunks with the document's path.
pub fn chunk_documents(documents: &[SourceDocument], max_chars: usize, overlap: usize) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            make_chunks(
                &doc.text,
                &doc.path.display().to_string(),
                max_chars,
                overlap,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("guides/deep")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("b.md"), "# Beta\nSecond file.").unwrap();
        fs::write(root.join("a.txt"), "Alpha notes.").unwrap();
        fs::write(root.join("guides/deep/c.MD"), "Gamma, nested and upper-case.").unwrap();
        fs::write(root.join("empty.txt"), "   \n\t").unwrap();
        fs::write(root.join("broken.pdf"), "not really a pdf").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".git/HEAD.txt"), "ref: main").unwrap();
        fs::write(root.join("node_modules/pkg/readme.md"), "vendored").unwrap();
        tmp
    }

    fn names(report: &IngestReport) -> Vec<String> {
        report
            .documents
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn walks_recursively_and_sorts() {
        let tmp = tree();
        let report = load_folder(tmp.path(), &IngestConfig::default()).unwrap();
        assert_eq!(names(&report), vec!["a.txt", "b.md", "c.MD"]);
        assert_eq!(report.documents[0].text, "Alpha notes.");
    }

    #[test]
    fn failures_and_empty_files_are_reported() {
        let tmp = tree();
        let report = load_folder(tmp.path(), &IngestConfig::default()).unwrap();
        let mut skipped: Vec<String> = report
            .skipped
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        skipped.sort();
        assert_eq!(skipped, vec!["broken.pdf", "empty.txt"]);
        assert!(report
            .skipped
            .iter()
            .any(|s| s.reason.contains("no text content")));
    }

    #[test]
    fn extension_list_and_excludes_from_config() {
        let tmp = tree();
        let config = IngestConfig {
            extensions: vec!["md".to_string()],
            exclude_globs: vec!["guides/**".to_string()],
            follow_symlinks: false,
        };
        let report = load_folder(tmp.path(), &config).unwrap();
        assert_eq!(names(&report), vec!["b.md"]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn single_file_input() {
        let tmp = tree();
        let report = load_folder(&tmp.path().join("b.md"), &IngestConfig::default()).unwrap();
        assert_eq!(names(&report), vec!["b.md"]);

        let report = load_folder(&tmp.path().join("image.png"), &IngestConfig::default()).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn single_file_respects_extension_list() {
        let tmp = tree();
        let config = IngestConfig {
            extensions: vec!["md".to_string()],
            ..IngestConfig::default()
        };
        let report = load_folder(&tmp.path().join("a.txt"), &config).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("ingest.extensions"));

        let report = load_folder(&tmp.path().join("b.md"), &config).unwrap();
        assert_eq!(names(&report), vec!["b.md"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_folder(&tmp.path().join("nope"), &IngestConfig::default()).is_err());
    }

    #[test]
    fn load_paths_concatenates_inputs() {
        let one = tree();
        let two = TempDir::new().unwrap();
        fs::write(two.path().join("z.txt"), "Zeta").unwrap();
        let report = load_paths(
            &[two.path().to_path_buf(), one.path().to_path_buf()],
            &IngestConfig::default(),
            &NoProgress,
        )
        .unwrap();
        assert_eq!(names(&report), vec!["z.txt", "a.txt", "b.md", "c.MD"]);
    }

    #[test]
    fn chunks_carry_document_path() {
        let docs = vec![
            SourceDocument {
                text: "abcdefghij".to_string(),
                path: PathBuf::from("docs/one.txt"),
            },
            SourceDocument {
                text: "xyz".to_string(),
                path: PathBuf::from("docs/two.md"),
            },
        ];
        let chunks = chunk_documents(&docs, 4, 1);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij", "xyz"]);
        assert_eq!(chunks[0].metadata.source, "docs/one.txt");
        assert_eq!(chunks[3].metadata.source, "docs/two.md");
    }
}
