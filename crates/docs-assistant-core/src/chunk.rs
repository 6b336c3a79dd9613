//! Fixed-window text chunker.
//!
//! Splits document text into overlapping windows of at most `max_chars`
//! characters. Windows are measured in Unicode scalar values (`char`s), never
//! bytes, so a window boundary never lands inside a multi-byte character.
//!
//! # Algorithm
//!
//! 1. Start a cursor at character 0.
//! 2. Emit `text[i .. min(i + max_chars, len)]`.
//! 3. If the window reached the end of the text, stop. The last window may be
//!    shorter than `max_chars`.
//! 4. Otherwise move the cursor to `end - overlap`, or to `end` when that
//!    would not move it forward (`overlap >= max_chars`).
//!
//! Every window except the last is exactly `max_chars` long, and consecutive
//! windows share exactly `overlap` characters whenever `overlap < max_chars`.
//!
//! # Example
//!
//! ```rust
//! use docs_assistant_core::chunk::split;
//!
//! let parts: Vec<&str> = split("abcdefghij", 4, 1).collect();
//! assert_eq!(parts, vec!["abcd", "defg", "ghij"]);
//! ```

use serde::{Deserialize, Serialize};

/// A unit of indexed text plus its provenance.
///
/// Serializes as `{"text": ..., "metadata": {"source": ...}}`, the record
/// shape stored in a namespace's `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Contiguous slice of the source document.
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Provenance attached to every [`Chunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the originating file, verbatim as ingested.
    #[serde(default)]
    pub source: String,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.into(),
            },
        }
    }

    /// Source path, or `"unknown"` when the record carries none.
    pub fn source(&self) -> &str {
        if self.metadata.source.is_empty() {
            "unknown"
        } else {
            &self.metadata.source
        }
    }
}

/// Lazy iterator over the windows of a text. Created by [`split`].
#[derive(Debug, Clone)]
pub struct Split<'a> {
    text: &'a str,
    /// Byte offset of every char start, followed by `text.len()`.
    bounds: Vec<usize>,
    /// Char index of the next window start; `None` once exhausted.
    cursor: Option<usize>,
    max_chars: usize,
    overlap: usize,
}

impl<'a> Iterator for Split<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let start = self.cursor?;
        let len = self.bounds.len() - 1;
        if start >= len {
            self.cursor = None;
            return None;
        }

        let end = (start + self.max_chars).min(len);
        let window = &self.text[self.bounds[start]..self.bounds[end]];

        self.cursor = if end == len {
            None
        } else {
            let back = end.saturating_sub(self.overlap);
            Some(if back > start { back } else { end })
        };

        Some(window)
    }
}

/// Split `text` into overlapping windows of at most `max_chars` characters.
///
/// Empty text yields no windows; text no longer than `max_chars` yields a
/// single window equal to the whole text. A `max_chars` of zero is treated
/// as one so the iterator always terminates.
pub fn split(text: &str, max_chars: usize, overlap: usize) -> Split<'_> {
    let bounds = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    Split {
        text,
        bounds,
        cursor: Some(0),
        max_chars: max_chars.max(1),
        overlap,
    }
}

/// Split `text` and tag every window with `source_path`, in document order.
pub fn make_chunks(text: &str, source_path: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    split(text, max_chars, overlap)
        .map(|window| Chunk::new(window, source_path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
        split(text, max_chars, overlap).map(str::to_string).collect()
    }

    /// Stitch windows back together by dropping each overlapped prefix.
    fn reconstruct(parts: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i == 0 {
                out.push_str(part);
            } else {
                out.extend(part.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(windows("", 1000, 200).is_empty());
        assert!(make_chunks("", "a.md", 10, 2).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(windows("abc", 1000, 200), vec!["abc"]);
    }

    #[test]
    fn test_exact_length_single_chunk() {
        assert_eq!(windows("abcd", 4, 1), vec!["abcd"]);
    }

    #[test]
    fn test_windows_and_overlap() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let parts = windows(&text, 1000, 200);
        assert_eq!(parts.len(), 3);
        for part in &parts[..parts.len() - 1] {
            assert_eq!(part.chars().count(), 1000);
        }
        for pair in parts.windows(2) {
            let tail: String = pair[0].chars().skip(800).collect();
            let head: String = pair[1].chars().take(200).collect();
            assert_eq!(tail, head);
        }
        assert_eq!(reconstruct(&parts, 200), text);
    }

    #[test]
    fn test_coverage_and_count_over_many_lengths() {
        for (max_chars, overlap) in [(10, 0), (10, 3), (7, 6), (1, 0), (5, 4)] {
            for len in 1..60usize {
                let text: String = (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
                let parts = windows(&text, max_chars, overlap);

                assert!(parts.iter().all(|p| p.chars().count() <= max_chars));
                assert_eq!(reconstruct(&parts, overlap), text, "len={len} max={max_chars} ov={overlap}");

                let expected = if len <= max_chars {
                    1
                } else {
                    (len - overlap).div_ceil(max_chars - overlap)
                };
                assert_eq!(parts.len(), expected, "len={len} max={max_chars} ov={overlap}");
            }
        }
    }

    #[test]
    fn test_overlap_not_smaller_than_window_terminates() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let equal = windows(text, 5, 5);
        assert_eq!(equal, vec!["abcde", "fghij", "klmno", "pqrst", "uvwxy", "z"]);

        let larger = windows(text, 4, 50);
        assert_eq!(larger.concat(), text);
        assert_eq!(larger.len(), 7);
    }

    #[test]
    fn test_zero_max_chars_terminates() {
        assert_eq!(windows("abc", 0, 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "héllo wörld ✓✓✓";
        let parts = windows(text, 4, 1);
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
        assert_eq!(reconstruct(&parts, 1), text);
    }

    #[test]
    fn test_make_chunks_attaches_source_in_order() {
        let chunks = make_chunks("abcdefgh", "docs/guide.md", 4, 2);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "cdef", "efgh"]);
        assert!(chunks.iter().all(|c| c.metadata.source == "docs/guide.md"));
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        assert_eq!(make_chunks(&text, "a", 64, 16), make_chunks(&text, "a", 64, 16));
    }

    #[test]
    fn test_chunk_json_shape() {
        let chunk = Chunk::new("alpha", "notes/a.txt");
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "alpha", "metadata": {"source": "notes/a.txt"}})
        );
    }

    #[test]
    fn test_missing_source_reads_as_unknown() {
        let chunk: Chunk = serde_json::from_str(r#"{"text": "x", "metadata": {}}"#).unwrap();
        assert_eq!(chunk.source(), "unknown");
    }
}
