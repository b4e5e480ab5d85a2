//! Overlapping-window text chunker.
//!
//! Splits cleaned document text into windows of at most `chunk_size`
//! characters. Consecutive windows overlap by `overlap` characters so that
//! a sentence cut at a window edge is still seen whole by one of them.
//!
//! # Algorithm
//!
//! 1. Text no longer than `chunk_size` is returned as a single chunk.
//! 2. Otherwise a cursor walks the text. Each window ends at
//!    `start + chunk_size`, pulled back to just after the last `.` in the
//!    window, or failing that to the last space.
//! 3. The window is trimmed and emitted unless empty.
//! 4. The next window starts `overlap` characters before the current end.
//!    If that would not move the cursor forward, it starts at the end.
//! 5. The walk stops once a window reaches the end of the text.
//!
//! All positions are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use knowledge_assistant::chunk::Chunker;
//!
//! let chunker = Chunker::new(10, 3).unwrap();
//! let chunks = chunker.chunk("abcdefghijklmnopqrstuvwxyz");
//! assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]);
//! ```

use std::ops::Range;

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// Punctuation kept by [`clean_text`]; everything else that is not a word
/// character or whitespace becomes a space.
const KEPT_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '(', ')', '-', '\'', '"'];

/// Normalize raw extracted text before chunking.
///
/// Collapses whitespace runs to single spaces, replaces characters outside
/// word characters and [`KEPT_PUNCTUATION`] with spaces, and trims.
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric()
                || c == '_'
                || c.is_whitespace()
                || KEPT_PUNCTUATION.contains(&c)
            {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic splitter for a single document's cleaned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl Chunker {
    /// Build a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidChunking {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, overlapping chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        self.windows(&chars)
            .into_iter()
            .filter_map(|range| {
                let piece: String = chars[range].iter().collect();
                let trimmed = piece.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect()
    }

    /// Character ranges of every window the cursor visits, before trimming.
    pub fn windows(&self, chars: &[char]) -> Vec<Range<usize>> {
        let len = chars.len();
        let mut out = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + self.chunk_size).min(len);

            if end < len {
                if let Some(p) = rfind_after(chars, start, end, '.') {
                    end = p + 1;
                } else if let Some(p) = rfind_after(chars, start, end, ' ') {
                    end = p;
                }
            }

            out.push(start..end);

            if end >= len {
                break;
            }

            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        out
    }
}

/// Last position `p` with `start < p < end` holding `needle`.
fn rfind_after(chars: &[char], start: usize, end: usize, needle: char) -> Option<usize> {
    (start + 1..end).rev().find(|&i| chars[i] == needle)
}
