//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! splits text by character count with a fixed overlap, nudging each split
//! back to the nearest whitespace when one is close enough.

use crate::document::TextChunk;
use crate::error::{RagError, Result};

/// Default number of characters searched backwards for a word boundary.
pub const DEFAULT_BOUNDARY_WINDOW: usize = 32;

/// A strategy for splitting extracted text into chunks.
///
/// Implementations are pure: the same text always yields the same chunks.
pub trait Chunker: Send + Sync {
    /// Split text into ordered chunks.
    ///
    /// Returns an empty `Vec` if the text is empty.
    fn split(&self, text: &str) -> Vec<TextChunk>;
}

/// Split `text` into chunks of at most `chunk_size` characters where each
/// chunk repeats the last `overlap` characters of the previous one.
///
/// Uses [`DEFAULT_BOUNDARY_WINDOW`] for word-boundary lookback.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] if `chunk_size == 0` or
/// `overlap >= chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextChunk>> {
    Ok(FixedSizeChunker::new(chunk_size, overlap)?.split(text))
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Sizes and offsets count Unicode scalar values. Consecutive chunks share
/// exactly `chunk_overlap` characters, so dropping the first `chunk_overlap`
/// characters of every chunk after the first and concatenating gives back the
/// original text.
///
/// When a split would land inside a word, the chunker looks back up to
/// `boundary_window` characters for whitespace and ends the chunk right
/// after it. If there is none, or ending there would not move the next chunk
/// forward, it splits at the hard limit.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(1000, 200)?;
/// let chunks = chunker.split(&text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    boundary_window: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap, boundary_window: DEFAULT_BOUNDARY_WINDOW })
    }

    /// Set the word-boundary lookback window. Zero disables boundary search.
    pub fn with_boundary_window(mut self, window: usize) -> Self {
        self.boundary_window = window;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Pick the end of a chunk starting at `start` whose hard limit is `hard_end`.
    ///
    /// The result is always greater than `start + chunk_overlap` so the next
    /// chunk starts strictly after this one.
    fn boundary_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        if self.boundary_window == 0 || chars[hard_end].is_whitespace() {
            return hard_end;
        }
        let floor =
            hard_end.saturating_sub(self.boundary_window).max(start + self.chunk_overlap + 1);
        (floor..=hard_end).rev().find(|&end| chars[end - 1].is_whitespace()).unwrap_or(hard_end)
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end < total {
                self.boundary_end(&chars, start, hard_end)
            } else {
                hard_end
            };

            chunks.push(TextChunk {
                index: chunks.len(),
                text: chars[start..end].iter().collect(),
                start,
                end,
            });

            if end >= total {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }
}
