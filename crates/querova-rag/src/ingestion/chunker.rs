//! Text chunking with page and position tracking
//!
//! Offsets and sizes are counted in characters. Each chunk ends at the
//! latest sentence boundary that still moves past the overlap, then the
//! latest word boundary, then a hard cut at `chunk_size`. The next chunk
//! starts exactly `chunk_overlap` characters before that cut.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;

/// A chunk before it is attached to a document and embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub chunk_index: u32,
    pub page_number: Option<u32>,
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; fails unless `0 <= overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
        }
        .validate()?;

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into overlapping chunks.
    ///
    /// `page_boundaries` are sorted character offsets where pages begin;
    /// each chunk is tagged with the page holding its first character.
    pub fn chunk(&self, text: &str, page_boundaries: &[usize]) -> Vec<ChunkDraft> {
        let offsets = CharOffsets::new(text);
        let n = offsets.len();
        if n == 0 {
            return Vec::new();
        }

        let sentence_bounds = offsets.to_chars(text.split_sentence_bound_indices().map(|(b, _)| b));
        let word_bounds = offsets.to_chars(text.split_word_bound_indices().map(|(b, _)| b));

        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let limit = (start + self.chunk_size).min(n);
            let end = if limit == n {
                n
            } else {
                // Cutting after start+overlap guarantees the next chunk starts later
                let min_cut = start + self.overlap + 1;
                latest_within(&sentence_bounds, min_cut, limit)
                    .or_else(|| latest_within(&word_bounds, min_cut, limit))
                    .unwrap_or(limit)
            };

            chunks.push(ChunkDraft {
                text: offsets.slice(text, start, end).to_string(),
                char_start: start,
                char_end: end,
                chunk_index: chunks.len() as u32,
                page_number: page_for(page_boundaries, start),
            });

            if end == n {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }
}

/// Split `text` with an explicit size and overlap
pub fn chunk(
    text: &str,
    page_boundaries: &[usize],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<ChunkDraft>> {
    Ok(TextChunker::new(chunk_size, chunk_overlap)?.chunk(text, page_boundaries))
}

/// 1-based page containing `offset`; `None` when the text has no page structure
fn page_for(page_boundaries: &[usize], offset: usize) -> Option<u32> {
    if page_boundaries.is_empty() {
        return None;
    }
    let pages_started = page_boundaries.partition_point(|&b| b <= offset);
    Some(pages_started.max(1) as u32)
}

/// Latest boundary `b` with `min <= b <= max`
fn latest_within(bounds: &[usize], min: usize, max: usize) -> Option<usize> {
    let idx = bounds.partition_point(|&b| b <= max);
    match idx {
        0 => None,
        i if bounds[i - 1] >= min => Some(bounds[i - 1]),
        _ => None,
    }
}

/// Byte offset of every character, plus the text length as a sentinel
struct CharOffsets(Vec<usize>);

impl CharOffsets {
    fn new(text: &str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self(offsets)
    }

    fn len(&self) -> usize {
        self.0.len() - 1
    }

    /// Convert ascending byte offsets (always on char boundaries) to char offsets
    fn to_chars(&self, bytes: impl Iterator<Item = usize>) -> Vec<usize> {
        bytes
            .filter_map(|b| self.0.binary_search(&b).ok())
            .filter(|&c| c > 0)
            .collect()
    }

    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.0[start]..self.0[end]]
    }
}
