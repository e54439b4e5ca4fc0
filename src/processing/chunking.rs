//! Boundary-aware text splitting with bounded overlap.
//!
//! Splitting is delegated to `text-splitter`, sized in chars. It prefers the coarsest semantic
//! boundary that fits (line breaks, then sentences, then words, then graphemes). Whitespace is
//! kept so that de-overlapped chunks reproduce the source exactly. Chunks carry their byte span
//! in the source text.

use super::types::ChunkingError;
use text_splitter::{ChunkConfig, TextSplitter};

/// A bounded-length window over the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the chunk sequence.
    pub index: usize,
    /// Chunk contents, equal to `source[start..end]`.
    pub text: String,
    /// Byte offset where the chunk starts.
    pub start: usize,
    /// Byte offset one past the chunk's end.
    pub end: usize,
}

/// Splits text into overlapping chunks of at most `chunk_size` chars.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Build a chunker; `overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        let invalid_overlap = || ChunkingError::InvalidOverlap {
            chunk_size,
            overlap,
        };
        if overlap >= chunk_size {
            return Err(invalid_overlap());
        }
        let config = ChunkConfig::new(chunk_size)
            .with_trim(false)
            .with_overlap(overlap)
            .map_err(|_| invalid_overlap())?;
        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            overlap,
        })
    }

    /// Split `text` into ordered chunks. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = self
            .splitter
            .chunk_indices(text)
            .enumerate()
            .map(|(index, (start, slice))| Chunk {
                index,
                text: slice.to_string(),
                start,
                end: start + slice.len(),
            })
            .collect();

        tracing::debug!(
            bytes = text.len(),
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap,
            "Split text into chunks"
        );
        chunks
    }
}
