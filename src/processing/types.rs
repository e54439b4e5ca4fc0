//! Core data types and error definitions for the processing pipeline.

use crate::embedding::EmbeddingClientError;
use crate::generation::ChatClientError;
use crate::index::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while configuring the text splitter.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible length budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Configured maximum chunk length.
        chunk_size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// Errors raised while reading a single PDF.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// File could not be opened or parsed as a PDF.
    #[error("failed to load {path}: {message}")]
    Load {
        /// Offending file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// A page's content stream could not be decoded.
    #[error("failed to read page {page} of {path}: {message}")]
    Page {
        /// Offending file.
        path: PathBuf,
        /// One-based page number.
        page: u32,
        /// Parser diagnostic.
        message: String,
    },
}

/// Errors that abort the embedding phase.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Nothing to embed.
    #[error("no chunks to embed")]
    NoChunks,
    /// The embedding provider failed for one batch.
    #[error("embedding batch {batch} failed: {source}")]
    Embedding {
        /// Zero-based batch number.
        batch: usize,
        /// Provider error.
        #[source]
        source: EmbeddingClientError,
    },
    /// A batch could not be turned into index entries or merged.
    #[error("indexing batch {batch} failed: {source}")]
    Index {
        /// Zero-based batch number.
        batch: usize,
        /// Index error.
        #[source]
        source: IndexError,
    },
}

/// Terminal failures of a background processing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No file yielded any text.
    #[error("no text could be extracted from the uploaded PDFs")]
    NoText,
    /// A blocking extraction or chunking task did not finish.
    #[error("background task failed: {0}")]
    BlockingTask(String),
    /// Embedding or index construction failed.
    #[error("{0}")]
    Embedding(#[from] BatchError),
    /// The finished index could not be written to disk.
    #[error("failed to persist index: {0}")]
    Persistence(#[source] IndexError),
    /// A newer upload replaced this run before it could persist its index.
    #[error("run was superseded by a newer upload")]
    Superseded,
}

impl PipelineError {
    /// Human-readable message recorded in the processing status.
    pub fn status_message(&self) -> String {
        match self {
            Self::NoText => "Could not extract text from PDFs.".to_string(),
            Self::Embedding(_) | Self::Persistence(_) => {
                format!("Failed to create vector store: {self}")
            }
            Self::BlockingTask(_) | Self::Superseded => {
                format!("Error processing PDFs: {self}")
            }
        }
    }
}

/// Errors emitted by the processing service outside the background run.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking configuration was rejected.
    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding client could not be constructed.
    #[error("Failed to initialize embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Chat client could not be constructed.
    #[error("Failed to initialize chat model: {0}")]
    Chat(#[from] ChatClientError),
    /// Upload contained no files.
    #[error("No files provided")]
    NoFiles,
    /// Upload file name has no usable final path component.
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
    /// Upload or index directories could not be prepared.
    #[error("Failed to store uploaded files: {0}")]
    Io(#[from] std::io::Error),
    /// The previous index snapshot could not be removed.
    #[error("Failed to reset vector store: {0}")]
    Index(#[from] IndexError),
}
