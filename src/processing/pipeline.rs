//! Background processing run: extract, chunk, embed, persist.

use super::batcher::EmbeddingBatcher;
use super::chunking::TextChunker;
use super::extract::extract_text;
use super::status::StatusHandle;
use super::types::PipelineError;
use crate::metrics::ServiceMetrics;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Files that yielded text.
    pub files_read: usize,
    /// Files skipped as unreadable.
    pub files_skipped: usize,
    /// Chunks embedded and persisted.
    pub chunk_count: usize,
}

/// Sequences the processing stages and reports progress through a [`StatusHandle`].
pub struct Pipeline {
    chunker: Arc<TextChunker>,
    batcher: EmbeddingBatcher,
    vector_store_dir: PathBuf,
    snapshot_lock: Arc<Mutex<()>>,
    metrics: Arc<ServiceMetrics>,
}

impl Pipeline {
    /// Assemble a pipeline writing its snapshot to `vector_store_dir`.
    ///
    /// `snapshot_lock` must be the same lock the upload path holds while it resets the
    /// snapshot and starts a new generation.
    pub fn new(
        chunker: TextChunker,
        batcher: EmbeddingBatcher,
        vector_store_dir: PathBuf,
        snapshot_lock: Arc<Mutex<()>>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            chunker: Arc::new(chunker),
            batcher,
            vector_store_dir,
            snapshot_lock,
            metrics,
        }
    }

    /// Process `paths` to completion and record the terminal status.
    pub async fn run(
        &self,
        paths: Vec<PathBuf>,
        handle: StatusHandle,
    ) -> Result<PipelineOutcome, PipelineError> {
        let generation = handle.generation();
        tracing::info!(generation, files = paths.len(), "Processing run started");

        let result = self.execute(paths, &handle).await;
        match &result {
            Ok(outcome) => {
                handle.complete("PDF processing completed successfully.");
                self.metrics.record_run(outcome.chunk_count as u64);
                tracing::info!(
                    generation,
                    chunks = outcome.chunk_count,
                    files_read = outcome.files_read,
                    files_skipped = outcome.files_skipped,
                    "Processing run completed"
                );
            }
            Err(PipelineError::Superseded) => {
                tracing::info!(generation, "Discarding output of superseded run");
            }
            Err(error) => {
                if handle.fail(error.status_message()) {
                    self.metrics.record_failure();
                }
                tracing::error!(generation, error = %error, "Processing run failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        paths: Vec<PathBuf>,
        handle: &StatusHandle,
    ) -> Result<PipelineOutcome, PipelineError> {
        handle.progress("Extracting text from PDFs...");
        let report = tokio::task::spawn_blocking(move || extract_text(&paths))
            .await
            .map_err(|error| PipelineError::BlockingTask(error.to_string()))?;
        if report.is_empty() {
            return Err(PipelineError::NoText);
        }

        handle.progress("Creating text chunks...");
        let chunker = Arc::clone(&self.chunker);
        let text = report.text;
        let chunks = tokio::task::spawn_blocking(move || chunker.chunk(&text))
            .await
            .map_err(|error| PipelineError::BlockingTask(error.to_string()))?;

        handle.progress(format!(
            "Creating vector embeddings for {} chunks...",
            chunks.len()
        ));
        let index = self.batcher.build_index(&chunks).await?;

        let _guard = self.snapshot_lock.lock().await;
        if !handle.is_current() {
            return Err(PipelineError::Superseded);
        }
        index
            .save(&self.vector_store_dir)
            .await
            .map_err(PipelineError::Persistence)?;

        Ok(PipelineOutcome {
            files_read: report.files_read,
            files_skipped: report.files_skipped,
            chunk_count: index.len(),
        })
    }
}
