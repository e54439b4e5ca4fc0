//! Batched embedding of chunks into a single vector index.

use super::chunking::Chunk;
use super::types::BatchError;
use crate::embedding::{EmbeddingTask, SharedEmbeddingClient};
use crate::index::{IndexInput, VectorIndex};
use std::time::Duration;

/// Embeds chunks in fixed-size batches, pausing between remote calls.
///
/// Each batch becomes a small index that is merged into the running one; a failing batch
/// aborts the whole build.
pub struct EmbeddingBatcher {
    client: SharedEmbeddingClient,
    batch_size: usize,
    pacing: Duration,
}

impl EmbeddingBatcher {
    /// Create a batcher issuing at most `batch_size` texts per call.
    pub fn new(client: SharedEmbeddingClient, batch_size: usize, pacing: Duration) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            pacing,
        }
    }

    /// Embed every chunk and return the merged index.
    pub async fn build_index(&self, chunks: &[Chunk]) -> Result<VectorIndex, BatchError> {
        if chunks.is_empty() {
            return Err(BatchError::NoChunks);
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut index = VectorIndex::new();

        for (batch, group) in chunks.chunks(self.batch_size).enumerate() {
            if batch > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            tracing::debug!(
                batch,
                total_batches,
                size = group.len(),
                "Embedding chunk batch"
            );

            let texts: Vec<String> = group.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self
                .client
                .generate_embeddings(texts, EmbeddingTask::Document)
                .await
                .map_err(|source| BatchError::Embedding { batch, source })?;

            let inputs = group
                .iter()
                .map(|chunk| IndexInput {
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                })
                .collect();
            let batch_index = VectorIndex::from_embeddings(inputs, vectors)
                .map_err(|source| BatchError::Index { batch, source })?;
            index
                .merge_from(batch_index)
                .map_err(|source| BatchError::Index { batch, source })?;
        }

        tracing::info!(
            chunks = chunks.len(),
            batches = total_batches,
            entries = index.len(),
            "Built vector index"
        );
        Ok(index)
    }
}
