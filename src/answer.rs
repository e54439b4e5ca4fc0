//! Retrieval-augmented answering over the persisted vector index.

use crate::embedding::{EmbeddingTask, SharedEmbeddingClient};
use crate::generation::{ChatRequest, SharedChatClient};
use crate::index::{IndexError, VectorIndex};
use crate::processing::status::ProcessingStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix the model must use when the question is not grounded in the uploaded documents.
pub const OUT_OF_CONTEXT_MARKER: &str =
    "⚠️ The question is not related to the uploaded PDF, but here's the response:";

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Processing has not reached `completed`.
    #[error("PDF processing not completed. Current status: {}", .0.status)]
    NotReady(ProcessingStatus),
    /// No index snapshot exists on disk.
    #[error("No processed documents found. Please upload PDFs first.")]
    NoDocuments,
    /// Retrieval or generation failed.
    #[error("{0}")]
    Failed(String),
}

/// Render the grounded-answer prompt for `question` with the retrieved `context`.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question using the provided context. If the answer is available in the \
context, respond with all the relevant details from it.\n\
If the question is not related to the context, begin your reply with \
\"{OUT_OF_CONTEXT_MARKER}\" and then answer from your general knowledge.\n\n\
Context:\n{context}\n\n\
Question:\n{question}\n\n\
Answer:\n"
    )
}

/// Answers questions by searching the on-disk index and prompting the chat model.
pub struct QuestionAnswerer {
    embedding: SharedEmbeddingClient,
    chat: SharedChatClient,
    vector_store_dir: PathBuf,
    top_k: usize,
    temperature: f32,
}

impl QuestionAnswerer {
    /// Create an answerer reading snapshots from `vector_store_dir`.
    pub fn new(
        embedding: SharedEmbeddingClient,
        chat: SharedChatClient,
        vector_store_dir: PathBuf,
        top_k: usize,
        temperature: f32,
    ) -> Self {
        Self {
            embedding,
            chat,
            vector_store_dir,
            top_k: top_k.max(1),
            temperature,
        }
    }

    /// Answer `question` from the most similar chunks of the current snapshot.
    ///
    /// The snapshot is read from disk on every call.
    pub async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        let index = match VectorIndex::load(&self.vector_store_dir).await {
            Ok(index) => index,
            Err(IndexError::NotFound(_)) => return Err(AnswerError::NoDocuments),
            Err(error) => return Err(AnswerError::Failed(error.to_string())),
        };
        if index.is_empty() {
            return Err(AnswerError::NoDocuments);
        }

        let mut vectors = self
            .embedding
            .generate_embeddings(vec![question.to_string()], EmbeddingTask::Query)
            .await
            .map_err(|error| AnswerError::Failed(error.to_string()))?;
        let query = vectors
            .pop()
            .ok_or_else(|| AnswerError::Failed("embedding provider returned no vector".into()))?;

        let hits = index
            .similarity_search(&query, self.top_k)
            .map_err(|error| AnswerError::Failed(error.to_string()))?;
        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|hit| hit.score),
            "Retrieved context chunks"
        );

        let context = hits
            .iter()
            .map(|hit| hit.entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let answer = self
            .chat
            .generate(ChatRequest {
                prompt: build_prompt(&context, question),
                temperature: self.temperature,
            })
            .await
            .map_err(|error| AnswerError::Failed(error.to_string()))?;
        Ok(answer)
    }
}
