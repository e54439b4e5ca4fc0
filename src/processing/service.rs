//! Processing service coordinating uploads, the background pipeline, and question answering.

use crate::{
    answer::{AnswerError, QuestionAnswerer},
    config::Config,
    embedding::{SharedEmbeddingClient, get_embedding_client},
    generation::{SharedChatClient, get_chat_client},
    index::remove_snapshot,
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        batcher::EmbeddingBatcher,
        chunking::TextChunker,
        pipeline::Pipeline,
        status::{ProcessingStatus, StatusKind, StatusTracker},
        types::ProcessingError,
    },
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One file received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name; only its final path component is used.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Acknowledgement returned once an upload batch is stored and processing has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Names the files were stored under.
    pub files: Vec<String>,
    /// Status right after dispatch (always `processing`).
    pub status: StatusKind,
}

/// Abstraction over the service used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Replace the current document set with `files` and start processing it in the background.
    async fn start_processing(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<UploadReceipt, ProcessingError>;

    /// Current processing status.
    fn processing_status(&self) -> ProcessingStatus;

    /// Answer a question against the processed documents.
    async fn answer_question(&self, question: &str) -> Result<String, AnswerError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the status tracker, the pipeline, and the answerer.
///
/// Construct once near process start and share through an `Arc`.
pub struct ProcessingService {
    upload_dir: PathBuf,
    vector_store_dir: PathBuf,
    status: StatusTracker,
    pipeline: Arc<Pipeline>,
    answerer: QuestionAnswerer,
    snapshot_lock: Arc<Mutex<()>>,
    metrics: Arc<ServiceMetrics>,
}

impl ProcessingService {
    /// Build the service with the providers selected by `config`.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!(provider = ?config.embedding_provider, "Initializing embedding client");
        let embedding = get_embedding_client(config)?;
        tracing::info!(model = %config.chat_model, "Initializing chat client");
        let chat = get_chat_client(config)?;
        Self::with_clients(config, embedding, chat)
    }

    /// Build the service around explicit providers.
    pub fn with_clients(
        config: &Config,
        embedding: SharedEmbeddingClient,
        chat: SharedChatClient,
    ) -> Result<Self, ProcessingError> {
        std::fs::create_dir_all(&config.upload_dir)?;

        let chunker = TextChunker::new(
            config.text_splitter_chunk_size,
            config.text_splitter_chunk_overlap,
        )?;
        let batcher = EmbeddingBatcher::new(
            Arc::clone(&embedding),
            config.embedding_batch_size,
            Duration::from_millis(config.embedding_batch_delay_ms),
        );
        let snapshot_lock = Arc::new(Mutex::new(()));
        let metrics = Arc::new(ServiceMetrics::new());
        let pipeline = Pipeline::new(
            chunker,
            batcher,
            config.vector_store_dir.clone(),
            Arc::clone(&snapshot_lock),
            Arc::clone(&metrics),
        );
        let answerer = QuestionAnswerer::new(
            embedding,
            chat,
            config.vector_store_dir.clone(),
            config.search_top_k,
            config.chat_temperature,
        );

        Ok(Self {
            upload_dir: config.upload_dir.clone(),
            vector_store_dir: config.vector_store_dir.clone(),
            status: StatusTracker::new(),
            pipeline: Arc::new(pipeline),
            answerer,
            snapshot_lock,
            metrics,
        })
    }

    /// Store an upload batch, reset the index, and spawn the pipeline.
    ///
    /// Files are written to a staging directory first. The previous uploads, snapshot, and
    /// status are only replaced once every file has been stored.
    pub async fn start_processing(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<UploadReceipt, ProcessingError> {
        if files.is_empty() {
            return Err(ProcessingError::NoFiles);
        }

        let guard = self.snapshot_lock.lock().await;
        let staging = staging_dir(&self.upload_dir);
        let names = match stage_files(&staging, &files).await {
            Ok(names) => names,
            Err(error) => {
                discard_dir(&staging).await;
                tracing::warn!(error = %error, "Upload rejected; previous documents kept");
                return Err(error);
            }
        };
        if let Err(error) = swap_dir(&staging, &self.upload_dir).await {
            discard_dir(&staging).await;
            return Err(error.into());
        }
        let paths: Vec<PathBuf> = names.iter().map(|name| self.upload_dir.join(name)).collect();

        remove_snapshot(&self.vector_store_dir).await?;
        let handle = self.status.begin("Processing PDFs...");
        drop(guard);

        tracing::info!(
            generation = handle.generation(),
            files = names.len(),
            "Upload accepted; processing started"
        );
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            // Outcome is recorded in the status tracker.
            let _ = pipeline.run(paths, handle).await;
        });

        Ok(UploadReceipt {
            files: names,
            status: StatusKind::Processing,
        })
    }

    /// Answer `question` once processing has completed.
    pub async fn answer_question(&self, question: &str) -> Result<String, AnswerError> {
        let status = self.status.snapshot();
        if status.status != StatusKind::Completed {
            return Err(AnswerError::NotReady(status));
        }
        let answer = self.answerer.answer(question).await?;
        self.metrics.record_question();
        tracing::info!(answer_chars = answer.chars().count(), "Question answered");
        Ok(answer)
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn start_processing(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<UploadReceipt, ProcessingError> {
        ProcessingService::start_processing(self, files).await
    }

    fn processing_status(&self) -> ProcessingStatus {
        self.status.snapshot()
    }

    async fn answer_question(&self, question: &str) -> Result<String, AnswerError> {
        ProcessingService::answer_question(self, question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Sibling of `dir` that receives a batch before it replaces `dir`.
fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.with_file_name(format!(".{name}.staging"))
}

async fn stage_files(
    staging: &Path,
    files: &[UploadedFile],
) -> Result<Vec<String>, ProcessingError> {
    remove_dir_if_present(staging).await?;
    tokio::fs::create_dir_all(staging).await?;

    let mut taken = HashSet::new();
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        let name = unique_name(base_name(&file.file_name)?, &mut taken);
        tokio::fs::write(staging.join(&name), &file.bytes).await?;
        tracing::debug!(file = %name, bytes = file.bytes.len(), "Stored upload");
        names.push(name);
    }
    Ok(names)
}

async fn swap_dir(staging: &Path, dir: &Path) -> Result<(), std::io::Error> {
    remove_dir_if_present(dir).await?;
    tokio::fs::rename(staging, dir).await
}

async fn discard_dir(dir: &Path) {
    if let Err(error) = remove_dir_if_present(dir).await {
        tracing::warn!(
            path = %dir.display(),
            error = %error,
            "Failed to remove staging directory"
        );
    }
}

async fn remove_dir_if_present(dir: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

/// Final path component of a client-supplied name, accepting either separator.
fn base_name(file_name: &str) -> Result<&str, ProcessingError> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ProcessingError::InvalidFileName(file_name.to_string()));
    }
    Ok(name)
}

fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut counter = 1;
    loop {
        let candidate = format!("{stem}_{counter}{extension}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
