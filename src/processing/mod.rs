//! Document processing: extraction, chunking, batched embedding, and run status.

pub mod batcher;
pub mod chunking;
pub mod extract;
pub mod pipeline;
mod service;
pub mod status;
pub mod types;

pub use service::{ProcessingApi, ProcessingService, UploadReceipt, UploadedFile};
pub use status::{ProcessingStatus, StatusKind};
pub use types::{BatchError, ChunkingError, ExtractError, PipelineError, ProcessingError};
