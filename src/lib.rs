#![deny(missing_docs)]

//! Core library for the PDF question-answering server.

/// Retrieval-augmented answer generation.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client abstraction and adapters.
pub mod generation;
/// In-memory vector index with on-disk snapshots.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Processing and question counters.
pub mod metrics;
/// Upload processing pipeline and status tracking.
pub mod processing;
