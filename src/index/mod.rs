//! In-memory vector index with on-disk snapshots.
//!
//! Search is brute-force cosine similarity over every entry; document sets are small enough
//! that an approximate structure would not pay for itself. Snapshots are JSON documents written
//! to a temporary file and renamed into place, so a concurrent reader observes either the old
//! or the new snapshot in full.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_VERSION: u32 = 1;

/// Errors produced while building, merging, or persisting an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Texts and vectors supplied to a build did not line up.
    #[error("expected {expected} vectors, got {actual}")]
    LengthMismatch {
        /// Number of chunks supplied.
        expected: usize,
        /// Number of vectors supplied.
        actual: usize,
    },
    /// A vector's dimension disagrees with the index.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// No snapshot exists at the requested location.
    #[error("no index snapshot found at {0}")]
    NotFound(PathBuf),
    /// Filesystem failure while reading or writing a snapshot.
    #[error("index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot contents could not be encoded or decoded.
    #[error("index snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Snapshot was written by an incompatible version.
    #[error("unsupported index snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// A chunk awaiting insertion together with its source position.
#[derive(Debug, Clone)]
pub struct IndexInput {
    /// Position of the chunk in the source chunk sequence.
    pub chunk_index: usize,
    /// Chunk text.
    pub text: String,
}

/// One embedded chunk stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Random identifier assigned at insertion.
    pub id: Uuid,
    /// Position of the chunk in the source chunk sequence.
    pub chunk_index: usize,
    /// SHA-256 of the chunk text, hex encoded.
    pub chunk_hash: String,
    /// Chunk text returned on retrieval.
    pub text: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

/// A retrieved entry and its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    /// Matched entry.
    pub entry: IndexEntry,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    created_at: String,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// Nearest-neighbour index over embedded chunks.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index whose dimension is fixed by the first insertion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from chunks and their vectors, paired by position.
    pub fn from_embeddings(
        inputs: Vec<IndexInput>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if inputs.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                expected: inputs.len(),
                actual: vectors.len(),
            });
        }

        let mut index = Self::new();
        for (input, vector) in inputs.into_iter().zip(vectors) {
            index.check_dimension(vector.len())?;
            index.entries.push(IndexEntry {
                id: Uuid::new_v4(),
                chunk_index: input.chunk_index,
                chunk_hash: compute_chunk_hash(&input.text),
                text: input.text,
                vector,
            });
        }
        Ok(index)
    }

    /// Move every entry of `other` into this index.
    ///
    /// Fails without modifying `self` when the dimensions disagree.
    pub fn merge_from(&mut self, other: VectorIndex) -> Result<(), IndexError> {
        if let Some(dimension) = other.dimension {
            self.check_dimension(dimension)?;
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    /// Return up to `k` entries ranked by cosine similarity to `query`, best first.
    pub fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                score: cosine_similarity(query, &entry.vector),
                entry: entry.clone(),
            })
            .collect();
        // Ties keep source order so results are reproducible.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.entry.chunk_index.cmp(&b.entry.chunk_index))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Persist the index under `dir`, replacing any previous snapshot.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, IndexError> {
        tokio::fs::create_dir_all(dir).await?;
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            created_at: current_timestamp_rfc3339(),
            dimension: self.dimension,
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let target = snapshot_path(dir);
        let staging = dir.join(format!(".{SNAPSHOT_FILE}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&staging, bytes).await?;
        if let Err(error) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error.into());
        }

        tracing::debug!(
            path = %target.display(),
            entries = self.entries.len(),
            "Saved index snapshot"
        );
        Ok(target)
    }

    /// Load the snapshot stored under `dir`.
    pub async fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = snapshot_path(dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound(path));
            }
            Err(error) => return Err(error.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::UnsupportedVersion(snapshot.version));
        }

        let mut index = Self {
            dimension: snapshot.dimension,
            entries: Vec::with_capacity(snapshot.entries.len()),
        };
        for entry in snapshot.entries {
            index.check_dimension(entry.vector.len())?;
            index.entries.push(entry);
        }
        Ok(index)
    }

    fn check_dimension(&mut self, actual: usize) -> Result<(), IndexError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            Some(_) => Ok(()),
            None => {
                self.dimension = Some(actual);
                Ok(())
            }
        }
    }
}

/// Delete the snapshot directory and everything in it; missing directories are fine.
pub async fn remove_snapshot(dir: &Path) -> Result<(), IndexError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
