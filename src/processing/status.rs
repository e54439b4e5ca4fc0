//! Process-wide processing status shared between the pipeline and polling clients.
//!
//! Every upload starts a new *generation*. The background run holds a [`StatusHandle`] for its
//! generation and may only move the record while that generation is current and the record is
//! still `processing`. Updates from a superseded run are dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Lifecycle stage of the current document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Nothing uploaded yet.
    Idle,
    /// A run is extracting, chunking, or embedding.
    Processing,
    /// The index is ready for questions.
    Completed,
    /// The last run failed.
    Failed,
}

impl StatusKind {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the processing status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// Current stage.
    pub status: StatusKind,
    /// Free-form progress or failure description.
    pub message: String,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self {
            status: StatusKind::Idle,
            message: String::new(),
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    generation: u64,
    status: ProcessingStatus,
}

/// Owner of the status record. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl StatusTracker {
    /// Create a tracker in the `idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status record.
    pub fn snapshot(&self) -> ProcessingStatus {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
            .clone()
    }

    /// Start a new run, discarding whatever state came before.
    pub fn begin(&self, message: impl Into<String>) -> StatusHandle {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.status = ProcessingStatus {
            status: StatusKind::Processing,
            message: message.into(),
        };
        tracing::debug!(generation = state.generation, "Processing run started");
        StatusHandle {
            tracker: self.clone(),
            generation: state.generation,
        }
    }

    fn apply(&self, generation: u64, status: StatusKind, message: String) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                next = %status,
                "Ignoring status update from superseded run"
            );
            return false;
        }
        if state.status.status != StatusKind::Processing {
            tracing::warn!(
                from = %state.status.status,
                to = %status,
                "Rejected illegal status transition"
            );
            return false;
        }
        state.status = ProcessingStatus { status, message };
        true
    }
}

/// Write access to the status record for one run.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tracker: StatusTracker,
    generation: u64,
}

impl StatusHandle {
    /// Generation this handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer run has started.
    pub fn is_current(&self) -> bool {
        self.tracker
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
            == self.generation
    }

    /// Update the progress message; the record stays `processing`.
    pub fn progress(&self, message: impl Into<String>) -> bool {
        self.tracker
            .apply(self.generation, StatusKind::Processing, message.into())
    }

    /// Mark the run as finished successfully.
    pub fn complete(&self, message: impl Into<String>) -> bool {
        self.tracker
            .apply(self.generation, StatusKind::Completed, message.into())
    }

    /// Mark the run as failed.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tracker
            .apply(self.generation, StatusKind::Failed, message.into())
    }
}
