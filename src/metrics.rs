use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing processing and question activity.
#[derive(Default)]
pub struct ServiceMetrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    chunks_indexed: AtomicU64,
    last_chunk_count: AtomicU64,
    questions_answered: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful run and the number of chunks it indexed.
    pub fn record_run(&self, chunk_count: u64) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_count.store(chunk_count, Ordering::Relaxed);
    }

    /// Record a failed run.
    pub fn record_failure(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question.
    pub fn record_question(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let runs_completed = self.runs_completed.load(Ordering::Relaxed);
        MetricsSnapshot {
            runs_completed,
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            last_chunk_count: (runs_completed > 0)
                .then(|| self.last_chunk_count.load(Ordering::Relaxed)),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Processing runs that produced an index.
    pub runs_completed: u64,
    /// Processing runs that ended in `failed`.
    pub runs_failed: u64,
    /// Chunks indexed across all successful runs.
    pub chunks_indexed: u64,
    /// Chunks indexed by the most recent successful run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_count: Option<u64>,
    /// Questions answered since startup.
    pub questions_answered: u64,
}
