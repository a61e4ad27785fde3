use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    documents_processed: AtomicU64,
    documents_failed: AtomicU64,
    fragments_indexed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully processed document and the number of fragments it produced.
    pub fn record_success(&self, fragment_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.fragments_indexed
            .fetch_add(fragment_count, Ordering::Relaxed);
    }

    /// Record a failed processing attempt.
    pub fn record_failure(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            fragments_indexed: self.fragments_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents processed to completion since startup.
    pub documents_processed: u64,
    /// Number of processing attempts that ended in a failed outcome.
    pub documents_failed: u64,
    /// Total fragment count persisted across all processed documents.
    pub fragments_indexed: u64,
}
