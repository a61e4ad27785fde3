//! Per-document ingestion orchestration.
//!
//! Pulls the blob from the object store, extracts and chunks its text,
//! indexes the fragments, and reports status transitions. Collaborator
//! failures never escape; every attempt collapses to one
//! [`IngestionOutcome`].

use async_trait::async_trait;

use crate::aws::ObjectStore;
use crate::processing::extract::{extract_fragments, file_extension};
use crate::processing::types::{IngestionJob, IngestionOutcome, TextFragment};
use crate::status::{DocumentStatus, StatusSink};
use crate::vector_store::FragmentIndex;

/// Interface over single-document processing, consumed by the worker.
#[async_trait]
pub trait ProcessDocument: Send + Sync {
    /// Process one job to a terminal outcome. Never panics or errors.
    async fn process(&self, job: &IngestionJob) -> IngestionOutcome;
}

/// Orchestrates one document through download, extraction, and indexing.
pub struct DocumentProcessor<S, R, V> {
    store: S,
    status: R,
    index: V,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<S, R, V> DocumentProcessor<S, R, V>
where
    S: ObjectStore,
    R: StatusSink,
    V: FragmentIndex,
{
    /// Construct a processor from its collaborators and chunking parameters.
    pub fn new(store: S, status: R, index: V, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            store,
            status,
            index,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Status reporting is advisory; a failed report never fails the job.
    async fn report(&self, document_id: &str, status: DocumentStatus, message: &str) {
        if let Err(err) = self.status.update(document_id, status, message).await {
            tracing::warn!(document_id, ?status, error = %err, "Status report failed");
        }
    }

    async fn run(&self, job: &IngestionJob) -> IngestionOutcome {
        let blob = match self.store.download(&job.source_key).await {
            Ok(blob) => blob,
            Err(err) => {
                tracing::error!(
                    document_id = %job.document_id,
                    source_key = %job.source_key,
                    attempt = job.attempt,
                    max_attempts = job.max_attempts,
                    error = %err,
                    "Failed to download document"
                );
                return IngestionOutcome::failed("error processing document");
            }
        };

        let texts = extract_fragments(
            blob.path(),
            &job.source_key,
            self.chunk_size,
            self.chunk_overlap,
        );
        // The local copy is released exactly once, whatever happens next.
        self.store.dispose(blob).await;

        if texts.is_empty() {
            tracing::warn!(
                document_id = %job.document_id,
                source_key = %job.source_key,
                "No content extracted"
            );
            return IngestionOutcome::failed("no content extracted");
        }

        let total = texts.len();
        let file_type = file_extension(&job.source_key);
        let fragments: Vec<TextFragment> = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextFragment {
                text,
                index,
                total_fragments: total,
                document_id: job.document_id.clone(),
                source_key: job.source_key.clone(),
                file_type: file_type.clone(),
            })
            .collect();

        if let Err(err) = self.index.index_fragments(&fragments).await {
            tracing::error!(
                document_id = %job.document_id,
                attempt = job.attempt,
                max_attempts = job.max_attempts,
                error = %err,
                "Failed to index fragments"
            );
            return IngestionOutcome::failed("error processing document");
        }

        self.report(
            &job.document_id,
            DocumentStatus::Completed,
            &format!("Successfully processed {total} text fragments"),
        )
        .await;

        tracing::info!(
            document_id = %job.document_id,
            source_key = %job.source_key,
            fragments = total,
            "Document processed"
        );
        IngestionOutcome::success(total)
    }
}

#[async_trait]
impl<S, R, V> ProcessDocument for DocumentProcessor<S, R, V>
where
    S: ObjectStore,
    R: StatusSink,
    V: FragmentIndex,
{
    async fn process(&self, job: &IngestionJob) -> IngestionOutcome {
        self.report(
            &job.document_id,
            DocumentStatus::Processing,
            &format!(
                "Document processing started (attempt {}/{})",
                job.attempt, job.max_attempts
            ),
        )
        .await;

        self.run(job).await
    }
}
