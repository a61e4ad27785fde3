//! Question answering over the indexed fragments.
//!
//! Retrieves the closest fragments for a question, builds a context-grounded
//! prompt, and asks the completion provider for an answer. Empty retrieval
//! yields a canned answer; completion failures degrade to an apologetic
//! message rather than erroring.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::chroma::{CollectionStats, QueryHit};
use crate::completion::CompletionClient;
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::vector_store::{VectorStoreError, VectorStoreService};

const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information to answer your \
     question. Please try rephrasing or ask about a different topic.";

/// Errors surfaced by the question-answering pipeline.
#[derive(Debug, Error)]
pub enum QaError {
    /// Retrieval against the vector store failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),
    /// Formatting the response timestamp failed.
    #[error("Timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// One retrieved fragment included in the answer's supporting context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextItem {
    /// Fragment text.
    pub text: String,
    /// Metadata record stored with the fragment.
    pub metadata: Map<String, Value>,
    /// Similarity distance (lower is closer).
    pub distance: f32,
}

/// Answer to one question, with the context that informed it.
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    /// Generated answer text.
    pub answer: String,
    /// Fragments the answer was grounded on.
    pub context_used: Vec<ContextItem>,
    /// The question as asked.
    pub question: String,
    /// RFC 3339 timestamp of when the answer was produced.
    pub timestamp: String,
}

/// Collection statistics plus ingestion counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Vector store collection statistics.
    pub vector_database: CollectionStats,
    /// Worker-side ingestion counters.
    pub ingestion: MetricsSnapshot,
    /// RFC 3339 timestamp of the snapshot.
    pub timestamp: String,
}

/// Interface consumed by the HTTP layer.
#[async_trait]
pub trait QaApi: Send + Sync {
    /// Answer a question, optionally scoped to specific documents.
    async fn ask(
        &self,
        question: &str,
        max_context_results: usize,
        document_ids: Option<&[String]>,
    ) -> Result<QaResponse, QaError>;

    /// Collection statistics plus ingestion counters.
    async fn stats(&self) -> Result<StatsResponse, QaError>;
}

/// Retrieval plus completion, composed into the QA pipeline.
pub struct QaService {
    vector_store: VectorStoreService,
    completion: Box<dyn CompletionClient + Send + Sync>,
    metrics: Arc<IngestMetrics>,
}

impl QaService {
    /// Construct the service from its collaborators.
    pub fn new(
        vector_store: VectorStoreService,
        completion: Box<dyn CompletionClient + Send + Sync>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            vector_store,
            completion,
            metrics,
        }
    }

    fn build_prompt(question: &str, hits: &[QueryHit]) -> String {
        let context = hits
            .iter()
            .enumerate()
            .map(|(idx, hit)| {
                let source = hit
                    .metadata
                    .get("source")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown source");
                format!("Context {} (Source: {}):\n{}\n", idx + 1, source, hit.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Based on the following context, please answer the question below.\n\n\
             Context:\n{context}\n\n\
             Question: {question}\n\n\
             Please provide a clear and concise answer based only on the information \
             provided in the context. If the context doesn't contain enough information \
             to answer the question completely, please say so."
        )
    }
}

fn rfc3339_now() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

#[async_trait]
impl QaApi for QaService {
    async fn ask(
        &self,
        question: &str,
        max_context_results: usize,
        document_ids: Option<&[String]>,
    ) -> Result<QaResponse, QaError> {
        tracing::info!(question_chars = question.len(), "Answering question");

        let hits = self
            .vector_store
            .search(question, max_context_results, document_ids)
            .await?;

        if hits.is_empty() {
            tracing::warn!("No relevant context found for the question");
            return Ok(QaResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                context_used: Vec::new(),
                question: question.to_string(),
                timestamp: rfc3339_now()?,
            });
        }

        let prompt = Self::build_prompt(question, &hits);
        let answer = match self.completion.complete(&prompt).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!(error = %err, "Completion failed, degrading answer");
                format!(
                    "Sorry, I encountered an error while processing your question: {err}"
                )
            }
        };

        Ok(QaResponse {
            answer,
            context_used: hits
                .into_iter()
                .map(|hit| ContextItem {
                    text: hit.text,
                    metadata: hit.metadata,
                    distance: hit.distance,
                })
                .collect(),
            question: question.to_string(),
            timestamp: rfc3339_now()?,
        })
    }

    async fn stats(&self) -> Result<StatsResponse, QaError> {
        let vector_database = self.vector_store.stats().await?;
        Ok(StatsResponse {
            vector_database,
            ingestion: self.metrics.snapshot(),
            timestamp: rfc3339_now()?,
        })
    }
}
