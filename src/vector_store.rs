//! Vector store service: embeds text and persists or retrieves fragments.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::chroma::{ChromaError, ChromaService, CollectionStats, QueryHit};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::processing::types::TextFragment;

/// Errors raised while indexing or searching fragments.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Embedding provider failed.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store backend failed.
    #[error("Vector store failed: {0}")]
    Chroma(#[from] ChromaError),
}

/// Interface over fragment persistence, consumed by the processor.
#[async_trait]
pub trait FragmentIndex: Send + Sync {
    /// Embed and persist one batch of fragments. All or nothing.
    async fn index_fragments(&self, fragments: &[TextFragment]) -> Result<(), VectorStoreError>;
}

/// Couples the embedding provider with the Chroma collection.
pub struct VectorStoreService {
    chroma: ChromaService,
    embedding: Box<dyn EmbeddingClient + Send + Sync>,
}

impl VectorStoreService {
    /// Construct the service from its collaborators.
    pub fn new(chroma: ChromaService, embedding: Box<dyn EmbeddingClient + Send + Sync>) -> Self {
        Self { chroma, embedding }
    }

    /// Similarity search for a question, optionally scoped to documents.
    pub async fn search(
        &self,
        question: &str,
        n_results: usize,
        document_ids: Option<&[String]>,
    ) -> Result<Vec<QueryHit>, VectorStoreError> {
        let mut embeddings = self
            .embedding
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let embedding = embeddings.pop().ok_or_else(|| {
            EmbeddingClientError::GenerationFailed("provider returned no embedding".to_string())
        })?;
        let hits = self.chroma.query(embedding, n_results, document_ids).await?;
        Ok(hits)
    }

    /// Aggregate collection statistics.
    pub async fn stats(&self) -> Result<CollectionStats, VectorStoreError> {
        Ok(self.chroma.stats().await?)
    }
}

fn metadata_for(fragment: &TextFragment) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".into(), json!(fragment.source_key));
    metadata.insert("documentId".into(), json!(fragment.document_id));
    metadata.insert("chunk_index".into(), json!(fragment.index));
    metadata.insert("total_chunks".into(), json!(fragment.total_fragments));
    metadata.insert("file_type".into(), json!(fragment.file_type));
    metadata
}

#[async_trait]
impl FragmentIndex for VectorStoreService {
    async fn index_fragments(&self, fragments: &[TextFragment]) -> Result<(), VectorStoreError> {
        if fragments.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let embeddings = self.embedding.generate_embeddings(texts.clone()).await?;

        let ids = fragments
            .iter()
            .map(|_| Uuid::new_v4().to_string())
            .collect();
        let metadatas = fragments.iter().map(metadata_for).collect();

        self.chroma.add(ids, embeddings, texts, metadatas).await?;
        tracing::info!(fragments = fragments.len(), "Indexed fragment batch");
        Ok(())
    }
}
