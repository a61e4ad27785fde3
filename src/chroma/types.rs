//! Shared types used by the Chroma client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Chroma.
#[derive(Debug, Error)]
pub enum ChromaError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Chroma URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Chroma responded with an unexpected status code.
    #[error("Unexpected Chroma response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Chroma.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One retrieval hit: fragment text, its metadata record, and the distance.
#[derive(Debug, Clone)]
pub struct QueryHit {
    /// Stored fragment text.
    pub text: String,
    /// Metadata record persisted with the fragment.
    pub metadata: Map<String, Value>,
    /// Similarity distance reported by Chroma (lower is closer).
    pub distance: f32,
}

/// Aggregate view of the collection, served by the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectionStats {
    /// Name of the collection.
    pub collection_name: String,
    /// Total number of stored fragments.
    pub total_fragments: usize,
    /// Per-document fragment counts.
    pub documents: Vec<DocumentListing>,
}

/// Fragment count for one ingested document.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentListing {
    /// Logical document identifier.
    pub document_id: String,
    /// Storage key the document was ingested from.
    pub source: String,
    /// Number of fragments stored for this document.
    pub fragments: usize,
}

#[derive(Deserialize)]
pub(crate) struct CollectionResponse {
    pub(crate) id: String,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub(crate) documents: Vec<Vec<String>>,
    #[serde(default)]
    pub(crate) metadatas: Vec<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub(crate) distances: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
pub(crate) struct GetResponse {
    #[serde(default)]
    pub(crate) metadatas: Vec<Map<String, Value>>,
}
