//! HTTP client wrapper for interacting with Chroma.

use crate::chroma::types::{
    ChromaError, CollectionResponse, CollectionStats, DocumentListing, GetResponse, QueryHit,
    QueryResponse,
};
use reqwest::{Client, Method};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

/// Lightweight HTTP client for Chroma collection operations.
///
/// The collection is resolved once (`get_or_create`, cosine space) and its
/// identifier cached for the lifetime of the client.
pub struct ChromaService {
    client: Client,
    base_url: String,
    collection_name: String,
    collection_id: OnceCell<String>,
}

impl ChromaService {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config() -> Result<Self, ChromaError> {
        let config = crate::config::get_config();
        Self::new(&config.chroma_url, config.chroma_collection.clone())
    }

    /// Construct a client against an explicit base URL and collection name.
    pub fn new(base_url: &str, collection_name: String) -> Result<Self, ChromaError> {
        let client = Client::builder().user_agent("docuvec/0.3").build()?;
        let base_url = normalize_base_url(base_url).map_err(ChromaError::InvalidUrl)?;
        tracing::debug!(url = %base_url, collection = %collection_name, "Initialized Chroma HTTP client");
        Ok(Self {
            client,
            base_url,
            collection_name,
            collection_id: OnceCell::new(),
        })
    }

    /// Name of the managed collection.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Resolve the collection identifier, creating the collection if missing.
    async fn collection_id(&self) -> Result<&str, ChromaError> {
        self.collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection_name,
                    "get_or_create": true,
                    "metadata": { "hnsw:space": "cosine" },
                });
                let response = self
                    .request(Method::POST, "api/v1/collections")
                    .json(&body)
                    .send()
                    .await?;
                let response = self.ensure_success(response).await?;
                let collection: CollectionResponse = response.json().await?;
                tracing::debug!(
                    collection = %self.collection_name,
                    id = %collection.id,
                    "Collection ensured"
                );
                Ok(collection.id)
            })
            .await
            .map(String::as_str)
    }

    /// Persist one batch of fragments with their embeddings and metadata.
    ///
    /// The batch either fully succeeds or errors; Chroma applies the add
    /// atomically per call.
    pub async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
    ) -> Result<(), ChromaError> {
        if ids.is_empty() {
            return Ok(());
        }
        let count = ids.len();
        let collection_id = self.collection_id().await?;
        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });
        let response = self
            .request(
                Method::POST,
                &format!("api/v1/collections/{collection_id}/add"),
            )
            .json(&body)
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(collection = %self.collection_name, fragments = count, "Fragments added");
        Ok(())
    }

    /// Similarity search, optionally scoped to a set of document identifiers.
    pub async fn query(
        &self,
        embedding: Vec<f32>,
        n_results: usize,
        document_ids: Option<&[String]>,
    ) -> Result<Vec<QueryHit>, ChromaError> {
        let collection_id = self.collection_id().await?;
        let mut body = Map::new();
        body.insert("query_embeddings".into(), json!([embedding]));
        body.insert("n_results".into(), json!(n_results));
        body.insert(
            "include".into(),
            json!(["documents", "metadatas", "distances"]),
        );
        if let Some(ids) = document_ids
            && !ids.is_empty()
        {
            body.insert("where".into(), json!({ "documentId": { "$in": ids } }));
        }

        let response = self
            .request(
                Method::POST,
                &format!("api/v1/collections/{collection_id}/query"),
            )
            .json(&body)
            .send()
            .await?;
        let response = self.ensure_success(response).await?;
        let parsed: QueryResponse = response.json().await?;

        // Chroma nests results per query embedding; we always send exactly one.
        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let mut metadatas = parsed
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let mut distances = parsed
            .distances
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();

        let hits = documents
            .into_iter()
            .map(|text| QueryHit {
                text,
                metadata: metadatas.next().unwrap_or_default(),
                distance: distances.next().unwrap_or(0.0),
            })
            .collect();
        Ok(hits)
    }

    /// Aggregate fragment count plus a per-document listing.
    pub async fn stats(&self) -> Result<CollectionStats, ChromaError> {
        let collection_id = self.collection_id().await?;

        let response = self
            .request(
                Method::GET,
                &format!("api/v1/collections/{collection_id}/count"),
            )
            .send()
            .await?;
        let response = self.ensure_success(response).await?;
        let total_fragments: usize = response.json().await?;

        let response = self
            .request(
                Method::POST,
                &format!("api/v1/collections/{collection_id}/get"),
            )
            .json(&json!({ "include": ["metadatas"] }))
            .send()
            .await?;
        let response = self.ensure_success(response).await?;
        let listing: GetResponse = response.json().await?;

        let mut per_document: BTreeMap<String, (String, usize)> = BTreeMap::new();
        for metadata in listing.metadatas {
            let document_id = metadata
                .get("documentId")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let source = metadata
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let entry = per_document.entry(document_id).or_insert((source, 0));
            entry.1 += 1;
        }

        Ok(CollectionStats {
            collection_name: self.collection_name.clone(),
            total_fragments,
            documents: per_document
                .into_iter()
                .map(|(document_id, (source, fragments))| DocumentListing {
                    document_id,
                    source,
                    fragments,
                })
                .collect(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        self.client.request(method, url)
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ChromaError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ChromaError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection_name, error = %error, "Chroma request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
