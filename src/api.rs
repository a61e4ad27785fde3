//! HTTP surface for question answering.
//!
//! A compact Axum router with three endpoints:
//!
//! - `POST /ask` – Retrieve the closest fragments for a question and generate a
//!   context-grounded answer. Accepts an optional `max_context_results` cap and
//!   an optional `file_id` list restricting retrieval to specific documents.
//! - `GET /stats` – Vector store collection statistics plus ingestion counters.
//! - `GET /` – Liveness probe.

use crate::qa::{QaApi, QaError, QaResponse, StatsResponse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_MAX_CONTEXT_RESULTS: usize = 5;

/// Build the HTTP router exposing the question-answering surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QaApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/ask", post(ask_question::<S>))
        .route("/stats", get(get_stats::<S>))
        .with_state(service)
}

/// Request body for the `POST /ask` endpoint.
#[derive(Deserialize)]
struct QuestionRequest {
    /// Question to answer.
    question: String,
    /// Maximum number of retrieved fragments used as context.
    #[serde(default)]
    max_context_results: Option<usize>,
    /// Optional document identifiers restricting retrieval.
    #[serde(default)]
    file_id: Option<Vec<String>>,
}

/// Answer a question over the indexed documents.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QaResponse>, AppError>
where
    S: QaApi,
{
    let max_context_results = request
        .max_context_results
        .unwrap_or(DEFAULT_MAX_CONTEXT_RESULTS);
    let response = service
        .ask(
            &request.question,
            max_context_results,
            request.file_id.as_deref(),
        )
        .await?;
    tracing::info!(
        context_fragments = response.context_used.len(),
        "Answer generated"
    );
    Ok(Json(response))
}

/// Return collection statistics and ingestion counters.
async fn get_stats<S>(State(service): State<Arc<S>>) -> Result<Json<StatsResponse>, AppError>
where
    S: QaApi,
{
    Ok(Json(service.stats().await?))
}

/// Response body for the liveness probe.
#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

/// Liveness probe.
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "QA API is running",
    })
}

struct AppError(QaError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<QaError> for AppError {
    fn from(inner: QaError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::chroma::CollectionStats;
    use crate::metrics::MetricsSnapshot;
    use crate::qa::{ContextItem, QaApi, QaError, QaResponse, StatsResponse};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Debug)]
    struct AskCall {
        question: String,
        max_context_results: usize,
        file_id: Option<Vec<String>>,
    }

    struct StubQaService {
        calls: Arc<Mutex<Vec<AskCall>>>,
    }

    impl StubQaService {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl QaApi for StubQaService {
        async fn ask(
            &self,
            question: &str,
            max_context_results: usize,
            document_ids: Option<&[String]>,
        ) -> Result<QaResponse, QaError> {
            self.calls.lock().await.push(AskCall {
                question: question.to_string(),
                max_context_results,
                file_id: document_ids.map(<[String]>::to_vec),
            });
            Ok(QaResponse {
                answer: "The report covers quarterly results.".into(),
                context_used: vec![ContextItem {
                    text: "Quarterly results were strong.".into(),
                    metadata: serde_json::Map::new(),
                    distance: 0.2,
                }],
                question: question.to_string(),
                timestamp: "2024-01-01T00:00:00Z".into(),
            })
        }

        async fn stats(&self) -> Result<StatsResponse, QaError> {
            Ok(StatsResponse {
                vector_database: CollectionStats {
                    collection_name: "documents".into(),
                    total_fragments: 7,
                    documents: Vec::new(),
                },
                ingestion: MetricsSnapshot {
                    documents_processed: 3,
                    documents_failed: 1,
                    fragments_indexed: 7,
                },
                timestamp: "2024-01-01T00:00:00Z".into(),
            })
        }
    }

    #[tokio::test]
    async fn ask_route_passes_question_and_filter_through() {
        let service = Arc::new(StubQaService::new());
        let app = create_router(service.clone());

        let payload = json!({
            "question": "What do the results show?",
            "max_context_results": 3,
            "file_id": ["doc-1", "doc-2"]
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["answer"], "The report covers quarterly results.");
        assert_eq!(json["question"], "What do the results show?");
        assert_eq!(json["context_used"].as_array().map(Vec::len), Some(1));

        let calls = service.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].question, "What do the results show?");
        assert_eq!(calls[0].max_context_results, 3);
        assert_eq!(
            calls[0].file_id,
            Some(vec!["doc-1".to_string(), "doc-2".to_string()])
        );
    }

    #[tokio::test]
    async fn ask_route_defaults_the_context_cap() {
        let service = Arc::new(StubQaService::new());
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ask")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "question": "anything" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let calls = service.calls.lock().await;
        assert_eq!(calls[0].max_context_results, 5);
        assert_eq!(calls[0].file_id, None);
    }

    #[tokio::test]
    async fn stats_route_reports_collection_and_ingestion_counters() {
        let service = Arc::new(StubQaService::new());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/stats")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["vector_database"]["total_fragments"], 7);
        assert_eq!(json["ingestion"]["documents_processed"], 3);
    }

    #[tokio::test]
    async fn root_route_answers_liveness_probes() {
        let service = Arc::new(StubQaService::new());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
