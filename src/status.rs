//! Status reporting back to the document management API.
//!
//! Authenticates as a service account, caches the bearer token, and refreshes
//! it shortly before expiry. Updates are `PATCH`ed per document.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::config::get_config;

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Errors returned while reporting document status.
#[derive(Debug, Error)]
pub enum StatusError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Status API responded with an unexpected status code.
    #[error("Unexpected status API response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the API.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Lifecycle states reported for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Ingestion has started and is running.
    Processing,
    /// Ingestion finished and fragments are indexed.
    Completed,
    /// Ingestion failed terminally.
    Failed,
}

/// Interface over status reporting, consumed by processor and worker.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Report the current state of a document, with a human-readable message.
    async fn update(
        &self,
        document_id: &str,
        status: DocumentStatus,
        message: &str,
    ) -> Result<(), StatusError>;
}

/// Cached service token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct ServiceToken {
    /// Bearer token value.
    pub token: String,
    /// Instant after which the token is no longer valid.
    pub expires_at: OffsetDateTime,
}

impl ServiceToken {
    /// Whether the token should be refreshed at `now`.
    pub fn needs_refresh(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at - TOKEN_REFRESH_MARGIN
    }
}

/// Bearer-token client against the document management API.
pub struct StatusClient {
    client: Client,
    base_url: String,
    service_id: String,
    service_secret: String,
    token: Mutex<Option<ServiceToken>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateRequest<'a> {
    service_id: &'a str,
    service_secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    status: DocumentStatus,
    message: &'a str,
}

impl StatusClient {
    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Result<Self, StatusError> {
        let config = get_config();
        Self::new(
            &config.status_api_url,
            config.status_service_id.clone(),
            config.status_service_secret.clone(),
        )
    }

    /// Construct a client against an explicit API base URL.
    pub fn new(
        base_url: &str,
        service_id: String,
        service_secret: String,
    ) -> Result<Self, StatusError> {
        let client = Client::builder().user_agent("docuvec/0.3").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_id,
            service_secret,
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, authenticating or refreshing as needed.
    async fn bearer_token(&self) -> Result<String, StatusError> {
        let mut guard = self.token.lock().await;
        let now = OffsetDateTime::now_utc();
        if let Some(token) = guard.as_ref()
            && !token.needs_refresh(now)
        {
            return Ok(token.token.clone());
        }

        let response = self
            .client
            .post(format!("{}/service-auth/authenticate", self.base_url))
            .json(&AuthenticateRequest {
                service_id: &self.service_id,
                service_secret: &self.service_secret,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let auth: AuthenticateResponse = response.json().await?;

        let token = ServiceToken {
            token: auth.access_token,
            expires_at: now + Duration::seconds(auth.expires_in),
        };
        tracing::debug!(service_id = %self.service_id, expires_in = auth.expires_in, "Authenticated service account");
        let value = token.token.clone();
        *guard = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl<T: StatusSink + ?Sized> StatusSink for std::sync::Arc<T> {
    async fn update(
        &self,
        document_id: &str,
        status: DocumentStatus,
        message: &str,
    ) -> Result<(), StatusError> {
        (**self).update(document_id, status, message).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StatusError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(StatusError::UnexpectedStatus { status, body })
    }
}

#[async_trait]
impl StatusSink for StatusClient {
    async fn update(
        &self,
        document_id: &str,
        status: DocumentStatus,
        message: &str,
    ) -> Result<(), StatusError> {
        let token = self.bearer_token().await?;
        let response = self
            .client
            .patch(format!("{}/documents/{document_id}", self.base_url))
            .bearer_auth(token)
            .json(&UpdateRequest { status, message })
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::debug!(document_id, ?status, "Reported document status");
        Ok(())
    }
}
