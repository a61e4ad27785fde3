//! Completion providers used for answer synthesis.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::get_config;

/// Generation never streams and is capped well below typical model limits.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);
const COMPLETION_TEMPERATURE: f64 = 0.7;
const COMPLETION_MAX_TOKENS: u32 = 1000;

/// Errors raised by completion providers.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected completion response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient {
    /// Generate a completion for the supplied prompt.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Completion client backed by an Ollama server.
pub struct OllamaCompletionClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaCompletionClient {
    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Result<Self, CompletionError> {
        let config = get_config();
        Self::new(&config.ollama_url, config.ollama_model.clone())
    }

    /// Construct a client against an explicit Ollama base URL.
    pub fn new(base_url: &str, model: String) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .user_agent("docuvec/0.3")
            .timeout(COMPLETION_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": COMPLETION_TEMPERATURE,
                    "num_predict": COMPLETION_MAX_TOKENS,
                },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::UnexpectedStatus { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}
