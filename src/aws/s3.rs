//! S3 object store client.
//!
//! Downloads a document blob to a transient local file and disposes of it
//! after processing. Requests are signed with SigV4; a custom endpoint
//! (LocalStack, MinIO) switches to path-style addressing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use time::OffsetDateTime;

use crate::aws::sigv4::{self, AwsCredentials, SigningRequest};
use crate::config::get_config;

/// Errors returned while downloading or disposing of blobs.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// S3 responded with an unexpected status code.
    #[error("Unexpected S3 response ({status}) for key '{key}'")]
    UnexpectedStatus {
        /// HTTP status returned from S3.
        status: StatusCode,
        /// Object key the request was for.
        key: String,
    },
    /// Writing the local copy failed.
    #[error("Failed to write local copy: {0}")]
    Io(#[from] std::io::Error),
}

/// Transient local copy of a downloaded blob.
///
/// The file outlives this value; release it through [`ObjectStore::dispose`].
#[derive(Debug)]
pub struct LocalBlob {
    path: PathBuf,
}

impl LocalBlob {
    /// Wrap an existing local file.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the local copy.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Interface over blob acquisition and release, consumed by the processor.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the object behind `key` to a transient local file.
    async fn download(&self, key: &str) -> Result<LocalBlob, ObjectStoreError>;

    /// Release the local copy. Infallible by contract; failures are logged.
    async fn dispose(&self, blob: LocalBlob);
}

/// SigV4-signed S3 client backed by `reqwest`.
pub struct S3Client {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    credentials: AwsCredentials,
}

impl S3Client {
    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Result<Self, ObjectStoreError> {
        let config = get_config();
        Self::new(
            config.s3_bucket.clone(),
            config.aws_region.clone(),
            config.s3_endpoint.clone(),
            AwsCredentials::from_config(config),
        )
    }

    /// Construct a client from explicit parameters.
    pub fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
        credentials: AwsCredentials,
    ) -> Result<Self, ObjectStoreError> {
        let client = Client::builder().user_agent("docuvec/0.3").build()?;
        Ok(Self {
            client,
            bucket,
            region,
            endpoint,
            credentials,
        })
    }

    /// Compute scheme, host, and request path for a key.
    ///
    /// Virtual-hosted style against AWS proper; path-style when a custom
    /// endpoint is configured.
    fn locate(&self, encoded_key: &str) -> (String, String, String) {
        match self.endpoint {
            Some(ref endpoint) => {
                let (scheme, host) = split_endpoint(endpoint);
                let path = format!("/{}/{}", self.bucket, encoded_key);
                (scheme, host, path)
            }
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", self.bucket, self.region),
                format!("/{}", encoded_key),
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn download(&self, key: &str) -> Result<LocalBlob, ObjectStoreError> {
        let encoded_key = key
            .split('/')
            .map(sigv4::uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let (scheme, host, path) = self.locate(&encoded_key);
        let url = format!("{scheme}://{host}{path}");

        let signed = sigv4::sign(
            &self.credentials,
            &SigningRequest {
                method: "GET",
                host: &host,
                path: &path,
                query: &[],
                headers: &[],
                payload: b"",
                region: &self.region,
                service: "s3",
            },
            OffsetDateTime::now_utc(),
        );

        let mut request = self.client.get(&url);
        for (name, value) in &signed {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(key, %status, "S3 GetObject failed");
            return Err(ObjectStoreError::UnexpectedStatus {
                status,
                key: key.to_string(),
            });
        }

        let bytes = response.bytes().await?;

        // Keep the original extension so the extractor can dispatch on it.
        let suffix = key
            .rsplit('/')
            .next()
            .and_then(|name| name.rfind('.').map(|idx| name[idx..].to_string()))
            .unwrap_or_default();
        let file = tempfile::Builder::new().suffix(&suffix).tempfile()?;
        std::fs::write(file.path(), &bytes)?;
        // Detach from the auto-delete guard; the processor disposes explicitly.
        let (_, path) = file.keep().map_err(|err| err.error)?;

        tracing::info!(key, path = %path.display(), bytes = bytes.len(), "Downloaded blob");
        Ok(LocalBlob::new(path))
    }

    async fn dispose(&self, blob: LocalBlob) {
        match tokio::fs::remove_file(blob.path()).await {
            Ok(()) => tracing::debug!(path = %blob.path().display(), "Removed local copy"),
            Err(err) => {
                tracing::warn!(path = %blob.path().display(), error = %err, "Failed to remove local copy");
            }
        }
    }
}

fn split_endpoint(endpoint: &str) -> (String, String) {
    let (scheme, rest) = match endpoint.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), rest),
        None => ("https".to_string(), endpoint),
    };
    (scheme, rest.trim_end_matches('/').to_string())
}
