//! SQS queue client.
//!
//! Speaks the AmazonSQS JSON protocol (`x-amz-json-1.0`) with SigV4 signing:
//! long-poll `ReceiveMessage` with delivery-count attributes, and
//! `DeleteMessage` by receipt handle. The queue URL carries scheme and host,
//! so LocalStack and mock servers need no extra configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::aws::sigv4::{self, AwsCredentials, SigningRequest};
use crate::config::get_config;

/// Errors returned while talking to the queue broker.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue URL was not parseable into scheme and host.
    #[error("Invalid queue URL: {0}")]
    InvalidQueueUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Broker responded with an unexpected status code.
    #[error("Unexpected SQS response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the broker.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One received queue message, attributes flattened.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Broker-assigned message identifier.
    pub message_id: String,
    /// Handle required to delete this delivery.
    pub receipt_handle: String,
    /// Raw message body.
    pub body: String,
    /// How many times this message has been delivered, 1-based.
    pub receive_count: u32,
}

/// Interface over the queue broker, consumed by the worker.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Long-poll for up to `max_messages` messages.
    async fn receive(
        &self,
        max_messages: usize,
        wait_secs: u64,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a delivery, removing it from the queue.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

/// SigV4-signed SQS client backed by `reqwest`.
pub struct SqsClient {
    client: Client,
    queue_url: String,
    scheme: String,
    host: String,
    region: String,
    credentials: AwsCredentials,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: usize,
    wait_time_seconds: u64,
    attribute_names: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    message_id: String,
    receipt_handle: String,
    body: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

impl SqsClient {
    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Result<Self, QueueError> {
        let config = get_config();
        Self::new(
            config.sqs_queue_url.clone(),
            config.aws_region.clone(),
            AwsCredentials::from_config(config),
        )
    }

    /// Construct a client from explicit parameters.
    pub fn new(
        queue_url: String,
        region: String,
        credentials: AwsCredentials,
    ) -> Result<Self, QueueError> {
        let (scheme, rest) = queue_url
            .split_once("://")
            .ok_or_else(|| QueueError::InvalidQueueUrl(queue_url.clone()))?;
        let host = rest
            .split('/')
            .next()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| QueueError::InvalidQueueUrl(queue_url.clone()))?
            .to_string();
        let client = Client::builder().user_agent("docuvec/0.3").build()?;
        Ok(Self {
            client,
            scheme: scheme.to_string(),
            host,
            queue_url,
            region,
            credentials,
        })
    }

    /// Issue one signed JSON-protocol call against the queue endpoint.
    async fn call(&self, target: &str, payload: Vec<u8>) -> Result<reqwest::Response, QueueError> {
        let url = format!("{}://{}/", self.scheme, self.host);
        let extra_headers = [
            (
                "content-type".to_string(),
                "application/x-amz-json-1.0".to_string(),
            ),
            ("x-amz-target".to_string(), target.to_string()),
        ];
        let signed = sigv4::sign(
            &self.credentials,
            &SigningRequest {
                method: "POST",
                host: &self.host,
                path: "/",
                query: &[],
                headers: &extra_headers,
                payload: &payload,
                region: &self.region,
                service: "sqs",
            },
            OffsetDateTime::now_utc(),
        );

        let mut request = self.client.post(&url).body(payload);
        for (name, value) in &signed {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::UnexpectedStatus { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl QueueTransport for SqsClient {
    async fn receive(
        &self,
        max_messages: usize,
        wait_secs: u64,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let payload = serde_json::to_vec(&ReceiveMessageRequest {
            queue_url: &self.queue_url,
            max_number_of_messages: max_messages,
            wait_time_seconds: wait_secs,
            attribute_names: ["ApproximateReceiveCount"],
        })
        .expect("receive request serializes");

        let response = self.call("AmazonSQS.ReceiveMessage", payload).await?;
        let parsed: ReceiveMessageResponse = response.json().await?;

        let messages = parsed
            .messages
            .into_iter()
            .map(|message| {
                let receive_count = message
                    .attributes
                    .get("ApproximateReceiveCount")
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);
                QueueMessage {
                    message_id: message.message_id,
                    receipt_handle: message.receipt_handle,
                    body: message.body,
                    receive_count,
                }
            })
            .collect();
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(&DeleteMessageRequest {
            queue_url: &self.queue_url,
            receipt_handle,
        })
        .expect("delete request serializes");

        self.call("AmazonSQS.DeleteMessage", payload).await?;
        tracing::debug!(receipt_handle, "Deleted message from queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn test_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: None,
        }
    }

    fn client_for(server: &MockServer) -> SqsClient {
        SqsClient::new(
            format!("{}/000000000000/ingest", server.base_url()),
            "us-east-1".into(),
            test_credentials(),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn receive_parses_messages_and_delivery_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header("x-amz-target", "AmazonSQS.ReceiveMessage")
                    .header("content-type", "application/x-amz-json-1.0")
                    .header_exists("authorization");
                then.status(200).json_body(json!({
                    "Messages": [
                        {
                            "MessageId": "m-1",
                            "ReceiptHandle": "rh-1",
                            "Body": "{\"key\":\"docs/a.txt\",\"documentId\":\"doc-1\"}",
                            "Attributes": { "ApproximateReceiveCount": "2" }
                        }
                    ]
                }));
            })
            .await;

        let client = client_for(&server);
        let messages = client.receive(10, 20).await.expect("receive");
        mock.assert();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, "m-1");
        assert_eq!(messages[0].receipt_handle, "rh-1");
        assert_eq!(messages[0].receive_count, 2);
        assert!(messages[0].body.contains("doc-1"));
    }

    #[tokio::test]
    async fn receive_defaults_missing_count_to_one_and_handles_empty_queue() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = client_for(&server);
        let messages = client.receive(10, 0).await.expect("receive");
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn delete_posts_receipt_handle() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header("x-amz-target", "AmazonSQS.DeleteMessage")
                    .body_contains("rh-42");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = client_for(&server);
        client.delete("rh-42").await.expect("delete");
        mock.assert();
    }

    #[tokio::test]
    async fn broker_error_is_surfaced_as_unexpected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(400).body("InvalidAddress");
            })
            .await;

        let client = client_for(&server);
        let err = client.receive(10, 0).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[test]
    fn malformed_queue_url_is_rejected() {
        let err = SqsClient::new("not-a-url".into(), "us-east-1".into(), test_credentials())
            .err()
            .expect("constructor should fail");
        assert!(matches!(err, QueueError::InvalidQueueUrl(_)));
    }
}
