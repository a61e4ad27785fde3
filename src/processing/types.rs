//! Shared types flowing through the ingestion pipeline.

use serde::Deserialize;
use thiserror::Error;

use crate::aws::QueueMessage;

/// Errors raised while interpreting a queue message as an ingestion job.
#[derive(Debug, Error)]
pub enum JobParseError {
    /// Message body was not valid JSON or lacked the expected fields.
    #[error("Malformed job payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct JobPayload {
    key: String,
    #[serde(rename = "documentId")]
    document_id: String,
}

/// One unit of ingestion work, parsed from a queue message.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    /// Object store key of the uploaded document.
    pub source_key: String,
    /// Logical document identifier in the management API.
    pub document_id: String,
    /// Which delivery attempt this is, 1-based.
    pub attempt: u32,
    /// Terminal failure is reported once this many attempts are exhausted.
    pub max_attempts: u32,
}

impl IngestionJob {
    /// Parse a job from a received queue message.
    pub fn from_message(message: &QueueMessage, max_attempts: u32) -> Result<Self, JobParseError> {
        let payload: JobPayload = serde_json::from_str(&message.body)?;
        Ok(Self {
            source_key: payload.key,
            document_id: payload.document_id,
            attempt: message.receive_count,
            max_attempts,
        })
    }

    /// Whether this delivery is the final attempt for the job.
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// One chunk of extracted text, positioned within its document.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Fragment text.
    pub text: String,
    /// Zero-based position of the fragment within the document.
    pub index: usize,
    /// Total number of fragments produced for the document.
    pub total_fragments: usize,
    /// Logical document identifier.
    pub document_id: String,
    /// Object store key the document was ingested from.
    pub source_key: String,
    /// Lowercased file extension the fragment was extracted from.
    pub file_type: String,
}

/// Terminal state of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Document was fully processed and indexed.
    Success,
    /// Processing failed; the worker decides whether to retry.
    Failed,
}

/// Result of one processing attempt, with a human-readable message.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    /// Whether the attempt succeeded.
    pub status: OutcomeStatus,
    /// Short description of what happened.
    pub message: String,
    /// Number of fragments indexed by a successful attempt.
    pub fragments: usize,
}

impl IngestionOutcome {
    /// Successful attempt that indexed `fragments` fragments.
    pub fn success(fragments: usize) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: format!("Processed {fragments} fragments"),
            fragments,
        }
    }

    /// Failed attempt with an explicit message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            message: message.into(),
            fragments: 0,
        }
    }

    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
