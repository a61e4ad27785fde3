#![deny(missing_docs)]

//! Core library for the DocuVec ingestion worker and QA server.

/// HTTP routing and REST handlers.
pub mod api;
/// AWS collaborators: SigV4 signing, S3 downloads, SQS polling.
pub mod aws;
/// Chroma vector store integration.
pub mod chroma;
/// Completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline: extraction, chunking, orchestration.
pub mod processing;
/// Question answering over indexed fragments.
pub mod qa;
/// Document status reporting.
pub mod status;
/// Embedding-backed fragment persistence and retrieval.
pub mod vector_store;
/// Queue-driven ingestion worker.
pub mod worker;
