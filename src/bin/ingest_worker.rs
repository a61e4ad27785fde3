use std::sync::Arc;

use docuvec::aws::{S3Client, SqsClient};
use docuvec::chroma::ChromaService;
use docuvec::embedding::get_embedding_client;
use docuvec::metrics::IngestMetrics;
use docuvec::processing::DocumentProcessor;
use docuvec::status::StatusClient;
use docuvec::vector_store::VectorStoreService;
use docuvec::worker::{QueueWorker, WorkerOptions};
use docuvec::{config, logging};

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let queue = SqsClient::from_config().expect("Failed to build SQS client");
    let store = S3Client::from_config().expect("Failed to build S3 client");
    let status = Arc::new(StatusClient::from_config().expect("Failed to build status client"));
    let chroma = ChromaService::from_config().expect("Failed to build Chroma client");
    let embedding = get_embedding_client().expect("Failed to build embedding client");
    let index = VectorStoreService::new(chroma, embedding);

    let processor = DocumentProcessor::new(
        store,
        Arc::clone(&status),
        index,
        config.chunk_size,
        config.chunk_overlap,
    );

    let worker = Arc::new(QueueWorker::new(
        queue,
        processor,
        status,
        Arc::new(IngestMetrics::new()),
        WorkerOptions::from_config(),
    ));

    let shutdown = Arc::clone(&worker);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.stop();
        }
    });

    worker.start().await;
}
