//! Queue-driven ingestion worker.
//!
//! Long-polls the queue in batches and dispatches each message to the
//! document processor, applying the acknowledgment policy: delete on
//! success, leave for redelivery on a retryable failure, and report plus
//! delete once the final attempt has failed. Messages within one batch
//! are processed sequentially so per-document status updates stay ordered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::aws::{QueueMessage, QueueTransport};
use crate::metrics::IngestMetrics;
use crate::processing::{IngestionJob, ProcessDocument};
use crate::status::{DocumentStatus, StatusSink};

/// Lifecycle of the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Loop is receiving and dispatching messages.
    Running,
    /// Stop was requested; the loop exits after the in-flight batch.
    Stopping,
    /// Loop has exited.
    Stopped,
}

const STATE_RUNNING: u8 = 0;
const STATE_STOPPING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Tuning knobs for the receive loop.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Maximum number of messages fetched per receive call.
    pub batch_size: usize,
    /// Long-poll wait passed to the queue broker, in seconds.
    pub wait_time_secs: u64,
    /// Deliveries after which a failing job is terminally failed.
    pub max_attempts: u32,
    /// Pause after an empty receive.
    pub empty_backoff: Duration,
    /// Pause after a transport error.
    pub error_backoff: Duration,
}

impl WorkerOptions {
    /// Options derived from the loaded configuration.
    pub fn from_config() -> Self {
        let config = crate::config::get_config();
        Self {
            batch_size: config.worker_batch_size,
            wait_time_secs: config.worker_wait_time_secs,
            max_attempts: config.max_ingest_attempts,
            empty_backoff: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
        }
    }
}

/// The receive loop and its collaborators.
pub struct QueueWorker<Q, P, R> {
    queue: Q,
    processor: P,
    status: R,
    metrics: Arc<IngestMetrics>,
    options: WorkerOptions,
    state: AtomicU8,
}

impl<Q, P, R> QueueWorker<Q, P, R>
where
    Q: QueueTransport,
    P: ProcessDocument,
    R: StatusSink,
{
    /// Construct a worker from its collaborators.
    pub fn new(
        queue: Q,
        processor: P,
        status: R,
        metrics: Arc<IngestMetrics>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            processor,
            status,
            metrics,
            options,
            state: AtomicU8::new(STATE_STOPPED),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => WorkerState::Running,
            STATE_STOPPING => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }

    /// Request a graceful stop; the in-flight batch completes first.
    pub fn stop(&self) {
        let _ = self.state.compare_exchange(
            STATE_RUNNING,
            STATE_STOPPING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        tracing::info!("Worker stop requested");
    }

    /// Run the receive loop until [`stop`](Self::stop) is observed.
    pub async fn start(&self) {
        self.state.store(STATE_RUNNING, Ordering::SeqCst);
        tracing::info!(
            batch_size = self.options.batch_size,
            wait_time_secs = self.options.wait_time_secs,
            max_attempts = self.options.max_attempts,
            "Worker started"
        );

        while self.state.load(Ordering::SeqCst) == STATE_RUNNING {
            let batch = self
                .queue
                .receive(self.options.batch_size, self.options.wait_time_secs)
                .await;
            match batch {
                Err(err) => {
                    tracing::error!(error = %err, "Queue receive failed, backing off");
                    tokio::time::sleep(self.options.error_backoff).await;
                }
                Ok(messages) if messages.is_empty() => {
                    tokio::time::sleep(self.options.empty_backoff).await;
                }
                Ok(messages) => {
                    tracing::debug!(batch = messages.len(), "Received message batch");
                    for message in messages {
                        self.handle_message(message).await;
                    }
                }
            }
        }

        self.state.store(STATE_STOPPED, Ordering::SeqCst);
        tracing::info!("Worker stopped");
    }

    async fn handle_message(&self, message: QueueMessage) {
        let job = match IngestionJob::from_message(&message, self.options.max_attempts) {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    error = %err,
                    "Skipping malformed message"
                );
                return;
            }
        };

        let outcome = self.processor.process(&job).await;

        if outcome.is_success() {
            self.metrics.record_success(outcome.fragments as u64);
            self.delete(&message).await;
            return;
        }

        if job.is_final_attempt() {
            self.metrics.record_failure();
            let message_text = format!("Processing failed after {} attempts", job.max_attempts);
            if let Err(err) = self
                .status
                .update(&job.document_id, DocumentStatus::Failed, &message_text)
                .await
            {
                tracing::warn!(
                    document_id = %job.document_id,
                    error = %err,
                    "Terminal failure report failed"
                );
            }
            tracing::error!(
                document_id = %job.document_id,
                attempts = job.max_attempts,
                reason = %outcome.message,
                "Document terminally failed"
            );
            self.delete(&message).await;
        } else {
            // Leave the message; the broker's visibility timeout redelivers it.
            tracing::warn!(
                document_id = %job.document_id,
                attempt = job.attempt,
                max_attempts = job.max_attempts,
                reason = %outcome.message,
                "Processing failed, message left for retry"
            );
        }
    }

    async fn delete(&self, message: &QueueMessage) {
        if let Err(err) = self.queue.delete(&message.receipt_handle).await {
            tracing::error!(
                message_id = %message.message_id,
                error = %err,
                "Failed to delete message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::QueueError;
    use crate::processing::IngestionOutcome;
    use crate::status::StatusError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedQueue {
        batches: Mutex<VecDeque<Result<Vec<QueueMessage>, QueueError>>>,
        deleted: Mutex<Vec<String>>,
        drained: tokio::sync::Notify,
    }

    impl ScriptedQueue {
        fn new(batches: Vec<Result<Vec<QueueMessage>, QueueError>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                deleted: Mutex::new(Vec::new()),
                drained: tokio::sync::Notify::new(),
            }
        }
    }

    #[async_trait]
    impl QueueTransport for &ScriptedQueue {
        async fn receive(
            &self,
            _max_messages: usize,
            _wait_secs: u64,
        ) -> Result<Vec<QueueMessage>, QueueError> {
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    self.drained.notify_one();
                    Ok(Vec::new())
                }
            }
        }

        async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
            self.deleted.lock().unwrap().push(receipt_handle.to_string());
            Ok(())
        }
    }

    struct ScriptedProcessor {
        outcome: IngestionOutcome,
        processed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessDocument for &ScriptedProcessor {
        async fn process(&self, job: &IngestionJob) -> IngestionOutcome {
            self.processed.lock().unwrap().push(job.document_id.clone());
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        updates: Mutex<Vec<(String, DocumentStatus, String)>>,
    }

    #[async_trait]
    impl StatusSink for &RecordingStatus {
        async fn update(
            &self,
            document_id: &str,
            status: DocumentStatus,
            message: &str,
        ) -> Result<(), StatusError> {
            self.updates.lock().unwrap().push((
                document_id.to_string(),
                status,
                message.to_string(),
            ));
            Ok(())
        }
    }

    fn message(body: &str, receive_count: u32) -> QueueMessage {
        QueueMessage {
            message_id: format!("m-{receive_count}"),
            receipt_handle: format!("rh-{receive_count}"),
            body: body.into(),
            receive_count,
        }
    }

    fn test_options() -> WorkerOptions {
        WorkerOptions {
            batch_size: 10,
            wait_time_secs: 0,
            max_attempts: 3,
            empty_backoff: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
        }
    }

    async fn run_to_drained<Q, P, R>(worker: &QueueWorker<Q, P, R>, queue: &ScriptedQueue)
    where
        Q: QueueTransport,
        P: ProcessDocument,
        R: StatusSink,
    {
        tokio::join!(worker.start(), async {
            queue.drained.notified().await;
            worker.stop();
        });
    }

    #[tokio::test]
    async fn successful_job_is_deleted_and_counted() {
        let queue = ScriptedQueue::new(vec![Ok(vec![message(
            r#"{"key":"docs/a.txt","documentId":"doc-1"}"#,
            1,
        )])]);
        let processor = ScriptedProcessor {
            outcome: IngestionOutcome::success(4),
            processed: Mutex::new(Vec::new()),
        };
        let status = RecordingStatus::default();
        let metrics = Arc::new(IngestMetrics::new());
        let worker = QueueWorker::new(
            &queue,
            &processor,
            &status,
            Arc::clone(&metrics),
            test_options(),
        );

        run_to_drained(&worker, &queue).await;

        assert_eq!(*processor.processed.lock().unwrap(), vec!["doc-1"]);
        assert_eq!(*queue.deleted.lock().unwrap(), vec!["rh-1"]);
        assert!(status.updates.lock().unwrap().is_empty());
        assert_eq!(metrics.snapshot().documents_processed, 1);
        assert_eq!(metrics.snapshot().fragments_indexed, 4);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn retryable_failure_leaves_the_message() {
        let queue = ScriptedQueue::new(vec![Ok(vec![message(
            r#"{"key":"docs/a.txt","documentId":"doc-1"}"#,
            1,
        )])]);
        let processor = ScriptedProcessor {
            outcome: IngestionOutcome::failed("error processing document"),
            processed: Mutex::new(Vec::new()),
        };
        let status = RecordingStatus::default();
        let metrics = Arc::new(IngestMetrics::new());
        let worker = QueueWorker::new(
            &queue,
            &processor,
            &status,
            Arc::clone(&metrics),
            test_options(),
        );

        run_to_drained(&worker, &queue).await;

        assert!(queue.deleted.lock().unwrap().is_empty());
        assert!(status.updates.lock().unwrap().is_empty());
        assert_eq!(metrics.snapshot().documents_failed, 0);
    }

    #[tokio::test]
    async fn final_attempt_failure_is_reported_once_and_deleted_once() {
        let queue = ScriptedQueue::new(vec![Ok(vec![message(
            r#"{"key":"docs/a.txt","documentId":"doc-1"}"#,
            3,
        )])]);
        let processor = ScriptedProcessor {
            outcome: IngestionOutcome::failed("no content extracted"),
            processed: Mutex::new(Vec::new()),
        };
        let status = RecordingStatus::default();
        let metrics = Arc::new(IngestMetrics::new());
        let worker = QueueWorker::new(
            &queue,
            &processor,
            &status,
            Arc::clone(&metrics),
            test_options(),
        );

        run_to_drained(&worker, &queue).await;

        let updates = status.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "doc-1");
        assert_eq!(updates[0].1, DocumentStatus::Failed);
        assert_eq!(updates[0].2, "Processing failed after 3 attempts");
        assert_eq!(*queue.deleted.lock().unwrap(), vec!["rh-3"]);
        assert_eq!(metrics.snapshot().documents_failed, 1);
    }

    #[tokio::test]
    async fn malformed_message_is_skipped_without_stopping_the_batch() {
        let queue = ScriptedQueue::new(vec![Ok(vec![
            message("not json", 1),
            message(r#"{"key":"docs/b.txt","documentId":"doc-2"}"#, 1),
        ])]);
        let processor = ScriptedProcessor {
            outcome: IngestionOutcome::success(1),
            processed: Mutex::new(Vec::new()),
        };
        let status = RecordingStatus::default();
        let metrics = Arc::new(IngestMetrics::new());
        let worker = QueueWorker::new(
            &queue,
            &processor,
            &status,
            Arc::clone(&metrics),
            test_options(),
        );

        run_to_drained(&worker, &queue).await;

        assert_eq!(*processor.processed.lock().unwrap(), vec!["doc-2"]);
        assert_eq!(queue.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_backs_off_and_keeps_running() {
        let queue = ScriptedQueue::new(vec![
            Err(QueueError::InvalidQueueUrl("transient".into())),
            Ok(vec![message(
                r#"{"key":"docs/a.txt","documentId":"doc-1"}"#,
                1,
            )]),
        ]);
        let processor = ScriptedProcessor {
            outcome: IngestionOutcome::success(2),
            processed: Mutex::new(Vec::new()),
        };
        let status = RecordingStatus::default();
        let metrics = Arc::new(IngestMetrics::new());
        let worker = QueueWorker::new(
            &queue,
            &processor,
            &status,
            Arc::clone(&metrics),
            test_options(),
        );

        run_to_drained(&worker, &queue).await;

        assert_eq!(*processor.processed.lock().unwrap(), vec!["doc-1"]);
    }
}
