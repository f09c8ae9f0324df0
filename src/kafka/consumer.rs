//! Continuous ingestion loop over a stream source

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::source::{EventSource, PollOutcome};
use super::{MessageProcessor, ProcessingResult};

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Valid messages handed to the writer, whether or not the write succeeded
    pub processed: u64,
    /// Messages dropped by validation
    pub rejected: u64,
    /// Valid messages whose write failed
    pub write_failures: u64,
    /// Polls that returned a consumption error
    pub consumption_errors: u64,
}

/// Closes the source when the loop exits, including on panic
struct CloseOnDrop<'a, S: EventSource> {
    source: &'a mut S,
}

impl<S: EventSource> Drop for CloseOnDrop<'_, S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Pull, validate, classify, transform and upload, one message at a time
pub struct IngestionLoop<S: EventSource> {
    source: S,
    processor: MessageProcessor,
    poll_timeout: Duration,
}

impl<S: EventSource> IngestionLoop<S> {
    /// Create a new ingestion loop
    pub fn new(source: S, processor: MessageProcessor, poll_timeout: Duration) -> Self {
        Self {
            source,
            processor,
            poll_timeout,
        }
    }

    /// Run until `ct` is cancelled
    ///
    /// Per-message failures are logged and never stop the loop. The source
    /// is closed on every exit path.
    pub async fn run(&mut self, ct: CancellationToken) -> LoopSummary {
        let Self {
            source,
            processor,
            poll_timeout,
        } = self;
        let mut guard = CloseOnDrop { source };
        let mut summary = LoopSummary::default();

        info!("Ingestion loop started");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = ct.cancelled() => {
                    info!("Consuming period cancelled");
                    break;
                }
                outcome = guard.source.poll(*poll_timeout) => outcome,
            };

            match outcome {
                PollOutcome::Empty => trace!("No message received"),
                PollOutcome::Error(e) => {
                    summary.consumption_errors += 1;
                    error!(error = %e, "Consumption error");
                },
                PollOutcome::Message(message) => {
                    let result = processor.process_message(&message.payload).await;
                    guard.source.ack();

                    match result {
                        ProcessingResult::Rejected(_) => {
                            summary.rejected += 1;
                            continue;
                        },
                        ProcessingResult::WriteFailed(e) => {
                            summary.write_failures += 1;
                            warn!(error = %e, offset = message.offset, "Message lost, not requeued");
                        },
                        ProcessingResult::Uploaded(_) => {},
                    }

                    summary.processed += 1;
                    info!(
                        message_number = summary.processed,
                        partition = message.partition,
                        offset = message.offset,
                        payload = %String::from_utf8_lossy(&message.payload),
                        "Message processed"
                    );
                },
            }
        }

        drop(guard);

        info!(
            processed = summary.processed,
            rejected = summary.rejected,
            write_failures = summary.write_failures,
            consumption_errors = summary.consumption_errors,
            "Ingestion loop stopped"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InstanceRepository, RepositoryResult, UploadWriter};
    use crate::models::{ClassifiedInstance, RatingInstance, SupportInstance};
    use crate::test_utils::{fixtures, MockEventSource, MockInstanceRepository};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loop_handles_every_outcome() {
        let repo = Arc::new(MockInstanceRepository::new());
        let source = MockEventSource::new(vec![
            PollOutcome::Empty,
            PollOutcome::Error("broker down".to_string()),
            fixtures::message(fixtures::VALID_RATING),
            fixtures::message(fixtures::AFTER_HOURS_RATING),
            fixtures::message(fixtures::VALID_SUPPORT),
        ]);
        let handle = source.handle();
        let ct = CancellationToken::new();
        handle.cancel_when_drained(ct.clone());

        let mut ingestion = IngestionLoop::new(
            source,
            MessageProcessor::new(UploadWriter::new(repo.clone())),
            Duration::from_millis(10),
        );
        let summary = ingestion.run(ct).await;

        assert_eq!(
            summary,
            LoopSummary {
                processed: 2,
                rejected: 1,
                write_failures: 0,
                consumption_errors: 1,
            }
        );
        assert_eq!(repo.insert_count(), 2);
        assert_eq!(handle.acks(), 3);
        assert!(handle.is_closed());
    }

    /// Repository whose inserts never complete
    struct StalledRepository;

    #[async_trait::async_trait]
    impl InstanceRepository for StalledRepository {
        async fn insert_instance(&self, _: &ClassifiedInstance) -> RepositoryResult<u64> {
            std::future::pending().await
        }

        async fn insert_ratings(&self, _: &[RatingInstance]) -> RepositoryResult<u64> {
            std::future::pending().await
        }

        async fn insert_supports(&self, _: &[SupportInstance]) -> RepositoryResult<u64> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_mid_upload_leaves_message_unacknowledged() {
        let source = MockEventSource::new(vec![fixtures::message(fixtures::VALID_RATING)]);
        let handle = source.handle();

        let mut ingestion = IngestionLoop::new(
            source,
            MessageProcessor::new(UploadWriter::new(Arc::new(StalledRepository))),
            Duration::from_millis(10),
        );
        let run = ingestion.run(CancellationToken::new());

        assert!(tokio::time::timeout(Duration::from_millis(50), run).await.is_err());
        assert_eq!(handle.polls(), 1);
        assert_eq!(handle.acks(), 0);
        assert_eq!(handle.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_poll() {
        let source = MockEventSource::new(vec![fixtures::message(fixtures::VALID_RATING)]);
        let handle = source.handle();
        let ct = CancellationToken::new();
        ct.cancel();

        let mut ingestion = IngestionLoop::new(
            source,
            MessageProcessor::new(UploadWriter::detached()),
            Duration::from_millis(10),
        );
        let summary = ingestion.run(ct).await;

        assert_eq!(summary, LoopSummary::default());
        assert!(handle.is_closed());
        assert_eq!(handle.polls(), 0);
    }
}
