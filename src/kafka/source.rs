//! Stream source abstraction and its Kafka implementation

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use tracing::{debug, info, warn};

use super::{KafkaConfig, KafkaIntegrationError};

/// A message delivered by a stream source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    /// Raw payload bytes; empty when the record carried no value
    pub payload: Vec<u8>,
    /// Source partition
    pub partition: i32,
    /// Source offset
    pub offset: i64,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within the timeout
    Empty,
    /// The source reported a consumption error
    Error(String),
    /// A message arrived
    Message(SourceMessage),
}

/// Pull-based source of kiosk messages
///
/// Delivery semantics and offset commits belong to the implementation.
#[async_trait]
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next message
    async fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// Mark the last delivered message as handled
    ///
    /// A message that was never acknowledged is redelivered after a restart.
    fn ack(&mut self);

    /// Release the consumption handle. Must be safe to call more than once.
    fn close(&mut self);
}

/// Kafka-backed event source
///
/// Auto-commit is off. Once a message is acknowledged its offset is
/// committed when the next poll starts, or on [`EventSource::close`]. A
/// message still in flight when the source closes is left uncommitted.
pub struct KafkaEventSource {
    consumer: StreamConsumer,
    topic: String,
    in_flight: Option<(i32, i64)>,
    pending: Option<(i32, i64)>,
    closed: bool,
}

impl KafkaEventSource {
    /// Create a consumer and subscribe to the configured topic
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaIntegrationError> {
        let consumer: StreamConsumer = config.build_consumer_config().create()?;

        consumer.subscribe(&[&config.topic])?;

        info!(
            topic = %config.topic,
            consumer_group = %config.consumer_group,
            "Subscribed to kiosk topic"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            in_flight: None,
            pending: None,
            closed: false,
        })
    }

    fn commit_pending(&mut self, mode: CommitMode) {
        let Some((partition, offset)) = self.pending.take() else {
            return;
        };

        let mut offsets = TopicPartitionList::new();
        if let Err(e) =
            offsets.add_partition_offset(&self.topic, partition, Offset::Offset(offset + 1))
        {
            warn!(partition, offset, error = %e, "Failed to build offset commit");
            return;
        }

        match self.consumer.commit(&offsets, mode) {
            Ok(()) => debug!(partition, offset, "Committed offset"),
            Err(e) => warn!(
                partition,
                offset,
                error = %KafkaIntegrationError::OffsetCommitError(e.to_string()),
                "Offset commit failed"
            ),
        }
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        self.commit_pending(CommitMode::Async);

        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => PollOutcome::Empty,
            Ok(Err(e)) => PollOutcome::Error(e.to_string()),
            Ok(Ok(message)) => {
                let delivered = SourceMessage {
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    partition: message.partition(),
                    offset: message.offset(),
                };
                self.in_flight = Some((delivered.partition, delivered.offset));
                PollOutcome::Message(delivered)
            },
        }
    }

    fn ack(&mut self) {
        if let Some(delivered) = self.in_flight.take() {
            self.pending = Some(delivered);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some((partition, offset)) = self.in_flight.take() {
            warn!(partition, offset, "Closing with an unacknowledged message");
        }
        self.commit_pending(CommitMode::Sync);
        self.consumer.unsubscribe();

        info!(topic = %self.topic, "Kafka consumer closed");
    }
}
