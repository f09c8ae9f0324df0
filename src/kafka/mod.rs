//! Kafka integration module for kiosk event streaming
//!
//! This module provides:
//! - A pull-based event source abstraction with a Kafka implementation
//! - Offset commits after each message has been handled
//! - The message processor shared with the batch path's pipeline
//! - The cancellable ingestion loop

mod config;
mod consumer;
mod processor;
mod source;

pub use config::KafkaConfig;
pub use consumer::{IngestionLoop, LoopSummary};
pub use processor::{MessageProcessor, ProcessingResult};
pub use source::{EventSource, KafkaEventSource, PollOutcome, SourceMessage};

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Kafka-specific error types
#[derive(Debug, Error)]
pub enum KafkaIntegrationError {
    #[error("Kafka connection error: {0}")]
    ConnectionError(#[from] KafkaError),

    #[error("Offset commit failed: {0}")]
    OffsetCommitError(String),
}

impl From<KafkaIntegrationError> for crate::error::Error {
    fn from(err: KafkaIntegrationError) -> Self {
        crate::error::Error::kafka(err.to_string())
    }
}
