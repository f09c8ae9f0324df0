//! Message processing logic for kiosk messages

use tracing::{debug, error};

use crate::db::{UploadWriter, WriteAck, WriteError};
use crate::models::{validate_payload, ValidationError};
use crate::pipeline::to_instance;

/// Outcome of handling one message
#[derive(Debug)]
pub enum ProcessingResult {
    /// The instance was stored
    Uploaded(WriteAck),

    /// The message failed validation and was dropped
    Rejected(ValidationError),

    /// The instance was valid but could not be stored; it is not requeued
    WriteFailed(WriteError),
}

/// Runs one payload through validate, classify, transform and upload
#[derive(Clone)]
pub struct MessageProcessor {
    writer: UploadWriter,
}

impl MessageProcessor {
    /// Create a new message processor
    pub fn new(writer: UploadWriter) -> Self {
        Self { writer }
    }

    /// Process a single message payload
    pub async fn process_message(&self, payload: &[u8]) -> ProcessingResult {
        let event = match validate_payload(payload) {
            Ok(event) => event,
            Err(err) => {
                error!(
                    field = %err.field,
                    phase = %err.phase(),
                    reason = %err,
                    payload = %String::from_utf8_lossy(payload),
                    "Invalid kiosk message dropped"
                );
                return ProcessingResult::Rejected(err);
            },
        };

        let instance = to_instance(&event);
        debug!(table = instance.table(), "Kiosk message classified");

        match self.writer.upload(&instance).await {
            Ok(ack) => ProcessingResult::Uploaded(ack),
            Err(err) => ProcessingResult::WriteFailed(err),
        }
    }
}
