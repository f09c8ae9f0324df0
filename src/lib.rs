//! kioskflow Library
//!
//! This library exposes the core modules of kioskflow for use in integration
//! tests and by the `kioskflow` binary.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod pipeline;

/// Mocks and fixtures, built for unit tests and the `test-utils` feature
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

// Re-export model types
pub use models::{
    validate, validate_payload, ClassifiedInstance, ExhibitionEvent, RawEvent, ValidationError,
    ValidationErrorKind,
};

// Re-export the pipeline drivers
pub use db::{UploadWriter, WriteAck, WriteError};
pub use kafka::{IngestionLoop, LoopSummary};
pub use pipeline::{BatchLoader, BatchSummary};
