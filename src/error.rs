//! Error handling module for kioskflow
//!
//! This module defines the crate-level error type. Per-record failures
//! (validation, consumption, writes) have their own types closer to where
//! they occur and only reach this type when a caller decides to abort.

use thiserror::Error;

/// Result type alias for kioskflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kioskflow
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(String),

    /// Kafka related errors
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Object storage (bucket listing, downloads)
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Validation errors for incoming data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operator stopped the run before it finished
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Error::Database(msg.into())
    }

    /// Create a Kafka error
    pub fn kafka<S: Into<String>>(msg: S) -> Self {
        Error::Kafka(msg.into())
    }

    /// Create an object storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Error::Storage(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error means a collaborator could not be set up at startup.
    ///
    /// These are never retried; they end the process.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Database(_) | Error::Kafka(_) | Error::Storage(_)
        )
    }

    /// Short machine-friendly name of the error category
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::Database(_) => "database_error",
            Error::Kafka(_) => "kafka_error",
            Error::Storage(_) => "storage_error",
            Error::Validation(_) => "validation_error",
            Error::Serialization(_) => "serialization_error",
            Error::Csv(_) => "csv_error",
            Error::Io(_) => "io_error",
            Error::Interrupted(_) => "interrupted",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}
