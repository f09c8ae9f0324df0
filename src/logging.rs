//! Logging module for kioskflow
//!
//! This module configures structured logging using the tracing crate,
//! providing JSON output for production and pretty formatting for development.
//! Only the binary entry point installs the subscriber; library code just
//! emits events.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::{Error, Result};

/// Initialize the logging system
///
/// Production gets JSON lines, anything else the pretty formatter. When
/// `log_file` is given, output is appended there instead of stdout.
pub fn init_tracing(log_level: &str, environment: &str, log_file: Option<&Path>) -> Result<()> {
    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kioskflow={},sqlx=warn", log_level)));

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        },
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let formatting_layer: Box<dyn Layer<Registry> + Send + Sync> = if environment == "production" {
        fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_ansi(log_file.is_none())
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed()
    };

    Registry::default()
        .with(formatting_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(
        environment = environment,
        log_level = log_level,
        to_file = log_file.is_some(),
        "Logging initialized"
    );

    Ok(())
}

/// Helper for timing operations
pub struct Timer {
    start: std::time::Instant,
    operation: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(operation: impl Into<String>) -> Self {
        Timer {
            start: std::time::Instant::now(),
            operation: operation.into(),
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
        duration
    }
}
