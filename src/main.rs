//! kioskflow - museum kiosk event ingestion
//!
//! This application consumes kiosk ratings and support requests from Kafka,
//! or loads historical exports from S3, validates them and stores them in
//! PostgreSQL.

use clap::Parser;
use tokio_util::sync::CancellationToken;

use kioskflow::cli::{shutdown_signal, Cli};
use kioskflow::{logging, Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env()?;

    // Validate configuration
    config.validate()?;

    // Initialize logging/tracing
    logging::init_tracing(
        &config.server.log_level,
        &config.server.environment,
        config.server.log_path(cli.log),
    )?;

    // Log configuration (with sensitive data masked)
    config.log_config();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting kioskflow");

    let ct = CancellationToken::new();
    let ct_clone = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        ct_clone.cancel();
    });

    if let Err(e) = cli.command.run(&config, ct).await {
        tracing::error!(
            error = %e,
            error_type = e.error_type(),
            fatal_configuration = e.is_fatal_configuration(),
            "kioskflow stopped"
        );
        return Err(e);
    }

    tracing::info!("kioskflow shutdown complete");
    Ok(())
}
