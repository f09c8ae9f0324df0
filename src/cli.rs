//! Command-line surface for kioskflow

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::connect_writer;
use crate::error::{Error, Result};
use crate::history::{download_and_merge, load_kiosk_rows};
use crate::kafka::{IngestionLoop, KafkaEventSource, LoopSummary, MessageProcessor};
use crate::pipeline::{BatchLoader, BatchSummary};

#[derive(Parser, Debug)]
#[command(name = "kioskflow")]
#[command(about = "Museum kiosk event ingestion")]
#[command(version)]
pub struct Cli {
    /// Write logs to the log file instead of the console
    #[arg(long, short = 'l', global = true)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume live kiosk messages until interrupted
    Consume,
    /// Load historical kiosk exports from the bucket
    Load(LoadArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Bucket holding the exports (defaults to MUSEUM_BUCKET)
    #[arg(long, short = 'b')]
    pub bucket: Option<String>,

    /// Upload at most this many rows of each instance kind
    #[arg(long = "num-rows", short = 'n', value_parser = clap::value_parser!(u64).range(1..))]
    pub num_rows: Option<u64>,

    /// Reuse the merged file from a previous download
    #[arg(long)]
    pub skip_download: bool,
}

impl LoadArgs {
    /// Per-subset row cap, `None` meaning all rows
    pub fn row_cap(&self) -> Option<usize> {
        self.num_rows
            .map(|rows| usize::try_from(rows).unwrap_or(usize::MAX))
    }
}

impl Commands {
    /// Run the selected command until it finishes or `ct` is cancelled
    ///
    /// A cancelled load stops at its next await point and reports
    /// [`Error::Interrupted`]; rows already committed stay committed.
    pub async fn run(self, config: &Config, ct: CancellationToken) -> Result<()> {
        match self {
            Commands::Consume => consume(config, ct).await.map(|_| ()),
            Commands::Load(args) => tokio::select! {
                biased;
                _ = ct.cancelled() => {
                    warn!("Historical load interrupted");
                    Err(Error::Interrupted("historical load cancelled".to_string()))
                }
                result = load(config, &args) => result.map(|_| ()),
            },
        }
    }
}

/// Stream kiosk messages into the database until `ct` is cancelled
pub async fn consume(config: &Config, ct: CancellationToken) -> Result<LoopSummary> {
    let writer = connect_writer(&config.database).await?;
    let source = KafkaEventSource::new(&config.kafka)?;

    let mut ingestion = IngestionLoop::new(
        source,
        MessageProcessor::new(writer),
        config.kafka.poll_timeout(),
    );

    Ok(ingestion.run(ct).await)
}

/// Download, merge and bulk-upload the historical exports
pub async fn load(config: &Config, args: &LoadArgs) -> Result<BatchSummary> {
    let bucket = args.bucket.as_deref().unwrap_or(&config.history.bucket);

    if args.skip_download {
        info!("Skipping download, reusing merged file");
    } else {
        download_and_merge(&config.history, bucket).await?;
    }

    let rows = load_kiosk_rows(&config.history.merged_path())?;
    let writer = connect_writer(&config.database).await?;

    let summary = BatchLoader::new(writer).load(&rows, args.row_cap()).await;

    info!(
        rows = summary.rows,
        rejected = summary.rejected,
        ratings_written = summary.ratings.written,
        supports_written = summary.supports.written,
        "Historical load finished"
    );

    Ok(summary)
}

/// Resolves on CTRL+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
