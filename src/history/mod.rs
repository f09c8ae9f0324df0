//! Historical kiosk data collaborators
//!
//! Periodic kiosk exports live in an S3 bucket as per-period CSVs. They are
//! downloaded, merged into one file, and read back as rows for the batch
//! loader.

pub mod bucket;
pub mod loader;
pub mod merge;

pub use bucket::{select_keys, BucketClient};
pub use loader::{load_kiosk_rows, normalize_row, normalize_timestamp, HistoricalRow};
pub use merge::{delete_csv_files, merge_csv_files};

use std::path::Path;

use crate::config::HistoryConfig;
use crate::error::Result;

/// Download the exports from `bucket` and merge them into the configured file
pub async fn download_and_merge(config: &HistoryConfig, bucket: &str) -> Result<()> {
    let dir = Path::new(&config.download_dir);
    tokio::fs::create_dir_all(dir).await?;

    let client = BucketClient::new(config).await;
    client
        .download_matching(bucket, &config.object_prefix, dir)
        .await?;

    merge_local_files(config)
}

/// Merge already-downloaded exports and remove the per-period files
pub fn merge_local_files(config: &HistoryConfig) -> Result<()> {
    let dir = Path::new(&config.download_dir);
    merge_csv_files(dir, &config.file_prefix, &config.merged_file)?;
    delete_csv_files(dir, &config.file_prefix, &config.merged_file)?;
    Ok(())
}
