//! S3 access for the kiosk export bucket

use std::path::{Path, PathBuf};

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, error, info};

use crate::config::HistoryConfig;
use crate::error::{Error, Result};

/// Keys worth downloading: under `prefix` and ending `.csv` or `.json`
pub fn select_keys(keys: &[String], prefix: &str) -> Vec<String> {
    keys.iter()
        .filter(|key| key.starts_with(prefix))
        .filter(|key| key.ends_with(".csv") || key.ends_with(".json"))
        .cloned()
        .collect()
}

/// Thin wrapper over the S3 client
pub struct BucketClient {
    client: S3Client,
}

impl BucketClient {
    /// Build a client from the ambient AWS credentials
    pub async fn new(config: &HistoryConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Local stacks need a custom endpoint and path-style addressing
        if let Some(ref endpoint_url) = config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(region = %config.region, "S3 client initialized");

        Self { client }
    }

    /// All object keys in `bucket`
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| {
                    Error::storage(format!("Failed to list objects in {}: {}", bucket, e))
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                },
                _ => break,
            }
        }

        info!(bucket = bucket, objects = keys.len(), "Bucket objects retrieved");
        Ok(keys)
    }

    /// Download one object to `destination`
    pub async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::storage(format!("Failed to get {}: {}", key, e)))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| Error::storage(format!("Failed to read {}: {}", key, e)))?
            .into_bytes();

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &bytes).await?;

        debug!(key = key, bytes = bytes.len(), "Downloaded object");
        Ok(())
    }

    /// Download every key under `prefix` that is a CSV or JSON export
    ///
    /// Finding nothing is logged as an error and returns an empty list.
    pub async fn download_matching(
        &self,
        bucket: &str,
        prefix: &str,
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let keys = self.list_objects(bucket).await?;
        let selected = select_keys(&keys, prefix);

        if selected.is_empty() {
            error!(bucket = bucket, prefix = prefix, "Museum bucket has no relevant data");
            return Ok(Vec::new());
        }

        let mut downloaded = Vec::with_capacity(selected.len());
        for key in &selected {
            let destination = dir.join(key);
            self.download(bucket, key, &destination).await?;
            downloaded.push(destination);
        }

        info!(bucket = bucket, files = downloaded.len(), "Selected bucket objects downloaded");
        Ok(downloaded)
    }
}
