//! Batch loader for historical kiosk rows

use tracing::{info, warn};

use crate::db::{UploadWriter, WriteError};
use crate::history::{normalize_row, HistoricalRow};
use crate::models::{validate, ClassifiedInstance, RatingInstance, SupportInstance};

use super::transform::{classify, transform};

/// Outcome of one subset's upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubsetSummary {
    /// Valid rows of this kind, before the cap
    pub available: usize,
    /// Rows the database acknowledged
    pub written: u64,
    /// Whether the upload failed
    pub failed: bool,
}

impl SubsetSummary {
    fn record(available: usize, result: Result<u64, WriteError>) -> Self {
        match result {
            Ok(written) => Self {
                available,
                written,
                failed: false,
            },
            Err(_) => Self {
                available,
                written: 0,
                failed: true,
            },
        }
    }
}

/// Counters reported after a batch load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Rows read
    pub rows: usize,
    /// Rows dropped by validation
    pub rejected: usize,
    /// Rating subset
    pub ratings: SubsetSummary,
    /// Support subset
    pub supports: SubsetSummary,
}

/// Runs historical rows through the shared pipeline and uploads them in bulk
#[derive(Clone)]
pub struct BatchLoader {
    writer: UploadWriter,
}

impl BatchLoader {
    /// Create a new batch loader
    pub fn new(writer: UploadWriter) -> Self {
        Self { writer }
    }

    /// Validate, partition, transform and upload `rows`
    ///
    /// `cap` limits each subset independently to its first `cap` rows.
    pub async fn load(&self, rows: &[HistoricalRow], cap: Option<usize>) -> BatchSummary {
        let mut ratings: Vec<RatingInstance> = Vec::new();
        let mut supports: Vec<SupportInstance> = Vec::new();
        let mut rejected = 0;

        for (index, row) in rows.iter().enumerate() {
            let event = match validate(&normalize_row(row)) {
                Ok(event) => event,
                Err(err) => {
                    rejected += 1;
                    warn!(
                        row = index + 1,
                        field = %err.field,
                        reason = %err,
                        "Historical row dropped"
                    );
                    continue;
                },
            };

            match transform(classify(&event)) {
                ClassifiedInstance::Rating(row) => ratings.push(row),
                ClassifiedInstance::Support(row) => supports.push(row),
            }
        }

        info!(
            ratings = ratings.len(),
            supports = supports.len(),
            rejected,
            "Historical rows classified"
        );

        let rating_result = self
            .writer
            .upload_ratings(&ratings, cap)
            .await
            .map(|ack| ack.rows);
        let support_result = self
            .writer
            .upload_supports(&supports, cap)
            .await
            .map(|ack| ack.rows);

        BatchSummary {
            rows: rows.len(),
            rejected,
            ratings: SubsetSummary::record(ratings.len(), rating_result),
            supports: SubsetSummary::record(supports.len(), support_result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RATING_TABLE, SUPPORT_TABLE};
    use crate::test_utils::MockInstanceRepository;
    use std::sync::Arc;

    fn rows() -> Vec<HistoricalRow> {
        vec![
            HistoricalRow::new("2023-06-01 09:00:00+00:00", "1", "2", ""),
            HistoricalRow::new("2023-06-01 09:30:00+00:00", "0", "-1", "1.0"),
            HistoricalRow::new("2023-06-01 10:00:00+00:00", "4", "0", ""),
            HistoricalRow::new("2023-06-01 11:00:00+00:00", "5", "-1", "0.0"),
            HistoricalRow::new("2023-06-01 12:00:00+00:00", "3", "4", ""),
        ]
    }

    #[tokio::test]
    async fn test_cap_applies_per_subset() {
        let repo = Arc::new(MockInstanceRepository::new());
        let loader = BatchLoader::new(UploadWriter::new(repo.clone()));

        let summary = loader.load(&rows(), Some(1)).await;

        assert_eq!(summary.rows, 5);
        assert_eq!(summary.ratings.available, 3);
        assert_eq!(summary.ratings.written, 1);
        assert_eq!(summary.supports.available, 2);
        assert_eq!(summary.supports.written, 1);
        assert_eq!(repo.batch_calls(), vec![(RATING_TABLE, 1), (SUPPORT_TABLE, 1)]);

        // First row of each subset, ids shifted
        assert_eq!(repo.rating_rows()[0].exhibition_id, 2);
        assert_eq!(repo.rating_rows()[0].rating_type_id, 3);
        assert_eq!(repo.support_rows()[0].exhibition_id, 1);
        assert_eq!(repo.support_rows()[0].support_type_id, 2);
    }

    #[tokio::test]
    async fn test_invalid_rows_dropped() {
        let repo = Arc::new(MockInstanceRepository::new());
        let loader = BatchLoader::new(UploadWriter::new(repo.clone()));
        let mut rows = rows();
        rows.push(HistoricalRow::new("2023-06-01 19:00:00+00:00", "1", "2", ""));
        rows.push(HistoricalRow::new("2023-06-01 10:00:00+00:00", "9", "2", ""));

        let summary = loader.load(&rows, None).await;

        assert_eq!(summary.rejected, 2);
        assert_eq!(repo.insert_count(), 5);
    }

    #[tokio::test]
    async fn test_failed_subset_does_not_stop_the_other() {
        let repo = Arc::new(MockInstanceRepository::new());
        repo.fail_next_operation();
        let loader = BatchLoader::new(UploadWriter::new(repo.clone()));

        let summary = loader.load(&rows(), None).await;

        assert!(summary.ratings.failed);
        assert!(!summary.supports.failed);
        assert_eq!(summary.supports.written, 2);
        assert!(repo.rating_rows().is_empty());
    }
}
