//! End-to-end pipeline tests for kioskflow
//!
//! Both drivers run against the in-memory repository and a scripted
//! stream source, so no broker or database is needed.

use std::sync::Arc;
use std::time::Duration;

use kioskflow::db::UploadWriter;
use kioskflow::history::{load_kiosk_rows, merge_csv_files, HistoricalRow};
use kioskflow::kafka::{IngestionLoop, LoopSummary, MessageProcessor, PollOutcome};
use kioskflow::models::{RATING_TABLE, SUPPORT_TABLE};
use kioskflow::pipeline::BatchLoader;
use kioskflow::test_utils::{fixtures, MockEventSource, MockInstanceRepository};
use tokio_util::sync::CancellationToken;

/// Run the loop over `script` until the script is drained
async fn run_script(
    script: Vec<PollOutcome>,
    writer: UploadWriter,
) -> (LoopSummary, kioskflow::test_utils::MockSourceHandle) {
    let source = MockEventSource::new(script);
    let handle = source.handle();
    let ct = CancellationToken::new();
    handle.cancel_when_drained(ct.clone());

    let mut ingestion =
        IngestionLoop::new(source, MessageProcessor::new(writer), Duration::from_millis(5));
    let summary = ingestion.run(ct).await;

    (summary, handle)
}

#[tokio::test]
async fn test_valid_rating_is_stored() {
    let repo = Arc::new(MockInstanceRepository::new());

    let (summary, _) = run_script(
        vec![fixtures::message(fixtures::VALID_RATING)],
        UploadWriter::new(repo.clone()),
    )
    .await;

    assert_eq!(summary.processed, 1);
    let rows = repo.rating_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].exhibition_id, 2);
    assert_eq!(rows[0].rating_type_id, 3);
    assert_eq!(rows[0].rating_created_at, fixtures::created_at());
    assert!(repo.support_rows().is_empty());
}

#[tokio::test]
async fn test_after_hours_rating_is_dropped() {
    let repo = Arc::new(MockInstanceRepository::new());

    let (summary, _) = run_script(
        vec![fixtures::message(fixtures::AFTER_HOURS_RATING)],
        UploadWriter::new(repo.clone()),
    )
    .await;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.rejected, 1);
    assert_eq!(repo.insert_count(), 0);
}

#[tokio::test]
async fn test_duplicate_messages_are_stored_twice() {
    let repo = Arc::new(MockInstanceRepository::new());

    let (summary, _) = run_script(
        vec![
            fixtures::message(fixtures::VALID_SUPPORT),
            fixtures::message(fixtures::VALID_SUPPORT),
        ],
        UploadWriter::new(repo.clone()),
    )
    .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(repo.support_rows().len(), 2);
}

#[tokio::test]
async fn test_loop_survives_errors_and_failed_writes() {
    let repo = Arc::new(MockInstanceRepository::new());
    repo.fail_next_operation();

    let (summary, handle) = run_script(
        vec![
            fixtures::message(fixtures::VALID_RATING),
            PollOutcome::Error("Broker transport failure".to_string()),
            PollOutcome::Empty,
            fixtures::message("{not json"),
            fixtures::message(fixtures::VALID_RATING),
        ],
        UploadWriter::new(repo.clone()),
    )
    .await;

    assert_eq!(
        summary,
        LoopSummary {
            processed: 2,
            rejected: 1,
            write_failures: 1,
            consumption_errors: 1,
        }
    );
    assert_eq!(repo.rating_rows().len(), 1);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn test_detached_writer_keeps_consuming() {
    let (summary, handle) = run_script(
        vec![
            fixtures::message(fixtures::VALID_RATING),
            fixtures::message(fixtures::VALID_SUPPORT),
        ],
        UploadWriter::detached(),
    )
    .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.write_failures, 2);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_external_cancellation_closes_source() {
    let repo = Arc::new(MockInstanceRepository::new());
    let source = MockEventSource::new(Vec::new());
    let handle = source.handle();
    let ct = CancellationToken::new();

    let mut ingestion = IngestionLoop::new(
        source,
        MessageProcessor::new(UploadWriter::new(repo)),
        Duration::from_millis(5),
    );

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ct_clone.cancel();
    });

    let summary = ingestion.run(ct).await;

    assert_eq!(summary, LoopSummary::default());
    assert!(handle.polls() > 0);
    assert_eq!(handle.close_calls(), 1);
}

#[tokio::test]
async fn test_historical_rows_capped_per_subset() {
    let repo = Arc::new(MockInstanceRepository::new());
    let loader = BatchLoader::new(UploadWriter::new(repo.clone()));

    let rows = vec![
        HistoricalRow::new("2023-06-01 09:00:00+00:00", "1", "2", ""),
        HistoricalRow::new("2023-06-01 09:10:00+00:00", "2", "-1", "0.0"),
        HistoricalRow::new("2023-06-01 09:20:00+00:00", "3", "3", ""),
        HistoricalRow::new("2023-06-01 09:30:00+00:00", "4", "-1", "1.0"),
        HistoricalRow::new("2023-06-01 09:40:00+00:00", "5", "1", ""),
    ];

    let summary = loader.load(&rows, Some(1)).await;

    assert_eq!(summary.ratings.available, 3);
    assert_eq!(summary.supports.available, 2);
    assert_eq!(repo.batch_calls(), vec![(RATING_TABLE, 1), (SUPPORT_TABLE, 1)]);
    assert_eq!(repo.rating_rows()[0].exhibition_id, 2);
    assert_eq!(repo.support_rows()[0].exhibition_id, 3);
    assert_eq!(repo.support_rows()[0].support_type_id, 1);
}

#[tokio::test]
async fn test_merged_exports_load_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("lmnh_hist_data_0.csv"),
        "at,site,val,type\n2023-06-01 09:00:00+00:00,1,2,\n2023-06-01 09:05:00+00:00,0,-1,1.0\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("lmnh_hist_data_1.csv"),
        "at,site,val,type\n2023-06-01 21:00:00+00:00,1,2,\n2023-06-01 10:00:00+00:00,5,4,\n",
    )
    .unwrap();

    let merged =
        merge_csv_files(dir.path(), "lmnh_hist_data", "lmnh_merged_hist_data.csv").unwrap();
    let rows = load_kiosk_rows(&merged).unwrap();
    assert_eq!(rows.len(), 4);

    let repo = Arc::new(MockInstanceRepository::new());
    let summary = BatchLoader::new(UploadWriter::new(repo.clone()))
        .load(&rows, None)
        .await;

    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.ratings.written, 2);
    assert_eq!(summary.supports.written, 1);
}
