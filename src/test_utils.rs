//! Test utilities for kioskflow
//!
//! This module provides mock collaborators and fixtures for testing the
//! pipeline without Kafka or PostgreSQL.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::repository::{InstanceRepository, RepositoryError, RepositoryResult};
use crate::kafka::{EventSource, PollOutcome};
use crate::models::{
    ClassifiedInstance, RatingInstance, SupportInstance, RATING_TABLE, SUPPORT_TABLE,
};

/// Mock implementation of InstanceRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockInstanceRepository {
    ratings: Arc<Mutex<Vec<RatingInstance>>>,
    supports: Arc<Mutex<Vec<SupportInstance>>>,
    batch_calls: Arc<Mutex<Vec<(&'static str, usize)>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl MockInstanceRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on the next operation
    pub fn fail_next_operation(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Stored rating rows, in insertion order
    pub fn rating_rows(&self) -> Vec<RatingInstance> {
        self.ratings.lock().unwrap().clone()
    }

    /// Stored support rows, in insertion order
    pub fn support_rows(&self) -> Vec<SupportInstance> {
        self.supports.lock().unwrap().clone()
    }

    /// Total stored rows across both relations
    pub fn insert_count(&self) -> usize {
        self.ratings.lock().unwrap().len() + self.supports.lock().unwrap().len()
    }

    /// Multi-row inserts issued, as (relation, row count)
    pub fn batch_calls(&self) -> Vec<(&'static str, usize)> {
        self.batch_calls.lock().unwrap().clone()
    }

    fn check_failure(&self) -> RepositoryResult<()> {
        let mut fail = self.fail_next.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(RepositoryError::QueryExecution("Mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceRepository for MockInstanceRepository {
    async fn insert_instance(&self, instance: &ClassifiedInstance) -> RepositoryResult<u64> {
        self.check_failure()?;
        match instance {
            ClassifiedInstance::Rating(row) => self.ratings.lock().unwrap().push(row.clone()),
            ClassifiedInstance::Support(row) => self.supports.lock().unwrap().push(row.clone()),
        }
        Ok(1)
    }

    async fn insert_ratings(&self, rows: &[RatingInstance]) -> RepositoryResult<u64> {
        self.check_failure()?;
        self.batch_calls.lock().unwrap().push((RATING_TABLE, rows.len()));
        self.ratings.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn insert_supports(&self, rows: &[SupportInstance]) -> RepositoryResult<u64> {
        self.check_failure()?;
        self.batch_calls.lock().unwrap().push((SUPPORT_TABLE, rows.len()));
        self.supports.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

#[derive(Debug, Default)]
struct SourceState {
    script: VecDeque<PollOutcome>,
    polls: usize,
    acks: usize,
    closed: bool,
    close_calls: usize,
    cancel_when_drained: Option<CancellationToken>,
}

/// Scripted stream source
///
/// Returns the scripted outcomes in order, then `Empty` forever.
#[derive(Debug, Clone)]
pub struct MockEventSource {
    state: Arc<Mutex<SourceState>>,
}

/// Observer for a [`MockEventSource`] moved into a loop
#[derive(Debug, Clone)]
pub struct MockSourceHandle {
    state: Arc<Mutex<SourceState>>,
}

impl MockEventSource {
    /// Create a source that replays `script`
    pub fn new(script: Vec<PollOutcome>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                script: script.into(),
                ..SourceState::default()
            })),
        }
    }

    /// Handle for inspecting the source after it has been moved
    pub fn handle(&self) -> MockSourceHandle {
        MockSourceHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockSourceHandle {
    /// Cancel `ct` once every scripted outcome has been delivered
    pub fn cancel_when_drained(&self, ct: CancellationToken) {
        self.state.lock().unwrap().cancel_when_drained = Some(ct);
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// How many times `close` was called
    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }

    /// Number of polls served
    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    /// How many delivered messages were acknowledged
    pub fn acks(&self) -> usize {
        self.state.lock().unwrap().acks
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            let next = state.script.pop_front();
            if next.is_none() {
                if let Some(ct) = &state.cancel_when_drained {
                    ct.cancel();
                }
            }
            next
        };

        match next {
            Some(outcome) => outcome,
            None => {
                tokio::time::sleep(timeout).await;
                PollOutcome::Empty
            },
        }
    }

    fn ack(&mut self) {
        self.state.lock().unwrap().acks += 1;
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.close_calls += 1;
    }
}

/// Ready-made kiosk payloads and rows
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::kafka::{PollOutcome, SourceMessage};
    use crate::models::{ClassifiedInstance, RatingInstance, SupportInstance};

    /// Rating at site "1" with value 2
    pub const VALID_RATING: &str =
        r#"{"at":"2023-06-01T10:00:00.000000+00:00","val":2,"site":"1"}"#;

    /// Same rating, after closing time
    pub const AFTER_HOURS_RATING: &str =
        r#"{"at":"2023-06-01T19:00:00.000000+00:00","val":2,"site":"1"}"#;

    /// Support request of type 1 at site "0"
    pub const VALID_SUPPORT: &str =
        r#"{"at":"2023-06-01T10:00:00.000000+00:00","val":-1,"site":"0","type":1}"#;

    /// 2023-06-01T10:00:00Z
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap()
    }

    /// Wrap a payload as a delivered message
    pub fn message(payload: &str) -> PollOutcome {
        PollOutcome::Message(SourceMessage {
            payload: payload.as_bytes().to_vec(),
            partition: 0,
            offset: 0,
        })
    }

    /// Rating row with one-based ids
    pub fn rating_row(exhibition_id: i32, rating_type_id: i32) -> RatingInstance {
        RatingInstance {
            rating_created_at: created_at(),
            exhibition_id,
            rating_type_id,
        }
    }

    /// Support row with one-based ids
    pub fn support_row(exhibition_id: i32, support_type_id: i32) -> SupportInstance {
        SupportInstance {
            instance_created_at: created_at(),
            exhibition_id,
            support_type_id,
        }
    }

    /// Rating instance with one-based ids
    pub fn rating_instance(exhibition_id: i32, rating_type_id: i32) -> ClassifiedInstance {
        ClassifiedInstance::Rating(rating_row(exhibition_id, rating_type_id))
    }

    /// Support instance with one-based ids
    pub fn support_instance(exhibition_id: i32, support_type_id: i32) -> ClassifiedInstance {
        ClassifiedInstance::Support(support_row(exhibition_id, support_type_id))
    }
}
