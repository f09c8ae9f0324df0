//! Upload writer shared by the stream consumer and the batch loader
//!
//! The writer owns the persistence step of the pipeline. It never retries
//! and never deduplicates; failures are logged here and handed back to the
//! caller, which decides whether to continue.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    db::repository::{InstanceRepository, RepositoryError},
    logging::Timer,
    models::{ClassifiedInstance, RatingInstance, SupportInstance, RATING_TABLE, SUPPORT_TABLE},
};

/// Acknowledgement of a completed persistence call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// Relation the rows went into
    pub table: &'static str,
    /// Rows inserted
    pub rows: u64,
}

/// Persistence failure; the affected rows are lost
#[derive(Error, Debug)]
pub enum WriteError {
    /// No storage handle was established
    #[error("Storage handle unavailable, {table} not updated")]
    Unavailable { table: &'static str },

    /// The insert or its commit failed
    #[error("Insert into {table} failed: {source}")]
    Insert {
        table: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl WriteError {
    /// Relation the failed write targeted
    pub fn table(&self) -> &'static str {
        match self {
            WriteError::Unavailable { table } | WriteError::Insert { table, .. } => table,
        }
    }

    /// Whether the storage handle itself is unusable
    pub fn is_unavailable(&self) -> bool {
        match self {
            WriteError::Unavailable { .. } => true,
            WriteError::Insert { source, .. } => source.is_unavailable(),
        }
    }
}

/// Writes classified instances to storage
#[derive(Clone)]
pub struct UploadWriter {
    repo: Option<Arc<dyn InstanceRepository>>,
}

impl UploadWriter {
    /// Create a writer backed by a repository
    pub fn new(repo: Arc<dyn InstanceRepository>) -> Self {
        Self { repo: Some(repo) }
    }

    /// Create a writer with no storage handle; every upload fails with
    /// [`WriteError::Unavailable`]
    pub fn detached() -> Self {
        Self { repo: None }
    }

    /// Whether a storage handle is present
    pub fn is_attached(&self) -> bool {
        self.repo.is_some()
    }

    fn repo(&self, table: &'static str) -> Result<&Arc<dyn InstanceRepository>, WriteError> {
        self.repo.as_ref().ok_or_else(|| {
            error!(table = table, "Storage handle unavailable, database not updated");
            WriteError::Unavailable { table }
        })
    }

    /// Insert one instance and commit it
    pub async fn upload(&self, instance: &ClassifiedInstance) -> Result<WriteAck, WriteError> {
        let table = instance.table();
        let repo = self.repo(table)?;

        match repo.insert_instance(instance).await {
            Ok(rows) => {
                info!(
                    table = table,
                    exhibition_id = instance.exhibition_id(),
                    "Uploaded instance to the database"
                );
                Ok(WriteAck { table, rows })
            },
            Err(source) => {
                error!(
                    table = table,
                    error = %source,
                    "Failed to upload instance, database not updated"
                );
                Err(WriteError::Insert { table, source })
            },
        }
    }

    /// Insert the first `cap` rating rows (all when `None`) in one statement
    pub async fn upload_ratings(
        &self,
        rows: &[RatingInstance],
        cap: Option<usize>,
    ) -> Result<WriteAck, WriteError> {
        let selected = capped(rows, cap);
        if selected.is_empty() {
            debug!(table = RATING_TABLE, "No rows to upload");
            return Ok(WriteAck {
                table: RATING_TABLE,
                rows: 0,
            });
        }

        let repo = self.repo(RATING_TABLE)?;
        let timer = Timer::start("upload_ratings");
        let result = repo.insert_ratings(selected).await;
        timer.stop();

        batch_outcome(RATING_TABLE, selected.len(), result)
    }

    /// Insert the first `cap` support rows (all when `None`) in one statement
    pub async fn upload_supports(
        &self,
        rows: &[SupportInstance],
        cap: Option<usize>,
    ) -> Result<WriteAck, WriteError> {
        let selected = capped(rows, cap);
        if selected.is_empty() {
            debug!(table = SUPPORT_TABLE, "No rows to upload");
            return Ok(WriteAck {
                table: SUPPORT_TABLE,
                rows: 0,
            });
        }

        let repo = self.repo(SUPPORT_TABLE)?;
        let timer = Timer::start("upload_supports");
        let result = repo.insert_supports(selected).await;
        timer.stop();

        batch_outcome(SUPPORT_TABLE, selected.len(), result)
    }
}

/// First `cap` rows, or all of them
fn capped<T>(rows: &[T], cap: Option<usize>) -> &[T] {
    match cap {
        Some(n) => &rows[..n.min(rows.len())],
        None => rows,
    }
}

fn batch_outcome(
    table: &'static str,
    selected: usize,
    result: Result<u64, RepositoryError>,
) -> Result<WriteAck, WriteError> {
    match result {
        Ok(rows) => {
            info!(table = table, rows = rows, "Uploaded instances to the database");
            Ok(WriteAck { table, rows })
        },
        Err(source) => {
            error!(
                table = table,
                rows = selected,
                error = %source,
                "Failed to upload instances, database not updated"
            );
            Err(WriteError::Insert { table, source })
        },
    }
}
