//! Database module for kioskflow
//!
//! This module provides database connectivity, the instance repository
//! and the upload writer both ingestion drivers persist through.

pub mod instance_repo;
pub mod pool;
pub mod repository;
pub mod writer;

// Re-export commonly used types
pub use instance_repo::PgInstanceRepository;
pub use pool::{create_pool, DbPool};
pub use repository::{InstanceRepository, RepositoryError, RepositoryResult};
pub use writer::{UploadWriter, WriteAck, WriteError};

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Build the upload writer for this process
///
/// A connection failure is returned to the caller when the database is
/// required. Otherwise it is logged and a detached writer is returned, so
/// every later upload reports a write error instead.
pub async fn connect_writer(config: &DatabaseConfig) -> Result<UploadWriter> {
    match create_pool(config).await {
        Ok(pool) => Ok(UploadWriter::new(Arc::new(PgInstanceRepository::new(pool)))),
        Err(e) if !config.required => {
            tracing::error!(error = %e, "Connection attempt to database unsuccessful");
            Ok(UploadWriter::detached())
        },
        Err(e) => Err(e),
    }
}
