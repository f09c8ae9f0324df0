//! Repository abstractions for kiosk instance storage
//!
//! This module defines the storage trait the upload writer talks to and
//! the error type its implementations report.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ClassifiedInstance, RatingInstance, SupportInstance};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Check if the storage handle itself is unusable rather than the statement
    pub fn is_unavailable(&self) -> bool {
        match self {
            RepositoryError::Connection(_) => true,
            RepositoryError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }

    /// Check if this is a foreign key violation (unknown exhibition or type id)
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            RepositoryError::Database(sqlx::Error::Database(db_err)) => {
                // PostgreSQL foreign_key_violation
                db_err.code().map_or(false, |code| code == "23503")
            },
            _ => false,
        }
    }
}

/// Convert repository errors to application errors
impl From<RepositoryError> for crate::error::Error {
    fn from(err: RepositoryError) -> Self {
        crate::error::Error::database(err.to_string())
    }
}

/// Insert-only storage for rating and support instances
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Insert one instance into its relation and commit
    async fn insert_instance(&self, instance: &ClassifiedInstance) -> RepositoryResult<u64>;

    /// Insert rating rows with a single multi-row statement
    async fn insert_ratings(&self, rows: &[RatingInstance]) -> RepositoryResult<u64>;

    /// Insert support rows with a single multi-row statement
    async fn insert_supports(&self, rows: &[SupportInstance]) -> RepositoryResult<u64>;
}
