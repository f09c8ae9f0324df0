//! Instance repository implementation for kioskflow
//!
//! This module provides the PostgreSQL implementation of the instance
//! repository. Inserts are plain (no upsert); the same event stored twice
//! produces two rows.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    db::{
        repository::{InstanceRepository, RepositoryError, RepositoryResult},
        DbPool,
    },
    models::{ClassifiedInstance, RatingInstance, SupportInstance},
};

/// PostgreSQL caps bind parameters per statement at 65535
const MAX_BIND_PARAMS: usize = 65_535;

/// Columns bound per instance row
const COLUMNS_PER_ROW: usize = 3;

/// Largest row count a single multi-row insert can carry
pub const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / COLUMNS_PER_ROW;

const INSERT_RATING: &str = r#"
    INSERT INTO rating_instance
        (rating_created_at, exhibition_id, rating_type_id)
    VALUES ($1, $2, $3)
"#;

const INSERT_SUPPORT: &str = r#"
    INSERT INTO support_instance
        (instance_created_at, exhibition_id, support_type_id)
    VALUES ($1, $2, $3)
"#;

/// PostgreSQL implementation of InstanceRepository
#[derive(Clone)]
pub struct PgInstanceRepository {
    pool: DbPool,
}

impl PgInstanceRepository {
    /// Create a new PostgreSQL instance repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> RepositoryResult<sqlx::Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Connection(format!("Failed to begin transaction: {}", e)))
    }
}

#[async_trait]
impl InstanceRepository for PgInstanceRepository {
    async fn insert_instance(&self, instance: &ClassifiedInstance) -> RepositoryResult<u64> {
        let mut tx = self.begin().await?;

        let result = match instance {
            ClassifiedInstance::Rating(row) => {
                sqlx::query(INSERT_RATING)
                    .bind(row.rating_created_at)
                    .bind(row.exhibition_id)
                    .bind(row.rating_type_id)
                    .execute(&mut *tx)
                    .await?
            },
            ClassifiedInstance::Support(row) => {
                sqlx::query(INSERT_SUPPORT)
                    .bind(row.instance_created_at)
                    .bind(row.exhibition_id)
                    .bind(row.support_type_id)
                    .execute(&mut *tx)
                    .await?
            },
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Commit failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn insert_ratings(&self, rows: &[RatingInstance]) -> RepositoryResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.begin().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO rating_instance (rating_created_at, exhibition_id, rating_type_id) ",
            );
            builder.push_values(chunk, |mut values, row| {
                values
                    .push_bind(row.rating_created_at)
                    .push_bind(row.exhibition_id)
                    .push_bind(row.rating_type_id);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Commit failed: {}", e)))?;

        Ok(inserted)
    }

    async fn insert_supports(&self, rows: &[SupportInstance]) -> RepositoryResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.begin().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO support_instance (instance_created_at, exhibition_id, support_type_id) ",
            );
            builder.push_values(chunk, |mut values, row| {
                values
                    .push_bind(row.instance_created_at)
                    .push_bind(row.exhibition_id)
                    .push_bind(row.support_type_id);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Commit failed: {}", e)))?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_row_limit() {
        assert_eq!(MAX_ROWS_PER_STATEMENT, 21_845);
        assert!(MAX_ROWS_PER_STATEMENT * COLUMNS_PER_ROW <= MAX_BIND_PARAMS);
    }

    #[test]
    fn test_insert_statements_target_relations() {
        assert!(INSERT_RATING.contains("rating_instance"));
        assert!(INSERT_RATING.contains("rating_created_at, exhibition_id, rating_type_id"));
        assert!(INSERT_SUPPORT.contains("support_instance"));
        assert!(INSERT_SUPPORT.contains("instance_created_at, exhibition_id, support_type_id"));
    }
}
