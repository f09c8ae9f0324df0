//! Database connection pool management for kioskflow
//!
//! This module provides connection pooling using SQLx. Failing to build the
//! pool is a startup error; the caller decides whether it is fatal.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Type alias for the database connection pool
pub type DbPool = PgPool;

/// Create a new database connection pool
///
/// # Arguments
/// * `config` - Database configuration
///
/// # Returns
/// A connection pool that has answered a `SELECT 1`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let connect_options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| Error::config(format!("Invalid database URL: {}", e)))?
        // Set application name for monitoring
        .application_name("kioskflow")
        .statement_cache_capacity(16);

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_max_size)
        .min_connections(config.pool_min_idle)
        .acquire_timeout(config.pool_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .test_before_acquire(true)
        .max_lifetime(Some(Duration::from_secs(3600))) // 1 hour
        .connect_with(connect_options)
        .await
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    health_check(&pool).await?;

    tracing::info!(
        url = %config.masked_url(),
        max_connections = config.pool_max_size,
        min_idle = config.pool_min_idle,
        "Connected to database successfully"
    );

    Ok(pool)
}

/// Pool health check
///
/// Verifies that the pool can acquire a connection and execute a simple query.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    let start = std::time::Instant::now();

    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::database(format!("Health check failed: {}", e)))?;

    let elapsed = start.elapsed();

    if elapsed > Duration::from_secs(1) {
        tracing::warn!(
            elapsed_ms = elapsed.as_millis(),
            "Database health check slow"
        );
    }

    Ok(())
}
