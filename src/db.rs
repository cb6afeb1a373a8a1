//! Database connection and pool management for the tenancy core.
//!
//! Every isolation boundary gets its own SeaORM connection pool; this module
//! owns the shared open-with-retry logic and the per-pool tuning knobs.

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::AppConfig;

/// Errors that can occur while opening or checking a connection pool.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to connect to '{url}': {source}")]
    ConnectionFailed {
        url: String,
        source: sea_orm::DbErr,
    },
    #[error("database connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },
    #[error("invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Opens a connection pool against the given URL.
///
/// `schema_search_path` scopes the pool to one Postgres schema; it is `None`
/// for SQLite boundaries, whose URL already names the boundary file. Retries
/// transient connection failures with exponential backoff.
pub async fn open_pool(
    url: &str,
    schema_search_path: Option<&str>,
    cfg: &AppConfig,
) -> Result<DatabaseConnection, DatabaseError> {
    if url.is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "database URL cannot be empty".to_string(),
        });
    }

    let mut opt = ConnectOptions::new(url);
    opt.max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    if let Some(schema) = schema_search_path {
        opt.set_schema_search_path(schema);
    }

    let max_retries = 5;
    let mut retry_delay = Duration::from_millis(100);

    for attempt in 1..=max_retries {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                log::debug!("connected to {} (attempt {})", url, attempt);
                return Ok(conn);
            }
            Err(e) => {
                if attempt == max_retries {
                    log::error!(
                        "failed to connect to {} after {} attempts: {}",
                        url,
                        max_retries,
                        e
                    );
                    return Err(DatabaseError::ConnectionFailed {
                        url: url.to_string(),
                        source: e,
                    });
                }

                log::warn!(
                    "connection attempt {} to {} failed: {}, retrying in {:?}",
                    attempt,
                    url,
                    e,
                    retry_delay
                );

                sleep(retry_delay).await;
                retry_delay *= 2;
            }
        }
    }

    Err(DatabaseError::ConnectionTimeout {
        timeout_ms: cfg.db_acquire_timeout_ms,
    })
}

/// Verifies that a pool is still usable by executing a trivial query.
pub async fn health_check(db: &DatabaseConnection) -> anyhow::Result<()> {
    use anyhow::Context;
    use sea_orm::Statement;

    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());
    db.query_one(stmt).await.context("database health check failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_url_is_rejected_before_any_connection_attempt() {
        let config = AppConfig::default();
        let result = open_pool("", None, &config).await;
        assert!(matches!(
            result,
            Err(DatabaseError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn in_memory_pool_passes_health_check() {
        let config = AppConfig::default();
        let db = open_pool("sqlite::memory:", None, &config).await.unwrap();
        health_check(&db).await.unwrap();
    }
}
