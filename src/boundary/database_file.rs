//! Database-file isolation strategy for SQLite deployments.
//!
//! Each tenant gets its own database file under the configured data
//! directory. Files are created explicitly with restrictive permissions;
//! pools are opened with `mode=rw` so a missing boundary is a connection
//! error, never an implicit create.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::boundary::tables::REQUIRED_TABLES;
use crate::boundary::{BoundaryStrategy, IsolationStrategy, index_statements, table_statements};
use crate::config::AppConfig;
use crate::db;
use crate::error::TenancyError;

pub struct DatabaseFileStrategy {
    config: AppConfig,
}

impl DatabaseFileStrategy {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn sqlite_url(locator: &str) -> String {
        format!("sqlite://{locator}?mode=rw")
    }

    /// Creates the file at `locator`, failing if it already exists.
    /// `create_new` closes the race between concurrent creations.
    async fn create_file(&self, locator: &str) -> Result<(), TenancyError> {
        if let Some(parent) = Path::new(locator).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TenancyError::boundary_creation(locator, e))?;
        }

        let result = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(locator)
            .await;

        match result {
            Ok(_file) => {
                restrict_permissions(locator)
                    .await
                    .map_err(|e| TenancyError::boundary_creation(locator, e))?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(TenancyError::BoundaryExists {
                locator: locator.to_string(),
            }),
            Err(e) => Err(TenancyError::boundary_creation(locator, e)),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &str) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &str) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl BoundaryStrategy for DatabaseFileStrategy {
    fn kind(&self) -> IsolationStrategy {
        IsolationStrategy::DatabaseFile
    }

    fn locator_for(&self, tenant_id: &str) -> String {
        self.config
            .tenant_db_file_path(tenant_id)
            .to_string_lossy()
            .into_owned()
    }

    async fn exists(&self, locator: &str) -> Result<bool, TenancyError> {
        Ok(Path::new(locator).exists())
    }

    async fn create(&self, tenant_id: &str) -> Result<String, TenancyError> {
        let locator = self.locator_for(tenant_id);

        if Path::new(&locator).exists() {
            return Err(TenancyError::BoundaryExists { locator });
        }
        self.create_file(&locator).await?;

        tracing::info!(file = %locator, "created tenant database file");
        Ok(locator)
    }

    async fn ensure(&self, locator: &str) -> Result<bool, TenancyError> {
        if Path::new(locator).exists() {
            return Ok(false);
        }
        match self.create_file(locator).await {
            Ok(()) => Ok(true),
            // Lost a creation race; the boundary is there, which is all
            // ensure promises.
            Err(TenancyError::BoundaryExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn open(&self, locator: &str) -> Result<DatabaseConnection, TenancyError> {
        let pool = db::open_pool(&Self::sqlite_url(locator), None, &self.config).await?;
        Ok(pool)
    }

    async fn initialize(&self, locator: &str) -> Result<(), TenancyError> {
        let pool = self.open(locator).await?;
        let backend = pool.get_database_backend();
        for stmt in table_statements(None) {
            pool.execute(backend.build(&stmt))
                .await
                .map_err(|e| TenancyError::schema_initialization(locator, e))?;
        }
        let _ = pool.close().await;

        tracing::info!(file = %locator, "initialized tenant tables");
        Ok(())
    }

    async fn create_indexes(&self, locator: &str) -> Result<(), TenancyError> {
        let pool = self.open(locator).await?;
        let backend = pool.get_database_backend();
        for (name, stmt) in index_statements(None) {
            if let Err(e) = pool.execute(backend.build(&stmt)).await {
                tracing::warn!(index = name, file = %locator, error = %e, "index creation failed, skipping");
            }
        }
        let _ = pool.close().await;
        Ok(())
    }

    async fn validate(&self, locator: &str) -> Result<(), TenancyError> {
        let pool = self.open(locator).await?;
        let stmt = Statement::from_string(
            DbBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table'".to_string(),
        );
        let rows = pool.query_all(stmt).await?;
        let mut present = Vec::with_capacity(rows.len());
        for row in rows {
            present.push(row.try_get::<String>("", "name")?);
        }
        let _ = pool.close().await;

        let missing: Vec<String> = REQUIRED_TABLES
            .iter()
            .filter(|t| !present.iter().any(|p| p == *t))
            .map(|t| t.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TenancyError::SchemaValidation {
                locator: locator.to_string(),
                missing_tables: missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy_in(dir: &Path) -> DatabaseFileStrategy {
        let config = AppConfig {
            data_dir: dir.to_string_lossy().into_owned(),
            ..Default::default()
        };
        DatabaseFileStrategy::new(&config)
    }

    #[tokio::test]
    async fn create_builds_the_file_and_refuses_a_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());

        let locator = strategy.create("acme-01").await.unwrap();
        assert!(Path::new(&locator).exists());
        assert!(strategy.exists(&locator).await.unwrap());

        let second = strategy.create("acme-01").await;
        assert!(matches!(second, Err(TenancyError::BoundaryExists { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());
        let locator = strategy.create("acme-01").await.unwrap();

        let mode = std::fs::metadata(&locator).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());
        let locator = dir.path().join("registry.db").to_string_lossy().into_owned();

        assert!(strategy.ensure(&locator).await.unwrap());
        assert!(!strategy.ensure(&locator).await.unwrap());
        assert!(Path::new(&locator).exists());
    }

    #[tokio::test]
    async fn initialize_then_validate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());

        let locator = strategy.create("acme-01").await.unwrap();
        strategy.initialize(&locator).await.unwrap();
        strategy.create_indexes(&locator).await.unwrap();
        strategy.validate(&locator).await.unwrap();
    }

    #[tokio::test]
    async fn validate_lists_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());

        let locator = strategy.create("acme-01").await.unwrap();
        strategy.initialize(&locator).await.unwrap();

        let pool = strategy.open(&locator).await.unwrap();
        pool.execute(Statement::from_string(
            DbBackend::Sqlite,
            "DROP TABLE documents".to_string(),
        ))
        .await
        .unwrap();
        let _ = pool.close().await;

        let result = strategy.validate(&locator).await;
        match result {
            Err(TenancyError::SchemaValidation { missing_tables, .. }) => {
                assert_eq!(missing_tables, vec!["documents".to_string()]);
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_failing_index_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = strategy_in(dir.path());

        let locator = strategy.create("acme-01").await.unwrap();
        strategy.initialize(&locator).await.unwrap();

        // Occupy one index name so that entry fails while the others apply.
        let pool = strategy.open(&locator).await.unwrap();
        pool.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE INDEX idx_documents_basket_id ON documents (title)".to_string(),
        ))
        .await
        .unwrap();
        let _ = pool.close().await;

        strategy.create_indexes(&locator).await.unwrap();

        let pool = strategy.open(&locator).await.unwrap();
        let rows = pool
            .query_all(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'"
                    .to_string(),
            ))
            .await
            .unwrap();
        let _ = pool.close().await;

        let names: Vec<String> = rows
            .into_iter()
            .map(|r| r.try_get::<String>("", "name").unwrap())
            .collect();
        for (expected, _) in index_statements(None) {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }
}
