//! Schema isolation strategy for Postgres deployments.
//!
//! Each tenant gets a dedicated schema in the shared database. DDL runs
//! through a single admin pool with schema-qualified statements; tenant
//! pools are opened with their `search_path` pinned to the tenant schema.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::boundary::{BoundaryStrategy, IsolationStrategy, index_statements, table_statements};
use crate::boundary::tables::REQUIRED_TABLES;
use crate::config::AppConfig;
use crate::db;
use crate::error::TenancyError;

pub struct SchemaStrategy {
    admin: DatabaseConnection,
    config: AppConfig,
}

impl SchemaStrategy {
    /// Opens the admin pool this strategy issues DDL through.
    pub async fn connect(config: &AppConfig) -> Result<Self, TenancyError> {
        let admin = db::open_pool(&config.database_url, None, config).await?;
        Ok(Self {
            admin,
            config: config.clone(),
        })
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool, TenancyError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1",
            [schema.into()],
        );
        Ok(self.admin.query_one(stmt).await?.is_some())
    }

    async fn tables_present(&self, schema: &str) -> Result<Vec<String>, TenancyError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1",
            [schema.into()],
        );
        let rows = self.admin.query_all(stmt).await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<String>("", "table_name")?);
        }
        Ok(names)
    }
}

/// Schema names reach raw DDL; restrict them to the identifier charset the
/// templates and tenant ids are already limited to.
fn checked_ident(locator: &str) -> Result<&str, TenancyError> {
    let safe = !locator.is_empty()
        && locator
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if safe {
        Ok(locator)
    } else {
        Err(TenancyError::Database(sea_orm::DbErr::Custom(format!(
            "unsafe schema name '{locator}'"
        ))))
    }
}

#[async_trait]
impl BoundaryStrategy for SchemaStrategy {
    fn kind(&self) -> IsolationStrategy {
        IsolationStrategy::Schema
    }

    fn locator_for(&self, tenant_id: &str) -> String {
        self.config.tenant_schema_name(tenant_id)
    }

    async fn exists(&self, locator: &str) -> Result<bool, TenancyError> {
        self.schema_exists(locator).await
    }

    async fn create(&self, tenant_id: &str) -> Result<String, TenancyError> {
        let locator = self.locator_for(tenant_id);
        let ident = checked_ident(&locator)?;

        if self.schema_exists(ident).await? {
            return Err(TenancyError::BoundaryExists { locator });
        }

        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("CREATE SCHEMA \"{ident}\""),
        );
        self.admin
            .execute(stmt)
            .await
            .map_err(|e| TenancyError::boundary_creation(&locator, e))?;

        tracing::info!(schema = %locator, "created tenant schema");
        Ok(locator)
    }

    async fn ensure(&self, locator: &str) -> Result<bool, TenancyError> {
        let ident = checked_ident(locator)?;
        if self.schema_exists(ident).await? {
            return Ok(false);
        }

        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("CREATE SCHEMA IF NOT EXISTS \"{ident}\""),
        );
        self.admin
            .execute(stmt)
            .await
            .map_err(|e| TenancyError::boundary_creation(locator, e))?;
        Ok(true)
    }

    async fn open(&self, locator: &str) -> Result<DatabaseConnection, TenancyError> {
        let pool = db::open_pool(&self.config.database_url, Some(locator), &self.config).await?;
        Ok(pool)
    }

    async fn initialize(&self, locator: &str) -> Result<(), TenancyError> {
        let backend = self.admin.get_database_backend();
        for stmt in table_statements(Some(locator)) {
            self.admin
                .execute(backend.build(&stmt))
                .await
                .map_err(|e| TenancyError::schema_initialization(locator, e))?;
        }
        tracing::info!(schema = %locator, "initialized tenant tables");
        Ok(())
    }

    async fn create_indexes(&self, locator: &str) -> Result<(), TenancyError> {
        let backend = self.admin.get_database_backend();
        for (name, stmt) in index_statements(Some(locator)) {
            if let Err(e) = self.admin.execute(backend.build(&stmt)).await {
                tracing::warn!(index = name, schema = %locator, error = %e, "index creation failed, skipping");
            }
        }
        Ok(())
    }

    async fn validate(&self, locator: &str) -> Result<(), TenancyError> {
        let present = self.tables_present(locator).await?;
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

    #[test]
    fn checked_ident_accepts_template_rendered_names() {
        assert!(checked_ident("tenant_acme-01").is_ok());
        assert!(checked_ident("docbox_registry").is_ok());
    }

    #[test]
    fn checked_ident_rejects_quoting_escapes() {
        assert!(checked_ident("tenant\"; DROP SCHEMA public").is_err());
        assert!(checked_ident("").is_err());
        assert!(checked_ident("tenant x").is_err());
    }
}
