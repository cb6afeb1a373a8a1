//! # Isolation Boundary Strategies
//!
//! A boundary is the physical container holding one tenant's data: a
//! Postgres schema or a SQLite database file. Strategies create and locate
//! boundaries and initialize their table/index structure; they know nothing
//! about the registry.
//!
//! The set of strategies is closed: a deployment selects exactly one from
//! its configured database engine and never mixes strategies within a single
//! registry instance.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, DatabaseEngine};
use crate::error::TenancyError;

pub mod database_file;
pub mod schema;
mod tables;

pub use database_file::DatabaseFileStrategy;
pub use schema::SchemaStrategy;
pub use tables::{REQUIRED_TABLES, index_statements, table_statements};

/// The two supported isolation mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationStrategy {
    Schema,
    DatabaseFile,
}

impl IsolationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationStrategy::Schema => "schema",
            IsolationStrategy::DatabaseFile => "database_file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "schema" => Some(IsolationStrategy::Schema),
            "database_file" => Some(IsolationStrategy::DatabaseFile),
            _ => None,
        }
    }

    /// Strategy implied by a database engine: schema isolation on a
    /// schema-capable engine, one database file per tenant otherwise.
    pub fn for_engine(engine: DatabaseEngine) -> Self {
        match engine {
            DatabaseEngine::Postgres => IsolationStrategy::Schema,
            DatabaseEngine::Sqlite => IsolationStrategy::DatabaseFile,
        }
    }
}

impl fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates and initializes isolation boundaries.
///
/// `create` is the non-idempotent provisioning path: a boundary that already
/// physically exists for a not-yet-registered tenant is an anomaly to
/// surface, not silently reuse. `ensure` is the bootstrap-only idempotent
/// path, safe to invoke on every startup.
#[async_trait]
pub trait BoundaryStrategy: Send + Sync {
    fn kind(&self) -> IsolationStrategy;

    /// Renders the configured locator template for a tenant id.
    fn locator_for(&self, tenant_id: &str) -> String;

    /// Whether the boundary physically exists.
    async fn exists(&self, locator: &str) -> Result<bool, TenancyError>;

    /// Creates the boundary for a tenant and returns its locator. Fails
    /// with [`TenancyError::BoundaryExists`] if it already exists.
    async fn create(&self, tenant_id: &str) -> Result<String, TenancyError>;

    /// Creates the boundary if absent; returns whether anything was created.
    async fn ensure(&self, locator: &str) -> Result<bool, TenancyError>;

    /// Opens a connection pool bound to the boundary. Never creates the
    /// boundary: a missing one surfaces as a connection error.
    async fn open(&self, locator: &str) -> Result<DatabaseConnection, TenancyError>;

    /// Creates the full set of required tables inside the boundary.
    async fn initialize(&self, locator: &str) -> Result<(), TenancyError>;

    /// Applies the fixed list of named indexes. Each index is independently
    /// attempted; failures are logged as warnings and skipped.
    async fn create_indexes(&self, locator: &str) -> Result<(), TenancyError>;

    /// Confirms every required table is present, failing with
    /// [`TenancyError::SchemaValidation`] listing the missing tables.
    async fn validate(&self, locator: &str) -> Result<(), TenancyError>;
}

/// Selects the strategy for the configured database engine.
pub async fn strategy_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn BoundaryStrategy>, TenancyError> {
    match config.database_engine()? {
        DatabaseEngine::Postgres => Ok(Arc::new(SchemaStrategy::connect(config).await?)),
        DatabaseEngine::Sqlite => Ok(Arc::new(DatabaseFileStrategy::new(config))),
    }
}
