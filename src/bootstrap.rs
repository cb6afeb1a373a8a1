//! # Bootstrap Manager
//!
//! One-time, idempotent system initialization. The registry that tracks
//! tenants must itself live inside a tenant-like boundary, so bootstrap
//! creates that boundary directly through the strategy (bypassing the
//! provisioner, which needs the registry to already exist), runs the
//! registry migrations inside it, and records the bootstrap tenant.

use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;

use crate::boundary::{BoundaryStrategy, IsolationStrategy};
use crate::config::AppConfig;
use crate::error::TenancyError;
use crate::repositories::{NewTenant, TenantRegistry};

/// Fixed identifier of the bootstrap tenant. Lives in the reserved
/// `__...__` namespace that ordinary provisioning rejects.
pub const BOOTSTRAP_TENANT_ID: &str = "__registry__";

const BOOTSTRAP_DISPLAY_NAME: &str = "System Registry";

pub struct BootstrapManager {
    config: AppConfig,
    strategy: Arc<dyn BoundaryStrategy>,
}

impl BootstrapManager {
    pub fn new(config: &AppConfig, strategy: Arc<dyn BoundaryStrategy>) -> Self {
        Self {
            config: config.clone(),
            strategy,
        }
    }

    /// Locator of the bootstrap boundary. Fixed per deployment rather than
    /// rendered from the tenant template, so the reserved identifier never
    /// leaks into schema or file names.
    pub fn registry_locator(&self) -> String {
        match self.strategy.kind() {
            IsolationStrategy::Schema => self.config.registry_schema.clone(),
            IsolationStrategy::DatabaseFile => self
                .config
                .registry_db_file_path()
                .to_string_lossy()
                .into_owned(),
        }
    }

    /// Initializes the system: bootstrap boundary, registry storage
    /// structure, and the single `is_system` record. Safe to call on every
    /// startup; repeated calls are no-ops after the first success.
    ///
    /// Returns the registry pool for the provisioner and router to use.
    pub async fn initialize(&self, created_by: &str) -> Result<DatabaseConnection, TenancyError> {
        let locator = self.registry_locator();

        let created = self.strategy.ensure(&locator).await?;
        if created {
            tracing::info!(locator = %locator, "created bootstrap boundary");
        }

        let pool = self.strategy.open(&locator).await?;
        Migrator::up(&pool, None).await?;

        let registry = TenantRegistry::new(&pool);
        if registry.system_record().await?.is_none() {
            let result = registry
                .register(NewTenant {
                    tenant_id: BOOTSTRAP_TENANT_ID.to_string(),
                    display_name: BOOTSTRAP_DISPLAY_NAME.to_string(),
                    is_system: true,
                    isolation_strategy: self.strategy.kind(),
                    boundary_locator: locator.clone(),
                    created_by: created_by.to_string(),
                })
                .await;
            match result {
                Ok(_) => {
                    tracing::info!(tenant_id = BOOTSTRAP_TENANT_ID, "registered bootstrap tenant")
                }
                // A concurrent bootstrap won the insert; initialization is
                // complete either way.
                Err(TenancyError::TenantExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(pool)
    }
}
