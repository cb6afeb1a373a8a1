//! Test utilities for tenancy integration tests.
//!
//! Builds a fully bootstrapped system on the database-file strategy inside
//! a temporary directory, so every test runs hermetically.

use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use docbox_tenancy::boundary::{BoundaryStrategy, DatabaseFileStrategy};
use docbox_tenancy::bootstrap::BootstrapManager;
use docbox_tenancy::config::AppConfig;
use docbox_tenancy::provisioner::ProvisionRequest;

pub struct TestSystem {
    pub config: AppConfig,
    pub strategy: Arc<dyn BoundaryStrategy>,
    pub registry_db: DatabaseConnection,
    pub bootstrap: BootstrapManager,
    // Holds the boundary files for the lifetime of the test.
    _data_dir: TempDir,
}

/// Bootstraps a fresh system under a temp data dir and returns its parts.
pub async fn setup_system() -> Result<TestSystem> {
    let data_dir = TempDir::new()?;
    let config = AppConfig {
        database_url: format!("sqlite://{}/docbox.db", data_dir.path().display()),
        data_dir: data_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };

    let strategy: Arc<dyn BoundaryStrategy> = Arc::new(DatabaseFileStrategy::new(&config));
    let bootstrap = BootstrapManager::new(&config, strategy.clone());
    let registry_db = bootstrap.initialize("test-harness").await?;

    Ok(TestSystem {
        config,
        strategy,
        registry_db,
        bootstrap,
        _data_dir: data_dir,
    })
}

/// A well-formed provisioning request for the given id.
#[allow(dead_code)]
pub fn provision_request(tenant_id: &str) -> ProvisionRequest {
    ProvisionRequest {
        tenant_id: tenant_id.to_string(),
        display_name: "Acme Corp".to_string(),
        isolation_strategy: None,
        created_by: "admin".to_string(),
    }
}
