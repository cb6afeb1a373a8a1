//! # Connection Router
//!
//! Maps tenant identifiers to ready-to-use pooled connections. The router
//! consults the registry on first use, refuses unregistered tenants, and
//! never creates boundaries. Pools for different tenants coexist
//! independently; the internal lock covers cache insertion and removal
//! only, not pool use.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;

use crate::boundary::{BoundaryStrategy, IsolationStrategy};
use crate::error::TenancyError;
use crate::repositories::TenantRegistry;

pub struct ConnectionRouter {
    registry_db: DatabaseConnection,
    strategy: Arc<dyn BoundaryStrategy>,
    pools: RwLock<HashMap<String, DatabaseConnection>>,
}

impl ConnectionRouter {
    /// `registry_db` is the bootstrap boundary's pool as returned by the
    /// Bootstrap Manager.
    pub fn new(registry_db: DatabaseConnection, strategy: Arc<dyn BoundaryStrategy>) -> Self {
        Self {
            registry_db,
            strategy,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the pooled connection for a registered tenant, opening and
    /// caching one bound to the registered boundary locator on first use.
    ///
    /// This is the sole sanctioned way for downstream document and storage
    /// logic to reach a tenant's boundary.
    pub async fn get_connection(&self, tenant_id: &str) -> Result<DatabaseConnection, TenancyError> {
        if let Some(pool) = self.pools.read().await.get(tenant_id) {
            return Ok(pool.clone());
        }

        let registry = TenantRegistry::new(&self.registry_db);
        let record =
            registry
                .lookup(tenant_id)
                .await?
                .ok_or_else(|| TenancyError::TenantNotProvisioned {
                    tenant_id: tenant_id.to_string(),
                })?;

        let recorded = IsolationStrategy::parse(&record.isolation_strategy).ok_or_else(|| {
            TenancyError::Database(sea_orm::DbErr::Custom(format!(
                "registry record for '{tenant_id}' has unknown isolation strategy '{}'",
                record.isolation_strategy
            )))
        })?;
        if recorded != self.strategy.kind() {
            return Err(TenancyError::StrategyMismatch {
                requested: recorded,
                configured: self.strategy.kind(),
            });
        }

        let pool = self.strategy.open(&record.boundary_locator).await?;

        let mut pools = self.pools.write().await;
        if let Some(existing) = pools.get(tenant_id) {
            // Lost an open race; keep the cached pool and discard ours.
            let existing = existing.clone();
            drop(pools);
            let _ = pool.close().await;
            return Ok(existing);
        }
        pools.insert(tenant_id.to_string(), pool.clone());
        drop(pools);

        counter!("docbox_router_pools_opened_total").increment(1);
        tracing::debug!(tenant_id = %tenant_id, locator = %record.boundary_locator, "opened tenant pool");
        Ok(pool)
    }

    /// Tears down and evicts the cached pool for one tenant. A no-op for
    /// tenants without an open pool.
    pub async fn close(&self, tenant_id: &str) -> Result<(), TenancyError> {
        let removed = self.pools.write().await.remove(tenant_id);
        if let Some(pool) = removed {
            pool.close().await?;
            counter!("docbox_router_pools_closed_total").increment(1);
            tracing::debug!(tenant_id = %tenant_id, "closed tenant pool");
        }
        Ok(())
    }

    /// Tears down every cached pool. Close failures are logged and do not
    /// stop the teardown of remaining pools.
    pub async fn close_all(&self) {
        let drained: Vec<(String, DatabaseConnection)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };
        for (tenant_id, pool) in drained {
            if let Err(e) = pool.close().await {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "failed to close tenant pool");
            } else {
                counter!("docbox_router_pools_closed_total").increment(1);
            }
        }
    }

    /// Identifiers of tenants with a currently open pool, sorted.
    pub async fn list_active(&self) -> Vec<String> {
        let mut active: Vec<String> = self.pools.read().await.keys().cloned().collect();
        active.sort();
        active
    }
}
