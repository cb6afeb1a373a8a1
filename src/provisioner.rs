//! # Tenant Provisioner
//!
//! Turns a provisioning request into a fully usable, registered tenant, or
//! fails cleanly with the step number and original cause attached. The
//! pipeline is strictly ordered and deliberately not idempotent:
//! re-provisioning an existing identifier always fails, which prevents
//! silent double-provisioning.

use std::sync::{Arc, OnceLock};

use metrics::counter;
use regex::Regex;
use sea_orm::DatabaseConnection;

use crate::boundary::{BoundaryStrategy, IsolationStrategy};
use crate::error::{ProvisionError, ProvisionStep, TenancyError};
use crate::models::tenant::Model as TenantModel;
use crate::repositories::tenant::validate_display_name;
use crate::repositories::{NewTenant, TenantRegistry};

/// A request to provision one tenant.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub tenant_id: String,
    pub display_name: String,
    /// Must match the configured strategy when given; auto-derived from the
    /// deployment's database engine when omitted.
    pub isolation_strategy: Option<IsolationStrategy>,
    pub created_by: String,
}

static TENANT_ID_RE: OnceLock<Regex> = OnceLock::new();
static RESERVED_RE: OnceLock<Regex> = OnceLock::new();

fn tenant_id_pattern() -> &'static Regex {
    TENANT_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,255}$").expect("valid pattern"))
}

fn reserved_pattern() -> &'static Regex {
    RESERVED_RE.get_or_init(|| Regex::new(r"^__.*__$").expect("valid pattern"))
}

/// Checks an identifier against the tenant-id format: 1-255 characters of
/// `[A-Za-z0-9_-]`, not matching the reserved `__...__` system namespace.
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), TenancyError> {
    if tenant_id.is_empty() {
        return Err(TenancyError::invalid_tenant_id(
            tenant_id,
            "identifier cannot be empty",
        ));
    }
    if tenant_id.len() > 255 {
        return Err(TenancyError::invalid_tenant_id(
            tenant_id,
            "identifier cannot exceed 255 characters",
        ));
    }
    if !tenant_id_pattern().is_match(tenant_id) {
        return Err(TenancyError::invalid_tenant_id(
            tenant_id,
            "identifier may only contain letters, digits, hyphens, and underscores",
        ));
    }
    if reserved_pattern().is_match(tenant_id) {
        return Err(TenancyError::invalid_tenant_id(
            tenant_id,
            "identifier matches the reserved system tenant pattern",
        ));
    }
    Ok(())
}

/// Orchestrates boundary creation, schema initialization, and registry
/// registration for new tenants.
pub struct TenantProvisioner {
    registry_db: DatabaseConnection,
    strategy: Arc<dyn BoundaryStrategy>,
}

impl TenantProvisioner {
    /// `registry_db` is the bootstrap boundary's pool as returned by the
    /// Bootstrap Manager.
    pub fn new(registry_db: DatabaseConnection, strategy: Arc<dyn BoundaryStrategy>) -> Self {
        Self {
            registry_db,
            strategy,
        }
    }

    /// Runs the six-step provisioning pipeline.
    ///
    /// Failures before step 6 leave no registry state; failures at or after
    /// step 3 leave an initialized-but-unregistered boundary behind, which
    /// is reported through [`ProvisionError::orphaned_boundary`] for manual
    /// inspection rather than deleted.
    pub async fn provision(&self, request: ProvisionRequest) -> Result<TenantModel, ProvisionError> {
        let tenant_id = request.tenant_id.clone();
        match self.run_pipeline(request).await {
            Ok(record) => {
                counter!("docbox_tenant_provision_success_total").increment(1);
                tracing::info!(tenant_id = %tenant_id, "tenant provisioned");
                Ok(record)
            }
            Err(err) => {
                counter!("docbox_tenant_provision_failure_total", "step" => err.step.name())
                    .increment(1);
                tracing::error!(
                    tenant_id = %tenant_id,
                    step = %err.step,
                    orphaned_boundary = err.orphaned_boundary.as_deref(),
                    "provisioning failed"
                );
                Err(err)
            }
        }
    }

    async fn run_pipeline(&self, request: ProvisionRequest) -> Result<TenantModel, ProvisionError> {
        let registry = TenantRegistry::new(&self.registry_db);

        // Step 1: validate. No side effects before this point.
        tracing::info!(tenant_id = %request.tenant_id, step = 1, "validating provisioning request");
        validate_tenant_id(&request.tenant_id)
            .map_err(|e| ProvisionError::at(ProvisionStep::Validate, e))?;
        validate_display_name(&request.display_name, &request.tenant_id)
            .map_err(|e| ProvisionError::at(ProvisionStep::Validate, e))?;
        if request.created_by.trim().is_empty() {
            return Err(ProvisionError::at(
                ProvisionStep::Validate,
                TenancyError::invalid_request(&request.tenant_id, "created_by cannot be empty"),
            ));
        }
        if let Some(requested) = request.isolation_strategy
            && requested != self.strategy.kind()
        {
            return Err(ProvisionError::at(
                ProvisionStep::Validate,
                TenancyError::StrategyMismatch {
                    requested,
                    configured: self.strategy.kind(),
                },
            ));
        }
        // Fast feedback only; the registry's key constraint at step 6 is the
        // authoritative guard against concurrent duplicates.
        if registry
            .exists(&request.tenant_id)
            .await
            .map_err(|e| ProvisionError::at(ProvisionStep::Validate, e))?
        {
            return Err(ProvisionError::at(
                ProvisionStep::Validate,
                TenancyError::TenantExists {
                    tenant_id: request.tenant_id.clone(),
                },
            ));
        }

        // Step 2: create the isolation boundary.
        tracing::info!(tenant_id = %request.tenant_id, step = 2, "creating isolation boundary");
        let locator = self
            .strategy
            .create(&request.tenant_id)
            .await
            .map_err(|e| ProvisionError::at(ProvisionStep::CreateBoundary, e))?;

        // Step 3: initialize tables. A failure here leaves the boundary
        // without tables; surfaced as an orphan, never auto-deleted.
        tracing::info!(tenant_id = %request.tenant_id, step = 3, locator = %locator, "initializing schema");
        self.strategy
            .initialize(&locator)
            .await
            .map_err(|e| ProvisionError::with_orphan(ProvisionStep::InitializeSchema, &locator, e))?;

        // Step 4: indexes. Never aborts provisioning.
        tracing::info!(tenant_id = %request.tenant_id, step = 4, locator = %locator, "creating indexes");
        if let Err(e) = self.strategy.create_indexes(&locator).await {
            tracing::warn!(
                tenant_id = %request.tenant_id,
                locator = %locator,
                error = %e,
                "index creation skipped"
            );
        }

        // Step 5: validate the schema before any registry write.
        tracing::info!(tenant_id = %request.tenant_id, step = 5, locator = %locator, "validating schema");
        self.strategy
            .validate(&locator)
            .await
            .map_err(|e| ProvisionError::with_orphan(ProvisionStep::ValidateSchema, &locator, e))?;

        // Step 6: register.
        tracing::info!(tenant_id = %request.tenant_id, step = 6, locator = %locator, "registering tenant");
        let record = registry
            .register(NewTenant {
                tenant_id: request.tenant_id.clone(),
                display_name: request.display_name,
                is_system: false,
                isolation_strategy: self.strategy.kind(),
                boundary_locator: locator.clone(),
                created_by: request.created_by,
            })
            .await
            .map_err(|e| match e {
                // A concurrent provisioner won the race at the storage
                // constraint; the duplicate surfaces as such.
                exists @ TenancyError::TenantExists { .. } => {
                    ProvisionError::with_orphan(ProvisionStep::Register, &locator, exists)
                }
                other => ProvisionError::with_orphan(
                    ProvisionStep::Register,
                    &locator,
                    TenancyError::RegistryWrite {
                        tenant_id: request.tenant_id.clone(),
                        boundary_locator: locator.clone(),
                        source: Box::new(other),
                    },
                ),
            })?;

        Ok(record)
    }
}
