//! # Tenant Registry
//!
//! Durable, unique-keyed storage of tenant records, itself persisted inside
//! the bootstrap boundary. Uniqueness of `tenant_id` is enforced by the
//! primary key constraint, not only by read-then-write checks, which closes
//! the race between concurrent provisioning attempts for the same id.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

use crate::boundary::IsolationStrategy;
use crate::error::{TenancyError, is_unique_violation};
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column as TenantColumn, Entity as Tenant,
    Model as TenantModel,
};

/// Data for a new registry record.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub tenant_id: String,
    pub display_name: String,
    pub is_system: bool,
    pub isolation_strategy: IsolationStrategy,
    pub boundary_locator: String,
    pub created_by: String,
}

/// Repository for tenant registry operations.
pub struct TenantRegistry<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TenantRegistry<'a> {
    /// Create a registry view over the bootstrap boundary's pool.
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new record. Fails with [`TenancyError::TenantExists`] when
    /// the identifier is already present, whether detected by this insert or
    /// by a concurrent one.
    pub async fn register(&self, new: NewTenant) -> Result<TenantModel, TenancyError> {
        validate_display_name(&new.display_name, &new.tenant_id)?;

        let record = TenantActiveModel {
            tenant_id: Set(new.tenant_id.clone()),
            display_name: Set(new.display_name),
            is_system: Set(new.is_system),
            isolation_strategy: Set(new.isolation_strategy.as_str().to_string()),
            boundary_locator: Set(new.boundary_locator),
            created_at: Set(Utc::now().into()),
            created_by: Set(new.created_by),
            last_updated_at: Set(None),
            last_updated_by: Set(None),
        };

        record.insert(self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                TenancyError::TenantExists {
                    tenant_id: new.tenant_id,
                }
            } else {
                TenancyError::Database(err)
            }
        })
    }

    /// Returns the record, or `None` for an unknown tenant. Missing tenants
    /// are not an error at this layer; callers decide.
    pub async fn lookup(&self, tenant_id: &str) -> Result<Option<TenantModel>, TenancyError> {
        let record = Tenant::find_by_id(tenant_id).one(self.db).await?;
        Ok(record)
    }

    /// Whether a record exists for the identifier.
    pub async fn exists(&self, tenant_id: &str) -> Result<bool, TenancyError> {
        Ok(self.lookup(tenant_id).await?.is_some())
    }

    /// All records, optionally excluding the system tenant.
    pub async fn list(&self, include_system: bool) -> Result<Vec<TenantModel>, TenancyError> {
        let mut query = Tenant::find().order_by_asc(TenantColumn::TenantId);
        if !include_system {
            query = query.filter(TenantColumn::IsSystem.eq(false));
        }
        let records = query.all(self.db).await?;
        Ok(records)
    }

    /// The single system record, if bootstrap has run.
    pub async fn system_record(&self) -> Result<Option<TenantModel>, TenancyError> {
        let record = Tenant::find()
            .filter(TenantColumn::IsSystem.eq(true))
            .one(self.db)
            .await?;
        Ok(record)
    }

    /// Update the display name and audit fields of an existing tenant.
    pub async fn update_display_name(
        &self,
        tenant_id: &str,
        display_name: &str,
        updated_by: &str,
    ) -> Result<TenantModel, TenancyError> {
        validate_display_name(display_name, tenant_id)?;

        let record =
            self.lookup(tenant_id)
                .await?
                .ok_or_else(|| TenancyError::TenantNotFound {
                    tenant_id: tenant_id.to_string(),
                })?;

        let mut active = record.into_active_model();
        active.display_name = Set(display_name.to_string());
        active.last_updated_at = Set(Some(Utc::now().into()));
        active.last_updated_by = Set(Some(updated_by.to_string()));

        let updated = active.update(self.db).await?;
        Ok(updated)
    }
}

/// Display names are free-form but must be non-empty and fit the column.
pub(crate) fn validate_display_name(name: &str, tenant_id: &str) -> Result<(), TenancyError> {
    if name.trim().is_empty() {
        return Err(TenancyError::invalid_request(
            tenant_id,
            "display name cannot be empty",
        ));
    }
    if name.len() > 255 {
        return Err(TenancyError::invalid_request(
            tenant_id,
            "display name cannot exceed 255 characters",
        ));
    }
    Ok(())
}
