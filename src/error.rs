//! # Error Handling
//!
//! Unified error taxonomy for the tenancy core. Validation errors fail
//! before any side effect; boundary and schema errors carry the original
//! cause; registry-write failures after a boundary exists always carry the
//! boundary locator so the orphan can be located.

use std::fmt;

use thiserror::Error;

use crate::boundary::IsolationStrategy;
use crate::db::DatabaseError;

/// Boxed underlying cause for boundary/schema failures, which can originate
/// from the database driver or from filesystem operations.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the tenancy core.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("invalid tenant id '{tenant_id}': {reason}")]
    InvalidTenantId { tenant_id: String, reason: String },

    #[error("invalid provisioning request for '{tenant_id}': {reason}")]
    InvalidRequest { tenant_id: String, reason: String },

    #[error("tenant '{tenant_id}' already exists")]
    TenantExists { tenant_id: String },

    #[error("tenant '{tenant_id}' not found in registry")]
    TenantNotFound { tenant_id: String },

    #[error("tenant '{tenant_id}' is not provisioned; provision it before requesting connections")]
    TenantNotProvisioned { tenant_id: String },

    #[error("requested isolation strategy '{requested}' conflicts with configured strategy '{configured}'")]
    StrategyMismatch {
        requested: IsolationStrategy,
        configured: IsolationStrategy,
    },

    #[error("isolation boundary '{locator}' already exists for an unregistered tenant")]
    BoundaryExists { locator: String },

    #[error("failed to create isolation boundary '{locator}': {source}")]
    BoundaryCreation {
        locator: String,
        #[source]
        source: BoxedCause,
    },

    #[error("failed to initialize schema in boundary '{locator}': {source}")]
    SchemaInitialization {
        locator: String,
        #[source]
        source: BoxedCause,
    },

    #[error("schema validation failed for boundary '{locator}'; missing tables: {}", .missing_tables.join(", "))]
    SchemaValidation {
        locator: String,
        missing_tables: Vec<String>,
    },

    #[error("failed to write registry record for tenant '{tenant_id}' (boundary '{boundary_locator}' was left behind): {source}")]
    RegistryWrite {
        tenant_id: String,
        boundary_locator: String,
        #[source]
        source: BoxedCause,
    },

    #[error("database connection failed: {0}")]
    Connection(#[from] DatabaseError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl TenancyError {
    pub fn invalid_tenant_id<S: Into<String>, R: Into<String>>(tenant_id: S, reason: R) -> Self {
        Self::InvalidTenantId {
            tenant_id: tenant_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request<S: Into<String>, R: Into<String>>(tenant_id: S, reason: R) -> Self {
        Self::InvalidRequest {
            tenant_id: tenant_id.into(),
            reason: reason.into(),
        }
    }

    pub fn boundary_creation<E>(locator: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BoundaryCreation {
            locator: locator.to_string(),
            source: Box::new(source),
        }
    }

    pub fn schema_initialization<E>(locator: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::SchemaInitialization {
            locator: locator.to_string(),
            source: Box::new(source),
        }
    }
}

/// Ordered provisioning steps, as reported on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Validate,
    CreateBoundary,
    InitializeSchema,
    CreateIndexes,
    ValidateSchema,
    Register,
}

impl ProvisionStep {
    pub fn number(self) -> u8 {
        match self {
            ProvisionStep::Validate => 1,
            ProvisionStep::CreateBoundary => 2,
            ProvisionStep::InitializeSchema => 3,
            ProvisionStep::CreateIndexes => 4,
            ProvisionStep::ValidateSchema => 5,
            ProvisionStep::Register => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProvisionStep::Validate => "validate",
            ProvisionStep::CreateBoundary => "create-boundary",
            ProvisionStep::InitializeSchema => "initialize-schema",
            ProvisionStep::CreateIndexes => "create-indexes",
            ProvisionStep::ValidateSchema => "validate-schema",
            ProvisionStep::Register => "register",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// A provisioning failure tagged with the step that failed and any physical
/// resource that was left behind.
#[derive(Debug, Error)]
#[error("provisioning failed at step {step}: {source}{}", .orphaned_boundary.as_deref().map(|l| format!(" [orphaned boundary: {l}]")).unwrap_or_default())]
pub struct ProvisionError {
    pub step: ProvisionStep,
    /// Locator of a boundary that exists but is not registered, if any.
    pub orphaned_boundary: Option<String>,
    #[source]
    pub source: TenancyError,
}

impl ProvisionError {
    pub fn at(step: ProvisionStep, source: TenancyError) -> Self {
        Self {
            step,
            orphaned_boundary: None,
            source,
        }
    }

    pub fn with_orphan(step: ProvisionStep, locator: &str, source: TenancyError) -> Self {
        Self {
            step,
            orphaned_boundary: Some(locator.to_string()),
            source,
        }
    }
}

/// Detects storage-level uniqueness constraint violations across the two
/// supported engines so duplicate-identifier races map to `TenantExists`.
pub fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_error.code() {
        let code_str = code.as_ref();
        if code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_step_numbers_follow_pipeline_order() {
        let steps = [
            ProvisionStep::Validate,
            ProvisionStep::CreateBoundary,
            ProvisionStep::InitializeSchema,
            ProvisionStep::CreateIndexes,
            ProvisionStep::ValidateSchema,
            ProvisionStep::Register,
        ];
        for (idx, step) in steps.iter().enumerate() {
            assert_eq!(step.number() as usize, idx + 1);
        }
    }

    #[test]
    fn provision_error_reports_step_and_orphan() {
        let err = ProvisionError::with_orphan(
            ProvisionStep::Register,
            "tenant_acme",
            TenancyError::TenantExists {
                tenant_id: "acme".to_string(),
            },
        );
        let rendered = err.to_string();
        assert!(rendered.contains("step 6 (register)"));
        assert!(rendered.contains("orphaned boundary: tenant_acme"));
    }

    #[test]
    fn provision_error_without_orphan_omits_suffix() {
        let err = ProvisionError::at(
            ProvisionStep::Validate,
            TenancyError::invalid_tenant_id("x y", "identifier contains invalid characters"),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("step 1 (validate)"));
        assert!(!rendered.contains("orphaned boundary"));
    }

    #[test]
    fn non_query_errors_are_not_unique_violations() {
        let err = sea_orm::DbErr::RecordNotFound("tenants".to_string());
        assert!(!is_unique_violation(&err));
    }
}
