//! Tenant registry entity model
//!
//! One row per tenant. The string identifier is the primary key and is
//! immutable once created; the storage-level key constraint is the
//! authoritative guard against duplicate provisioning.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Tenant record as persisted in the registry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique tenant identifier (primary key), 1-255 chars of
    /// `[A-Za-z0-9_-]`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: String,

    /// Human-readable display name; the only mutable business field.
    pub display_name: String,

    /// True only for the bootstrap tenant whose boundary stores this table.
    pub is_system: bool,

    /// `schema` or `database_file`; fixed at creation.
    pub isolation_strategy: String,

    /// Schema name or file path of the tenant's isolation boundary.
    pub boundary_locator: String,

    pub created_at: DateTimeWithTimeZone,
    pub created_by: String,
    pub last_updated_at: Option<DateTimeWithTimeZone>,
    pub last_updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
