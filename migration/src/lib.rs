//! Registry migrations for the Docbox tenancy core.
//!
//! These run inside the bootstrap boundary only; per-tenant document tables
//! are created by the isolation boundary strategies, not by migrations.

pub use sea_orm_migration::prelude::*;

mod m2024_06_01_000001_create_tenants;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m2024_06_01_000001_create_tenants::Migration)]
    }
}
