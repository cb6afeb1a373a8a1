//! Migration to create the tenant registry table.
//!
//! The registry keys tenants by their string identifier; the primary key is
//! the authoritative uniqueness guard against concurrent provisioning of the
//! same identifier.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tenants::TenantId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tenants::DisplayName).text().not_null())
                    .col(
                        ColumnDef::new(Tenants::IsSystem)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Tenants::IsolationStrategy).text().not_null())
                    .col(ColumnDef::new(Tenants::BoundaryLocator).text().not_null())
                    .col(
                        ColumnDef::new(Tenants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Tenants::CreatedBy).text().not_null())
                    .col(
                        ColumnDef::new(Tenants::LastUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Tenants::LastUpdatedBy).text().null())
                    .to_owned(),
            )
            .await?;

        // Non-unique: used when listing system vs business tenants.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tenants_is_system")
                    .table(Tenants::Table)
                    .col(Tenants::IsSystem)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    TenantId,
    DisplayName,
    IsSystem,
    IsolationStrategy,
    BoundaryLocator,
    CreatedAt,
    CreatedBy,
    LastUpdatedAt,
    LastUpdatedBy,
}
