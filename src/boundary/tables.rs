//! Table and index structure shared by every tenant boundary.
//!
//! The DDL is defined once as sea-query statements and rendered per backend:
//! schema-qualified for Postgres boundaries, unqualified for SQLite files.

use sea_orm::DeriveIden;
use sea_orm::sea_query::{
    Alias, ColumnDef, Expr, Index, IndexCreateStatement, IntoIden, IntoTableRef, Table,
    TableCreateStatement, TableRef,
};

/// Every table a usable tenant boundary must contain.
pub const REQUIRED_TABLES: &[&str] = &["baskets", "documents", "document_metadata"];

fn tref<T: IntoIden + 'static>(schema: Option<&str>, table: T) -> TableRef {
    match schema {
        Some(s) => (Alias::new(s), table.into_iden()).into_table_ref(),
        None => table.into_iden().into_table_ref(),
    }
}

/// Create-table statements for all required tables, in creation order.
pub fn table_statements(schema: Option<&str>) -> Vec<TableCreateStatement> {
    vec![baskets(schema), documents(schema), document_metadata(schema)]
}

/// The fixed list of named indexes applied to a boundary. Each entry is
/// independently attempted during provisioning.
pub fn index_statements(schema: Option<&str>) -> Vec<(&'static str, IndexCreateStatement)> {
    vec![
        (
            "idx_baskets_name",
            Index::create()
                .name("idx_baskets_name")
                .table(tref(schema, Baskets::Table))
                .col(Baskets::Name)
                .to_owned(),
        ),
        (
            "idx_documents_basket_id",
            Index::create()
                .name("idx_documents_basket_id")
                .table(tref(schema, Documents::Table))
                .col(Documents::BasketId)
                .to_owned(),
        ),
        (
            "idx_documents_created_at",
            Index::create()
                .name("idx_documents_created_at")
                .table(tref(schema, Documents::Table))
                .col(Documents::CreatedAt)
                .to_owned(),
        ),
        (
            "idx_documents_content_hash",
            Index::create()
                .name("idx_documents_content_hash")
                .table(tref(schema, Documents::Table))
                .col(Documents::ContentHash)
                .to_owned(),
        ),
        (
            "idx_document_metadata_document_id",
            Index::create()
                .name("idx_document_metadata_document_id")
                .table(tref(schema, DocumentMetadata::Table))
                .col(DocumentMetadata::DocumentId)
                .to_owned(),
        ),
        (
            "idx_document_metadata_key",
            Index::create()
                .name("idx_document_metadata_key")
                .table(tref(schema, DocumentMetadata::Table))
                .col(DocumentMetadata::Key)
                .to_owned(),
        ),
    ]
}

fn baskets(schema: Option<&str>) -> TableCreateStatement {
    Table::create()
        .table(tref(schema, Baskets::Table))
        .col(ColumnDef::new(Baskets::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Baskets::Name).text().not_null())
        .col(ColumnDef::new(Baskets::Description).text().null())
        .col(
            ColumnDef::new(Baskets::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Baskets::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned()
}

fn documents(schema: Option<&str>) -> TableCreateStatement {
    Table::create()
        .table(tref(schema, Documents::Table))
        .col(ColumnDef::new(Documents::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Documents::BasketId).uuid().not_null())
        .col(ColumnDef::new(Documents::Title).text().not_null())
        .col(ColumnDef::new(Documents::FileName).text().null())
        .col(ColumnDef::new(Documents::ContentHash).text().null())
        .col(ColumnDef::new(Documents::SizeBytes).big_integer().null())
        .col(ColumnDef::new(Documents::MimeType).text().null())
        .col(
            ColumnDef::new(Documents::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Documents::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned()
}

fn document_metadata(schema: Option<&str>) -> TableCreateStatement {
    Table::create()
        .table(tref(schema, DocumentMetadata::Table))
        .col(
            ColumnDef::new(DocumentMetadata::Id)
                .uuid()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(DocumentMetadata::DocumentId).uuid().not_null())
        .col(ColumnDef::new(DocumentMetadata::Key).text().not_null())
        .col(ColumnDef::new(DocumentMetadata::Value).json_binary().null())
        .col(
            ColumnDef::new(DocumentMetadata::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned()
}

#[derive(DeriveIden)]
enum Baskets {
    Table,
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    BasketId,
    Title,
    FileName,
    ContentHash,
    SizeBytes,
    MimeType,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DocumentMetadata {
    Table,
    Id,
    DocumentId,
    Key,
    Value,
    CreatedAt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{PostgresQueryBuilder, SqliteQueryBuilder};

    #[test]
    fn statement_list_covers_every_required_table() {
        assert_eq!(table_statements(None).len(), REQUIRED_TABLES.len());
    }

    #[test]
    fn postgres_statements_are_schema_qualified() {
        for stmt in table_statements(Some("tenant_acme-01")) {
            let sql = stmt.to_string(PostgresQueryBuilder);
            assert!(
                sql.contains("\"tenant_acme-01\"."),
                "expected schema qualifier in: {sql}"
            );
        }
        for (_, stmt) in index_statements(Some("tenant_acme-01")) {
            let sql = stmt.to_string(PostgresQueryBuilder);
            assert!(
                sql.contains("\"tenant_acme-01\"."),
                "expected schema qualifier in: {sql}"
            );
        }
    }

    #[test]
    fn sqlite_statements_are_unqualified() {
        for stmt in table_statements(None) {
            let sql = stmt.to_string(SqliteQueryBuilder);
            assert!(!sql.contains('.'), "unexpected qualifier in: {sql}");
        }
    }

    #[test]
    fn every_index_targets_a_required_table() {
        for (name, stmt) in index_statements(None) {
            let sql = stmt.to_string(SqliteQueryBuilder);
            assert!(sql.contains(name));
            assert!(
                REQUIRED_TABLES.iter().any(|t| sql.contains(t)),
                "index {name} targets no required table: {sql}"
            );
        }
    }
}
