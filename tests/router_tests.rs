//! Connection Router integration tests: routing, refusal, and pool
//! lifecycle.

use anyhow::Result;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use uuid::Uuid;

use docbox_tenancy::error::TenancyError;
use docbox_tenancy::provisioner::TenantProvisioner;
use docbox_tenancy::router::ConnectionRouter;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{provision_request, setup_system};

async fn insert_basket(conn: &sea_orm::DatabaseConnection, name: &str) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO baskets (id, name) VALUES (?, ?)",
        [Uuid::new_v4().to_string().into(), name.into()],
    );
    conn.execute(stmt).await?;
    Ok(())
}

async fn basket_count(conn: &sea_orm::DatabaseConnection) -> Result<i64> {
    let stmt = Statement::from_string(
        DbBackend::Sqlite,
        "SELECT COUNT(*) AS cnt FROM baskets".to_string(),
    );
    let row = conn.query_one(stmt).await?.expect("count row");
    Ok(row.try_get::<i64>("", "cnt")?)
}

#[tokio::test]
async fn routed_connections_reach_the_tenant_boundary() -> Result<()> {
    let system = setup_system().await?;
    let provisioner =
        TenantProvisioner::new(system.registry_db.clone(), system.strategy.clone());
    provisioner.provision(provision_request("acme-01")).await?;

    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());
    let conn = router.get_connection("acme-01").await?;
    insert_basket(&conn, "inbox").await?;
    assert_eq!(basket_count(&conn).await?, 1);

    // Document metadata lands in the same boundary.
    let doc_id = Uuid::new_v4().to_string();
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO document_metadata (id, document_id, key, value) VALUES (?, ?, ?, ?)",
        [
            Uuid::new_v4().to_string().into(),
            doc_id.into(),
            "author".into(),
            serde_json::json!({"name": "admin"}).into(),
        ],
    );
    conn.execute(stmt).await?;

    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn unprovisioned_tenants_are_refused_with_no_side_effects() -> Result<()> {
    let system = setup_system().await?;
    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());

    let err = router.get_connection("unregistered-id").await.unwrap_err();
    assert!(matches!(
        err,
        TenancyError::TenantNotProvisioned { tenant_id } if tenant_id == "unregistered-id"
    ));

    // No pool was cached and no boundary was created.
    assert!(router.list_active().await.is_empty());
    assert!(!system.config.tenant_db_file_path("unregistered-id").exists());
    Ok(())
}

#[tokio::test]
async fn close_then_reopen_uses_the_registered_locator() -> Result<()> {
    let system = setup_system().await?;
    let provisioner =
        TenantProvisioner::new(system.registry_db.clone(), system.strategy.clone());
    provisioner.provision(provision_request("acme-01")).await?;

    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());

    let conn = router.get_connection("acme-01").await?;
    insert_basket(&conn, "inbox").await?;
    router.close("acme-01").await?;
    assert!(router.list_active().await.is_empty());

    // A fresh pool against the same boundary sees the earlier write; no
    // re-provisioning happened.
    let conn = router.get_connection("acme-01").await?;
    assert_eq!(basket_count(&conn).await?, 1);

    router.close_all().await;
    Ok(())
}

#[tokio::test]
async fn close_is_idempotent() -> Result<()> {
    let system = setup_system().await?;
    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());

    // Never-opened and already-closed tenants are both no-ops.
    router.close("acme-01").await?;

    let provisioner =
        TenantProvisioner::new(system.registry_db.clone(), system.strategy.clone());
    provisioner.provision(provision_request("acme-01")).await?;
    router.get_connection("acme-01").await?;
    router.close("acme-01").await?;
    router.close("acme-01").await?;
    Ok(())
}

#[tokio::test]
async fn pools_for_different_tenants_coexist() -> Result<()> {
    let system = setup_system().await?;
    let provisioner =
        TenantProvisioner::new(system.registry_db.clone(), system.strategy.clone());
    provisioner.provision(provision_request("acme-01")).await?;
    provisioner.provision(provision_request("globex-02")).await?;

    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());
    let (a, b) = tokio::join!(
        router.get_connection("acme-01"),
        router.get_connection("globex-02")
    );
    let (a, b) = (a?, b?);

    insert_basket(&a, "inbox").await?;
    insert_basket(&b, "archive").await?;
    insert_basket(&b, "outbox").await?;

    // Writes stayed within each tenant's own boundary.
    assert_eq!(basket_count(&a).await?, 1);
    assert_eq!(basket_count(&b).await?, 2);

    assert_eq!(
        router.list_active().await,
        vec!["acme-01".to_string(), "globex-02".to_string()]
    );

    router.close_all().await;
    assert!(router.list_active().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_for_one_tenant_share_a_pool() -> Result<()> {
    let system = setup_system().await?;
    let provisioner =
        TenantProvisioner::new(system.registry_db.clone(), system.strategy.clone());
    provisioner.provision(provision_request("acme-01")).await?;

    let router = ConnectionRouter::new(system.registry_db.clone(), system.strategy.clone());
    let (a, b, c) = tokio::join!(
        router.get_connection("acme-01"),
        router.get_connection("acme-01"),
        router.get_connection("acme-01")
    );
    let (a, b, c) = (a?, b?, c?);

    insert_basket(&a, "inbox").await?;
    assert_eq!(basket_count(&b).await?, 1);
    assert_eq!(basket_count(&c).await?, 1);
    assert_eq!(router.list_active().await.len(), 1);

    router.close_all().await;
    Ok(())
}
