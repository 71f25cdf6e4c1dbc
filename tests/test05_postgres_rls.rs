#![cfg(feature = "test-utils-postgres")]

use std::time::Duration;

use rds_data_middleware::prelude::*;
use rds_data_middleware::test_utils::postgres::setup_tenant_postgres;
use rds_data_middleware::test_utils::test_target;

fn names(rs: &ResultSet) -> Vec<String> {
    rs.column("tenant_name")
        .filter_map(|v| v.and_then(RowValues::as_text).map(str::to_string))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn row_level_security_through_the_executor() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let db = setup_tenant_postgres("tenant_rls").await?;
    let executor = StatementExecutor::new(db.app_client()?, test_target());

    // transaction-scoped setting, one tenant per call
    for (tenant, expected) in [(1_i64, "Tenant1"), (2, "Tenant2"), (3, "Tenant3")] {
        let scope = TenantScope::new(StaticTenant(TenantId::from(tenant)));
        let rs = executor
            .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
            .await?;
        assert_eq!(names(&rs), vec![expected.to_string()]);
    }

    // the same flow spelled out by hand
    let tx = executor.begin_transaction().await?;
    executor.execute("set tenant.id = 2", &[], Some(&tx)).await?;
    let rs = executor
        .execute(
            "select tenant_id, tenant_name, account_balance from tenant where tenant_id >= :min",
            &[Parameter::new("min", 0)],
            Some(&tx),
        )
        .await?;
    let outcome = executor.commit(&tx).await?;
    assert_eq!(outcome.state, TxState::Committed);
    assert_eq!(rs.results.len(), 1);
    let row = &rs.results[0];
    assert_eq!(row.get("tenant_id").and_then(RowValues::as_int), Some(&2));
    assert_eq!(
        row.get("account_balance").and_then(RowValues::as_text),
        Some("60000")
    );
    assert!(executor.commit(&tx).await.unwrap_err().is_transaction());

    // the setting does not outlive its transaction
    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");

    // single statement, tenant bound as a parameter
    let scope = TenantScope::new(StaticTenant(TenantId::from(3_i64)));
    let rs = executor
        .execute_with_tenant_parameter(
            &scope,
            "select tenant_name from get_tenant_data(:tenant_id::integer)",
            &[],
        )
        .await?;
    assert_eq!(names(&rs), vec!["Tenant3".to_string()]);

    // failures inside the scope roll back and release the connection
    let err = executor
        .execute_for_tenant(&scope, "select no_such_column from tenant", &[])
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");
    assert_eq!(executor.client().open_transactions(), 0);

    // the bootstrap superuser bypasses the policy entirely
    let admin = StatementExecutor::new(db.admin_client()?, test_target());
    let rs = admin
        .execute("select tenant_name from tenant order by tenant_id", &[], None)
        .await?;
    assert_eq!(names(&rs), vec!["Tenant1", "Tenant2", "Tenant3"]);

    let affected = admin
        .statement(
            "update tenant set account_balance = account_balance + :delta::integer where tenant_id = :id",
        )
        .param("delta", 100)
        .param("id", 1)
        .execute()
        .await?;
    assert_eq!(affected, 1);

    drop(executor);
    drop(admin);
    db.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn session_settings_never_reach_the_next_borrower() -> Result<(), Box<dyn std::error::Error>>
{
    let db = setup_tenant_postgres("tenant_sessions").await?;
    // one pooled connection, so every call below reuses the same server session
    let executor = StatementExecutor::new(db.app_client_with_max_size(1)?, test_target());

    let tx = executor.begin_transaction().await?;
    executor.execute("set tenant.id = 2", &[], Some(&tx)).await?;
    let rs = executor
        .execute("select tenant_name from tenant", &[], Some(&tx))
        .await?;
    executor.commit(&tx).await?;
    assert_eq!(names(&rs), vec!["Tenant2".to_string()]);

    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");

    let fresh = executor.begin_transaction().await?;
    let err = executor
        .execute("select tenant_name from tenant", &[], Some(&fresh))
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");
    executor.rollback(&fresh).await?;

    executor.execute("set tenant.id = 3", &[], None).await?;
    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");

    drop(executor);
    db.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_statement_abandons_its_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup_tenant_postgres("tenant_cancel").await?;
    let executor = StatementExecutor::new(db.app_client_with_max_size(1)?, test_target());

    let tx = executor.begin_transaction().await?;
    let timed_out = tokio::time::timeout(
        Duration::from_millis(200),
        executor.execute("select pg_sleep(2)", &[], Some(&tx)),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(tx.is_active());

    // the server already rolled back with the closed connection; rolling back the handle succeeds
    let outcome = executor.rollback(&tx).await?;
    assert_eq!(outcome.state, TxState::RolledBack);
    assert_eq!(executor.client().open_transactions(), 0);

    // the next borrower gets a session outside any transaction
    let rs = executor
        .execute("select now() = statement_timestamp() as fresh", &[], None)
        .await?;
    assert_eq!(
        rs.results[0].get("fresh").and_then(RowValues::as_bool),
        Some(&true)
    );

    // committing an abandoned transaction reports that its work is gone
    let tx = executor.begin_transaction().await?;
    let _ = tokio::time::timeout(
        Duration::from_millis(200),
        executor.execute("select pg_sleep(2)", &[], Some(&tx)),
    )
    .await;
    let err = executor.commit(&tx).await.unwrap_err();
    assert!(err.is_transaction(), "{err}");
    assert_eq!(executor.client().open_transactions(), 0);

    drop(executor);
    db.stop().await;
    Ok(())
}
