use std::sync::Arc;

use rds_data_middleware::prelude::*;
use rds_data_middleware::test_utils::{
    MockDataApi, RecordedCall, tenant_table_responder, test_target,
};
use rds_data_middleware::SET_TENANT_SQL;
use serde_json::json;

fn tenant_executor() -> (Arc<MockDataApi>, StatementExecutor<MockDataApi>) {
    let mock = Arc::new(MockDataApi::with_responder(tenant_table_responder));
    let executor = StatementExecutor::from_shared(mock.clone(), test_target());
    (mock, executor)
}

fn names(rs: &ResultSet) -> Vec<String> {
    rs.column("tenant_name")
        .filter_map(|v| v.and_then(RowValues::as_text).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn transaction_scoped_tenant_sees_only_its_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (mock, executor) = tenant_executor();
    let scope = TenantScope::new(StaticTenant(TenantId::from(2_i64)));

    let rs = executor
        .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
        .await?;
    assert_eq!(names(&rs), vec!["Tenant2".to_string()]);

    let calls = mock.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], RecordedCall::Begin);
    let RecordedCall::Execute {
        sql,
        params,
        transaction_id: Some(first_tx),
    } = &calls[1]
    else {
        panic!("expected set_config inside the transaction, got {:?}", calls[1]);
    };
    assert_eq!(sql, SET_TENANT_SQL);
    assert_eq!(
        params,
        &vec![
            Parameter::new("setting_name", "tenant.id"),
            Parameter::new("setting_value", "2"),
        ]
    );
    let RecordedCall::Execute {
        transaction_id: Some(second_tx),
        ..
    } = &calls[2]
    else {
        panic!("expected the query inside the transaction, got {:?}", calls[2]);
    };
    assert_eq!(first_tx, second_tx);
    assert_eq!(calls[3], RecordedCall::Commit(first_tx.clone()));
    Ok(())
}

#[tokio::test]
async fn each_resolution_picks_up_the_current_tenant() -> Result<(), Box<dyn std::error::Error>> {
    let (_mock, executor) = tenant_executor();
    for (tenant, expected) in [(1_i64, "Tenant1"), (3, "Tenant3")] {
        let scope = TenantScope::new(move || TenantId::from(tenant));
        let rs = executor
            .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
            .await?;
        assert_eq!(names(&rs), vec![expected.to_string()]);
    }
    Ok(())
}

#[tokio::test]
async fn settings_do_not_leak_between_calls() -> Result<(), Box<dyn std::error::Error>> {
    let (_mock, executor) = tenant_executor();

    executor
        .execute(
            SET_TENANT_SQL,
            &[
                Parameter::new("setting_name", "tenant.id"),
                Parameter::new("setting_value", "2"),
            ],
            None,
        )
        .await?;
    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");
    Ok(())
}

#[tokio::test]
async fn manual_transaction_matches_the_helper() -> Result<(), Box<dyn std::error::Error>> {
    let (_mock, executor) = tenant_executor();
    let scope = TenantScope::new(StaticTenant(TenantId::from(2_i64)));

    let tx = executor.begin_transaction().await?;
    executor.execute("set tenant.id = 2", &[], Some(&tx)).await?;
    let manual = executor
        .execute("select tenant_name from tenant", &[], Some(&tx))
        .await?;
    executor.commit(&tx).await?;

    let helper = executor
        .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
        .await?;
    assert_eq!(names(&manual), names(&helper));
    Ok(())
}

#[tokio::test]
async fn session_level_set_ends_with_its_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let (_mock, executor) = tenant_executor();

    let tx = executor.begin_transaction().await?;
    executor.execute("set tenant.id = 2", &[], Some(&tx)).await?;
    let first = executor
        .execute("select tenant_name from tenant", &[], Some(&tx))
        .await?;
    let second = executor
        .execute("select tenant_name from tenant", &[], Some(&tx))
        .await?;
    executor.commit(&tx).await?;
    assert_eq!(names(&first), vec!["Tenant2".to_string()]);
    assert_eq!(names(&second), names(&first));

    // a standalone call starts from a clean session
    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");

    // so does the next transaction
    let next = executor.begin_transaction().await?;
    let err = executor
        .execute("select tenant_name from tenant", &[], Some(&next))
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");
    executor.rollback(&next).await?;

    // and a plain SET outside a transaction only lasts for its own call
    executor.execute("set tenant.id = 3", &[], None).await?;
    let err = executor
        .execute("select tenant_name from tenant", &[], None)
        .await
        .unwrap_err();
    assert!(err.is_statement(), "{err}");
    Ok(())
}

#[tokio::test]
async fn single_statement_variant_binds_the_tenant() -> Result<(), Box<dyn std::error::Error>> {
    let (mock, executor) = tenant_executor();
    let scope = TenantScope::new(StaticTenant(TenantId::from(2_i64)));

    let rs = executor
        .execute_with_tenant_parameter(
            &scope,
            "select * from get_tenant_data(:tenant_id::integer)",
            &[],
        )
        .await?;
    assert_eq!(names(&rs), vec!["Tenant2".to_string()]);
    assert_eq!(
        mock.calls(),
        vec![RecordedCall::Execute {
            sql: "select * from get_tenant_data(:tenant_id::integer)".into(),
            params: vec![Parameter::new("tenant_id", 2)],
            transaction_id: None,
        }]
    );

    let renamed = scope.clone().with_parameter_name("id")?;
    let rs = executor
        .execute_with_tenant_parameter(
            &renamed,
            "select * from get_tenant_data(:id::integer)",
            &[],
        )
        .await?;
    assert_eq!(rs.results.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_scope_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let (mock, executor) = tenant_executor();
    let scope = TenantScope::new(StaticTenant(TenantId::from(2_i64)));

    let err = executor
        .execute_for_tenant(&scope, "drop table tenant", &[])
        .await
        .unwrap_err();
    assert!(err.is_statement());
    assert!(matches!(mock.calls().last(), Some(RecordedCall::Rollback(_))));
    assert_eq!(mock.open_transactions(), 0);
    Ok(())
}

#[tokio::test]
async fn tenant_errors_stop_before_the_network() -> Result<(), Box<dyn std::error::Error>> {
    let (mock, executor) = tenant_executor();
    let scope = TenantScope::new(ClaimsTenantResolver::new(json!({ "sub": "user-1" })));

    let err = executor
        .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DataApiError::TenantError(_)), "{err}");
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn claims_drive_the_tenant() -> Result<(), Box<dyn std::error::Error>> {
    let (_mock, executor) = tenant_executor();

    let flat = TenantScope::new(ClaimsTenantResolver::new(json!({ "custom:tenantId": "3" })));
    let rs = executor
        .execute_for_tenant(&flat, "select tenant_name from tenant", &[])
        .await?;
    assert_eq!(names(&rs), vec!["Tenant3".to_string()]);

    let tagged = TenantScope::new(ClaimsTenantResolver::new(json!({
        "https://aws.amazon.com/tags": { "principal_tags": { "tenantId": ["1"] } }
    })));
    let rs = executor
        .execute_for_tenant(&tagged, "select tenant_name from tenant", &[])
        .await?;
    assert_eq!(names(&rs), vec!["Tenant1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn custom_setting_names_are_validated() {
    let scope = TenantScope::new(StaticTenant(TenantId::from("acme")));
    assert!(scope.clone().with_setting_name("app.current_tenant").is_ok());
    let err = scope.with_setting_name("tenant.id; drop table tenant").unwrap_err();
    assert!(matches!(err, DataApiError::ConfigError(_)));
}
