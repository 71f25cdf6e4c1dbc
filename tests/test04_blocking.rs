use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rds_data_middleware::prelude::*;
use rds_data_middleware::test_utils::{MockDataApi, tenant_table_responder, test_target};

/// Never answers within a reasonable time.
struct StalledDataApi;

#[async_trait]
impl DataApiClient for StalledDataApi {
    async fn execute_statement(
        &self,
        _request: &StatementRequest<'_>,
    ) -> Result<ResultSet, DataApiError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ResultSet::default())
    }

    async fn batch_execute_statement(
        &self,
        _request: &BatchRequest<'_>,
    ) -> Result<usize, DataApiError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(0)
    }

    async fn begin_transaction(&self, _target: &ConnectionTarget) -> Result<String, DataApiError> {
        Ok("stalled-tx".to_string())
    }

    async fn commit_transaction(
        &self,
        _target: &ConnectionTarget,
        _transaction_id: &str,
    ) -> Result<String, DataApiError> {
        Ok("Transaction Committed".to_string())
    }

    async fn rollback_transaction(
        &self,
        _target: &ConnectionTarget,
        _transaction_id: &str,
    ) -> Result<String, DataApiError> {
        Ok("Rollback Complete".to_string())
    }
}

#[test]
fn blocking_calls_run_the_tenant_flow() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::with_responder(tenant_table_responder));
    let blocking =
        BlockingExecutor::new(StatementExecutor::from_shared(mock.clone(), test_target()))?;

    let tx = blocking.begin_transaction()?;
    blocking.execute("set tenant.id = 2", &[], Some(&tx))?;
    let rs = blocking.execute("select tenant_name from tenant", &[], Some(&tx))?;
    let outcome = blocking.commit(&tx)?;

    assert_eq!(
        rs.results[0].get("tenant_name").and_then(RowValues::as_text),
        Some("Tenant2")
    );
    assert_eq!(outcome.state, TxState::Committed);
    assert!(blocking.rollback(&tx).unwrap_err().is_transaction());

    let scope = TenantScope::new(StaticTenant(TenantId::from(3_i64)));
    let rs = blocking.execute_for_tenant(&scope, "select tenant_name from tenant", &[])?;
    assert_eq!(
        rs.results[0].get("tenant_name").and_then(RowValues::as_text),
        Some("Tenant3")
    );
    let rs = blocking.execute_with_tenant_parameter(
        &scope,
        "select * from get_tenant_data(:tenant_id::integer)",
        &[],
    )?;
    assert_eq!(rs.results.len(), 1);
    assert_eq!(mock.open_transactions(), 0);
    Ok(())
}

#[test]
fn unanswered_calls_time_out_as_connection_errors() -> Result<(), Box<dyn std::error::Error>> {
    let blocking = BlockingExecutor::new(StatementExecutor::new(StalledDataApi, test_target()))?
        .with_timeout(Duration::from_millis(50));

    let err = blocking.execute("select 1", &[], None).unwrap_err();
    assert!(err.is_connection(), "{err}");
    assert!(err.is_retryable());
    Ok(())
}

#[test]
fn validation_errors_surface_synchronously() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::new());
    let blocking =
        BlockingExecutor::new(StatementExecutor::from_shared(mock.clone(), test_target()))?;

    assert!(blocking.execute("", &[], None).unwrap_err().is_statement());
    assert_eq!(mock.call_count(), 0);
    Ok(())
}
