use std::sync::Arc;

use rds_data_middleware::prelude::*;
use rds_data_middleware::test_utils::{MockDataApi, RecordedCall, test_target};

fn executor_with(mock: &Arc<MockDataApi>) -> StatementExecutor<MockDataApi> {
    StatementExecutor::from_shared(mock.clone(), test_target())
}

#[tokio::test]
async fn commit_retires_the_handle() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::new());
    let executor = executor_with(&mock);

    let tx = executor.begin_transaction().await?;
    assert_eq!(tx.state(), TxState::Active);
    executor.execute("select 1", &[], Some(&tx)).await?;

    let outcome = executor.commit(&tx).await?;
    assert_eq!(outcome.state, TxState::Committed);
    assert_eq!(outcome.transaction_id, tx.id());
    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(mock.open_transactions(), 0);

    let calls_before = mock.call_count();
    let again = executor.commit(&tx).await.unwrap_err();
    assert!(again.is_transaction(), "{again}");
    let rollback = executor.rollback(&tx).await.unwrap_err();
    assert!(rollback.is_transaction(), "{rollback}");
    let exec = executor.execute("select 1", &[], Some(&tx)).await.unwrap_err();
    assert!(exec.is_transaction(), "{exec}");
    assert_eq!(mock.call_count(), calls_before);
    Ok(())
}

#[tokio::test]
async fn rollback_is_terminal_too() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::new());
    let executor = executor_with(&mock);

    let tx = executor.begin_transaction().await?;
    let outcome = executor.rollback(&tx).await?;
    assert_eq!(outcome.state, TxState::RolledBack);
    assert!(!tx.is_active());

    assert!(executor.commit(&tx).await.unwrap_err().is_transaction());
    assert!(executor.rollback(&tx).await.unwrap_err().is_transaction());
    Ok(())
}

#[tokio::test]
async fn clones_share_one_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::new());
    let executor = executor_with(&mock);

    let tx = executor.begin_transaction().await?;
    let copy = tx.clone();
    executor.commit(&copy).await?;
    assert_eq!(tx.state(), TxState::Committed);
    assert!(executor.commit(&tx).await.unwrap_err().is_transaction());
    Ok(())
}

#[tokio::test]
async fn failed_remote_commit_still_retires_the_handle() -> Result<(), Box<dyn std::error::Error>>
{
    let mock = Arc::new(MockDataApi::new());
    let executor = executor_with(&mock);

    let tx = executor.begin_transaction().await?;
    mock.queue_error(DataApiError::ConnectionError("connection reset".into()));
    let err = executor.commit(&tx).await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(tx.state(), TxState::Committed);
    assert!(executor.rollback(&tx).await.unwrap_err().is_transaction());
    Ok(())
}

#[tokio::test]
async fn handles_are_bound_to_their_target() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::new());
    let executor = executor_with(&mock);
    let other = StatementExecutor::from_shared(
        mock.clone(),
        ConnectionTarget::new(
            "arn:aws:rds:us-east-1:123456789012:cluster:other-cluster",
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:other",
            "postgres",
        )?,
    );

    let tx = executor.begin_transaction().await?;
    let err = other.execute("select 1", &[], Some(&tx)).await.unwrap_err();
    assert!(err.is_transaction(), "{err}");
    assert!(tx.is_active());
    executor.rollback(&tx).await?;
    Ok(())
}

#[tokio::test]
async fn with_transaction_commits_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::with_responder(|_| Ok(ResultSet::from_rows_affected(1))));
    let executor = executor_with(&mock);

    let affected = executor
        .with_transaction(|tx| {
            let executor = executor.clone();
            async move {
                let rs = executor
                    .execute(
                        "update tenant set account_balance = :balance where tenant_id = :id",
                        &[Parameter::new("balance", 1000), Parameter::new("id", 2)],
                        Some(&tx),
                    )
                    .await?;
                Ok(rs.rows_affected)
            }
        })
        .await?;
    assert_eq!(affected, 1);

    let calls = mock.calls();
    assert_eq!(calls.first(), Some(&RecordedCall::Begin));
    assert!(matches!(calls.last(), Some(RecordedCall::Commit(_))));
    assert_eq!(mock.open_transactions(), 0);
    Ok(())
}

#[tokio::test]
async fn with_transaction_rolls_back_on_error() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockDataApi::with_responder(|_| {
        Err(DataApiError::StatementError(
            "23505: duplicate key value violates unique constraint".into(),
        ))
    }));
    let executor = executor_with(&mock);

    let err = executor
        .with_transaction(|tx| {
            let executor = executor.clone();
            async move {
                executor
                    .execute(
                        "insert into tenant (tenant_id) values (:id)",
                        &[Parameter::new("id", 1)],
                        Some(&tx),
                    )
                    .await
            }
        })
        .await
        .unwrap_err();
    assert!(err.is_statement());

    let calls = mock.calls();
    assert!(matches!(calls.last(), Some(RecordedCall::Rollback(_))));
    assert!(!calls.iter().any(|c| matches!(c, RecordedCall::Commit(_))));
    assert_eq!(mock.open_transactions(), 0);
    Ok(())
}
