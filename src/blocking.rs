use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::client::DataApiClient;
use crate::error::DataApiError;
use crate::executor::StatementExecutor;
use crate::params::Parameter;
use crate::results::ResultSet;
use crate::tenant::TenantScope;
use crate::transaction::{TransactionHandle, TxOutcome};

/// Synchronous facade: each call blocks the current thread until the remote endpoint answers.
///
/// Owns a current-thread tokio runtime, so it must not be used from inside another runtime.
pub struct BlockingExecutor<C: DataApiClient> {
    runtime: Runtime,
    executor: StatementExecutor<C>,
    timeout: Option<Duration>,
}

impl<C: DataApiClient> BlockingExecutor<C> {
    /// # Errors
    /// Returns `ConfigError` if the runtime cannot be built.
    pub fn new(executor: StatementExecutor<C>) -> Result<Self, DataApiError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DataApiError::ConfigError(format!("failed to build runtime: {e}")))?;
        Ok(Self {
            runtime,
            executor,
            timeout: None,
        })
    }

    /// Bound every call; an expired call fails with `ConnectionError`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn executor(&self) -> &StatementExecutor<C> {
        &self.executor
    }

    fn block<T>(
        &self,
        fut: impl Future<Output = Result<T, DataApiError>>,
    ) -> Result<T, DataApiError> {
        match self.timeout {
            Some(limit) => self.runtime.block_on(async {
                tokio::time::timeout(limit, fut).await.map_err(|_| {
                    DataApiError::ConnectionError(format!(
                        "no response within {}ms",
                        limit.as_millis()
                    ))
                })?
            }),
            None => self.runtime.block_on(fut),
        }
    }

    /// # Errors
    /// See [`StatementExecutor::execute`].
    pub fn execute(
        &self,
        sql: &str,
        parameters: &[Parameter],
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DataApiError> {
        self.block(self.executor.execute(sql, parameters, transaction))
    }

    /// # Errors
    /// See [`StatementExecutor::begin_transaction`].
    pub fn begin_transaction(&self) -> Result<TransactionHandle, DataApiError> {
        self.block(self.executor.begin_transaction())
    }

    /// # Errors
    /// See [`StatementExecutor::commit`].
    pub fn commit(&self, transaction: &TransactionHandle) -> Result<TxOutcome, DataApiError> {
        self.block(self.executor.commit(transaction))
    }

    /// # Errors
    /// See [`StatementExecutor::rollback`].
    pub fn rollback(&self, transaction: &TransactionHandle) -> Result<TxOutcome, DataApiError> {
        self.block(self.executor.rollback(transaction))
    }

    /// # Errors
    /// See [`StatementExecutor::execute_for_tenant`].
    pub fn execute_for_tenant(
        &self,
        scope: &TenantScope,
        sql: &str,
        parameters: &[Parameter],
    ) -> Result<ResultSet, DataApiError> {
        self.block(self.executor.execute_for_tenant(scope, sql, parameters))
    }

    /// # Errors
    /// See [`StatementExecutor::execute_with_tenant_parameter`].
    pub fn execute_with_tenant_parameter(
        &self,
        scope: &TenantScope,
        sql: &str,
        parameters: &[Parameter],
    ) -> Result<ResultSet, DataApiError> {
        self.block(
            self.executor
                .execute_with_tenant_parameter(scope, sql, parameters),
        )
    }
}
