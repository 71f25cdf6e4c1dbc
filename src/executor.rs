use std::future::Future;
use std::sync::Arc;

use crate::client::{BatchRequest, DataApiClient, StatementRequest};
use crate::error::DataApiError;
use crate::params::{Parameter, Params};
use crate::query_builder::StatementBuilder;
use crate::results::ResultSet;
use crate::target::ConnectionTarget;
use crate::tenant::{TenantId, TenantScope};
use crate::transaction::{TransactionHandle, TxOutcome, TxState};
use crate::types::RowValues;

/// Transaction-local assignment of the tenant session setting. Fully parameterized, so neither
/// the setting name nor the tenant id is ever spliced into SQL text.
pub const SET_TENANT_SQL: &str = "SELECT set_config(:setting_name, :setting_value, true)";

/// Sends parameterized SQL to one database through a [`DataApiClient`].
///
/// Every precondition (non-empty SQL, parameter names, transaction state) is checked before the
/// client is called, so a rejected call never reaches the network.
pub struct StatementExecutor<C: DataApiClient> {
    client: Arc<C>,
    target: ConnectionTarget,
}

impl<C: DataApiClient> Clone for StatementExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            target: self.target.clone(),
        }
    }
}

impl<C: DataApiClient> StatementExecutor<C> {
    pub fn new(client: C, target: ConnectionTarget) -> Self {
        Self::from_shared(Arc::new(client), target)
    }

    pub fn from_shared(client: Arc<C>, target: ConnectionTarget) -> Self {
        Self { client, target }
    }

    #[must_use]
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Start a fluent statement.
    ///
    /// ```rust,no_run
    /// # use rds_data_middleware::prelude::*;
    /// # async fn demo<C: DataApiClient>(executor: &StatementExecutor<C>) -> Result<(), DataApiError> {
    /// let rows = executor
    ///     .statement("select get_tenant_data(:id::integer)")
    ///     .param("id", 2)
    ///     .fetch()
    ///     .await?;
    /// # let _ = rows;
    /// # Ok(()) }
    /// ```
    pub fn statement<'e>(&'e self, sql: &'e str) -> StatementBuilder<'e, C> {
        StatementBuilder::new(self, sql)
    }

    /// Execute one statement, optionally inside `transaction`.
    ///
    /// # Errors
    /// - `StatementError` for empty SQL (no remote call) or a server-side rejection
    /// - `ParameterError` for duplicate, malformed, or unmatched parameter names (no remote call)
    /// - `TransactionError` if `transaction` is not active (no remote call)
    /// - `ConnectionError` if the endpoint is unreachable or credentials are refused
    pub async fn execute(
        &self,
        sql: &str,
        parameters: &[Parameter],
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DataApiError> {
        require_sql(sql)?;
        let params = Params::try_from(parameters)?;
        self.execute_params(sql, &params, transaction).await
    }

    /// Same as [`execute`](Self::execute) with an already-validated parameter list.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn execute_params(
        &self,
        sql: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<ResultSet, DataApiError> {
        require_sql(sql)?;
        params.check_against(sql)?;
        if let Some(tx) = transaction {
            tx.ensure_usable(&self.target)?;
        }

        tracing::debug!(
            sql_len = sql.len(),
            params = params.len(),
            transaction_id = transaction.map(TransactionHandle::id),
            "executing statement"
        );

        let request = StatementRequest {
            target: &self.target,
            sql,
            params,
            transaction_id: transaction.map(TransactionHandle::id),
        };
        self.client.execute_statement(&request).await
    }

    /// Run one statement per parameter set; returns the number of sets applied.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute); an empty batch is a `ParameterError`.
    pub async fn execute_batch(
        &self,
        sql: &str,
        parameter_sets: &[Vec<Parameter>],
        transaction: Option<&TransactionHandle>,
    ) -> Result<usize, DataApiError> {
        require_sql(sql)?;
        if parameter_sets.is_empty() {
            return Err(DataApiError::ParameterError(
                "batch needs at least one parameter set".to_string(),
            ));
        }
        let sets = parameter_sets
            .iter()
            .map(|set| {
                let params = Params::try_from(set.as_slice())?;
                params.check_against(sql)?;
                Ok(params)
            })
            .collect::<Result<Vec<_>, DataApiError>>()?;
        if let Some(tx) = transaction {
            tx.ensure_usable(&self.target)?;
        }

        tracing::debug!(
            sql_len = sql.len(),
            sets = sets.len(),
            transaction_id = transaction.map(TransactionHandle::id),
            "executing batch"
        );

        let request = BatchRequest {
            target: &self.target,
            sql,
            parameter_sets: &sets,
            transaction_id: transaction.map(TransactionHandle::id),
        };
        self.client.batch_execute_statement(&request).await
    }

    /// # Errors
    /// Returns `ConnectionError` if the endpoint cannot start a transaction.
    pub async fn begin_transaction(&self) -> Result<TransactionHandle, DataApiError> {
        let id = self.client.begin_transaction(&self.target).await?;
        tracing::info!(transaction_id = %id, "transaction started");
        Ok(TransactionHandle::new(id, &self.target))
    }

    /// Commit an active transaction. The handle is retired even if the remote commit fails.
    ///
    /// # Errors
    /// `TransactionError` if the handle is not active (no remote call), otherwise the
    /// classified remote error.
    pub async fn commit(&self, transaction: &TransactionHandle) -> Result<TxOutcome, DataApiError> {
        transaction.finish(&self.target, TxState::Committed)?;
        let status = self
            .client
            .commit_transaction(&self.target, transaction.id())
            .await?;
        tracing::info!(transaction_id = %transaction.id(), %status, "transaction committed");
        Ok(TxOutcome {
            transaction_id: transaction.id().to_string(),
            state: TxState::Committed,
            status,
        })
    }

    /// Roll back an active transaction. The handle is retired even if the remote call fails.
    ///
    /// # Errors
    /// `TransactionError` if the handle is not active (no remote call), otherwise the
    /// classified remote error.
    pub async fn rollback(
        &self,
        transaction: &TransactionHandle,
    ) -> Result<TxOutcome, DataApiError> {
        transaction.finish(&self.target, TxState::RolledBack)?;
        let status = self
            .client
            .rollback_transaction(&self.target, transaction.id())
            .await?;
        tracing::info!(transaction_id = %transaction.id(), %status, "transaction rolled back");
        Ok(TxOutcome {
            transaction_id: transaction.id().to_string(),
            state: TxState::RolledBack,
            status,
        })
    }

    /// Run `f` inside a fresh transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// A failed rollback is logged and the closure's error is returned.
    ///
    /// # Errors
    /// The closure's error, or the error from begin/commit.
    pub async fn with_transaction<T, F, Fut>(&self, f: F) -> Result<T, DataApiError>
    where
        F: FnOnce(TransactionHandle) -> Fut,
        Fut: Future<Output = Result<T, DataApiError>>,
    {
        let tx = self.begin_transaction().await?;
        match f(tx.clone()).await {
            Ok(value) => {
                self.commit(&tx).await?;
                Ok(value)
            }
            Err(err) => {
                if tx.is_active()
                    && let Err(rollback_err) = self.rollback(&tx).await
                {
                    tracing::warn!(
                        transaction_id = %tx.id(),
                        error = %rollback_err,
                        "rollback after failed unit of work also failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Tenant-scoped statement using one transaction for both the session setting and `sql`.
    ///
    /// This is the reliable pattern: the setting is transaction-local, and the statement that
    /// the row-level-security policy filters runs in that same transaction.
    ///
    /// # Errors
    /// Validation errors before any remote call; `TenantError` from the resolver; otherwise
    /// the first failing remote call (the transaction is rolled back).
    pub async fn execute_for_tenant(
        &self,
        scope: &TenantScope,
        sql: &str,
        parameters: &[Parameter],
    ) -> Result<ResultSet, DataApiError> {
        require_sql(sql)?;
        let params = Params::try_from(parameters)?;
        params.check_against(sql)?;
        let tenant = scope.resolve()?;

        self.with_transaction(|tx| async move {
            self.apply_tenant(scope, &tenant, &tx).await?;
            self.execute_params(sql, &params, Some(&tx)).await
        })
        .await
    }

    /// Set the scope's session setting to `tenant` inside `transaction`.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn apply_tenant(
        &self,
        scope: &TenantScope,
        tenant: &TenantId,
        transaction: &TransactionHandle,
    ) -> Result<(), DataApiError> {
        let params = Params::new(vec![
            Parameter::new("setting_name", scope.setting_name()),
            Parameter::new("setting_value", tenant.as_str()),
        ])?;
        self.execute_params(SET_TENANT_SQL, &params, Some(transaction))
            .await?;
        Ok(())
    }

    /// Tenant-scoped single statement: binds the tenant as `:<scope.parameter_name()>` and runs
    /// `sql` without a transaction, e.g. `select get_tenant_data(:tenant_id::integer)`.
    ///
    /// Caveat: any session setting made by `sql` (typically inside a server-side function) only
    /// holds for that one call. Whether a separate later call would see it depends on how the
    /// service assigns sessions, so nothing here relies on it. Prefer
    /// [`execute_for_tenant`](Self::execute_for_tenant) when more than one statement needs the
    /// tenant.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute); `TenantError` from the resolver.
    pub async fn execute_with_tenant_parameter(
        &self,
        scope: &TenantScope,
        sql: &str,
        parameters: &[Parameter],
    ) -> Result<ResultSet, DataApiError> {
        require_sql(sql)?;
        let tenant = scope.resolve()?;
        let mut all = parameters.to_vec();
        all.push(Parameter::new(scope.parameter_name(), tenant_value(&tenant)));
        let params = Params::new(all)?;

        tracing::debug!(
            parameter = scope.parameter_name(),
            "tenant bound as a parameter; session settings made by this statement do not outlive it"
        );
        self.execute_params(sql, &params, None).await
    }
}

/// Numeric tenant ids travel as integers so `::integer` casts and integer columns line up.
fn tenant_value(tenant: &TenantId) -> RowValues {
    tenant
        .as_str()
        .parse::<i64>()
        .map_or_else(|_| RowValues::Text(tenant.to_string()), RowValues::Int)
}

fn require_sql(sql: &str) -> Result<(), DataApiError> {
    if sql.trim().is_empty() {
        return Err(DataApiError::StatementError(
            "SQL text must not be empty".to_string(),
        ));
    }
    Ok(())
}
