use crate::client::DataApiClient;
use crate::error::DataApiError;
use crate::executor::StatementExecutor;
use crate::params::Parameter;
use crate::results::ResultSet;
use crate::transaction::TransactionHandle;
use crate::types::RowValues;

/// Fluent builder for one statement on a [`StatementExecutor`].
pub struct StatementBuilder<'e, C: DataApiClient> {
    executor: &'e StatementExecutor<C>,
    sql: &'e str,
    params: Vec<Parameter>,
    transaction: Option<&'e TransactionHandle>,
}

impl<'e, C: DataApiClient> StatementBuilder<'e, C> {
    pub(crate) fn new(executor: &'e StatementExecutor<C>, sql: &'e str) -> Self {
        Self {
            executor,
            sql,
            params: Vec::new(),
            transaction: None,
        }
    }

    /// Bind one named parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.params.push(Parameter::new(name, value));
        self
    }

    /// Bind several parameters at once.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.params.extend(params);
        self
    }

    /// Run inside an existing transaction.
    #[must_use]
    pub fn transaction(mut self, transaction: &'e TransactionHandle) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Execute and return the full result set.
    ///
    /// # Errors
    /// See [`StatementExecutor::execute`].
    pub async fn fetch(self) -> Result<ResultSet, DataApiError> {
        self.executor
            .execute(self.sql, &self.params, self.transaction)
            .await
    }

    /// Execute and return only the affected-row count.
    ///
    /// # Errors
    /// See [`StatementExecutor::execute`].
    pub async fn execute(self) -> Result<usize, DataApiError> {
        Ok(self.fetch().await?.rows_affected)
    }
}
