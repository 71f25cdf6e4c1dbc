use async_trait::async_trait;

use crate::error::DataApiError;
use crate::params::Params;
use crate::results::ResultSet;
use crate::target::ConnectionTarget;

/// One statement as sent to the data-plane API.
#[derive(Debug, Clone, Copy)]
pub struct StatementRequest<'a> {
    pub target: &'a ConnectionTarget,
    pub sql: &'a str,
    pub params: &'a Params,
    pub transaction_id: Option<&'a str>,
}

/// One statement applied to several parameter sets.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub target: &'a ConnectionTarget,
    pub sql: &'a str,
    pub parameter_sets: &'a [Params],
    pub transaction_id: Option<&'a str>,
}

/// The remote SQL execution service.
///
/// Implementations only translate and forward; validation of SQL text, parameters, and
/// transaction state happens in [`StatementExecutor`](crate::executor::StatementExecutor)
/// before any of these methods is called.
#[async_trait]
pub trait DataApiClient: Send + Sync {
    /// Execute one statement, optionally inside a transaction.
    async fn execute_statement(
        &self,
        request: &StatementRequest<'_>,
    ) -> Result<ResultSet, DataApiError>;

    /// Execute one statement once per parameter set; returns the number of sets applied.
    async fn batch_execute_statement(
        &self,
        request: &BatchRequest<'_>,
    ) -> Result<usize, DataApiError>;

    /// Start a transaction and return its server-side id.
    async fn begin_transaction(&self, target: &ConnectionTarget) -> Result<String, DataApiError>;

    /// Commit a transaction; returns the status reported by the service.
    async fn commit_transaction(
        &self,
        target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError>;

    /// Roll back a transaction; returns the status reported by the service.
    async fn rollback_transaction(
        &self,
        target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError>;
}
