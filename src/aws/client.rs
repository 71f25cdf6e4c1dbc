use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_rdsdata::Client;

use super::error::classify_sdk_error;
use super::params::convert_params;
use super::query::build_result_set;
use crate::client::{BatchRequest, DataApiClient, StatementRequest};
use crate::error::DataApiError;
use crate::results::ResultSet;
use crate::target::ConnectionTarget;

/// [`DataApiClient`] over the RDS Data API.
///
/// # Example
/// ```no_run
/// use rds_data_middleware::aws::AwsDataApiClient;
/// use rds_data_middleware::prelude::*;
///
/// # async fn example() -> Result<(), DataApiError> {
/// let client = AwsDataApiClient::from_env().await;
/// let executor = StatementExecutor::new(client, ConnectionTarget::from_env()?);
/// let scope = TenantScope::new(|| TenantId::from(2_i64));
/// let rows = executor
///     .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
///     .await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AwsDataApiClient {
    client: Client,
}

impl AwsDataApiClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential and region chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    /// Build a client for an explicit region, keeping the default credential chain.
    pub async fn from_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }

    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DataApiClient for AwsDataApiClient {
    async fn execute_statement(
        &self,
        request: &StatementRequest<'_>,
    ) -> Result<ResultSet, DataApiError> {
        let output = self
            .client
            .execute_statement()
            .resource_arn(request.target.resource_arn())
            .secret_arn(request.target.secret_arn())
            .database(request.target.database())
            .sql(request.sql)
            .set_parameters(Some(convert_params(request.params)))
            .set_transaction_id(request.transaction_id.map(str::to_string))
            .include_result_metadata(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error("ExecuteStatement", e))?;

        build_result_set(&output)
    }

    async fn batch_execute_statement(
        &self,
        request: &BatchRequest<'_>,
    ) -> Result<usize, DataApiError> {
        let parameter_sets = request.parameter_sets.iter().map(convert_params).collect();
        let output = self
            .client
            .batch_execute_statement()
            .resource_arn(request.target.resource_arn())
            .secret_arn(request.target.secret_arn())
            .database(request.target.database())
            .sql(request.sql)
            .set_parameter_sets(Some(parameter_sets))
            .set_transaction_id(request.transaction_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify_sdk_error("BatchExecuteStatement", e))?;

        Ok(output.update_results().len())
    }

    async fn begin_transaction(&self, target: &ConnectionTarget) -> Result<String, DataApiError> {
        let output = self
            .client
            .begin_transaction()
            .resource_arn(target.resource_arn())
            .secret_arn(target.secret_arn())
            .database(target.database())
            .send()
            .await
            .map_err(|e| classify_sdk_error("BeginTransaction", e))?;

        output
            .transaction_id()
            .map(str::to_string)
            .ok_or_else(|| {
                DataApiError::ExecutionError(
                    "BeginTransaction returned no transaction id".to_string(),
                )
            })
    }

    async fn commit_transaction(
        &self,
        target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        let output = self
            .client
            .commit_transaction()
            .resource_arn(target.resource_arn())
            .secret_arn(target.secret_arn())
            .transaction_id(transaction_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error("CommitTransaction", e))?;

        Ok(output
            .transaction_status()
            .unwrap_or("Transaction Committed")
            .to_string())
    }

    async fn rollback_transaction(
        &self,
        target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        let output = self
            .client
            .rollback_transaction()
            .resource_arn(target.resource_arn())
            .secret_arn(target.secret_arn())
            .transaction_id(transaction_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error("RollbackTransaction", e))?;

        Ok(output
            .transaction_status()
            .unwrap_or("Rollback Complete")
            .to_string())
    }
}
