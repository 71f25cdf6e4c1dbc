//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types
//! to make it easier to get started with the library.

pub use crate::blocking::BlockingExecutor;
pub use crate::client::{BatchRequest, DataApiClient, StatementRequest};
pub use crate::error::DataApiError;
pub use crate::executor::StatementExecutor;
pub use crate::params::{Parameter, Params};
pub use crate::query_builder::StatementBuilder;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::target::ConnectionTarget;
pub use crate::tenant::{
    ClaimsTenantResolver, StaticTenant, TenantContextResolver, TenantId, TenantScope,
};
pub use crate::transaction::{TransactionHandle, TxOutcome, TxState};
pub use crate::types::RowValues;

#[cfg(feature = "aws")]
pub use crate::aws::AwsDataApiClient;

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresDataApi, PostgresOptions};
