//! Tenant-scoped SQL over the RDS Data API.
//!
//! A [`StatementExecutor`] binds a [`DataApiClient`] to one [`ConnectionTarget`] and runs
//! parameterized statements, explicit transactions, and tenant-scoped reads whose isolation is
//! enforced by Postgres row-level security. The AWS SDK client lives behind the `aws` feature; a
//! local Postgres stand-in lives behind `postgres`.
//!
//! ```rust,no_run
//! use rds_data_middleware::prelude::*;
//! # async fn run<C: DataApiClient>(executor: StatementExecutor<C>) -> Result<(), DataApiError> {
//! let scope = TenantScope::new(StaticTenant(TenantId::from(2_i64)));
//! let rows = executor
//!     .execute_for_tenant(&scope, "select tenant_name from tenant", &[])
//!     .await?;
//! for row in &rows.results {
//!     println!("{:?}", row.get("tenant_name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod client;
pub mod error;
pub mod executor;
pub mod params;
pub mod prelude;
pub mod query_builder;
pub mod results;
pub mod target;
pub mod tenant;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use blocking::BlockingExecutor;
pub use client::{BatchRequest, DataApiClient, StatementRequest};
pub use error::DataApiError;
pub use executor::{SET_TENANT_SQL, StatementExecutor};
pub use params::{Parameter, Params};
pub use query_builder::StatementBuilder;
pub use results::{CustomDbRow, ResultSet};
pub use target::ConnectionTarget;
pub use tenant::{ClaimsTenantResolver, StaticTenant, TenantContextResolver, TenantId, TenantScope};
pub use transaction::{TransactionHandle, TxOutcome, TxState};
pub use types::RowValues;

#[cfg(feature = "aws")]
pub use aws::AwsDataApiClient;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresDataApi, PostgresOptions};
