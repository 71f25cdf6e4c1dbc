//! Test tooling: a recording in-memory [`DataApiClient`](crate::DataApiClient) and fixtures for
//! the tenant table used by the row-level-security examples.

pub mod mock;
pub mod test_helpers;

#[cfg(feature = "test-utils-postgres")]
pub mod postgres;

pub use mock::{MockDataApi, MockStatement, RecordedCall};
pub use test_helpers::*;
