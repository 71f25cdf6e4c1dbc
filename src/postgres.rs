//! Local stand-in for the data-plane API on a plain Postgres server.
//!
//! Useful for development and for integration tests of row-level-security policies without an
//! Aurora cluster. The resource and secret ARNs of a [`ConnectionTarget`](crate::ConnectionTarget)
//! are ignored here; the pool decides which database is used.

mod client;
mod config;
mod params;
mod query;

pub use client::PostgresDataApi;
pub use config::PostgresOptions;
pub use params::bind_named;
pub use query::{build_result_set, postgres_extract_value};
