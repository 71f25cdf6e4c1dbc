//! Data-plane client backed by the AWS SDK (`aws-sdk-rdsdata`).

mod client;
mod error;
mod params;
mod query;

pub use client::AwsDataApiClient;
pub use error::classify_error_code;
pub use params::{convert_params, to_field};
pub use query::{build_result_set, extract_value};
