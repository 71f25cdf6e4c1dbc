use serde::{Deserialize, Serialize};

use crate::error::DataApiError;

pub const RESOURCE_ARN_ENV: &str = "RDS_DATA_RESOURCE_ARN";
pub const SECRET_ARN_ENV: &str = "RDS_DATA_SECRET_ARN";
pub const DATABASE_ENV: &str = "RDS_DATA_DATABASE";

/// Identifies the remote database: cluster ARN, credential secret ARN, and database name.
///
/// Immutable once built; every constructor validates the fields.
/// ```rust
/// use rds_data_middleware::prelude::*;
///
/// let target = ConnectionTarget::new(
///     "arn:aws:rds:us-east-1:123456789012:cluster:tenants",
///     "arn:aws:secretsmanager:us-east-1:123456789012:secret:tenants-app",
///     "postgres",
/// )?;
/// assert_eq!(target.database(), "postgres");
/// # Ok::<(), DataApiError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTarget")]
pub struct ConnectionTarget {
    resource_arn: String,
    secret_arn: String,
    database: String,
}

#[derive(Deserialize)]
struct RawTarget {
    resource_arn: String,
    secret_arn: String,
    database: String,
}

impl TryFrom<RawTarget> for ConnectionTarget {
    type Error = DataApiError;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        ConnectionTarget::new(raw.resource_arn, raw.secret_arn, raw.database)
    }
}

impl ConnectionTarget {
    /// # Errors
    /// Returns `DataApiError::ConfigError` if a field is empty or an ARN is malformed.
    pub fn new(
        resource_arn: impl Into<String>,
        secret_arn: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, DataApiError> {
        let target = Self {
            resource_arn: resource_arn.into(),
            secret_arn: secret_arn.into(),
            database: database.into(),
        };

        require_arn("resource_arn", &target.resource_arn)?;
        require_arn("secret_arn", &target.secret_arn)?;
        if target.database.trim().is_empty() {
            return Err(DataApiError::ConfigError(
                "database is required".to_string(),
            ));
        }

        Ok(target)
    }

    /// Read the target from `RDS_DATA_RESOURCE_ARN`, `RDS_DATA_SECRET_ARN`, and
    /// `RDS_DATA_DATABASE`.
    ///
    /// # Errors
    /// Returns `DataApiError::ConfigError` if a variable is unset or fails validation.
    pub fn from_env() -> Result<Self, DataApiError> {
        Self::new(
            env_var(RESOURCE_ARN_ENV)?,
            env_var(SECRET_ARN_ENV)?,
            env_var(DATABASE_ENV)?,
        )
    }

    #[must_use]
    pub fn resource_arn(&self) -> &str {
        &self.resource_arn
    }

    #[must_use]
    pub fn secret_arn(&self) -> &str {
        &self.secret_arn
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

fn require_arn(field: &str, value: &str) -> Result<(), DataApiError> {
    if value.trim().is_empty() {
        return Err(DataApiError::ConfigError(format!("{field} is required")));
    }
    if !value.starts_with("arn:") {
        return Err(DataApiError::ConfigError(format!(
            "{field} must be an ARN, got `{value}`"
        )));
    }
    Ok(())
}

fn env_var(name: &str) -> Result<String, DataApiError> {
    std::env::var(name)
        .map_err(|e| DataApiError::ConfigError(format!("{name} is not usable: {e}")))
}
