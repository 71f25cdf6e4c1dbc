use deadpool_postgres::{Config as PgConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::error::DataApiError;

/// Options for the local Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: PgConfig,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Validate the configuration and create the connection pool.
    ///
    /// Connections are always recycled with [`RecyclingMethod::Clean`], so session settings such
    /// as `tenant.id` never carry over from one borrower to the next.
    ///
    /// # Errors
    /// Returns `DataApiError::ConfigError` if required config fields are missing or
    /// `DataApiError::ConnectionError` if pool creation fails.
    pub fn build_pool(&self) -> Result<Pool, DataApiError> {
        let cfg = &self.config;
        if cfg.dbname.is_none() {
            return Err(DataApiError::ConfigError("dbname is required".to_string()));
        }
        if cfg.host.is_none() {
            return Err(DataApiError::ConfigError("host is required".to_string()));
        }
        if cfg.port.is_none() {
            return Err(DataApiError::ConfigError("port is required".to_string()));
        }
        if cfg.user.is_none() {
            return Err(DataApiError::ConfigError("user is required".to_string()));
        }

        clean_recycling(cfg).create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            DataApiError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
        })
    }
}

/// Copy of `config` whose pool resets every session (`RESET ALL`, `DISCARD TEMP`, ...) before
/// handing a connection out again.
fn clean_recycling(config: &PgConfig) -> PgConfig {
    let mut config = config.clone();
    let mut manager = config.manager.take().unwrap_or_default();
    manager.recycling_method = RecyclingMethod::Clean;
    config.manager = Some(manager);
    config
}

impl From<PgConfig> for PostgresOptions {
    fn from(config: PgConfig) -> Self {
        Self::new(config)
    }
}
