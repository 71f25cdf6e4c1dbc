//! Embedded Postgres provisioned with the `tenant` row-level-security fixture.

use std::sync::LazyLock;

use deadpool_postgres::{Config as PgConfig, PoolConfig};
use postgresql_embedded::PostgreSQL;

use super::test_helpers::TENANT_SCHEMA_SQL;
use crate::postgres::{PostgresDataApi, PostgresOptions};

/// Login role the policy applies to; the bootstrap superuser bypasses row-level security.
pub const APP_USER: &str = "app_user";
const APP_PASSWORD: &str = "app_user_pw";

/// Serializes binary installation and cluster start-up across tests in one process.
static STARTUP: LazyLock<tokio::sync::Mutex<()>> = LazyLock::new(|| tokio::sync::Mutex::new(()));

/// A running embedded Postgres instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    /// Superuser configuration.
    pub admin_config: PgConfig,
    /// Configuration for [`APP_USER`].
    pub app_config: PgConfig,
}

impl EmbeddedPostgres {
    /// Data API stand-in connected as [`APP_USER`], so the tenant policy applies.
    ///
    /// # Errors
    /// Propagates pool construction failures.
    pub fn app_client(&self) -> Result<PostgresDataApi, crate::DataApiError> {
        PostgresDataApi::from_options(&PostgresOptions::new(self.app_config.clone()))
    }

    /// Like [`app_client`](Self::app_client) with at most `max_size` pooled connections, so
    /// consecutive calls reuse the same sessions.
    ///
    /// # Errors
    /// Propagates pool construction failures.
    pub fn app_client_with_max_size(
        &self,
        max_size: usize,
    ) -> Result<PostgresDataApi, crate::DataApiError> {
        let mut config = self.app_config.clone();
        config.pool = Some(PoolConfig::new(max_size));
        PostgresDataApi::from_options(&PostgresOptions::new(config))
    }

    /// Data API stand-in connected as the superuser.
    ///
    /// # Errors
    /// Propagates pool construction failures.
    pub fn admin_client(&self) -> Result<PostgresDataApi, crate::DataApiError> {
        PostgresDataApi::from_options(&PostgresOptions::new(self.admin_config.clone()))
    }

    pub async fn stop(self) {
        let _ = self.postgresql.stop().await;
    }
}

/// Start embedded Postgres, create `db_name`, load the tenant fixture, and create [`APP_USER`].
///
/// # Errors
/// Returns an error if the server cannot be set up or started, or if provisioning fails.
pub async fn setup_tenant_postgres(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let startup = STARTUP.lock().await;
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;
    drop(startup);
    postgresql.create_database(db_name).await?;

    let settings = postgresql.settings();
    let port = settings.port;

    let mut admin_config = PgConfig::new();
    admin_config.host = Some(settings.host.clone());
    admin_config.port = Some(port);
    admin_config.user = Some(settings.username.clone());
    admin_config.password = Some(settings.password.clone());
    admin_config.dbname = Some(db_name.to_string());

    let pool = PostgresOptions::new(admin_config.clone()).build_pool()?;
    let conn = pool.get().await?;
    conn.batch_execute(TENANT_SCHEMA_SQL).await?;
    conn.batch_execute(&format!(
        "CREATE ROLE {APP_USER} LOGIN PASSWORD '{APP_PASSWORD}';
         GRANT USAGE ON SCHEMA public TO {APP_USER};
         GRANT SELECT ON tenant TO {APP_USER};"
    ))
    .await?;
    drop(conn);
    pool.close();

    let mut app_config = admin_config.clone();
    app_config.user = Some(APP_USER.to_string());
    app_config.password = Some(APP_PASSWORD.to_string());

    tracing::info!(port, db_name, "embedded postgres ready");

    Ok(EmbeddedPostgres {
        postgresql,
        port,
        admin_config,
        app_config,
    })
}
