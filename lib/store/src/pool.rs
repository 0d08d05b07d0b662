//! Connection pool and schema provisioning.

use crate::error::StoreError;
use rootcause::Report;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Opens a connection pool.
///
/// # Errors
///
/// Returns `ConnectionFailed` if the database cannot be reached.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, Report<StoreError>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::ConnectionFailed {
            reason: e.to_string(),
        })?;
    info!(max_connections = config.max_connections, "connected to database");
    Ok(pool)
}

/// Creates or upgrades the store schema.
///
/// # Errors
///
/// Returns `MigrationFailed` if a migration cannot be applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), Report<StoreError>> {
    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::MigrationFailed {
            reason: e.to_string(),
        })?;
    Ok(())
}
