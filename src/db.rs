use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::Config;
use crate::error::{MigrateError, Result};

/// Build the process-wide connection pool.
///
/// Called once at startup; the pool is then handed to the store explicitly.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let url = config.database_url()?;

    let options = PgConnectOptions::from_str(url)
        .map_err(|e| MigrateError::config(format!("invalid database url: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections())
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    Ok(pool)
}
