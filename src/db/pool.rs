use crate::{
    config::{DatabaseConfig, InstrumentationConfig},
    errors::Result,
};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, PgPool,
};
use std::time::Duration;

/// Create a PostgreSQL connection pool.
///
/// At least one connection is established before this returns, so an
/// unreachable database surfaces here rather than on the first request.
pub async fn create_pool(
    config: &DatabaseConfig,
    instrumentation: &InstrumentationConfig,
) -> Result<PgPool> {
    tracing::info!("Creating database connection pool");

    let mut options: PgConnectOptions = config.url.parse()?;
    options = if instrumentation.database {
        options.log_statements(log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    tracing::info!(
        "Database connection pool created with {} max connections",
        config.max_connections
    );

    Ok(pool)
}

/// One trivial round-trip against the database, used by the health probe
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
