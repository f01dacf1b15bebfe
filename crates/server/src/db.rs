use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

/// Connect to the job database and apply migrations.
///
/// The job store is required: without it no job can be recovered or
/// reloaded, so every failure here is returned to the caller.
pub async fn init_pg_pool(config: &vigil_core::config::PostgresConfig) -> anyhow::Result<PgPool> {
    if !config.is_configured() {
        warn!("PG_USERNAME not set: connecting as the default postgres user");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await
        .with_context(|| format!("failed to connect to PostgreSQL at {}:{}", config.host, config.port))?;
    info!(host = %config.host, database = %config.database, "PostgreSQL connected");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    info!("Database migrations applied successfully");

    Ok(pool)
}
