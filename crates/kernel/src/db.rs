//! Database connection pool management.

use anyhow::{Context, Result, bail};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::Config;

/// Tables the compiled filters and the gather service read from.
pub const REQUIRED_TABLES: [&str; 4] = ["category", "tag", "entry", "entry_tag"];

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to PostgreSQL")?;

    info!(
        max_connections = config.database_max_connections,
        "connected to PostgreSQL"
    );
    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Fail unless every table in [`REQUIRED_TABLES`] is visible on the
/// connection's search path.
pub async fn check_schema(pool: &PgPool) -> Result<()> {
    let tables: Vec<String> = REQUIRED_TABLES.iter().map(ToString::to_string).collect();
    let missing: Vec<String> = sqlx::query_scalar(
        "SELECT t FROM unnest($1::text[]) AS t WHERE to_regclass(t) IS NULL ORDER BY t",
    )
    .bind(&tables)
    .fetch_all(pool)
    .await
    .context("failed to inspect schema")?;

    if !missing.is_empty() {
        bail!("missing tables: {}", missing.join(", "));
    }
    Ok(())
}
