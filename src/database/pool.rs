use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect the single application pool from DATABASE_URL and run pending
/// migrations.
pub async fn connect() -> Result<PgPool, PoolError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| PoolError::ConfigMissing("DATABASE_URL"))?;

    let db_config = &config::config().database;
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(Duration::from_secs(db_config.connect_timeout_secs))
        .connect(&database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    info!("Connected database pool ({} max connections)", db_config.max_connections);
    Ok(pool)
}
