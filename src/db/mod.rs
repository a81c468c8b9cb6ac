pub mod repository;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open (creating if needed) the database at `url` and bring its schema up
/// to date.
pub async fn connect(url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AppError::Database(e.into()))?;

    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Failed to parse test db url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test db");

    MIGRATOR.run(&pool).await.expect("Failed to run migrations");

    pool
}
