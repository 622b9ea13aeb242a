pub mod models;
pub mod predictions;
pub mod results;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

pub use predictions::PredictionStore;
pub use results::ResultStore;

/// Open the store and bring the schema up to date.
/// Any failure here is fatal for the run.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    // An in-memory database exists per connection, so it must not be pooled wider.
    let max_connections = if url.contains(":memory:") { 1 } else { 4 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {url}");
    Ok(pool)
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    connect("sqlite::memory:").await.expect("in-memory database")
}
