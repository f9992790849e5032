//! `SQLite` connection and schema bootstrap for the key-value store.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::debug;

use crate::Result;

use super::schema;

/// Connect to `database_url` and apply the schema.
///
/// In-memory URLs are limited to one connection, since every `SQLite`
/// memory connection is a separate database.
///
/// # Errors
///
/// Returns `AppError::Kv` if the connection or schema bootstrap fails.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        5
    };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    schema::bootstrap_schema(&pool).await?;
    debug!(max_connections, "kv database ready");
    Ok(pool)
}
