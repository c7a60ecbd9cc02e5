use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;

use crate::{config::Config, AppError, AppResult};

// rooms: unique: id
// messages: ordered by seq within room_id
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        room_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        user_name TEXT NOT NULL,
        text TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, seq)",
];

pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    migrate(&db_pool).await.context("creating schema")?;
    Ok(db_pool)
}

/// Single-connection in-memory database. Every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

pub(crate) fn to_nanos(at: OffsetDateTime) -> AppResult<i64> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| AppError::Internal(anyhow::anyhow!("timestamp {at} out of range")))
}

pub(crate) fn from_nanos(nanos: i64) -> AppResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|err| AppError::Internal(err.into()))
}
