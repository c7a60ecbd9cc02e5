use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{db, AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Room id for a display name: lowercased, each whitespace run collapsed to one hyphen.
///
/// `"System Design"` becomes `"system-design"`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Room metadata, persisted in the `rooms` table.
#[derive(Clone)]
pub struct RoomRegistry {
    db_pool: SqlitePool,
}

impl RoomRegistry {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn create(&self, name: &str) -> AppResult<Room> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("room name must not be empty"));
        }

        let room = Room {
            id: slugify(name),
            name: name.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };

        let inserted = sqlx::query("INSERT INTO rooms (id,name,created_at) values (?,?,?)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(db::to_nanos(room.created_at)?)
            .execute(&self.db_pool)
            .await;

        match inserted {
            Ok(_) => {
                tracing::info!(room_id = %room.id, name = %room.name, "room created");
                Ok(room)
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(AppError::conflict(format!("room {} already exists", room.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Every room, newest first.
    pub async fn list(&self) -> AppResult<Vec<Room>> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT id,name,created_at FROM rooms ORDER BY created_at DESC, seq DESC")
                .fetch_all(&self.db_pool)
                .await?;

        rows.into_iter()
            .map(|(id, name, created_at)| {
                Ok(Room {
                    id,
                    name,
                    created_at: db::from_nanos(created_at)?,
                })
            })
            .collect()
    }
}
