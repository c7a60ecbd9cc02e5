use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db, AppError, AppResult};

/// A persisted chat line. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub room_id: String,
    pub sender_id: String,
    pub user: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub(crate) fn validate_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation("message text must not be empty"));
    }
    Ok(())
}

/// Append-only per-room message log.
///
/// Room ids are not checked against the room registry, so messages for
/// unknown rooms are stored like any other.
#[derive(Clone)]
pub struct MessageStore {
    db_pool: SqlitePool,
}

impl MessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn append(
        &self,
        room_id: &str,
        sender_id: &str,
        user: &str,
        text: &str,
    ) -> AppResult<Message> {
        validate_text(text)?;

        let message = Message {
            id: Uuid::now_v7(),
            room_id: room_id.to_owned(),
            sender_id: sender_id.to_owned(),
            user: user.to_owned(),
            text: text.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };

        sqlx::query("INSERT INTO messages (id,room_id,sender_id,user_name,text,created_at) values (?,?,?,?,?,?)")
            .bind(message.id.to_string())
            .bind(&message.room_id)
            .bind(&message.sender_id)
            .bind(&message.user)
            .bind(&message.text)
            .bind(db::to_nanos(message.created_at)?)
            .execute(&self.db_pool)
            .await?;

        Ok(message)
    }

    /// Full snapshot of a room's log in acceptance order.
    pub async fn history(&self, room_id: &str) -> AppResult<Vec<Message>> {
        let rows: Vec<(String, String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id,room_id,sender_id,user_name,text,created_at FROM messages WHERE room_id=? ORDER BY seq ASC",
        )
        .bind(room_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(id, room_id, sender_id, user, text, created_at)| {
                Ok(Message {
                    id: Uuid::parse_str(&id).map_err(|err| AppError::Internal(err.into()))?,
                    room_id,
                    sender_id,
                    user,
                    text,
                    created_at: db::from_nanos(created_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MessageStore {
        MessageStore::new(db::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn history_returns_appends_in_order() {
        let store = store().await;

        let mut sent = Vec::new();
        for i in 0..20 {
            sent.push(store.append("algebra", "u1", "Ada", &format!("line {i}")).await.unwrap());
        }

        assert_eq!(store.history("algebra").await.unwrap(), sent);
    }

    #[tokio::test]
    async fn rejects_blank_text_without_storing() {
        let store = store().await;

        for text in ["", "  ", "\n\t"] {
            let err = store.append("algebra", "u1", "Ada", text).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(store.history("algebra").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keeps_text_verbatim() {
        let store = store().await;

        let message = store.append("algebra", "u1", "Ada", "  spaced out  ").await.unwrap();
        assert_eq!(message.text, "  spaced out  ");
        assert_eq!(store.history("algebra").await.unwrap()[0].text, "  spaced out  ");
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let store = store().await;

        store.append("algebra", "u1", "Ada", "x^2").await.unwrap();
        store.append("biology", "u2", "Bo", "cells").await.unwrap();
        store.append("algebra", "u2", "Bo", "y^2").await.unwrap();

        let algebra: Vec<_> = store
            .history("algebra")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(algebra, ["x^2", "y^2"]);
        assert_eq!(store.history("biology").await.unwrap().len(), 1);
        assert!(store.history("chemistry").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn each_history_call_is_a_fresh_snapshot() {
        let store = store().await;

        store.append("algebra", "u1", "Ada", "first").await.unwrap();
        let before = store.history("algebra").await.unwrap();
        store.append("algebra", "u1", "Ada", "second").await.unwrap();
        let after = store.history("algebra").await.unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
    }

    #[tokio::test]
    async fn append_fails_when_store_is_gone() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let store = MessageStore::new(db_pool.clone());
        db_pool.close().await;

        let err = store.append("algebra", "u1", "Ada", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
