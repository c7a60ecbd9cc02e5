use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::{AppResult, GetField};

use super::room::{Room, RoomRegistry};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_rooms(State(registry): State<RoomRegistry>) -> AppResult<Json<Vec<Room>>> {
    Ok(Json(registry.list().await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(registry): State<RoomRegistry>,

    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<Room>)> {
    let name = body.get_str_field("name")?;
    let room = registry.create(&name).await?;

    Ok((StatusCode::CREATED, Json(room)))
}
