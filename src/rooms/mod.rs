mod broadcaster;
mod gateway;
mod msg;
mod new;
mod protocol;
mod room;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use broadcaster::{Broadcaster, ConnectionId, Outbound, RoomChannel, RoomGuard};
pub use gateway::{Connection, Gateway, Identity};
pub use msg::{Message, MessageStore};
pub use protocol::{ClientEvent, SendMessage, ServerEvent};
pub use room::{slugify, Room, RoomRegistry};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(new::list_rooms).post(new::new_room))
        .route("/ws", get(ws::room_ws))
}
