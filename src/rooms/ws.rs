use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{config::Config, AppError};

use super::{
    gateway::{Connection, Gateway, Identity},
    protocol::{ClientEvent, ServerEvent},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectQuery {
    sender_id: Option<String>,
    user: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    State(gateway): State<Gateway>,
    State(config): State<Arc<Config>>,
    Query(ConnectQuery { sender_id, user }): Query<ConnectQuery>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let outbound_buffer = config.outbound_buffer;
    let identity = Identity { sender_id, user };

    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| serve(socket, gateway, outbound_buffer, identity))
}

/// Runs one connection until the client goes away.
///
/// Inbound frames are handled in arrival order on this task. Outbound events
/// are drained by a separate writer task so fan-out never waits on a socket.
async fn serve(socket: WebSocket, gateway: Gateway, outbound_buffer: usize, identity: Identity) {
    let (outbound, mut rx) = mpsc::channel::<ServerEvent>(outbound_buffer);
    let mut connection = gateway.connect(outbound, identity);
    let connection_id = connection.id();
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(%connection_id, error = %err, "could not encode event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_frame(&gateway, &mut connection, text.as_str()).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(%connection_id, error = %err, "socket error");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    gateway.disconnect(connection).await;
    writer.abort();
}

async fn handle_frame(gateway: &Gateway, connection: &mut Connection, text: &str) {
    let result = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => gateway.handle(connection, event).await,
        Err(err) => Err(AppError::validation(format!("malformed frame: {err}"))),
    };

    if let Err(err) = result {
        err.log();
        connection.notify(ServerEvent::from(&err));
    }
}
