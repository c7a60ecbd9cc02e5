use uuid::Uuid;

use super::{
    broadcaster::{Broadcaster, ConnectionId, Outbound},
    msg::{validate_text, MessageStore},
    protocol::{ClientEvent, SendMessage, ServerEvent},
};
use crate::{AppError, AppResult};

const ANONYMOUS: &str = "Anonymous";

/// Who a connection claims to be, as handed over at connect time.
/// Never checked; used only when a send omits its own identity.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub sender_id: Option<String>,
    pub user: Option<String>,
}

/// One live client session. Holds at most one room subscription.
///
/// Dropping the value without [`Gateway::disconnect`] leaves its subscription
/// to be pruned on the room's next publish.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbound: Outbound,
    room: Option<String>,
    identity: Identity,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Queues an event for this connection only.
    pub fn notify(&self, event: ServerEvent) -> bool {
        match self.outbound.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(connection_id = %self.id, error = %err, "could not queue event");
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    broadcaster: Broadcaster,
    messages: MessageStore,
}

impl Gateway {
    pub fn new(messages: MessageStore, broadcaster: Broadcaster) -> Self {
        Self { broadcaster, messages }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn connect(&self, outbound: Outbound, identity: Identity) -> Connection {
        let connection = Connection {
            id: Uuid::now_v7(),
            outbound,
            room: None,
            identity,
        };
        tracing::info!(connection_id = %connection.id, "connected");
        connection
    }

    pub async fn handle(&self, connection: &mut Connection, event: ClientEvent) -> AppResult<()> {
        match event {
            ClientEvent::Join { room_id } => self.join(connection, &room_id).await,
            ClientEvent::SendMessage(request) => self.send(connection, request).await.map(|_| ()),
        }
    }

    /// Moves the connection into `room_id` and queues the room's full history
    /// to it alone.
    ///
    /// History is read and the subscription added under the room lock, so the
    /// first live message the connection sees is the one after the last
    /// message in that history. Unlike fan-out, history delivery waits for
    /// queue space rather than being dropped.
    pub async fn join(&self, connection: &mut Connection, room_id: &str) -> AppResult<()> {
        if connection.room().is_some_and(|current| current != room_id) {
            if let Some(previous) = connection.room.take() {
                self.broadcaster.unsubscribe(&previous, connection.id).await;
                tracing::debug!(connection_id = %connection.id, room_id = %previous, "left room");
            }
        }

        let permit = connection.outbound.reserve().await.map_err(|_| {
            AppError::Internal(anyhow::anyhow!("connection {} is closed", connection.id))
        })?;

        let mut room = self.broadcaster.lock(room_id).await;
        let history = match self.messages.history(room_id).await {
            Ok(history) => history,
            Err(err) => {
                drop(room);
                self.broadcaster.release(room_id);
                return Err(err);
            }
        };

        room.subscribe(connection.id, &connection.outbound);
        let count = history.len();
        permit.send(ServerEvent::LoadMessages { history });
        drop(room);

        connection.room = Some(room_id.to_owned());
        tracing::info!(connection_id = %connection.id, room_id, history = count, "joined room");
        Ok(())
    }

    /// Persists then fans out. Returns how many subscribers it was queued for.
    ///
    /// The room lock is held across both steps so concurrent sends to one
    /// room are delivered in the order they were stored.
    pub async fn send(&self, connection: &Connection, request: SendMessage) -> AppResult<usize> {
        validate_text(&request.text)?;

        let sender_id = non_blank(request.sender_id)
            .or_else(|| non_blank(connection.identity.sender_id.clone()))
            .unwrap_or_else(|| connection.id.to_string());
        let user = non_blank(request.user)
            .or_else(|| non_blank(connection.identity.user.clone()))
            .unwrap_or_else(|| ANONYMOUS.to_owned());

        let mut room = self.broadcaster.lock(&request.room_id).await;
        let message = match self
            .messages
            .append(&request.room_id, &sender_id, &user, &request.text)
            .await
        {
            Ok(message) => message,
            Err(err) => {
                drop(room);
                self.broadcaster.release(&request.room_id);
                return Err(err);
            }
        };

        let message_id = message.id;
        let delivered = room.publish(&ServerEvent::ReceiveMessage { message });
        drop(room);
        self.broadcaster.release(&request.room_id);

        tracing::debug!(
            connection_id = %connection.id,
            room_id = %request.room_id,
            %message_id,
            delivered,
            "message sent"
        );
        Ok(delivered)
    }

    /// Ends the session. The connection cannot be used afterwards.
    pub async fn disconnect(&self, connection: Connection) {
        if let Some(room_id) = &connection.room {
            self.broadcaster.unsubscribe(room_id, connection.id).await;
        }
        tracing::info!(connection_id = %connection.id, room_id = ?connection.room, "disconnected");
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
