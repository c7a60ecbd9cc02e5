//! Live subscriber sets, one per room.
//!
//! Each room's set sits behind its own async mutex. Holding a [`RoomGuard`]
//! serializes every subscribe, unsubscribe and publish for that room, which
//! is what lets the gateway keep persistence order and delivery order equal.
//! Rooms never contend with each other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex as AsyncMutex, OwnedMutexGuard,
};
use uuid::Uuid;

use super::protocol::ServerEvent;

pub type ConnectionId = Uuid;

/// Queue feeding one connection's socket writer.
pub type Outbound = mpsc::Sender<ServerEvent>;

#[derive(Default)]
pub struct RoomChannel {
    subscribers: HashMap<ConnectionId, Outbound>,
}

impl RoomChannel {
    /// Returns false if the connection was already subscribed.
    pub fn subscribe(&mut self, connection_id: ConnectionId, outbound: &Outbound) -> bool {
        if self.subscribers.contains_key(&connection_id) {
            return false;
        }
        self.subscribers.insert(connection_id, outbound.clone());
        true
    }

    pub fn unsubscribe(&mut self, connection_id: ConnectionId) -> bool {
        self.subscribers.remove(&connection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Fire-and-forget fan-out. A full queue misses this event; a closed one
    /// belongs to a gone connection and is dropped from the set.
    pub fn publish(&mut self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|connection_id, outbound| {
            match outbound.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(%connection_id, "outbound queue full, event dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%connection_id, "pruning closed subscriber");
                    false
                }
            }
        });
        delivered
    }
}

pub type RoomGuard = OwnedMutexGuard<RoomChannel>;

#[derive(Clone, Default)]
pub struct Broadcaster {
    rooms: Arc<Mutex<HashMap<String, Arc<AsyncMutex<RoomChannel>>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to a room's subscriber set, creating it on first use.
    pub async fn lock(&self, room_id: &str) -> RoomGuard {
        let channel = self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room_id.to_owned())
            .or_default()
            .clone();
        channel.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn subscribe(&self, room_id: &str, connection_id: ConnectionId, outbound: &Outbound) -> bool {
        self.lock(room_id).await.subscribe(connection_id, outbound)
    }

    pub async fn unsubscribe(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self.lock(room_id).await.unsubscribe(connection_id);
        self.release(room_id);
        removed
    }

    #[cfg(test)]
    pub(crate) async fn publish(&self, room_id: &str, message: super::msg::Message) -> usize {
        let delivered = self
            .lock(room_id)
            .await
            .publish(&ServerEvent::ReceiveMessage { message });
        self.release(room_id);
        delivered
    }

    /// Forgets a room that has no subscribers and that nobody holds.
    ///
    /// A handle to a room channel can only be obtained under the map lock,
    /// so a strong count of one means no task can be waiting on it.
    pub fn release(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = rooms.get(room_id).is_some_and(|channel| {
            Arc::strong_count(channel) == 1
                && channel.try_lock().is_ok_and(|room| room.is_empty())
        });
        if idle {
            rooms.remove(room_id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        let channel = self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned();
        match channel {
            Some(channel) => channel.lock().await.len(),
            None => 0,
        }
    }
}
