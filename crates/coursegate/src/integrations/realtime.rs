use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

/// Buffered events per room before slow subscribers start lagging.
const ROOM_CAPACITY: usize = 64;

pub const ADMIN_ROOM: &str = "admins";

pub fn user_room(user_id: i32) -> String {
    format!("user:{}", user_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// In-process publish/subscribe rooms.
///
/// Joining returns a receiver; leaving is dropping it. Rooms without
/// subscribers are pruned on the next emit.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, room: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Emit `event` to `room`. Returns how many subscribers received it.
    pub async fn emit(&self, room: &str, event: &str, payload: serde_json::Value) -> usize {
        let delivered = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(tx) => tx
                    .send(RealtimeEvent {
                        room: room.to_string(),
                        event: event.to_string(),
                        payload,
                    })
                    .unwrap_or(0),
                None => 0,
            }
        };

        if delivered == 0 {
            let mut rooms = self.rooms.write().await;
            if rooms.get(room).is_some_and(|tx| tx.receiver_count() == 0) {
                rooms.remove(room);
            }
        }
        tracing::debug!(room, event, delivered, "realtime event emitted");
        delivered
    }

    pub async fn subscribers(&self, room: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map_or(0, |tx| tx.receiver_count())
    }
}
