//! Workshop rooms: connections watching the same workshop.
//!
//! Each room is a broadcast channel. Frames carry the ID of the connection
//! that produced them so members can skip their own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

const ROOM_CAPACITY: usize = 256;

/// One serialized wire frame published to a room
#[derive(Debug, Clone)]
pub struct RoomFrame {
    pub origin: uuid::Uuid,
    pub frame: Arc<str>,
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, broadcast::Sender<RoomFrame>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a workshop's room, creating it if needed
    pub fn join(&self, workshop_id: &str) -> broadcast::Receiver<RoomFrame> {
        let mut rooms = self
            .rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms
            .entry(workshop_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Send a frame to every member of the room. Rooms nobody listens to
    /// any more are dropped. Returns the number of receivers.
    pub fn publish(&self, workshop_id: &str, origin: uuid::Uuid, frame: Arc<str>) -> usize {
        let mut rooms = self
            .rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = rooms.get(workshop_id) else {
            return 0;
        };
        match sender.send(RoomFrame { origin, frame }) {
            Ok(n) => n,
            Err(_) => {
                rooms.remove(workshop_id);
                debug!(workshop_id, "Dropped empty room");
                0
            }
        }
    }

    /// Current member count of a room
    pub fn members(&self, workshop_id: &str) -> usize {
        self.rooms
            .read()
            .map(|rooms| rooms.get(workshop_id).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|r| r.len()).unwrap_or(0)
    }
}
