//! Live-connection registry: one broadcast group per room.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event fanned out to every live connection in a room, the sender's own
/// connection included. Clients render from this one canonical payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEvent {
    pub id: Uuid,
    pub message: String,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-group buffer. A receiver that falls this far behind starts losing
/// events and is told so via the lag error, not disconnected.
const GROUP_CAPACITY: usize = 64;

/// Broadcast groups keyed by room id. The map is sharded, so traffic in one
/// room never contends with another; a group exists only while somebody is
/// subscribed to it.
#[derive(Clone, Default)]
pub struct RoomBus {
    groups: Arc<DashMap<Uuid, broadcast::Sender<ChatEvent>>>,
}

impl RoomBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the room's group, creating the group on first join.
    pub fn join(&self, room_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        self.groups
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Best-effort fan-out; returns how many live connections got the event.
    /// A room with no listeners simply drops it, the history in the store is
    /// what clients catch up from.
    pub fn broadcast(&self, room_id: Uuid, event: ChatEvent) -> usize {
        match self.groups.get(&room_id) {
            Some(group) => group.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Removes the group once its last subscriber is gone. Callers drop
    /// their receiver first; a group that picked up a fresh subscriber in
    /// the meantime is left alone.
    pub fn leave(&self, room_id: Uuid) {
        self.groups
            .remove_if(&room_id, |_, group| group.receiver_count() == 0);
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
