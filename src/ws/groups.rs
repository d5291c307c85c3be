use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::ServerEvent;

/// Buffered events per subscriber before a slow connection starts lagging.
const GROUP_BUFFER: usize = 100;

/// One event fanned out to a room's live connections.
///
/// `sender` is the emitting connection id; subscribers drop the message on
/// the floor when it is their own and `include_sender` is false.
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    pub sender: Uuid,
    pub include_sender: bool,
    pub event: ServerEvent,
}

/// Process-local broadcast groups, one channel per live room.
///
/// A group exists exactly while the room has live subscribers in this
/// process (or until the room is ended, which closes it). Serving more than
/// one process requires backing this fan-out with a shared pub/sub; nothing
/// here pretends otherwise.
pub struct RoomGroups {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<RoomBroadcast>>>,
}

impl RoomGroups {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe a connection to a room, creating the group on first join.
    pub async fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RoomBroadcast> {
        let mut channels = self.channels.write().await;
        channels
            .entry(room_id)
            .or_insert_with(|| {
                let (sender, _rx) = broadcast::channel(GROUP_BUFFER);
                sender
            })
            .subscribe()
    }

    /// Whether the room still has a live group in this process.
    pub async fn contains(&self, room_id: Uuid) -> bool {
        self.channels.read().await.contains_key(&room_id)
    }

    /// Fan an event out to the room. Returns the number of subscribers it
    /// reached, or `None` when no group exists for the room — publishing
    /// into nothing is not an error.
    pub async fn publish(&self, room_id: Uuid, message: RoomBroadcast) -> Option<usize> {
        let channels = self.channels.read().await;
        let sender = channels.get(&room_id)?;
        Some(sender.send(message).unwrap_or(0))
    }

    /// Drop the group once its last subscriber is gone.
    pub async fn prune(&self, room_id: Uuid) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&room_id) {
            if sender.receiver_count() == 0 {
                channels.remove(&room_id);
            }
        }
    }

    /// Drop the group outright, disconnecting every subscriber's feed.
    /// Used when a room is ended.
    pub async fn close(&self, room_id: Uuid) {
        self.channels.write().await.remove(&room_id);
    }

    pub async fn room_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.channels
            .read()
            .await
            .values()
            .map(|sender| sender.receiver_count())
            .sum()
    }
}

impl Default for RoomGroups {
    fn default() -> Self {
        Self::new()
    }
}
