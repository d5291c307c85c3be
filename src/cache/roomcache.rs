use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::{PresenceRecord, RoomMeta};

const MAX_ENTRIES: u64 = 1_000_000;
const IDLE_EVICTION: Duration = Duration::from_secs(6 * 60 * 60);

/// Cache-resident live room state: presence entries, the latest content
/// snapshot and a small metadata record, all keyed per room.
///
/// Nothing in here is durable. Eviction or a restart degenerates a room to
/// "empty" and clients resynchronize by re-joining; membership history and
/// room lifecycle live in the registry. This type therefore holds no
/// business rules and never rejects a write.
///
/// Every entry is one key-value pair (`room:{id}:users:{uid}`,
/// `room:{id}:content`, `room:{id}:meta`), so a single presence or content
/// write is atomic on its own key and writes for different rooms can never
/// collide.
#[derive(Clone)]
pub struct RoomCache {
    entries: Cache<String, String>,
}

impl RoomCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_idle(IDLE_EVICTION)
                .build(),
        }
    }

    fn meta_key(room_id: Uuid) -> String {
        format!("room:{}:meta", room_id)
    }

    fn content_key(room_id: Uuid) -> String {
        format!("room:{}:content", room_id)
    }

    fn presence_key(room_id: Uuid, user_id: Uuid) -> String {
        format!("room:{}:users:{}", room_id, user_id)
    }

    fn presence_prefix(room_id: Uuid) -> String {
        format!("room:{}:users:", room_id)
    }

    fn room_prefix(room_id: Uuid) -> String {
        format!("room:{}:", room_id)
    }

    pub fn set_room_meta(&self, room_id: Uuid, meta: &RoomMeta) {
        match serde_json::to_string(meta) {
            Ok(value) => self.entries.insert(Self::meta_key(room_id), value),
            Err(e) => error!("Failed to serialize metadata for room {}: {}", room_id, e),
        }
    }

    pub fn room_meta(&self, room_id: Uuid) -> Option<RoomMeta> {
        let raw = self.entries.get(&Self::meta_key(room_id))?;
        match serde_json::from_str(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Dropping corrupt metadata entry for room {}: {}", room_id, e);
                None
            }
        }
    }

    pub fn put_presence(&self, room_id: Uuid, user_id: Uuid, record: &PresenceRecord) {
        match serde_json::to_string(record) {
            Ok(value) => self
                .entries
                .insert(Self::presence_key(room_id, user_id), value),
            Err(e) => error!(
                "Failed to serialize presence for user {} in room {}: {}",
                user_id, room_id, e
            ),
        }
    }

    pub fn remove_presence(&self, room_id: Uuid, user_id: Uuid) {
        self.entries.invalidate(&Self::presence_key(room_id, user_id));
    }

    /// All live presence entries for a room. Corrupt entries are logged and
    /// skipped so one bad value cannot take down the whole read.
    pub fn presence(&self, room_id: Uuid) -> HashMap<Uuid, PresenceRecord> {
        let prefix = Self::presence_prefix(room_id);
        let mut users = HashMap::new();
        for (key, value) in self.entries.iter() {
            let Some(suffix) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let Ok(user_id) = Uuid::parse_str(suffix) else {
                warn!("Dropping presence entry with malformed key: {}", key);
                continue;
            };
            match serde_json::from_str::<PresenceRecord>(&value) {
                Ok(record) => {
                    users.insert(user_id, record);
                }
                Err(e) => {
                    warn!(
                        "Dropping corrupt presence entry for user {} in room {}: {}",
                        user_id, room_id, e
                    );
                }
            }
        }
        users
    }

    /// Overwrite the room's content snapshot. Last write wins.
    pub fn set_content(&self, room_id: Uuid, content: &str) {
        self.entries
            .insert(Self::content_key(room_id), content.to_string());
    }

    /// Current content snapshot, or the empty string when none exists.
    pub fn content(&self, room_id: Uuid) -> String {
        self.entries
            .get(&Self::content_key(room_id))
            .unwrap_or_default()
    }

    /// Drop every entry belonging to a room. Used when a room is ended.
    pub fn purge_room(&self, room_id: Uuid) {
        let prefix = Self::room_prefix(room_id);
        let keys: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix.as_str()))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.entries.invalidate(&*key);
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    #[cfg(test)]
    pub(crate) fn inject_raw(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl Default for RoomCache {
    fn default() -> Self {
        Self::new()
    }
}
