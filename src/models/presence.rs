use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cache-resident record that a user is currently live in a room.
///
/// Stored serialized in the room cache and rebuilt from nothing after a
/// restart; never a source of durable truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub username: String,
    pub first_name: String,
    pub profile_image: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub connection_id: Uuid,
}
