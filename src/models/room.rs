use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::user::PublicProfile;

/// Room row from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub topic: String,
    pub max_participants: i32,
    pub is_public: bool,
    pub is_active: bool,
    pub room_code: String,
    pub technologies: Vec<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Public room listing entry with its derived active-member count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub topic: String,
    pub technologies: Vec<String>,
    pub member_count: i64,
    pub max_participants: i32,
    pub owner: PublicProfile,
    pub created_at: DateTime<Utc>,
}

/// Room metadata mirrored into the ephemeral cache when a room is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMeta {
    pub name: String,
    pub topic: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}
