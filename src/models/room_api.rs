use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::room::{RoomRow, RoomSummary};

/// Request body for creating a room
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
    pub topic: String,
    #[serde(default = "default_max_participants")]
    pub max_participants: i32,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    #[serde(default)]
    pub technologies: Vec<String>,
}

fn default_max_participants() -> i32 {
    10
}

fn default_is_public() -> bool {
    true
}

/// Request body for updating a room; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub max_participants: Option<i32>,
    pub is_public: Option<bool>,
    pub technologies: Option<Vec<String>>,
}

/// Full room representation returned by the room endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
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
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<RoomRow> for RoomResponse {
    fn from(room: RoomRow) -> Self {
        Self {
            id: room.id,
            name: room.name,
            description: room.description,
            topic: room.topic,
            max_participants: room.max_participants,
            is_public: room.is_public,
            is_active: room.is_active,
            room_code: room.room_code,
            technologies: room.technologies,
            owner_id: room.owner_id,
            created_at: room.created_at,
            ended_at: room.ended_at,
        }
    }
}

/// Response for the public room listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

const NAME_RANGE: std::ops::RangeInclusive<usize> = 3..=100;
const TOPIC_RANGE: std::ops::RangeInclusive<usize> = 3..=200;
const DESCRIPTION_MAX: usize = 500;
const PARTICIPANTS_RANGE: std::ops::RangeInclusive<i32> = 2..=50;

fn check_name(name: &str) -> Result<(), String> {
    if NAME_RANGE.contains(&name.trim().len()) {
        Ok(())
    } else {
        Err("Room name must be between 3-100 characters".to_string())
    }
}

fn check_topic(topic: &str) -> Result<(), String> {
    if TOPIC_RANGE.contains(&topic.trim().len()) {
        Ok(())
    } else {
        Err("Topic must be between 3-200 characters".to_string())
    }
}

fn check_description(description: &str) -> Result<(), String> {
    if description.len() <= DESCRIPTION_MAX {
        Ok(())
    } else {
        Err("Description cannot exceed 500 characters".to_string())
    }
}

fn check_participants(max_participants: i32) -> Result<(), String> {
    if PARTICIPANTS_RANGE.contains(&max_participants) {
        Ok(())
    } else {
        Err("Room must allow between 2 and 50 participants".to_string())
    }
}

impl CreateRoomRequest {
    pub fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_topic(&self.topic)?;
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        check_participants(self.max_participants)
    }
}

impl UpdateRoomRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(topic) = &self.topic {
            check_topic(topic)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(max_participants) = self.max_participants {
            check_participants(max_participants)?;
        }
        Ok(())
    }
}
