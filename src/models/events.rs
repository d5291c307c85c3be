use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::presence::PresenceRecord;
use crate::models::room::RoomSummary;

/// Events a client may emit over an established realtime connection.
///
/// Payloads are parsed into these strict shapes at the socket boundary;
/// anything that does not deserialize is answered with a `room-error`
/// before it can reach the session state machine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join-room", rename_all = "camelCase")]
    JoinRoom { room_id: Uuid },

    #[serde(rename = "leave-room", rename_all = "camelCase")]
    LeaveRoom { room_id: Uuid },

    #[serde(rename = "content-change", rename_all = "camelCase")]
    ContentChange {
        room_id: Uuid,
        content: String,
        #[serde(default)]
        operation: Option<String>,
    },

    #[serde(rename = "cursor-position", rename_all = "camelCase")]
    CursorPosition {
        room_id: Uuid,
        position: Value,
        #[serde(default)]
        selection: Option<Value>,
    },

    #[serde(rename = "room-message", rename_all = "camelCase")]
    RoomMessage { room_id: Uuid, message: String },

    #[serde(rename = "get-rooms")]
    GetRooms {},
}

/// Events the server delivers to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "room-joined", rename_all = "camelCase")]
    RoomJoined {
        room: RoomSnapshot,
        users: HashMap<Uuid, PresenceRecord>,
    },

    #[serde(rename = "room-error")]
    RoomError { message: String },

    #[serde(rename = "user-joined", rename_all = "camelCase")]
    UserJoined {
        user_id: Uuid,
        username: String,
        first_name: String,
        profile_image: Option<String>,
    },

    #[serde(rename = "user-left", rename_all = "camelCase")]
    UserLeft {
        user_id: Uuid,
        username: String,
        first_name: String,
        profile_image: Option<String>,
    },

    #[serde(rename = "content-updated", rename_all = "camelCase")]
    ContentUpdated {
        content: String,
        operation: Option<String>,
        user_id: Uuid,
        username: String,
        timestamp: String,
    },

    #[serde(rename = "cursor-updated", rename_all = "camelCase")]
    CursorUpdated {
        user_id: Uuid,
        username: String,
        position: Value,
        selection: Option<Value>,
        timestamp: String,
    },

    #[serde(rename = "room-message", rename_all = "camelCase")]
    RoomMessage {
        id: Uuid,
        user_id: Uuid,
        username: String,
        first_name: String,
        profile_image: Option<String>,
        message: String,
        timestamp: String,
    },

    #[serde(rename = "rooms-list", rename_all = "camelCase")]
    RoomsList { rooms: Vec<RoomSummary> },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::RoomError {
            message: message.into(),
        }
    }
}

/// Room metadata plus the live content snapshot sent back on a join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub topic: String,
    pub content: String,
}

/// Wire timestamp: RFC 3339 UTC with millisecond precision.
pub fn wire_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
