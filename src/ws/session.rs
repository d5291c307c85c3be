use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::RoomCache;
use crate::db::RoomRegistry;
use crate::models::{
    wire_timestamp, ClientEvent, PresenceRecord, RoomRow, RoomSnapshot, ServerEvent, UserRow,
};
use crate::ws::groups::{RoomBroadcast, RoomGroups};
use crate::ws::ClientTx;

/// Fixed page size for the room listing query.
const ROOMS_PAGE_SIZE: i64 = 20;

/// Where a connection currently stands. A connection is in at most one room
/// at a time; this pointer is the sole source of truth for whether it may
/// emit events for a given room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(Uuid),
}

/// Why a room operation was refused or failed.
///
/// Domain variants map directly to the `room-error` strings clients display;
/// `Registry` wraps an infrastructure failure and is reported with the
/// per-operation fallback message instead of internal detail.
#[derive(Debug)]
pub enum SessionError {
    RoomNotFound,
    RoomPrivate,
    RoomFull,
    NotInRoom,
    AlreadyInRoom,
    EmptyMessage,
    Registry(sqlx::Error),
}

impl SessionError {
    fn client_message(&self, fallback: &str) -> String {
        match self {
            SessionError::Registry(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::RoomNotFound => write!(f, "Room not found or inactive"),
            SessionError::RoomPrivate => write!(f, "Room is private"),
            SessionError::RoomFull => write!(f, "Room is full"),
            SessionError::NotInRoom => write!(f, "Not in this room"),
            SessionError::AlreadyInRoom => write!(f, "Already in another room"),
            SessionError::EmptyMessage => write!(f, "Message cannot be empty"),
            SessionError::Registry(e) => write!(f, "Registry failure: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Registry(e)
    }
}

/// Per-connection room session.
///
/// Owns the connection's state machine and mediates between the durable
/// registry (membership, lifecycle), the room cache (presence, content) and
/// the broadcast groups (fan-out). One instance lives for exactly as long
/// as its socket.
pub struct RoomSession {
    connection_id: Uuid,
    user: UserRow,
    state: SessionState,
    registry: Arc<dyn RoomRegistry>,
    cache: RoomCache,
    groups: Arc<RoomGroups>,
    tx: ClientTx,
    feed: Option<JoinHandle<()>>,
}

impl RoomSession {
    pub fn new(
        connection_id: Uuid,
        user: UserRow,
        registry: Arc<dyn RoomRegistry>,
        cache: RoomCache,
        groups: Arc<RoomGroups>,
        tx: ClientTx,
    ) -> Self {
        Self {
            connection_id,
            user,
            state: SessionState::Unjoined,
            registry,
            cache,
            groups,
            tx,
            feed: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> &UserRow {
        &self.user
    }

    /// Dispatch one client event. Nothing a handler does may take the
    /// connection down: domain refusals and infrastructure failures alike
    /// degrade to a `room-error` event to this connection only.
    pub async fn handle_event(&mut self, event: ClientEvent) {
        let outcome = match event {
            ClientEvent::JoinRoom { room_id } => {
                (self.join_room(room_id).await, "Failed to join room")
            }
            ClientEvent::LeaveRoom { room_id } => {
                (self.leave_room(room_id).await, "Failed to leave room")
            }
            ClientEvent::ContentChange {
                room_id,
                content,
                operation,
            } => (
                self.content_change(room_id, content, operation).await,
                "Failed to update content",
            ),
            ClientEvent::CursorPosition {
                room_id,
                position,
                selection,
            } => {
                // Cursor spam after a lost race is harmless; never an error.
                self.cursor_position(room_id, position, selection).await;
                (Ok(()), "")
            }
            ClientEvent::RoomMessage { room_id, message } => (
                self.room_message(room_id, message).await,
                "Failed to send message",
            ),
            ClientEvent::GetRooms {} => (self.get_rooms().await, "Failed to get rooms"),
        };

        if let (Err(e), fallback) = outcome {
            if let SessionError::Registry(cause) = &e {
                error!(
                    "Operation failed for connection {}: {}",
                    self.connection_id, cause
                );
            }
            self.send(ServerEvent::error(e.client_message(fallback)));
        }
    }

    /// Run the leave sequence for whatever room the connection was in.
    /// There is no grace period: a reconnect is a fresh join.
    pub async fn handle_disconnect(&mut self) {
        if let SessionState::Joined(room_id) = self.state {
            self.depart(room_id).await;
        }
    }

    pub fn send_error(&self, message: impl Into<String>) {
        self.send(ServerEvent::error(message));
    }

    fn send(&self, event: ServerEvent) {
        // The writer shutting down first just means there is nobody left to tell.
        let _ = self.tx.send(event);
    }

    async fn join_room(&mut self, room_id: Uuid) -> Result<(), SessionError> {
        match self.state {
            SessionState::Joined(current) if current == room_id => {
                // Re-affirmation of the current room: resend the snapshot,
                // touch nothing.
                let room = self
                    .registry
                    .find_active_room(room_id)
                    .await?
                    .ok_or(SessionError::RoomNotFound)?;
                self.send(self.room_joined(&room));
                return Ok(());
            }
            SessionState::Joined(_) => return Err(SessionError::AlreadyInRoom),
            SessionState::Unjoined => {}
        }

        let room = self
            .registry
            .find_active_room(room_id)
            .await?
            .ok_or(SessionError::RoomNotFound)?;
        let members = self.registry.list_active_members(room_id).await?;
        let is_member = members.iter().any(|m| m.user_id == self.user.id);

        if !is_member {
            if !room.is_public {
                return Err(SessionError::RoomPrivate);
            }
            if members.len() as i32 >= room.max_participants {
                return Err(SessionError::RoomFull);
            }
            self.registry.upsert_membership(room_id, self.user.id).await?;
        }

        // Subscribe before acking so nothing broadcast from here on is missed.
        let rx = self.groups.subscribe(room_id).await;
        self.spawn_feed(rx);

        self.cache.put_presence(
            room_id,
            self.user.id,
            &PresenceRecord {
                username: self.user.username.clone(),
                first_name: self.user.first_name.clone(),
                profile_image: self.user.profile_image.clone(),
                joined_at: Utc::now(),
                connection_id: self.connection_id,
            },
        );
        self.state = SessionState::Joined(room_id);

        // Ack to the joiner first, then tell the others. Causal, not total:
        // peers see user-joined only after this connection saw room-joined
        // leave this process.
        self.send(self.room_joined(&room));
        self.groups
            .publish(
                room_id,
                RoomBroadcast {
                    sender: self.connection_id,
                    include_sender: false,
                    event: ServerEvent::UserJoined {
                        user_id: self.user.id,
                        username: self.user.username.clone(),
                        first_name: self.user.first_name.clone(),
                        profile_image: self.user.profile_image.clone(),
                    },
                },
            )
            .await;

        info!("User {} joined room {}", self.user.username, room_id);
        Ok(())
    }

    fn room_joined(&self, room: &RoomRow) -> ServerEvent {
        ServerEvent::RoomJoined {
            room: RoomSnapshot {
                id: room.id,
                name: room.name.clone(),
                description: room.description.clone(),
                topic: room.topic.clone(),
                content: self.cache.content(room.id),
            },
            users: self.cache.presence(room.id),
        }
    }

    async fn leave_room(&mut self, room_id: Uuid) -> Result<(), SessionError> {
        match self.state {
            // Leaving a room you are not in is a no-op, not an error.
            SessionState::Unjoined => Ok(()),
            SessionState::Joined(current) if current != room_id => Err(SessionError::NotInRoom),
            SessionState::Joined(_) => {
                self.depart(room_id).await;
                Ok(())
            }
        }
    }

    /// The leave/disconnect sequence. Every step is taken even when an
    /// earlier one fails, so a registry outage cannot leak a phantom member
    /// into the cache or the broadcast group.
    async fn depart(&mut self, room_id: Uuid) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }

        self.cache.remove_presence(room_id, self.user.id);

        if let Err(e) = self
            .registry
            .deactivate_membership(room_id, self.user.id)
            .await
        {
            error!(
                "Failed to deactivate membership of user {} in room {}: {}",
                self.user.id, room_id, e
            );
        }

        self.groups
            .publish(
                room_id,
                RoomBroadcast {
                    sender: self.connection_id,
                    include_sender: false,
                    event: ServerEvent::UserLeft {
                        user_id: self.user.id,
                        username: self.user.username.clone(),
                        first_name: self.user.first_name.clone(),
                        profile_image: self.user.profile_image.clone(),
                    },
                },
            )
            .await;
        self.groups.prune(room_id).await;

        self.state = SessionState::Unjoined;
        info!("User {} left room {}", self.user.username, room_id);
    }

    async fn content_change(
        &mut self,
        room_id: Uuid,
        content: String,
        operation: Option<String>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Joined(room_id) {
            return Err(SessionError::NotInRoom);
        }
        if !self.groups.contains(room_id).await {
            self.room_gone(room_id);
            return Err(SessionError::RoomNotFound);
        }

        // Last write wins: concurrent edits race and the later write
        // observed by the cache is the one that sticks.
        self.cache.set_content(room_id, &content);

        self.groups
            .publish(
                room_id,
                RoomBroadcast {
                    sender: self.connection_id,
                    include_sender: false,
                    event: ServerEvent::ContentUpdated {
                        content,
                        operation,
                        user_id: self.user.id,
                        username: self.user.username.clone(),
                        timestamp: wire_timestamp(),
                    },
                },
            )
            .await;

        self.registry
            .increment_contribution(room_id, self.user.id)
            .await?;
        Ok(())
    }

    async fn cursor_position(
        &mut self,
        room_id: Uuid,
        position: serde_json::Value,
        selection: Option<serde_json::Value>,
    ) {
        if self.state != SessionState::Joined(room_id) {
            return;
        }
        if !self.groups.contains(room_id).await {
            self.room_gone(room_id);
            return;
        }

        self.groups
            .publish(
                room_id,
                RoomBroadcast {
                    sender: self.connection_id,
                    include_sender: false,
                    event: ServerEvent::CursorUpdated {
                        user_id: self.user.id,
                        username: self.user.username.clone(),
                        position,
                        selection,
                        timestamp: wire_timestamp(),
                    },
                },
            )
            .await;
    }

    async fn room_message(&mut self, room_id: Uuid, message: String) -> Result<(), SessionError> {
        if self.state != SessionState::Joined(room_id) {
            return Err(SessionError::NotInRoom);
        }
        let body = message.trim();
        if body.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if !self.groups.contains(room_id).await {
            self.room_gone(room_id);
            return Err(SessionError::RoomNotFound);
        }

        // Chat goes to everyone, the author included.
        self.groups
            .publish(
                room_id,
                RoomBroadcast {
                    sender: self.connection_id,
                    include_sender: true,
                    event: ServerEvent::RoomMessage {
                        id: Uuid::new_v4(),
                        user_id: self.user.id,
                        username: self.user.username.clone(),
                        first_name: self.user.first_name.clone(),
                        profile_image: self.user.profile_image.clone(),
                        message: body.to_string(),
                        timestamp: wire_timestamp(),
                    },
                },
            )
            .await;
        Ok(())
    }

    async fn get_rooms(&self) -> Result<(), SessionError> {
        let rooms = self.registry.list_public_rooms(ROOMS_PAGE_SIZE).await?;
        self.send(ServerEvent::RoomsList { rooms });
        Ok(())
    }

    /// The room's broadcast group vanished under us: the room was ended.
    /// Fall back to Unjoined so the connection cannot write into a dead room.
    fn room_gone(&mut self, room_id: Uuid) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        self.cache.remove_presence(room_id, self.user.id);
        self.state = SessionState::Unjoined;
    }

    /// Pump room broadcasts into this connection's outbound queue, skipping
    /// our own echoes unless the event explicitly includes the sender.
    fn spawn_feed(&mut self, mut rx: broadcast::Receiver<RoomBroadcast>) {
        let connection_id = self.connection_id;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        if message.sender == connection_id && !message.include_sender {
                            continue;
                        }
                        if tx.send(message.event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Connection {} lagged behind its room broadcast by {} events",
                            connection_id, skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.feed = Some(handle);
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}
