//! In-memory test doubles for the durable registry.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Error as SqlxError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::db::RoomRegistry;
use crate::models::{
    CreateRoomRequest, MemberRole, MembershipRow, PublicProfile, RoomRow, RoomSummary,
    UpdateRoomRequest, UserRow,
};

/// Hash-map backed `RoomRegistry` with a switchable failure mode, so session
/// tests can drive the state machine without a database and simulate a
/// registry outage.
pub struct MemoryRegistry {
    users: Mutex<HashMap<Uuid, UserRow>>,
    rooms: Mutex<HashMap<Uuid, RoomRow>>,
    memberships: Mutex<HashMap<(Uuid, Uuid), MembershipRow>>,
    pub upsert_calls: AtomicUsize,
    fail: AtomicBool,
}

fn relock<'a, T>(
    guard: Result<std::sync::MutexGuard<'a, T>, PoisonError<std::sync::MutexGuard<'a, T>>>,
) -> std::sync::MutexGuard<'a, T> {
    guard.unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            rooms: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
            upsert_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every registry call fail with a pool error until reset.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), SqlxError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(SqlxError::PoolClosed)
        } else {
            Ok(())
        }
    }

    pub fn add_user(&self, username: &str) -> UserRow {
        let user = UserRow {
            id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: {
                let mut name = username.to_string();
                if let Some(first) = name.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                name
            },
            last_name: "Tester".to_string(),
            profile_image: None,
            is_active: true,
        };
        relock(self.users.lock()).insert(user.id, user.clone());
        user
    }

    pub fn deactivate_user(&self, user_id: Uuid) {
        if let Some(user) = relock(self.users.lock()).get_mut(&user_id) {
            user.is_active = false;
        }
    }

    /// Seed an active room owned by `owner`, including the owner membership
    /// the real create path would write.
    pub fn add_room(&self, owner: &UserRow, max_participants: i32, is_public: bool) -> RoomRow {
        let now = Utc::now();
        let room = RoomRow {
            id: Uuid::new_v4(),
            name: format!("{}-room", owner.username),
            description: None,
            topic: "testing".to_string(),
            max_participants,
            is_public,
            is_active: true,
            room_code: format!("{:08}", relock(self.rooms.lock()).len()),
            technologies: vec![],
            owner_id: owner.id,
            created_at: now,
            updated_at: now,
            ended_at: None,
        };
        relock(self.rooms.lock()).insert(room.id, room.clone());
        relock(self.memberships.lock()).insert(
            (room.id, owner.id),
            MembershipRow {
                room_id: room.id,
                user_id: owner.id,
                role: MemberRole::Owner,
                joined_at: now,
                left_at: None,
                is_active: true,
                contribution_count: 0,
            },
        );
        room
    }

    pub fn deactivate_room(&self, room_id: Uuid) {
        if let Some(room) = relock(self.rooms.lock()).get_mut(&room_id) {
            room.is_active = false;
            room.ended_at = Some(Utc::now());
        }
    }

    /// The durable side of ending a room: deactivate it and cascade the
    /// memberships, mirroring the SQL transaction.
    pub fn end_room_now(&self, room_id: Uuid) {
        self.deactivate_room(room_id);
        let now = Utc::now();
        for membership in relock(self.memberships.lock()).values_mut() {
            if membership.room_id == room_id && membership.is_active {
                membership.is_active = false;
                membership.left_at = Some(now);
            }
        }
    }

    pub fn membership(&self, room_id: Uuid, user_id: Uuid) -> Option<MembershipRow> {
        relock(self.memberships.lock())
            .get(&(room_id, user_id))
            .cloned()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomRegistry for MemoryRegistry {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRow>, SqlxError> {
        self.guard()?;
        Ok(relock(self.users.lock()).get(&user_id).cloned())
    }

    async fn find_active_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError> {
        self.guard()?;
        Ok(relock(self.rooms.lock())
            .get(&room_id)
            .filter(|room| room.is_active)
            .cloned())
    }

    async fn find_active_room_by_code(&self, room_code: &str) -> Result<Option<RoomRow>, SqlxError> {
        self.guard()?;
        Ok(relock(self.rooms.lock())
            .values()
            .find(|room| room.room_code == room_code && room.is_active)
            .cloned())
    }

    async fn list_active_members(&self, room_id: Uuid) -> Result<Vec<MembershipRow>, SqlxError> {
        self.guard()?;
        Ok(relock(self.memberships.lock())
            .values()
            .filter(|m| m.room_id == room_id && m.is_active)
            .cloned()
            .collect())
    }

    async fn list_public_rooms(&self, limit: i64) -> Result<Vec<RoomSummary>, SqlxError> {
        self.guard()?;
        let users = relock(self.users.lock());
        let memberships = relock(self.memberships.lock());
        let mut rooms: Vec<RoomRow> = relock(self.rooms.lock())
            .values()
            .filter(|room| room.is_active && room.is_public)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms.truncate(limit as usize);

        Ok(rooms
            .into_iter()
            .filter_map(|room| {
                let owner = users.get(&room.owner_id)?;
                let member_count = memberships
                    .values()
                    .filter(|m| m.room_id == room.id && m.is_active)
                    .count() as i64;
                Some(RoomSummary {
                    id: room.id,
                    name: room.name,
                    description: room.description,
                    topic: room.topic,
                    technologies: room.technologies,
                    member_count,
                    max_participants: room.max_participants,
                    owner: PublicProfile::from(owner),
                    created_at: room.created_at,
                })
            })
            .collect())
    }

    async fn room_code_exists(&self, room_code: &str) -> Result<bool, SqlxError> {
        self.guard()?;
        Ok(relock(self.rooms.lock())
            .values()
            .any(|room| room.room_code == room_code))
    }

    async fn create_room(
        &self,
        owner_id: Uuid,
        request: &CreateRoomRequest,
        room_code: &str,
    ) -> Result<RoomRow, SqlxError> {
        self.guard()?;
        let now = Utc::now();
        let room = RoomRow {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            topic: request.topic.trim().to_string(),
            max_participants: request.max_participants,
            is_public: request.is_public,
            is_active: true,
            room_code: room_code.to_string(),
            technologies: request.technologies.clone(),
            owner_id,
            created_at: now,
            updated_at: now,
            ended_at: None,
        };
        relock(self.rooms.lock()).insert(room.id, room.clone());
        relock(self.memberships.lock()).insert(
            (room.id, owner_id),
            MembershipRow {
                room_id: room.id,
                user_id: owner_id,
                role: MemberRole::Owner,
                joined_at: now,
                left_at: None,
                is_active: true,
                contribution_count: 0,
            },
        );
        Ok(room)
    }

    async fn update_room(
        &self,
        room_id: Uuid,
        patch: &UpdateRoomRequest,
    ) -> Result<Option<RoomRow>, SqlxError> {
        self.guard()?;
        let mut rooms = relock(self.rooms.lock());
        let Some(room) = rooms.get_mut(&room_id).filter(|room| room.is_active) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            room.name = name.clone();
        }
        if let Some(description) = &patch.description {
            room.description = Some(description.clone());
        }
        if let Some(topic) = &patch.topic {
            room.topic = topic.clone();
        }
        if let Some(max_participants) = patch.max_participants {
            room.max_participants = max_participants;
        }
        if let Some(is_public) = patch.is_public {
            room.is_public = is_public;
        }
        if let Some(technologies) = &patch.technologies {
            room.technologies = technologies.clone();
        }
        room.updated_at = Utc::now();
        Ok(Some(room.clone()))
    }

    async fn end_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError> {
        self.guard()?;
        let active = relock(self.rooms.lock())
            .get(&room_id)
            .map(|room| room.is_active)
            .unwrap_or(false);
        if !active {
            return Ok(None);
        }
        self.end_room_now(room_id);
        Ok(relock(self.rooms.lock()).get(&room_id).cloned())
    }

    async fn upsert_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        self.guard()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        relock(self.memberships.lock())
            .entry((room_id, user_id))
            .and_modify(|membership| {
                membership.is_active = true;
                membership.left_at = None;
                membership.joined_at = now;
            })
            .or_insert(MembershipRow {
                room_id,
                user_id,
                role: MemberRole::Participant,
                joined_at: now,
                left_at: None,
                is_active: true,
                contribution_count: 0,
            });
        Ok(())
    }

    async fn deactivate_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        self.guard()?;
        if let Some(membership) = relock(self.memberships.lock()).get_mut(&(room_id, user_id)) {
            if membership.is_active {
                membership.is_active = false;
                membership.left_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn increment_contribution(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        self.guard()?;
        if let Some(membership) = relock(self.memberships.lock()).get_mut(&(room_id, user_id)) {
            membership.contribution_count += 1;
        }
        Ok(())
    }
}
