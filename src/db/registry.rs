use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    CreateRoomRequest, MemberRole, MembershipRow, PublicProfile, RoomRow, RoomSummary,
    UpdateRoomRequest, UserRow,
};

/// Durable source of truth for rooms, memberships and user identity.
///
/// Every room lifecycle and membership decision goes through this adapter;
/// the ephemeral room cache is never consulted for them. Injected as a
/// trait object so the session layer can be exercised against an in-memory
/// double.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRow>, SqlxError>;

    async fn find_active_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError>;

    async fn find_active_room_by_code(&self, room_code: &str) -> Result<Option<RoomRow>, SqlxError>;

    async fn list_active_members(&self, room_id: Uuid) -> Result<Vec<MembershipRow>, SqlxError>;

    /// Public, active rooms with derived member counts, newest first.
    async fn list_public_rooms(&self, limit: i64) -> Result<Vec<RoomSummary>, SqlxError>;

    async fn room_code_exists(&self, room_code: &str) -> Result<bool, SqlxError>;

    /// Insert the room and its owner membership in one transaction. The
    /// owner role is assigned here and never anywhere else.
    async fn create_room(
        &self,
        owner_id: Uuid,
        request: &CreateRoomRequest,
        room_code: &str,
    ) -> Result<RoomRow, SqlxError>;

    async fn update_room(
        &self,
        room_id: Uuid,
        patch: &UpdateRoomRequest,
    ) -> Result<Option<RoomRow>, SqlxError>;

    /// Mark the room ended and cascade every active membership to inactive.
    async fn end_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError>;

    /// Create a participant membership, or reactivate the previous row for
    /// this (room, user) pair. The stored role is preserved on reactivation.
    async fn upsert_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError>;

    async fn deactivate_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError>;

    async fn increment_contribution(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError>;
}

const ROOM_COLUMNS: &str = r#"
    id, name, description, topic, max_participants, is_public, is_active,
    room_code, technologies, owner_id, created_at, updated_at, ended_at
"#;

/// Postgres-backed registry
pub struct PgRoomRegistry {
    pool: PgPool,
}

impl PgRoomRegistry {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }
}

#[async_trait]
impl RoomRegistry for PgRoomRegistry {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRow>, SqlxError> {
        let query_sql = r#"
            SELECT id, username, first_name, last_name, profile_image, is_active
            FROM users
            WHERE id = $1
        "#;
        sqlx::query_as::<_, UserRow>(query_sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_active_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError> {
        let query_sql = format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 AND is_active = TRUE"
        );
        sqlx::query_as::<_, RoomRow>(&query_sql)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_active_room_by_code(&self, room_code: &str) -> Result<Option<RoomRow>, SqlxError> {
        let query_sql = format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE room_code = $1 AND is_active = TRUE"
        );
        sqlx::query_as::<_, RoomRow>(&query_sql)
            .bind(room_code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_active_members(&self, room_id: Uuid) -> Result<Vec<MembershipRow>, SqlxError> {
        let query_sql = r#"
            SELECT room_id, user_id, role, joined_at, left_at, is_active, contribution_count
            FROM room_members
            WHERE room_id = $1 AND is_active = TRUE
        "#;
        sqlx::query_as::<_, MembershipRow>(query_sql)
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_public_rooms(&self, limit: i64) -> Result<Vec<RoomSummary>, SqlxError> {
        let query_sql = r#"
            SELECT
                r.id,
                r.name,
                r.description,
                r.topic,
                r.technologies,
                r.max_participants,
                r.created_at,
                u.id AS owner_id,
                u.username AS owner_username,
                u.first_name AS owner_first_name,
                u.profile_image AS owner_profile_image,
                COUNT(m.user_id) FILTER (WHERE m.is_active) AS member_count
            FROM rooms r
                JOIN users u ON u.id = r.owner_id
                LEFT JOIN room_members m ON m.room_id = r.id
            WHERE r.is_active = TRUE AND r.is_public = TRUE
            GROUP BY r.id, u.id
            ORDER BY r.created_at DESC
            LIMIT $1
        "#;
        let rows = sqlx::query(query_sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in rows {
            rooms.push(RoomSummary {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                topic: row.try_get("topic")?,
                technologies: row.try_get("technologies")?,
                member_count: row.try_get("member_count")?,
                max_participants: row.try_get("max_participants")?,
                owner: PublicProfile {
                    id: row.try_get("owner_id")?,
                    username: row.try_get("owner_username")?,
                    first_name: row.try_get("owner_first_name")?,
                    profile_image: row.try_get("owner_profile_image")?,
                },
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(rooms)
    }

    async fn room_code_exists(&self, room_code: &str) -> Result<bool, SqlxError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM rooms WHERE room_code = $1) AS found")
            .bind(room_code)
            .fetch_one(&self.pool)
            .await?;
        row.try_get("found")
    }

    async fn create_room(
        &self,
        owner_id: Uuid,
        request: &CreateRoomRequest,
        room_code: &str,
    ) -> Result<RoomRow, SqlxError> {
        let mut tx = self.pool.begin().await?;

        let insert_room_sql = format!(
            r#"
            INSERT INTO rooms (name, description, topic, max_participants, is_public, room_code, technologies, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ROOM_COLUMNS}
            "#
        );
        let room = sqlx::query_as::<_, RoomRow>(&insert_room_sql)
            .bind(request.name.trim())
            .bind(request.description.as_deref())
            .bind(request.topic.trim())
            .bind(request.max_participants)
            .bind(request.is_public)
            .bind(room_code)
            .bind(&request.technologies)
            .bind(owner_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO room_members (room_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(room.id)
            .bind(owner_id)
            .bind(MemberRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Room {} created by user {}", room.id, owner_id);
        Ok(room)
    }

    async fn update_room(
        &self,
        room_id: Uuid,
        patch: &UpdateRoomRequest,
    ) -> Result<Option<RoomRow>, SqlxError> {
        let update_sql = format!(
            r#"
            UPDATE rooms
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                topic = COALESCE($4, topic),
                max_participants = COALESCE($5, max_participants),
                is_public = COALESCE($6, is_public),
                technologies = COALESCE($7, technologies),
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {ROOM_COLUMNS}
            "#
        );
        sqlx::query_as::<_, RoomRow>(&update_sql)
            .bind(room_id)
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.topic.as_deref())
            .bind(patch.max_participants)
            .bind(patch.is_public)
            .bind(patch.technologies.as_deref())
            .fetch_optional(&self.pool)
            .await
    }

    async fn end_room(&self, room_id: Uuid) -> Result<Option<RoomRow>, SqlxError> {
        let mut tx = self.pool.begin().await?;

        let end_sql = format!(
            r#"
            UPDATE rooms
            SET is_active = FALSE, ended_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {ROOM_COLUMNS}
            "#
        );
        let room = sqlx::query_as::<_, RoomRow>(&end_sql)
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?;

        if room.is_some() {
            sqlx::query(
                r#"
                UPDATE room_members
                SET is_active = FALSE, left_at = NOW()
                WHERE room_id = $1 AND is_active = TRUE
                "#,
            )
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(room)
    }

    async fn upsert_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (room_id, user_id)
            DO UPDATE SET is_active = TRUE, left_at = NULL, joined_at = NOW()
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(MemberRole::Participant)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            UPDATE room_members
            SET is_active = FALSE, left_at = NOW()
            WHERE room_id = $1 AND user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_contribution(&self, room_id: Uuid, user_id: Uuid) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            UPDATE room_members
            SET contribution_count = contribution_count + 1
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
