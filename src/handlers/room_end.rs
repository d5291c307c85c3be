use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{ErrorResponse, RoomResponse, ServerEvent};
use crate::AppState;

/// End a room. Owner only.
///
/// The registry cascade marks every active membership inactive; after that,
/// every trace of the room is swept out of the live layer: members still
/// connected are told, the broadcast group is closed and the cache entries
/// are purged. An ended room accepts no further joins or content changes.
pub async fn room_end(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(room_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RoomResponse>), (StatusCode, Json<ErrorResponse>)> {
    let room = state
        .registry
        .find_active_room(room_id)
        .await
        .map_err(|e| {
            error!("Room lookup failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to end room")
        })?
        .ok_or_else(|| ErrorResponse::of(StatusCode::NOT_FOUND, "Room not found or inactive"))?;

    if room.owner_id != user_id {
        return Err(ErrorResponse::of(
            StatusCode::FORBIDDEN,
            "Only the room owner can end the room",
        ));
    }

    let ended = state
        .registry
        .end_room(room_id)
        .await
        .map_err(|e| {
            error!("Room end failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to end room")
        })?
        .ok_or_else(|| ErrorResponse::of(StatusCode::NOT_FOUND, "Room not found or inactive"))?;

    // Tell everyone still present before their feeds go away.
    let present = state.cache.presence(room_id);
    let notice = ServerEvent::error("Room has ended");
    for member_id in present.keys() {
        state.presence.send_to_user(*member_id, &notice);
    }

    state.groups.close(room_id).await;
    state.cache.purge_room(room_id);

    info!("Room {} ended by owner {}", room_id, user_id);
    Ok((StatusCode::OK, Json(RoomResponse::from(ended))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RoomCache;
    use crate::db::RoomRegistry;
    use crate::models::PresenceRecord;
    use crate::testutil::MemoryRegistry;
    use crate::ws::{groups::RoomGroups, presence_index::PresenceIndex};
    use axum::extract::{Path, State};
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::sync::{broadcast, mpsc};

    fn app_state(registry: Arc<MemoryRegistry>) -> AppState {
        AppState {
            registry,
            cache: RoomCache::new(),
            groups: Arc::new(RoomGroups::new()),
            presence: Arc::new(PresenceIndex::new()),
        }
    }

    #[tokio::test]
    async fn owner_end_sweeps_the_live_layer() {
        let registry = Arc::new(MemoryRegistry::new());
        let state = app_state(registry.clone());
        let owner = registry.add_user("ada");
        let member = registry.add_user("bob");
        let room = registry.add_room(&owner, 10, true);

        registry
            .upsert_membership(room.id, member.id)
            .await
            .expect("membership");
        state.cache.set_content(room.id, "notes");
        state.cache.put_presence(
            room.id,
            member.id,
            &PresenceRecord {
                username: member.username.clone(),
                first_name: member.first_name.clone(),
                profile_image: None,
                joined_at: Utc::now(),
                connection_id: Uuid::new_v4(),
            },
        );
        let mut group_rx = state.groups.subscribe(room.id).await;
        let (tx, mut member_rx) = mpsc::unbounded_channel();
        state.presence.register(Uuid::new_v4(), member.id, tx);

        let (status, Json(response)) =
            room_end(State(state.clone()), Extension(owner.id), Path(room.id))
                .await
                .expect("room end");
        assert_eq!(status, StatusCode::OK);
        assert!(!response.is_active);
        assert!(response.ended_at.is_some());

        // Durable cascade
        let membership = registry.membership(room.id, member.id).expect("membership row");
        assert!(!membership.is_active);
        assert!(membership.left_at.is_some());

        // Live layer swept
        assert_eq!(state.cache.content(room.id), "");
        assert!(state.cache.presence(room.id).is_empty());
        assert!(!state.groups.contains(room.id).await);
        assert!(matches!(
            group_rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        // Members still connected were told
        match member_rx.try_recv().expect("notice") {
            ServerEvent::RoomError { message } => assert_eq!(message, "Room has ended"),
            other => panic!("expected room-error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_owner_cannot_end_the_room() {
        let registry = Arc::new(MemoryRegistry::new());
        let state = app_state(registry.clone());
        let owner = registry.add_user("ada");
        let intruder = registry.add_user("mallory");
        let room = registry.add_room(&owner, 10, true);

        let result = room_end(State(state), Extension(intruder.id), Path(room.id)).await;
        let (status, _) = result.err().expect("rejection");
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(registry.membership(room.id, owner.id).expect("owner row").is_active);
    }

    #[tokio::test]
    async fn ending_a_missing_room_is_not_found() {
        let registry = Arc::new(MemoryRegistry::new());
        let state = app_state(registry.clone());
        let owner = registry.add_user("ada");

        let result = room_end(State(state), Extension(owner.id), Path(Uuid::new_v4())).await;
        let (status, _) = result.err().expect("rejection");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
