use axum::{extract::State, http::StatusCode, Extension, Json};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::error;
use uuid::Uuid;

use crate::models::{CreateRoomRequest, ErrorResponse, RoomMeta, RoomResponse};
use crate::AppState;

const ROOM_CODE_LENGTH: usize = 8;
const ROOM_CODE_ATTEMPTS: usize = 10;

fn generate_room_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_CODE_LENGTH)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

/// Create a room. The caller becomes its owner; the owner membership is
/// written in the same transaction as the room itself.
pub async fn room_create(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(message) = request.validate() {
        return Err(ErrorResponse::of(StatusCode::BAD_REQUEST, message));
    }

    // Join codes are human-enterable and unique; collide-and-retry with a
    // bounded number of attempts.
    let mut room_code = None;
    for _ in 0..ROOM_CODE_ATTEMPTS {
        let candidate = generate_room_code();
        let exists = state
            .registry
            .room_code_exists(&candidate)
            .await
            .map_err(|e| {
                error!("Room code lookup failed: {}", e);
                ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create room")
            })?;
        if !exists {
            room_code = Some(candidate);
            break;
        }
    }
    let Some(room_code) = room_code else {
        return Err(ErrorResponse::of(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate unique room code",
        ));
    };

    let room = state
        .registry
        .create_room(user_id, &request, &room_code)
        .await
        .map_err(|e| {
            error!("Room creation failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create room")
        })?;

    state.cache.set_room_meta(
        room.id,
        &RoomMeta {
            name: room.name.clone(),
            topic: room.topic.clone(),
            owner_id: room.owner_id,
            created_at: room.created_at,
        },
    );

    Ok((StatusCode::CREATED, Json(RoomResponse::from(room))))
}
