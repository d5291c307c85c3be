use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::error;
use uuid::Uuid;

use crate::models::{ErrorResponse, RoomResponse, UpdateRoomRequest};
use crate::AppState;

/// Update room metadata. Owner only.
pub async fn room_update(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(room_id): Path<Uuid>,
    Json(patch): Json<UpdateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(message) = patch.validate() {
        return Err(ErrorResponse::of(StatusCode::BAD_REQUEST, message));
    }

    let room = state
        .registry
        .find_active_room(room_id)
        .await
        .map_err(|e| {
            error!("Room lookup failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update room")
        })?
        .ok_or_else(|| ErrorResponse::of(StatusCode::NOT_FOUND, "Room not found or inactive"))?;

    if room.owner_id != user_id {
        return Err(ErrorResponse::of(
            StatusCode::FORBIDDEN,
            "Only the room owner can update the room",
        ));
    }

    let updated = state
        .registry
        .update_room(room_id, &patch)
        .await
        .map_err(|e| {
            error!("Room update failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update room")
        })?
        .ok_or_else(|| ErrorResponse::of(StatusCode::NOT_FOUND, "Room not found or inactive"))?;

    Ok((StatusCode::OK, Json(RoomResponse::from(updated))))
}
