use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::error;
use uuid::Uuid;

use crate::models::{ErrorResponse, RoomResponse};
use crate::AppState;

/// Look up an active room by id.
pub async fn room_detail(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RoomResponse>), (StatusCode, Json<ErrorResponse>)> {
    let room = state
        .registry
        .find_active_room(room_id)
        .await
        .map_err(|e| {
            error!("Room lookup failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get room")
        })?;

    match room {
        Some(room) => Ok((StatusCode::OK, Json(RoomResponse::from(room)))),
        None => Err(ErrorResponse::of(
            StatusCode::NOT_FOUND,
            "Room not found or inactive",
        )),
    }
}

/// Look up an active room by its human-enterable join code.
pub async fn room_by_code(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<(StatusCode, Json<RoomResponse>), (StatusCode, Json<ErrorResponse>)> {
    let room = state
        .registry
        .find_active_room_by_code(&room_code)
        .await
        .map_err(|e| {
            error!("Room lookup by code failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get room")
        })?;

    match room {
        Some(room) => Ok((StatusCode::OK, Json(RoomResponse::from(room)))),
        None => Err(ErrorResponse::of(
            StatusCode::NOT_FOUND,
            "Room not found or inactive",
        )),
    }
}
