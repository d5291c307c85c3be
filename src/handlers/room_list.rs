use axum::{extract::State, http::StatusCode, Json};
use tracing::error;

use crate::models::{ErrorResponse, RoomListResponse};
use crate::AppState;

const LIST_PAGE_SIZE: i64 = 20;

/// Public, active rooms with derived member counts, newest first.
pub async fn room_list(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RoomListResponse>), (StatusCode, Json<ErrorResponse>)> {
    let rooms = state
        .registry
        .list_public_rooms(LIST_PAGE_SIZE)
        .await
        .map_err(|e| {
            error!("Room listing failed: {}", e);
            ErrorResponse::of(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get rooms")
        })?;

    Ok((StatusCode::OK, Json(RoomListResponse { rooms })))
}
