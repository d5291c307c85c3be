use utoipa::OpenApi;

use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a new room
#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created successfully", body = RoomResponse),
        (status = 400, description = "Invalid room parameters", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_create_doc() {}

/// List public rooms
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    responses(
        (status = 200, description = "Public active rooms, newest first", body = RoomListResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_list_doc() {}

/// Get a room by id
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    responses(
        (status = 200, description = "Room found", body = RoomResponse),
        (status = 404, description = "Room not found or inactive", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_detail_doc() {}

/// Update a room
#[utoipa::path(
    patch,
    path = "/api/v1/rooms/{room_id}",
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Room updated", body = RoomResponse),
        (status = 403, description = "Caller is not the room owner", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_update_doc() {}

/// End a room
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/end",
    responses(
        (status = 200, description = "Room ended", body = RoomResponse),
        (status = 403, description = "Caller is not the room owner", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_end_doc() {}

/// Service diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Live counters and host stats", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        room_create_doc,
        room_list_doc,
        room_detail_doc,
        room_update_doc,
        room_end_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            ErrorResponse,
            CreateRoomRequest,
            UpdateRoomRequest,
            RoomResponse,
            RoomListResponse,
            RoomSummary,
            PublicProfile,
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
