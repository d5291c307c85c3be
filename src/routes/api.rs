use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    diagnostics, health_check, ready_check, room_by_code, room_create, room_detail, room_end,
    room_list, room_update,
};
use crate::routes::auth_middleware::auth_middleware;
use crate::AppState;

/// Create API routes
pub fn create_api_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/rooms", post(room_create).get(room_list))
        .route("/v1/rooms/code/:room_code", get(room_by_code))
        .route("/v1/rooms/:room_id", get(room_detail).patch(room_update))
        .route("/v1/rooms/:room_id/end", post(room_end))
        .route_layer(middleware::from_fn(auth_middleware)); // Applies to all routes added above

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(protected)
}
