use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::error;

use crate::models::{DiagnosticsResponse, ErrorResponse};
use crate::AppState;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Live service counters plus host CPU and memory stats.
pub async fn diagnostics(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let live_rooms = state.groups.room_count().await as u32;
    let live_connections = state.presence.connection_count() as u32;
    let connected_users = state.presence.user_count() as u32;
    let cache_entries = state.cache.entry_count();

    let (cpu_usage, memory_used, memory_free, memory_total) = {
        let monitor = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match monitor.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(e) => {
                error!("Failed to lock system monitor: {}", e);
                return Err(ErrorResponse::of(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read system stats",
                ));
            }
        }
    };

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            live_rooms,
            live_connections,
            connected_users,
            cache_entries,
            cpu_usage,
            memory_used,
            memory_free,
            memory_total,
        }),
    ))
}
