use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Live counters and host stats reported by the diagnostics endpoint.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub live_rooms: u32,
    pub live_connections: u32,
    pub connected_users: u32,
    pub cache_entries: u64,
    pub cpu_usage: f32,
    pub memory_used: u64,
    pub memory_free: u64,
    pub memory_total: u64,
}
