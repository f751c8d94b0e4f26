//! `/health` and `/stats` response bodies.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered `WebSocket` clients.
    pub connections: usize,
    /// Server start time, RFC 3339.
    pub started_at: String,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
    connections: usize,
    shutting_down: bool,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        started_at: started_at.to_rfc3339(),
    }
}

/// `/stats` response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsResponse {
    /// Registered `WebSocket` clients.
    pub client_count: usize,
}
