//! Health check endpoint.

use crate::server::PostboxRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of open connections.
    pub connections: usize,
    /// Number of registered clients.
    pub clients: u64,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
///
/// Reports `degraded` when the client table cannot be read.
pub async fn health_handler(Extension(relay): Extension<Arc<PostboxRelay>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let (status, clients) = match relay.registry().count().await {
        Ok(count) => ("ok", count),
        Err(e) => {
            tracing::error!("Health check could not count clients: {}", e);
            ("degraded", 0)
        }
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: relay.active_connections(),
        clients,
        uptime_seconds: uptime,
    })
}
