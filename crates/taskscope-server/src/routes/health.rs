//! Health check endpoint.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
    pub metrics: HealthMetrics,
}

#[derive(Serialize)]
pub struct HealthComponents {
    /// Whether the cache database answers (true when running without one)
    pub cache_db: bool,
    pub cache_enabled: bool,
    /// `anthropic` or `heuristic`
    pub analysis_provider: String,
}

#[derive(Serialize)]
pub struct HealthMetrics {
    pub workshops: usize,
    pub websocket_connections: usize,
    pub rooms: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let cache_db = state
        .cache_db
        .as_ref()
        .map(|db| db.ping().is_ok())
        .unwrap_or(true);

    let workshops = state
        .orchestrator
        .list_workshops()
        .map(|w| w.len())
        .unwrap_or(0);

    let status = if cache_db { "healthy" } else { "degraded" };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            cache_db,
            cache_enabled: state.cache.is_enabled(),
            analysis_provider: state.orchestrator.engine().provider_name().to_string(),
        },
        metrics: HealthMetrics {
            workshops,
            websocket_connections: state.ws_connections.load(Ordering::SeqCst),
            rooms: state.rooms.room_count(),
        },
    })
}
