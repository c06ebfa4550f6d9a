//! Response cache routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use serde::Serialize;
use taskscope_core::CacheStats;
use tracing::info;

use crate::state::AppState;

/// Create cache router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cache", delete(clear_cache))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/scopes/{scope}", delete(invalidate_scope))
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

/// Today's and the retained window's hit/miss figures
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Drop every entry stored under a scope (e.g. `domains:Sales|Finance`)
pub async fn invalidate_scope(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Json<RemovedResponse> {
    let removed = state.cache.invalidate(&scope);
    info!(scope = %scope, removed, "Cache scope invalidated");
    Json(RemovedResponse { removed })
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<RemovedResponse> {
    let removed = state.cache.clear();
    info!(removed, "Cache cleared");
    Json(RemovedResponse { removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use serde_json::json;
    use taskscope_core::cache::CacheRequest;

    #[tokio::test]
    async fn test_invalidate_scope_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let request = CacheRequest::new("prompt", json!({})).with_scope("domains:Sales");
        state.cache.set(&request, "[]");
        assert!(state.cache.get(&request).is_some());

        let Json(stats) = cache_stats(State(state.clone())).await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);

        let Json(removed) =
            invalidate_scope(State(state.clone()), Path("domains:Sales".to_string())).await;
        assert_eq!(removed.removed, 1);

        let Json(cleared) = clear_cache(State(state)).await;
        assert_eq!(cleared.removed, 0);
    }
}
