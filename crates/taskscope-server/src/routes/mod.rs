//! API route modules.

pub mod cache;
pub mod health;
pub mod workshops;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::middleware::auth_middleware;
use crate::state::AppState;
use crate::ws;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Protected routes (require auth)
    let api_routes = Router::new()
        .merge(workshops::router())
        .merge(cache::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Checked before the upgrade, like any other request
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(ws_routes)
        .nest("/api", api_routes)
        .with_state(state)
}
