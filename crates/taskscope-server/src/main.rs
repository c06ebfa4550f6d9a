//! taskscope-server - Taskscope backend server
//!
//! REST API for workshops and uploads, plus a WebSocket channel that streams
//! analysis progress.

use std::path::Path;
use std::sync::Arc;

use taskscope_core::auth::AccessToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod error;
mod middleware;
mod rooms;
mod routes;
mod services;
mod state;
mod ws;

use config::{Config, LogFormat};
use services::ReaperService;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    info!("taskscope-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!(data_dir = %config.data_dir.display(), bind = %config.bind, "Config loaded");

    // Check for existing server
    if config.pid_file.exists() {
        let pid_str = std::fs::read_to_string(&config.pid_file)?;
        if let Ok(pid) = pid_str.trim().parse::<i32>() {
            if process_exists(pid) {
                anyhow::bail!("Server already running with PID {}", pid);
            }
        }
        info!("Cleaning up stale PID file from previous crash");
        let _ = std::fs::remove_file(&config.pid_file);
    }

    let access_token = AccessToken::load_or_generate(&config.token_file)?;
    info!(
        token_id = %access_token.token_id,
        path = %config.token_file.display(),
        "Access token ready"
    );

    let bind = config.bind;
    let pid_file = config.pid_file.clone();
    let reaper_config = config.pipeline.reaper.clone();
    let state = AppState::new(config, access_token)?;

    let reaper = Arc::new(ReaperService::new(
        state.orchestrator.clone(),
        state.cache.clone(),
        reaper_config,
    ));
    reaper.clone().start().await;

    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    std::fs::write(&pid_file, std::process::id().to_string())?;
    info!(addr = %listener.local_addr()?, "Server ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.stop().await;
    remove_pid_file(&pid_file);
    served?;
    Ok(())
}

fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("taskscope_server=info".parse()?)
        .add_directive("taskscope_core=info".parse()?);

    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(error = %e, path = %path.display(), "Failed to remove PID file");
    }
}

/// Check if a process exists by PID
fn process_exists(pid: i32) -> bool {
    // On Unix, sending signal 0 checks if process exists
    unsafe { libc::kill(pid, 0) == 0 }
}
