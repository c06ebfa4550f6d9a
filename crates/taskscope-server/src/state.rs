//! Application state.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use anyhow::Context;
use taskscope_core::auth::AccessToken;
use taskscope_core::cache::SqliteCacheBackend;
use taskscope_core::{
    AnalysisEngine, FileIntake, InMemoryWorkshopStore, ResponseCache, WorkshopOrchestrator,
};
use tracing::info;

use crate::config::Config;
use crate::rooms::RoomRegistry;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Workshop lifecycle and analysis runs
    pub orchestrator: Arc<WorkshopOrchestrator>,
    /// Provider response cache
    pub cache: Arc<ResponseCache>,
    /// SQLite handle behind `cache`, for health checks
    pub cache_db: Option<Arc<SqliteCacheBackend>>,
    /// Upload validation and storage
    pub intake: Arc<FileIntake>,
    /// Token clients must present
    pub access_token: Arc<AccessToken>,
    /// Connections watching each workshop
    pub rooms: Arc<RoomRegistry>,
    /// Open WebSocket connections
    pub ws_connections: AtomicUsize,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build the full pipeline from configuration
    pub fn new(config: Config, access_token: AccessToken) -> anyhow::Result<Arc<Self>> {
        let pipeline = &config.pipeline;

        let cache_db = Arc::new(
            SqliteCacheBackend::open_path(&config.cache_db)
                .with_context(|| format!("opening cache at {}", config.cache_db.display()))?,
        );
        let cache = Arc::new(ResponseCache::new(cache_db.clone(), pipeline.cache.clone()));

        let engine = AnalysisEngine::from_config(pipeline.analysis.clone(), cache.clone())?;
        info!(
            provider = engine.provider_name(),
            model = %pipeline.analysis.model,
            cache_enabled = pipeline.cache.enabled,
            "Analysis engine ready"
        );

        let orchestrator = Arc::new(WorkshopOrchestrator::new(
            Arc::new(InMemoryWorkshopStore::new()),
            Arc::new(engine),
        ));
        let intake = FileIntake::new(&config.upload_dir, pipeline.upload.clone())?;

        Ok(Self::from_parts(
            config,
            orchestrator,
            cache,
            Some(cache_db),
            intake,
            access_token,
        ))
    }

    pub fn from_parts(
        config: Config,
        orchestrator: Arc<WorkshopOrchestrator>,
        cache: Arc<ResponseCache>,
        cache_db: Option<Arc<SqliteCacheBackend>>,
        intake: FileIntake,
        access_token: AccessToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            orchestrator,
            cache,
            cache_db,
            intake: Arc::new(intake),
            access_token: Arc::new(access_token),
            rooms: Arc::new(RoomRegistry::new()),
            ws_connections: AtomicUsize::new(0),
            start_time: Instant::now(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use taskscope_core::config::{AnalysisConfig, CacheConfig};

    /// Heuristic-only state over a temporary directory
    pub fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        let config = Config::with_data_dir(dir);
        let cache = Arc::new(ResponseCache::in_memory(CacheConfig::default()));
        let engine = AnalysisEngine::new(None, cache.clone(), AnalysisConfig::default());
        let orchestrator = Arc::new(WorkshopOrchestrator::new(
            Arc::new(InMemoryWorkshopStore::new()),
            Arc::new(engine),
        ));
        let intake = FileIntake::new(&config.upload_dir, config.pipeline.upload.clone()).unwrap();
        AppState::from_parts(config, orchestrator, cache, None, intake, AccessToken::generate())
    }
}
