//! ReaperService - periodic cleanup of idle workshops
//!
//! Workshops live in memory and their documents on disk. Anything untouched
//! for longer than the idle TTL is removed on each sweep, along with expired
//! cache entries. Workshops with a run in progress are never reaped.

use std::sync::Arc;

use taskscope_core::config::ReaperConfig;
use taskscope_core::{ResponseCache, WorkshopOrchestrator};
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Outcome of one sweep
#[derive(Debug, Default, PartialEq)]
pub struct SweepResult {
    pub reaped_workshops: Vec<String>,
    pub purged_cache_entries: usize,
}

pub struct ReaperService {
    orchestrator: Arc<WorkshopOrchestrator>,
    cache: Arc<ResponseCache>,
    config: ReaperConfig,
    handle: Mutex<Option<tokio::task::AbortHandle>>,
}

impl ReaperService {
    pub fn new(
        orchestrator: Arc<WorkshopOrchestrator>,
        cache: Arc<ResponseCache>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            orchestrator,
            cache,
            config,
            handle: Mutex::new(None),
        }
    }

    /// Run one sweep now
    pub async fn sweep(&self) -> SweepResult {
        let reaped_workshops = if self.config.enabled() {
            match self.orchestrator.reap_idle(self.config.idle_ttl()).await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(error = %e, "Idle workshop sweep failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let purged_cache_entries = self.cache.purge_expired();
        debug!(
            reaped = reaped_workshops.len(),
            purged = purged_cache_entries,
            "Sweep finished"
        );

        SweepResult {
            reaped_workshops,
            purged_cache_entries,
        }
    }

    /// Start sweeping every `interval`. Returns false when reaping is
    /// disabled by configuration.
    pub async fn start(self: Arc<Self>) -> bool {
        if !self.config.enabled() {
            info!("Idle workshop reaping disabled");
            return false;
        }

        let mut guard = self.handle.lock().await;
        if let Some(previous) = guard.take() {
            previous.abort();
        }

        info!(
            idle_ttl_secs = self.config.idle_ttl_secs,
            interval_secs = self.config.interval_secs,
            "Starting idle workshop reaper"
        );

        let service = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let mut ticker = interval(service.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; nothing is idle at startup
            ticker.tick().await;

            loop {
                ticker.tick().await;
                service.sweep().await;
            }
        });

        *guard = Some(task.abort_handle());
        true
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
            info!("Stopped idle workshop reaper");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
