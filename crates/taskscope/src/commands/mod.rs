//! Command implementations for the taskscope CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod analyze;
pub mod cache;
pub mod doctor;
pub mod extract;

use std::sync::Arc;

use anyhow::{Context, Result};
use taskscope_core::ResponseCache;
use taskscope_core::cache::SqliteCacheBackend;

use crate::config::Config;

/// Open the response cache shared with the server.
pub fn open_cache(config: &Config) -> Result<Arc<ResponseCache>> {
    config.ensure_dirs()?;
    let backend = SqliteCacheBackend::open_path(&config.cache_db)
        .with_context(|| format!("opening cache at {}", config.cache_db.display()))?;
    Ok(Arc::new(ResponseCache::new(
        Arc::new(backend),
        config.pipeline.cache.clone(),
    )))
}
