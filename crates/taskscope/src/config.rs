//! CLI configuration.
//!
//! Reads the same `<data dir>/config.toml` as the server. Tables the CLI has
//! no use for (such as `[server]`) are ignored.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use taskscope_core::TaskscopeConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(flatten)]
    pipeline: TaskscopeConfig,
}

/// Main CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all local state (default: ~/.taskscope)
    pub data_dir: PathBuf,
    /// Optional overrides file
    pub config_path: PathBuf,
    /// Response cache shared with the server
    pub cache_db: PathBuf,
    /// Token file written by the server
    pub token_file: PathBuf,
    /// Pipeline settings
    pub pipeline: TaskscopeConfig,
}

impl Config {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_path: data_dir.join("config.toml"),
            cache_db: data_dir.join("cache.db"),
            token_file: data_dir.join("server").join("access-token"),
            pipeline: TaskscopeConfig::default(),
            data_dir,
        }
    }

    /// Load from `$TASKSCOPE_DIR` (or ~/.taskscope), config.toml and environment.
    pub fn load() -> Result<Self> {
        let data_dir = std::env::var("TASKSCOPE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".taskscope")
            });

        let mut config = Self::with_data_dir(data_dir);
        if config.config_path.exists() {
            let raw = std::fs::read_to_string(&config.config_path)
                .with_context(|| format!("reading {}", config.config_path.display()))?;
            config.apply_toml(&raw)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.pipeline.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(raw).context("parsing config.toml")?;
        let api_key = file
            .pipeline
            .analysis
            .api_key
            .clone()
            .or(self.pipeline.analysis.api_key.take());
        self.pipeline = file.pipeline;
        self.pipeline.analysis.api_key = api_key;
        Ok(())
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = var("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.pipeline.analysis.api_key = Some(key);
        }
        if let Some(model) = var("TASKSCOPE_MODEL") {
            self.pipeline.analysis.model = model;
        }
        if let Some(ttl) = var("TASKSCOPE_CACHE_TTL_SECS") {
            self.pipeline.cache.ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("TASKSCOPE_CACHE_TTL_SECS must be an integer, got '{}'", ttl))?;
        }
        if let Some(enabled) = var("TASKSCOPE_CACHE_ENABLED") {
            self.pipeline.cache.enabled = match enabled.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => anyhow::bail!("TASKSCOPE_CACHE_ENABLED must be a boolean, got '{}'", enabled),
            };
        }
        Ok(())
    }

    /// Create the data directory if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        Ok(())
    }
}
