//! Server configuration.
//!
//! Layered: built-in defaults, then `<data dir>/config.toml`, then `TASKSCOPE_*`
//! environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use taskscope_core::TaskscopeConfig;

const DEFAULT_BIND: &str = "127.0.0.1:7420";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `TASKSCOPE_LOG_FORMAT`; anything but `json` is pretty
    pub fn from_env() -> Self {
        match std::env::var("TASKSCOPE_LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// `[server]` table of config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    bind: Option<String>,
    cancel_on_disconnect: Option<bool>,
}

/// On-disk config.toml layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerSection,
    #[serde(flatten)]
    pipeline: TaskscopeConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all server state
    pub data_dir: PathBuf,
    /// Path to configuration file
    pub config_path: PathBuf,
    /// HTTP listen address
    pub bind: SocketAddr,
    /// PID file path
    pub pid_file: PathBuf,
    /// Access token file path
    pub token_file: PathBuf,
    /// SQLite response cache
    pub cache_db: PathBuf,
    /// Where uploaded documents are stored
    pub upload_dir: PathBuf,
    /// Cancel a connection's runs when it disconnects
    pub cancel_on_disconnect: bool,
    /// Analysis, cache, upload and reaper settings
    pub pipeline: TaskscopeConfig,
}

impl Config {
    /// Defaults rooted at `data_dir`
    ///
    /// ```text
    /// <data dir>/
    /// ├── config.toml        # Optional overrides
    /// ├── cache.db           # Response cache
    /// ├── uploads/           # Stored documents
    /// └── server/
    ///     ├── access-token   # Token clients present (0600)
    ///     └── server.pid     # PID file
    /// ```
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let server_dir = data_dir.join("server");
        Self {
            config_path: data_dir.join("config.toml"),
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|e| unreachable!("static address: {e}")),
            pid_file: server_dir.join("server.pid"),
            token_file: server_dir.join("access-token"),
            cache_db: data_dir.join("cache.db"),
            upload_dir: data_dir.join("uploads"),
            cancel_on_disconnect: false,
            pipeline: TaskscopeConfig::default(),
            data_dir,
        }
    }

    /// Load configuration from file, environment and defaults, and create
    /// the directory layout
    pub fn load() -> anyhow::Result<Self> {
        let data_dir = std::env::var("TASKSCOPE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mut config = Self::with_data_dir(data_dir);
        if config.config_path.exists() {
            let raw = std::fs::read_to_string(&config.config_path)
                .with_context(|| format!("reading {}", config.config_path.display()))?;
            config.apply_toml(&raw)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;

        config
            .pipeline
            .validate()
            .context("invalid configuration")?;

        std::fs::create_dir_all(config.server_dir())?;
        std::fs::create_dir_all(&config.upload_dir)?;

        Ok(config)
    }

    pub fn server_dir(&self) -> PathBuf {
        self.data_dir.join("server")
    }

    /// Merge a config.toml document
    pub fn apply_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: FileConfig = toml::from_str(raw).context("parsing config.toml")?;
        if let Some(bind) = file.server.bind {
            self.bind = parse_bind(&bind)?;
        }
        if let Some(cancel) = file.server.cancel_on_disconnect {
            self.cancel_on_disconnect = cancel;
        }
        // Keep a key from the environment if the file doesn't set one
        let api_key = file.pipeline.analysis.api_key.clone().or(self.pipeline.analysis.api_key.take());
        self.pipeline = file.pipeline;
        self.pipeline.analysis.api_key = api_key;
        Ok(())
    }

    /// Apply `TASKSCOPE_*` (and `ANTHROPIC_API_KEY`) overrides
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(bind) = var("TASKSCOPE_BIND") {
            self.bind = parse_bind(&bind)?;
        }
        if let Some(key) = var("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.pipeline.analysis.api_key = Some(key);
        }
        if let Some(model) = var("TASKSCOPE_MODEL") {
            self.pipeline.analysis.model = model;
        }
        if let Some(mb) = var("TASKSCOPE_MAX_FILE_SIZE_MB") {
            let mb: u64 = parse_num("TASKSCOPE_MAX_FILE_SIZE_MB", &mb)?;
            self.pipeline.upload.max_file_size = mb * 1024 * 1024;
        }
        if let Some(n) = var("TASKSCOPE_MAX_FILES") {
            self.pipeline.upload.max_files = parse_num("TASKSCOPE_MAX_FILES", &n)?;
        }
        if let Some(ttl) = var("TASKSCOPE_CACHE_TTL_SECS") {
            self.pipeline.cache.ttl_secs = parse_num("TASKSCOPE_CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(enabled) = var("TASKSCOPE_CACHE_ENABLED") {
            self.pipeline.cache.enabled = parse_bool("TASKSCOPE_CACHE_ENABLED", &enabled)?;
        }
        if let Some(idle) = var("TASKSCOPE_WORKSHOP_IDLE_SECS") {
            self.pipeline.reaper.idle_ttl_secs = parse_num("TASKSCOPE_WORKSHOP_IDLE_SECS", &idle)?;
        }
        if let Some(cancel) = var("TASKSCOPE_CANCEL_ON_DISCONNECT") {
            self.cancel_on_disconnect = parse_bool("TASKSCOPE_CANCEL_ON_DISCONNECT", &cancel)?;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskscope")
}

fn parse_bind(raw: &str) -> anyhow::Result<SocketAddr> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid bind address '{}'", raw))
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> anyhow::Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", key, raw))
}

fn parse_bool(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be a boolean, got '{}'", key, raw),
    }
}
