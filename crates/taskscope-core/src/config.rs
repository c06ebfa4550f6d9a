//! Configuration for the analysis pipeline.
//!
//! Every struct has sensible defaults; binaries layer file and environment
//! overrides on top and call [`TaskscopeConfig::validate`] before use.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskscopeConfig {
    pub analysis: AnalysisConfig,
    pub cache: CacheConfig,
    pub upload: UploadPolicy,
    pub reaper: ReaperConfig,
}

impl TaskscopeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set analysis configuration
    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Set cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set upload limits
    pub fn with_upload(mut self, upload: UploadPolicy) -> Self {
        self.upload = upload;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.analysis.max_input_chars == 0 {
            return Err(ConfigValidationError::invalid(
                "analysis.max_input_chars",
                "must be greater than 0",
            ));
        }

        if self.analysis.max_tokens == 0 {
            return Err(ConfigValidationError::invalid(
                "analysis.max_tokens",
                "must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.analysis.temperature) {
            return Err(ConfigValidationError::invalid(
                "analysis.temperature",
                "must be between 0 and 1",
            ));
        }

        if self.analysis.model.trim().is_empty() {
            return Err(ConfigValidationError::invalid("analysis.model", "must not be empty"));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigValidationError::invalid(
                "cache.ttl_secs",
                "must be greater than 0 when the cache is enabled",
            ));
        }

        if self.upload.max_file_size == 0 || self.upload.max_files == 0 {
            return Err(ConfigValidationError::invalid(
                "upload",
                "size and file-count limits must be greater than 0",
            ));
        }

        if self.reaper.enabled() && self.reaper.interval_secs == 0 {
            return Err(ConfigValidationError::invalid(
                "reaper.interval_secs",
                "must be greater than 0 when idle reaping is enabled",
            ));
        }

        Ok(())
    }
}

/// LLM analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Provider API key. `None` selects the heuristic extractor.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Provider base URL (default: https://api.anthropic.com)
    pub api_base_url: String,

    /// Model identifier
    pub model: String,

    /// Characters of document text sent per request (default: 8000)
    pub max_input_chars: usize,

    /// Output token budget (default: 4000)
    pub max_tokens: u32,

    /// Sampling temperature (default: 0.3)
    pub temperature: f32,

    /// Per-request timeout in seconds (default: 120)
    pub request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_input_chars: 8000,
            max_tokens: 4000,
            temperature: 0.3,
            request_timeout_secs: 120,
        }
    }
}

impl AnalysisConfig {
    /// Whether a provider credential is configured
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether lookups and stores happen at all (default: true)
    pub enabled: bool,

    /// Entry lifetime in seconds (default: 86400 = 24 hours)
    pub ttl_secs: u64,

    /// Days of hit/miss counters kept (default: 7)
    pub metrics_retention_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 86_400,
            metrics_retention_days: 7,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Maximum bytes per file (default: 50 MiB)
    pub max_file_size: u64,

    /// Maximum files per upload batch (default: 10)
    pub max_files: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_files: 10,
        }
    }
}

/// Idle workshop reaping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Workshops untouched for this long are removed. 0 disables reaping.
    /// (default: 86400 = 24 hours)
    pub idle_ttl_secs: u64,

    /// Sweep interval in seconds (default: 600 = 10 minutes)
    pub interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 86_400,
            interval_secs: 600,
        }
    }
}

impl ReaperConfig {
    pub fn enabled(&self) -> bool {
        self.idle_ttl_secs > 0
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigValidationError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigValidationError> for crate::error::Error {
    fn from(e: ConfigValidationError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TaskscopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.max_input_chars, 8000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.upload.max_file_size, 52_428_800);
        assert!(!config.analysis.has_credentials());
    }

    #[test]
    fn test_rejects_zero_ttl_when_enabled() {
        let config = TaskscopeConfig::new().with_cache(CacheConfig {
            ttl_secs: 0,
            ..Default::default()
        });
        assert!(config.validate().is_err());

        let disabled = TaskscopeConfig::new().with_cache(CacheConfig {
            enabled: false,
            ttl_secs: 0,
            ..Default::default()
        });
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let config = TaskscopeConfig::new().with_analysis(AnalysisConfig {
            temperature: 1.5,
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analysis.temperature"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TaskscopeConfig = serde_json::from_str(r#"{"cache": {"ttl_secs": 60}}"#).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.enabled);
        assert_eq!(config.upload.max_files, 10);
    }

    #[test]
    fn test_blank_api_key_is_not_a_credential() {
        let analysis = AnalysisConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        assert!(!analysis.has_credentials());
    }
}
