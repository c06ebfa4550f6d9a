//! Content-addressed cache of LLM provider responses.
//!
//! Keys are the SHA-256 of the normalized prompt plus its structured context,
//! so two requests that differ only in whitespace or letter case share an
//! entry. Each lookup bumps a per-day hit or miss counter.
//!
//! The cache is an optimization: backend failures are logged and then treated
//! as a miss (or a no-op), never returned to the caller.

pub mod backend;
#[cfg(feature = "db")]
pub mod sqlite;

pub use backend::{CacheBackend, CounterKind, DailyCounters, MemoryCacheBackend};
#[cfg(feature = "db")]
pub use sqlite::SqliteCacheBackend;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Collapse whitespace runs to one space, trim, lowercase
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key for a prompt and its context
pub fn cache_key(prompt: &str, context: &serde_json::Value) -> String {
    let material = serde_json::json!({
        "prompt": normalize_prompt(prompt),
        "context": context,
    });
    let mut hasher = Sha256::new();
    hasher.update(material.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A cacheable request
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub prompt: String,
    pub context: serde_json::Value,
    /// Tag used for bulk invalidation
    pub scope: Option<String>,
}

impl CacheRequest {
    pub fn new(prompt: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            prompt: prompt.into(),
            context,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn key(&self) -> String {
        cache_key(&self.prompt, &self.context)
    }
}

/// Hit/miss accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    /// Live entries
    pub entries: usize,
    /// Today (UTC)
    pub hits: u64,
    pub misses: u64,
    /// Percentage, two decimals
    pub hit_rate: f64,
    /// Whole retention window
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    let pct = hits as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Response cache over a pluggable backend
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Process-local cache
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new()), config)
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self::in_memory(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// First day still inside the metrics retention window
    fn window_start(&self) -> String {
        let days = u64::from(self.config.metrics_retention_days.max(1) - 1);
        Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(days))
            .unwrap_or_else(|| Utc::now().date_naive())
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Look up a cached response, counting the hit or miss
    pub fn get(&self, request: &CacheRequest) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let key = request.key();
        let found = match self.backend.get(&key, Utc::now().timestamp()) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Response cache lookup failed");
                None
            }
        };

        let kind = if found.is_some() {
            CounterKind::Hit
        } else {
            CounterKind::Miss
        };
        if let Err(e) = self.backend.incr_counter(&Self::today(), kind) {
            warn!(error = %e, "Failed to record cache metric");
        }
        debug!(key = %&key[..12], hit = found.is_some(), "Response cache lookup");

        found
    }

    /// Store a response for the configured TTL
    pub fn set(&self, request: &CacheRequest, response: &str) {
        self.set_with_ttl(request, response, self.config.ttl());
    }

    /// Store a response with an explicit TTL
    pub fn set_with_ttl(&self, request: &CacheRequest, response: &str, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);
        if let Err(e) =
            self.backend
                .set(&request.key(), response, expires_at, request.scope.as_deref())
        {
            warn!(error = %e, "Failed to store cached response");
        }
    }

    /// Drop every entry tagged with `scope`
    pub fn invalidate(&self, scope: &str) -> usize {
        match self.backend.delete_scope(scope) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, scope, "Failed to invalidate cache scope");
                0
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) -> usize {
        match self.backend.clear() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to clear response cache");
                0
            }
        }
    }

    /// Remove expired entries and counters outside the retention window
    pub fn purge_expired(&self) -> usize {
        if let Err(e) = self.backend.prune_counters(&self.window_start()) {
            warn!(error = %e, "Failed to prune cache metrics");
        }
        match self.backend.purge_expired(Utc::now().timestamp()) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to purge expired cache entries");
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .backend
            .len(Utc::now().timestamp())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to count cache entries");
                0
            });

        let days = self
            .backend
            .counters(&self.window_start())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read cache metrics");
                Vec::new()
            });

        let today = Self::today();
        let (hits, misses) = days
            .iter()
            .find(|d| d.day == today)
            .map(|d| (d.hits, d.misses))
            .unwrap_or_default();
        let total_hits = days.iter().map(|d| d.hits).sum();
        let total_misses = days.iter().map(|d| d.misses).sum();

        CacheStats {
            enabled: self.config.enabled,
            entries,
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            total_hits,
            total_misses,
            total_hit_rate: hit_rate(total_hits, total_misses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use serde_json::json;

    /// Backend whose every operation fails
    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn get(&self, _: &str, _: i64) -> Result<Option<String>> {
            Err(Error::Cache("down".into()))
        }
        fn set(&self, _: &str, _: &str, _: i64, _: Option<&str>) -> Result<()> {
            Err(Error::Cache("down".into()))
        }
        fn delete_scope(&self, _: &str) -> Result<usize> {
            Err(Error::Cache("down".into()))
        }
        fn clear(&self) -> Result<usize> {
            Err(Error::Cache("down".into()))
        }
        fn purge_expired(&self, _: i64) -> Result<usize> {
            Err(Error::Cache("down".into()))
        }
        fn len(&self, _: i64) -> Result<usize> {
            Err(Error::Cache("down".into()))
        }
        fn incr_counter(&self, _: &str, _: CounterKind) -> Result<()> {
            Err(Error::Cache("down".into()))
        }
        fn counters(&self, _: &str) -> Result<Vec<DailyCounters>> {
            Err(Error::Cache("down".into()))
        }
        fn prune_counters(&self, _: &str) -> Result<usize> {
            Err(Error::Cache("down".into()))
        }
    }

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(normalize_prompt("  Weekly\n\tREPORT   due "), "weekly report due");
    }

    #[test]
    fn test_known_key_is_stable() {
        let a = cache_key("hello", &json!({"domains": ["Sales"]}));
        assert_eq!(a.len(), 64);
        assert_eq!(a, cache_key("HELLO ", &json!({"domains": ["Sales"]})));
    }

    #[test]
    fn test_whitespace_variants_share_key_but_context_does_not() {
        let ctx = json!({"domains": ["Sales", "Finance"]});
        let a = CacheRequest::new("1. Weekly report\n- takes 30 minutes", ctx.clone());
        let b = CacheRequest::new("1.  weekly report   - takes 30 minutes", ctx);
        let c = CacheRequest::new(
            "1. Weekly report\n- takes 30 minutes",
            json!({"domains": ["Sales"]}),
        );
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_hit_after_set() {
        let cache = ResponseCache::in_memory(CacheConfig::default());
        let req = CacheRequest::new("prompt", json!({}));

        assert_eq!(cache.get(&req), None);
        cache.set(&req, "[1,2]");
        assert_eq!(cache.get(&req).as_deref(), Some("[1,2]"));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate, 50.0);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = ResponseCache::in_memory(CacheConfig::default());
        let req = CacheRequest::new("prompt", json!({}));
        cache.set_with_ttl(&req, "x", Duration::ZERO);
        assert_eq!(cache.get(&req), None);
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = ResponseCache::disabled();
        let req = CacheRequest::new("prompt", json!({}));
        cache.set(&req, "x");
        assert_eq!(cache.get(&req), None);
        let stats = cache.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_invalidate_scope() {
        let cache = ResponseCache::in_memory(CacheConfig::default());
        let sales = CacheRequest::new("a", json!(1)).with_scope("domains:Sales");
        let finance = CacheRequest::new("b", json!(2)).with_scope("domains:Finance");
        cache.set(&sales, "s");
        cache.set(&finance, "f");

        assert_eq!(cache.invalidate("domains:Sales"), 1);
        assert_eq!(cache.get(&sales), None);
        assert_eq!(cache.get(&finance).as_deref(), Some("f"));
    }

    #[test]
    fn test_backend_failures_are_swallowed() {
        let cache = ResponseCache::new(Arc::new(BrokenBackend), CacheConfig::default());
        let req = CacheRequest::new("prompt", json!({}));

        cache.set(&req, "x");
        assert_eq!(cache.get(&req), None);
        assert_eq!(cache.invalidate("s"), 0);
        assert_eq!(cache.stats(), CacheStats { enabled: true, ..Default::default() });
    }

    #[test]
    fn test_hit_rate_rounding() {
        assert_eq!(hit_rate(0, 0), 0.0);
        assert_eq!(hit_rate(1, 2), 33.33);
        assert_eq!(hit_rate(2, 1), 66.67);
    }
}
