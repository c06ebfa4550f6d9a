//! Cache storage backends.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Which daily counter to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Hit,
    Miss,
}

/// Hit/miss totals for one UTC day (`YYYY-MM-DD`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounters {
    pub day: String,
    pub hits: u64,
    pub misses: u64,
}

/// Storage behind [`super::ResponseCache`].
///
/// Timestamps are unix seconds supplied by the caller; an entry is live while
/// `expires_at > now`. Implementations must be safe to share across tasks.
pub trait CacheBackend: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str, now: i64) -> Result<Option<String>>;

    /// Insert or replace an entry.
    fn set(&self, key: &str, value: &str, expires_at: i64, scope: Option<&str>) -> Result<()>;

    /// Remove every entry tagged with `scope`. Returns the number removed.
    fn delete_scope(&self, scope: &str) -> Result<usize>;

    /// Remove every entry.
    fn clear(&self) -> Result<usize>;

    /// Remove entries whose expiry has passed.
    fn purge_expired(&self, now: i64) -> Result<usize>;

    /// Number of live entries.
    fn len(&self, now: i64) -> Result<usize>;

    /// Add one to the given counter for `day`.
    fn incr_counter(&self, day: &str, kind: CounterKind) -> Result<()>;

    /// Counters for every day `>= since_day`, oldest first.
    fn counters(&self, since_day: &str) -> Result<Vec<DailyCounters>>;

    /// Drop counters for days `< before_day`.
    fn prune_counters(&self, before_day: &str) -> Result<usize>;
}

struct MemoryEntry {
    value: String,
    expires_at: i64,
    scope: Option<String>,
}

/// Process-local backend. Entries vanish on restart.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    counters: Mutex<BTreeMap<String, (u64, u64)>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, key: &str, now: i64) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, expires_at: i64, scope: Option<&str>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
                scope: scope.map(String::from),
            },
        );
        Ok(())
    }

    fn delete_scope(&self, scope: &str) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, e| e.scope.as_deref() != Some(scope));
        Ok(before - entries.len())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        let n = entries.len();
        entries.clear();
        Ok(n)
    }

    fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok(before - entries.len())
    }

    fn len(&self, now: i64) -> Result<usize> {
        let entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(entries.values().filter(|e| e.expires_at > now).count())
    }

    fn incr_counter(&self, day: &str, kind: CounterKind) -> Result<()> {
        let mut counters = self.counters.lock().map_err(|_| Error::LockPoisoned)?;
        let slot = counters.entry(day.to_string()).or_default();
        match kind {
            CounterKind::Hit => slot.0 += 1,
            CounterKind::Miss => slot.1 += 1,
        }
        Ok(())
    }

    fn counters(&self, since_day: &str) -> Result<Vec<DailyCounters>> {
        let counters = self.counters.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(counters
            .range(since_day.to_string()..)
            .map(|(day, (hits, misses))| DailyCounters {
                day: day.clone(),
                hits: *hits,
                misses: *misses,
            })
            .collect())
    }

    fn prune_counters(&self, before_day: &str) -> Result<usize> {
        let mut counters = self.counters.lock().map_err(|_| Error::LockPoisoned)?;
        let before = counters.len();
        counters.retain(|day, _| day.as_str() >= before_day);
        Ok(before - counters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_exclusive() {
        let backend = MemoryCacheBackend::new();
        backend.set("k", "v", 100, None).unwrap();
        assert_eq!(backend.get("k", 99).unwrap().as_deref(), Some("v"));
        assert_eq!(backend.get("k", 100).unwrap(), None);
        assert_eq!(backend.purge_expired(100).unwrap(), 1);
    }

    #[test]
    fn test_delete_scope() {
        let backend = MemoryCacheBackend::new();
        backend.set("a", "1", 100, Some("domains:Sales")).unwrap();
        backend.set("b", "2", 100, Some("domains:Sales")).unwrap();
        backend.set("c", "3", 100, Some("domains:Finance")).unwrap();
        backend.set("d", "4", 100, None).unwrap();

        assert_eq!(backend.delete_scope("domains:Sales").unwrap(), 2);
        assert_eq!(backend.len(0).unwrap(), 2);
    }

    #[test]
    fn test_counters_window() {
        let backend = MemoryCacheBackend::new();
        backend.incr_counter("2026-01-01", CounterKind::Hit).unwrap();
        backend.incr_counter("2026-01-05", CounterKind::Miss).unwrap();
        backend.incr_counter("2026-01-05", CounterKind::Hit).unwrap();

        let recent = backend.counters("2026-01-02").unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!((recent[0].hits, recent[0].misses), (1, 1));

        assert_eq!(backend.prune_counters("2026-01-02").unwrap(), 1);
    }
}
