//! SQLite-backed response cache.
//!
//! Shares one connection behind a Mutex, like the rest of the crate's SQLite
//! access. Entries and daily counters survive restarts.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use super::backend::{CacheBackend, CounterKind, DailyCounters};
use crate::error::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    scope       TEXT,
    expires_at  INTEGER NOT NULL,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_response_cache_scope ON response_cache(scope);
CREATE INDEX IF NOT EXISTS idx_response_cache_expires ON response_cache(expires_at);

CREATE TABLE IF NOT EXISTS cache_metrics (
    day     TEXT PRIMARY KEY,
    hits    INTEGER NOT NULL DEFAULT 0,
    misses  INTEGER NOT NULL DEFAULT 0
);
"#;

pub struct SqliteCacheBackend {
    conn: Mutex<Connection>,
}

impl SqliteCacheBackend {
    /// Open (creating if needed) the cache database at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory database, for tests and one-shot CLI runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

impl CacheBackend for SqliteCacheBackend {
    fn get(&self, key: &str, now: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM response_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, expires_at: i64, scope: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO response_cache (key, value, scope, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, strftime('%s','now'))",
            params![key, value, scope, expires_at],
        )?;
        Ok(())
    }

    fn delete_scope(&self, scope: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let n = conn.execute("DELETE FROM response_cache WHERE scope = ?1", params![scope])?;
        Ok(n)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let n = conn.execute("DELETE FROM response_cache", [])?;
        Ok(n)
    }

    fn purge_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let n = conn.execute("DELETE FROM response_cache WHERE expires_at <= ?1", params![now])?;
        Ok(n)
    }

    fn len(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM response_cache WHERE expires_at > ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn incr_counter(&self, day: &str, kind: CounterKind) -> Result<()> {
        let (hits, misses) = match kind {
            CounterKind::Hit => (1, 0),
            CounterKind::Miss => (0, 1),
        };
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO cache_metrics (day, hits, misses) VALUES (?1, ?2, ?3)
             ON CONFLICT(day) DO UPDATE SET
                hits = hits + excluded.hits,
                misses = misses + excluded.misses",
            params![day, hits, misses],
        )?;
        Ok(())
    }

    fn counters(&self, since_day: &str) -> Result<Vec<DailyCounters>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT day, hits, misses FROM cache_metrics WHERE day >= ?1 ORDER BY day ASC",
        )?;
        let rows = stmt
            .query_map(params![since_day], |row| {
                Ok(DailyCounters {
                    day: row.get(0)?,
                    hits: row.get::<_, i64>(1)? as u64,
                    misses: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn prune_counters(&self, before_day: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let n = conn.execute("DELETE FROM cache_metrics WHERE day < ?1", params![before_day])?;
        Ok(n)
    }
}
