//! Conditional document cache backed by redb.
//!
//! Entries carry a TTL and the server's revalidator (ETag/Last-Modified).
//! A fresh entry short-circuits the network entirely; an expired entry is
//! revalidated conditionally, and a "not modified" reply extends the expiry
//! while keeping the stored body.
//!
//! The store is shared by every concurrent source batch. Storage failures
//! are retried with bounded exponential backoff; persistent failure
//! degrades to an uncached fetch with a warning, never a crash.

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::transport::Revalidator;
use super::FetchError;

const CACHE_TABLE: TableDefinition<'static, &str, &[u8]> = TableDefinition::new("documents");

/// What a fetch closure produced for the cache to act on.
#[derive(Debug, Clone)]
pub enum FetchedDoc {
    Full {
        body: String,
        revalidator: Option<Revalidator>,
    },
    NotModified,
    Absent,
}

/// What the cache hands back to the scheduler.
#[derive(Debug, Clone)]
pub enum CachedDoc {
    Document { body: String, from_cache: bool },
    Absent,
}

/// Cache entry as persisted. Timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    body: String,
    revalidator: Option<Revalidator>,
    expires_at: i64,
    fetched_at: i64,
}

/// Summary of cache contents for the `cache status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub expired: usize,
    pub total_bytes: u64,
}

pub struct ConditionalCache {
    db: Database,
    retries: u32,
    base_delay: Duration,
}

impl ConditionalCache {
    /// Open (or create) the cache store and eagerly create its table so
    /// that reads work before the first insert.
    pub fn open(path: &Path) -> Result<Self, FetchError> {
        let db = Database::create(path).map_err(|e| FetchError::Store(e.to_string()))?;
        {
            let txn = db
                .begin_write()
                .map_err(|e| FetchError::Store(e.to_string()))?;
            txn.open_table(CACHE_TABLE)
                .map_err(|e| FetchError::Store(e.to_string()))?;
            txn.commit().map_err(|e| FetchError::Store(e.to_string()))?;
        }
        Ok(Self {
            db,
            retries: 3,
            base_delay: Duration::from_millis(25),
        })
    }

    /// Override the contention retry policy.
    pub fn with_retry_policy(mut self, retries: u32, base_delay: Duration) -> Self {
        self.retries = retries;
        self.base_delay = base_delay;
        self
    }

    /// Cache key for a request URL (query params included in the URL).
    pub fn key_for(url: &str) -> String {
        blake3::hash(url.as_bytes()).to_hex().to_string()
    }

    /// Fetch through the cache.
    ///
    /// - fresh entry: returns the cached body, no call to `fetch`.
    /// - expired entry: calls `fetch` with the stored revalidator; a
    ///   `NotModified` reply keeps the old body and extends expiry, a
    ///   `Full` reply replaces body + revalidator + expiry.
    /// - no entry: calls `fetch` with no revalidator and inserts.
    pub fn get_or_fetch(
        &self,
        key: &str,
        ttl: Duration,
        fetch: impl FnOnce(Option<&Revalidator>) -> Result<FetchedDoc, FetchError>,
    ) -> Result<CachedDoc, FetchError> {
        let now = Utc::now().timestamp();

        let existing = match self.with_retry("read", || self.read_entry(key)) {
            Ok(entry) => entry,
            Err(e) => {
                // Persistent store trouble: degrade to an uncached fetch.
                warn!(key, error = %e, "cache read failed, fetching uncached");
                return match fetch(None)? {
                    FetchedDoc::Full { body, .. } => Ok(CachedDoc::Document {
                        body,
                        from_cache: false,
                    }),
                    FetchedDoc::Absent => Ok(CachedDoc::Absent),
                    FetchedDoc::NotModified => Err(FetchError::Store(
                        "not-modified reply without a cached entry".into(),
                    )),
                };
            }
        };

        if let Some(entry) = &existing {
            if now < entry.expires_at {
                return Ok(CachedDoc::Document {
                    body: entry.body.clone(),
                    from_cache: true,
                });
            }
        }

        let revalidator = existing.as_ref().and_then(|e| e.revalidator.clone());
        match fetch(revalidator.as_ref())? {
            FetchedDoc::Full { body, revalidator } => {
                let entry = StoredEntry {
                    body: body.clone(),
                    revalidator,
                    expires_at: now + ttl.as_secs() as i64,
                    fetched_at: now,
                };
                if let Err(e) = self.with_retry("write", || self.write_entry(key, &entry)) {
                    warn!(key, error = %e, "cache write failed, returning uncached body");
                }
                Ok(CachedDoc::Document {
                    body,
                    from_cache: false,
                })
            }
            FetchedDoc::NotModified => match existing {
                Some(mut entry) => {
                    debug!(key, "revalidated, extending expiry");
                    entry.expires_at = now + ttl.as_secs() as i64;
                    if let Err(e) = self.with_retry("write", || self.write_entry(key, &entry)) {
                        warn!(key, error = %e, "cache expiry extension failed");
                    }
                    Ok(CachedDoc::Document {
                        body: entry.body,
                        from_cache: true,
                    })
                }
                None => Err(FetchError::Store(
                    "not-modified reply without a cached entry".into(),
                )),
            },
            FetchedDoc::Absent => Ok(CachedDoc::Absent),
        }
    }

    /// Remove entries whose TTL has elapsed. Returns how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, FetchError> {
        let now = Utc::now().timestamp();
        let expired = self.collect_keys(|entry| entry.expires_at <= now)?;
        self.remove_keys(&expired)?;
        Ok(expired.len())
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, FetchError> {
        let all = self.collect_keys(|_| true)?;
        self.remove_keys(&all)?;
        Ok(all.len())
    }

    pub fn status(&self) -> Result<CacheStatus, FetchError> {
        let now = Utc::now().timestamp();
        let txn = self
            .db
            .begin_read()
            .map_err(|e| FetchError::Store(e.to_string()))?;
        let table = txn
            .open_table(CACHE_TABLE)
            .map_err(|e| FetchError::Store(e.to_string()))?;

        let mut status = CacheStatus {
            entries: 0,
            expired: 0,
            total_bytes: 0,
        };
        for item in table.iter().map_err(|e| FetchError::Store(e.to_string()))? {
            let (_, value) = item.map_err(|e| FetchError::Store(e.to_string()))?;
            status.entries += 1;
            status.total_bytes += value.value().len() as u64;
            if let Ok(entry) = serde_json::from_slice::<StoredEntry>(value.value()) {
                if entry.expires_at <= now {
                    status.expired += 1;
                }
            }
        }
        Ok(status)
    }

    // ── storage primitives ──────────────────────────────────────────

    fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, FetchError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| FetchError::Store(e.to_string()))?;
        let table = txn
            .open_table(CACHE_TABLE)
            .map_err(|e| FetchError::Store(e.to_string()))?;
        let Some(guard) = table
            .get(key)
            .map_err(|e| FetchError::Store(e.to_string()))?
        else {
            return Ok(None);
        };
        let entry = serde_json::from_slice(guard.value())
            .map_err(|e| FetchError::Store(format!("corrupt cache entry: {e}")))?;
        Ok(Some(entry))
    }

    // Writes are atomic per key: redb commits the whole transaction or
    // nothing.
    fn write_entry(&self, key: &str, entry: &StoredEntry) -> Result<(), FetchError> {
        let bytes = serde_json::to_vec(entry)
            .map_err(|e| FetchError::Store(format!("encode cache entry: {e}")))?;
        let txn = self
            .db
            .begin_write()
            .map_err(|e| FetchError::Store(e.to_string()))?;
        {
            let mut table = txn
                .open_table(CACHE_TABLE)
                .map_err(|e| FetchError::Store(e.to_string()))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| FetchError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| FetchError::Store(e.to_string()))?;
        Ok(())
    }

    fn collect_keys(
        &self,
        mut predicate: impl FnMut(&StoredEntry) -> bool,
    ) -> Result<Vec<String>, FetchError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| FetchError::Store(e.to_string()))?;
        let table = txn
            .open_table(CACHE_TABLE)
            .map_err(|e| FetchError::Store(e.to_string()))?;

        let mut keys = Vec::new();
        for item in table.iter().map_err(|e| FetchError::Store(e.to_string()))? {
            let (key, value) = item.map_err(|e| FetchError::Store(e.to_string()))?;
            // Unparseable entries are treated as matching so that purge
            // cannot leave corrupt data stranded.
            let matches = serde_json::from_slice::<StoredEntry>(value.value())
                .map(|entry| predicate(&entry))
                .unwrap_or(true);
            if matches {
                keys.push(key.value().to_string());
            }
        }
        Ok(keys)
    }

    fn remove_keys(&self, keys: &[String]) -> Result<(), FetchError> {
        if keys.is_empty() {
            return Ok(());
        }
        let txn = self
            .db
            .begin_write()
            .map_err(|e| FetchError::Store(e.to_string()))?;
        {
            let mut table = txn
                .open_table(CACHE_TABLE)
                .map_err(|e| FetchError::Store(e.to_string()))?;
            for key in keys {
                table
                    .remove(key.as_str())
                    .map_err(|e| FetchError::Store(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| FetchError::Store(e.to_string()))?;
        Ok(())
    }

    /// Bounded exponential backoff around a storage operation.
    fn with_retry<T>(
        &self,
        what: &str,
        op: impl Fn() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.retries {
                        return Err(e);
                    }
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    debug!(what, attempt, ?delay, error = %e, "cache contention, retrying");
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn open_cache(dir: &TempDir) -> ConditionalCache {
        ConditionalCache::open(&dir.path().join("cache.redb")).unwrap()
    }

    fn full(body: &str, etag: Option<&str>) -> FetchedDoc {
        FetchedDoc::Full {
            body: body.to_string(),
            revalidator: etag.map(|e| Revalidator {
                etag: Some(e.to_string()),
                last_modified: None,
            }),
        }
    }

    #[test]
    fn fresh_hit_skips_network() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let calls = AtomicU32::new(0);
        let ttl = Duration::from_secs(300);

        let first = cache
            .get_or_fetch("k", ttl, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(full("body-1", Some("v1")))
            })
            .unwrap();
        let second = cache
            .get_or_fetch("k", ttl, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(full("body-2", Some("v2")))
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1, "one underlying fetch");
        let CachedDoc::Document { body, from_cache } = first else {
            panic!("expected document");
        };
        assert_eq!(body, "body-1");
        assert!(!from_cache);
        let CachedDoc::Document { body, from_cache } = second else {
            panic!("expected document");
        };
        assert_eq!(body, "body-1");
        assert!(from_cache);
    }

    #[test]
    fn expired_entry_revalidates_and_keeps_body() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);

        // Insert with zero TTL so the entry is immediately stale.
        cache
            .get_or_fetch("k", Duration::ZERO, |_| Ok(full("original", Some("v1"))))
            .unwrap();

        // Revalidation path: closure must see the stored revalidator.
        let saw_revalidator = AtomicU32::new(0);
        let doc = cache
            .get_or_fetch("k", Duration::from_secs(300), |reval| {
                assert_eq!(reval.and_then(|r| r.etag.as_deref()), Some("v1"));
                saw_revalidator.fetch_add(1, Ordering::SeqCst);
                Ok(FetchedDoc::NotModified)
            })
            .unwrap();
        assert_eq!(saw_revalidator.load(Ordering::SeqCst), 1);
        let CachedDoc::Document { body, from_cache } = doc else {
            panic!("expected document");
        };
        assert_eq!(body, "original", "304 keeps the stored body");
        assert!(from_cache);

        // Expiry was extended: the next lookup is a fresh hit.
        let doc = cache
            .get_or_fetch("k", Duration::from_secs(300), |_| {
                panic!("entry should be fresh after revalidation")
            })
            .unwrap();
        let CachedDoc::Document { body, .. } = doc else {
            panic!("expected document");
        };
        assert_eq!(body, "original");
    }

    #[test]
    fn expired_entry_replaced_on_change() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);

        cache
            .get_or_fetch("k", Duration::ZERO, |_| Ok(full("old", Some("v1"))))
            .unwrap();
        let doc = cache
            .get_or_fetch("k", Duration::from_secs(300), |_| {
                Ok(full("new", Some("v2")))
            })
            .unwrap();
        let CachedDoc::Document { body, from_cache } = doc else {
            panic!("expected document");
        };
        assert_eq!(body, "new");
        assert!(!from_cache);
    }

    #[test]
    fn absent_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let doc = cache
                .get_or_fetch("missing", Duration::from_secs(300), |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(FetchedDoc::Absent)
                })
                .unwrap();
            assert!(matches!(doc, CachedDoc::Absent));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2, "absence is re-checked");
    }

    #[test]
    fn purge_and_status() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);

        cache
            .get_or_fetch("stale", Duration::ZERO, |_| Ok(full("a", None)))
            .unwrap();
        cache
            .get_or_fetch("fresh", Duration::from_secs(300), |_| Ok(full("b", None)))
            .unwrap();

        let status = cache.status().unwrap();
        assert_eq!(status.entries, 2);
        assert_eq!(status.expired, 1);

        assert_eq!(cache.purge_expired().unwrap(), 1);
        let status = cache.status().unwrap();
        assert_eq!(status.entries, 1);
        assert_eq!(status.expired, 0);
    }

    #[test]
    fn clear_empties_the_store() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        cache
            .get_or_fetch("a", Duration::from_secs(300), |_| Ok(full("a", None)))
            .unwrap();
        cache
            .get_or_fetch("b", Duration::from_secs(300), |_| Ok(full("b", None)))
            .unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.status().unwrap().entries, 0);
    }

    #[test]
    fn key_for_is_stable() {
        assert_eq!(
            ConditionalCache::key_for("https://x/a?b=1"),
            ConditionalCache::key_for("https://x/a?b=1")
        );
        assert_ne!(
            ConditionalCache::key_for("https://x/a?b=1"),
            ConditionalCache::key_for("https://x/a?b=2")
        );
    }
}
