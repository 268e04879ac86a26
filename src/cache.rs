//! Keyed result cache with TTL expiry and tag-based bulk invalidation.
//!
//! The cache is injected into the engine rather than living as a module-level
//! singleton, so tests can substitute a deterministic clock. Entries carry
//! the owning entity's relation name as a tag; one write invalidates every
//! outstanding list-query variant for that entity at once.
//!
//! Concurrent recomputation for the same key is not deduplicated. With TTLs
//! on the order of a second the duplicate work is bounded and acceptable;
//! single-flight would be a strict improvement, not a contract change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Time source for expiry decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).expect("duration out of range");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// -----------------------------
/// Cache contract
/// -----------------------------
#[async_trait]
pub trait ListCache: Send + Sync + 'static {
    /// Returns the stored value if present and within TTL. A hit is served
    /// without re-validation; callers accept up to `ttl` of staleness.
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[&str]);

    /// Drops every entry carrying `tag`, regardless of key.
    async fn invalidate(&self, tag: &str);
}

struct Entry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    ttl: Duration,
    tags: Vec<String>,
}

/// In-process cache. Expired entries are dropped lazily on read.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn expired(&self, entry: &Entry) -> bool {
        let age = self.clock.now() - entry.stored_at;
        age >= chrono::Duration::from_std(entry.ttl).expect("duration out of range")
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if !self.expired(entry) => {
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!(key, "cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[&str]) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: self.clock.now(),
                ttl,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    async fn invalidate(&self, tag: &str) {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        debug!(tag, dropped = before - entries.len(), "cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> (ManualClock, MemoryCache) {
        let clock = ManualClock::new(Utc::now());
        let cache = MemoryCache::with_clock(Arc::new(clock.clone()));
        (clock, cache)
    }

    #[tokio::test]
    async fn hit_within_ttl_miss_after() {
        let (clock, cache) = manual();
        cache
            .put("k", serde_json::json!(1), Duration::from_secs(1), &["orders"])
            .await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!(1)));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn tag_invalidation_drops_all_variants() {
        let (_clock, cache) = manual();
        let ttl = Duration::from_secs(3600);
        cache.put("orders:a", serde_json::json!(1), ttl, &["orders"]).await;
        cache.put("orders:b", serde_json::json!(2), ttl, &["orders"]).await;
        cache.put("products:a", serde_json::json!(3), ttl, &["products"]).await;

        cache.invalidate("orders").await;
        assert_eq!(cache.get("orders:a").await, None);
        assert_eq!(cache.get("orders:b").await, None);
        assert_eq!(cache.get("products:a").await, Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn put_overwrites_previous_entry() {
        let (_clock, cache) = manual();
        let ttl = Duration::from_secs(10);
        cache.put("k", serde_json::json!("old"), ttl, &["orders"]).await;
        cache.put("k", serde_json::json!("new"), ttl, &["orders"]).await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!("new")));
    }
}
