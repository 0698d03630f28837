use crate::core::cache::Cache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expiry| now < expiry)
    }
}

/// Process-local TTL cache. Expired entries are dropped on the read that
/// finds them.
pub struct MemoryCache<K, V> {
    label: &'static str,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// A cache whose log lines carry `label`.
    pub fn named(label: &'static str) -> Self {
        MemoryCache {
            label,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K: Eq + Hash, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        let live = entries.get(key).map(|entry| entry.is_live(Instant::now()));
        match live {
            Some(true) => {
                debug!(cache = self.label, ?key, "hit");
                entries.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                debug!(cache = self.label, ?key, "expired");
                entries.remove(key);
                None
            }
            None => {
                debug!(cache = self.label, ?key, "miss");
                None
            }
        }
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        debug!(cache = self.label, ?key, ?ttl, "put");
        self.entries
            .lock()
            .await
            .insert(key, Entry { value, expires_at });
    }

    async fn remove(&self, key: &K) {
        let removed = self.entries.lock().await.remove(key).is_some();
        debug!(cache = self.label, ?key, removed, "remove");
    }

    async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        debug!(cache = self.label, dropped = entries.len(), "clear");
        entries.clear();
    }
}
